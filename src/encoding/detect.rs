//! Transport content-encoding detection.
//!
//! Only `gzip` is special-cased; every other value (or no header at all)
//! passes the body through unchanged.

use std::io::Read;

use flate2::read::MultiGzDecoder;
use http::header::CONTENT_ENCODING;
use http::HeaderMap;

/// Transport encoding of an upstream body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Parse from a Content-Encoding header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("gzip") => Self::Gzip,
            _ => Self::Identity,
        }
    }

    /// Detect from the first Content-Encoding value of a header map.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_header(
            headers
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
        }
    }

    /// Wrap `source` in the matching decompressor.
    ///
    /// Gzip bodies may hold several concatenated members; all of them are
    /// decoded. Construction never fails: a malformed gzip header is
    /// reported by the first `read` on the returned reader.
    pub fn decompress<'a, R>(self, source: R) -> Box<dyn Read + 'a>
    where
        R: Read + 'a,
    {
        match self {
            Self::Identity => Box::new(source),
            Self::Gzip => Box::new(MultiGzDecoder::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http::HeaderValue;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn header_values() {
        assert_eq!(ContentEncoding::from_header(None), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(Some("gzip")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(Some(" GZIP ")), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_header(Some("br")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(Some("deflate")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::from_header(Some("")), ContentEncoding::Identity);
    }

    #[test]
    fn first_header_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.append(CONTENT_ENCODING, HeaderValue::from_static("br"));
        assert_eq!(ContentEncoding::from_headers(&headers), ContentEncoding::Gzip);
        assert_eq!(ContentEncoding::from_headers(&HeaderMap::new()), ContentEncoding::Identity);
    }

    #[test]
    fn gzip_round_trip() {
        let compressed = gzip(br#"{"a":1}"#);
        let mut out = String::new();
        ContentEncoding::Gzip
            .decompress(compressed.as_slice())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, r#"{"a":1}"#);
    }

    #[test]
    fn concatenated_members_are_all_decoded() {
        let mut compressed = gzip(b"hello ");
        compressed.extend(gzip(b"world"));

        let mut out = String::new();
        ContentEncoding::Gzip
            .decompress(compressed.as_slice())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn identity_is_untouched() {
        let mut out = Vec::new();
        ContentEncoding::Identity
            .decompress(&b"plain"[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"plain");
    }

    #[test]
    fn malformed_gzip_fails_on_read() {
        let mut reader = ContentEncoding::Gzip.decompress(&b"not gzip at all"[..]);
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }
}
