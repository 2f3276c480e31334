//! Body decoders.
//!
//! A [`Decoder`] turns a (possibly decompressed) byte source into the
//! structured payload of a gateway response. Decoders are plain
//! capabilities: any `Fn(&mut dyn Read) -> Result<Payload, DecodeError>`
//! closure is one.

use std::io::Read;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::EncodingKind;

/// Structured payload of a decoded response.
pub type Payload = Map<String, Value>;

/// Key used to wrap array bodies.
pub const COLLECTION_KEY: &str = "collection";

/// Key used to wrap text and scalar bodies.
pub const CONTENT_KEY: &str = "content";

/// The body could not be turned into a payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading the body failed, including malformed gzip streams.
    #[error("failed to read body: {0}")]
    Io(#[from] std::io::Error),

    /// The body is not the JSON shape the decoder expects.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is not valid UTF-8 text.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decodes a byte source into a payload.
pub trait Decoder: Send + Sync {
    fn decode(&self, reader: &mut dyn Read) -> Result<Payload, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(&mut dyn Read) -> Result<Payload, DecodeError> + Send + Sync,
{
    fn decode(&self, reader: &mut dyn Read) -> Result<Payload, DecodeError> {
        self(reader)
    }
}

/// Decodes a JSON object, or a JSON array when `collection` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder {
    pub collection: bool,
}

impl Decoder for JsonDecoder {
    fn decode(&self, reader: &mut dyn Read) -> Result<Payload, DecodeError> {
        if self.collection {
            let items: Vec<Value> = serde_json::from_reader(reader)?;
            let mut payload = Payload::new();
            payload.insert(COLLECTION_KEY.to_string(), Value::Array(items));
            Ok(payload)
        } else {
            Ok(serde_json::from_reader(reader)?)
        }
    }
}

/// Decodes any JSON document, wrapping arrays and scalars.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeJsonDecoder;

impl Decoder for SafeJsonDecoder {
    fn decode(&self, reader: &mut dyn Read) -> Result<Payload, DecodeError> {
        let value: Value = serde_json::from_reader(reader)?;
        Ok(match value {
            Value::Object(map) => map,
            Value::Array(items) => wrap(COLLECTION_KEY, Value::Array(items)),
            scalar => wrap(CONTENT_KEY, scalar),
        })
    }
}

/// Reads the whole body as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringDecoder;

impl Decoder for StringDecoder {
    fn decode(&self, reader: &mut dyn Read) -> Result<Payload, DecodeError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let text = String::from_utf8(buf)?;
        Ok(wrap(CONTENT_KEY, Value::String(text)))
    }
}

/// Ignores the body and yields an empty payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDecoder;

impl Decoder for NoopDecoder {
    fn decode(&self, _reader: &mut dyn Read) -> Result<Payload, DecodeError> {
        Ok(Payload::new())
    }
}

fn wrap(key: &str, value: Value) -> Payload {
    let mut payload = Payload::new();
    payload.insert(key.to_string(), value);
    payload
}

/// Stock decoder for a configured encoding.
///
/// Returns `None` for [`EncodingKind::NoOp`], whose bodies are never decoded.
pub fn decoder_for(kind: EncodingKind, is_collection: bool) -> Option<Arc<dyn Decoder>> {
    match kind {
        EncodingKind::Json => Some(Arc::new(JsonDecoder {
            collection: is_collection,
        })),
        EncodingKind::SafeJson => Some(Arc::new(SafeJsonDecoder)),
        EncodingKind::String => Some(Arc::new(StringDecoder)),
        EncodingKind::NoOp => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(decoder: &dyn Decoder, body: &str) -> Result<Payload, DecodeError> {
        let mut reader = body.as_bytes();
        decoder.decode(&mut reader)
    }

    #[test]
    fn json_object() {
        let payload = decode(&JsonDecoder::default(), r#"{"a":1,"b":{"c":"d"}}"#).unwrap();
        assert_eq!(Value::Object(payload), json!({"a": 1, "b": {"c": "d"}}));
    }

    #[test]
    fn json_rejects_array_unless_collection() {
        assert!(matches!(
            decode(&JsonDecoder::default(), "[1,2]"),
            Err(DecodeError::Json(_))
        ));

        let payload = decode(&JsonDecoder { collection: true }, "[1,2]").unwrap();
        assert_eq!(payload[COLLECTION_KEY], json!([1, 2]));
    }

    #[test]
    fn json_truncated_body() {
        assert!(matches!(
            decode(&JsonDecoder::default(), r#"{"a":"#),
            Err(DecodeError::Json(_))
        ));
        assert!(decode(&JsonDecoder::default(), "").is_err());
    }

    #[test]
    fn safejson_wraps_non_objects() {
        let decoder = SafeJsonDecoder;
        assert_eq!(decode(&decoder, r#"{"a":1}"#).unwrap()["a"], json!(1));
        assert_eq!(decode(&decoder, "[true]").unwrap()[COLLECTION_KEY], json!([true]));
        assert_eq!(decode(&decoder, "42").unwrap()[CONTENT_KEY], json!(42));
        assert_eq!(decode(&decoder, r#""hi""#).unwrap()[CONTENT_KEY], json!("hi"));
    }

    #[test]
    fn string_decoder() {
        let payload = decode(&StringDecoder, "<html/>").unwrap();
        assert_eq!(payload[CONTENT_KEY], json!("<html/>"));

        let mut reader: &[u8] = &[0xff, 0xfe];
        assert!(matches!(
            StringDecoder.decode(&mut reader),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn closures_are_decoders() {
        let decoder = |_: &mut dyn Read| -> Result<Payload, DecodeError> {
            Ok(wrap("fixed", json!(true)))
        };
        assert_eq!(decode(&decoder, "ignored").unwrap()["fixed"], json!(true));
    }

    #[test]
    fn noop_has_no_stock_decoder() {
        assert!(decoder_for(EncodingKind::NoOp, false).is_none());
        assert!(decoder_for(EncodingKind::Json, true).is_some());
        assert!(decode(&NoopDecoder, "anything").unwrap().is_empty());
    }
}
