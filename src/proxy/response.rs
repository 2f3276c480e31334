//! Gateway-internal response representation.
//!
//! # Design Decisions
//! - Exactly one content carrier is active: either `data` (decode path) or
//!   `io` (passthrough path)
//! - `is_complete` means "processing finished", so passthrough responses
//!   also carry `true`
//! - Status code is recorded on both paths

use http::{HeaderMap, StatusCode};

use crate::encoding::Payload;
use crate::proxy::stream::ResponseStream;

/// Upstream response metadata kept alongside the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub status_code: StatusCode,
    pub headers: HeaderMap,
}

/// A normalized upstream response.
#[derive(Debug, Default)]
pub struct Response {
    /// Decoded payload. Empty for passthrough responses.
    pub data: Payload,
    /// Whether the parser finished processing the response.
    pub is_complete: bool,
    /// Still-open upstream body, passthrough path only.
    pub io: Option<ResponseStream>,
    pub metadata: Metadata,
}

impl Response {
    /// A fully decoded response.
    pub fn decoded(data: Payload, metadata: Metadata) -> Self {
        Self {
            data,
            is_complete: true,
            io: None,
            metadata,
        }
    }

    /// A response whose body is still an open stream.
    pub fn streaming(io: ResponseStream, metadata: Metadata) -> Self {
        Self {
            data: Payload::new(),
            is_complete: true,
            io: Some(io),
            metadata,
        }
    }

    /// True when the body is carried by `io` rather than `data`.
    pub fn is_streaming(&self) -> bool {
        self.io.is_some()
    }

    /// Take ownership of the passthrough stream, if any.
    pub fn take_stream(&mut self) -> Option<ResponseStream> {
        self.io.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decoded_response_has_no_stream() {
        let mut data = Payload::new();
        data.insert("a".into(), json!(1));
        let mut response = Response::decoded(data, Metadata::default());

        assert!(response.is_complete);
        assert!(!response.is_streaming());
        assert!(response.take_stream().is_none());
        assert_eq!(response.metadata.status_code, StatusCode::OK);
    }

    #[test]
    fn default_is_incomplete() {
        let response = Response::default();
        assert!(!response.is_complete);
        assert!(response.data.is_empty());
    }
}
