//! Metrics collection.
//!
//! # Metrics
//! - `gateway_response_parsed_total` (counter): decode-path outcomes by backend
//! - `gateway_response_passthrough_total` (counter): passthrough responses by backend
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding binary installs
//!   an exporter if it wants one
//! - Labels are backend name and outcome only

/// Result of a decode-path parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Decoded,
    DecodeError,
    BodyError,
    Cancelled,
}

impl ParseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseOutcome::Decoded => "decoded",
            ParseOutcome::DecodeError => "decode_error",
            ParseOutcome::BodyError => "body_error",
            ParseOutcome::Cancelled => "cancelled",
        }
    }
}

/// Record the outcome of a decode-path parse.
pub fn record_parse(backend: &str, outcome: ParseOutcome) {
    ::metrics::counter!(
        "gateway_response_parsed_total",
        "backend" => backend.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a response handed through as a raw stream.
pub fn record_passthrough(backend: &str) {
    ::metrics::counter!(
        "gateway_response_passthrough_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}
