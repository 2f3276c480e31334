//! Upstream response normalization.
//!
//! # Data Flow
//! ```text
//! http::Response<B>
//!     → collect body (raced against cancellation)
//!     → ContentEncoding::decompress
//!     → Decoder
//!     → project_headers (allow-list)
//!     → EntityFormatter
//!     → Response
//!
//! passthrough:
//! http::Response<B> → ResponseStream (status + all headers kept)
//! ```
//!
//! # Design Decisions
//! - Fail fast: a decode error aborts the parse, no partial payload, no retry
//! - The body is owned by the collect future, so it is released on every
//!   exit path, unwinding included
//! - The decompressor is dropped before `parse` returns
//! - Both paths record the upstream status code

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use http::HeaderName;
use http_body::Body;
use http_body_util::BodyExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::BackendConfig;
use crate::encoding::decoder::NoopDecoder;
use crate::encoding::{ContentEncoding, DecodeError, Decoder};
use crate::observability::metrics::{self, ParseOutcome};
use crate::proxy::formatter::{EntityFormatter, IdentityFormatter};
use crate::proxy::headers::{allow_list, project_headers};
use crate::proxy::response::{Metadata, Response};
use crate::proxy::stream::ResponseStream;
use crate::proxy::BoxError;

/// Errors produced by the decode path.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The decoder rejected the body.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The upstream body failed before it was fully received.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] BoxError),

    /// The caller's cancellation token fired while the body was in flight.
    #[error("response parsing cancelled")]
    Cancelled,
}

/// Decoder and formatter used by a [`ResponseParser`].
#[derive(Clone)]
pub struct ParserConfig {
    pub decoder: Arc<dyn Decoder>,
    pub formatter: Arc<dyn EntityFormatter>,
}

impl ParserConfig {
    pub fn new(decoder: Arc<dyn Decoder>, formatter: Arc<dyn EntityFormatter>) -> Self {
        Self { decoder, formatter }
    }
}

impl Default for ParserConfig {
    /// Ignores the body and leaves the response unformatted.
    fn default() -> Self {
        Self {
            decoder: Arc::new(NoopDecoder),
            formatter: Arc::new(IdentityFormatter),
        }
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig").finish_non_exhaustive()
    }
}

/// Decode-path parser for one backend.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    backend: String,
    headers: Vec<HeaderName>,
    config: ParserConfig,
}

impl ResponseParser {
    /// Create a parser with an explicit header allow-list.
    pub fn new(backend: impl Into<String>, headers: Vec<HeaderName>, config: ParserConfig) -> Self {
        Self {
            backend: backend.into(),
            headers,
            config,
        }
    }

    /// Create a parser using the backend's name and `response_headers`.
    pub fn from_backend(backend: &BackendConfig, config: ParserConfig) -> Self {
        Self::new(
            backend.name.clone(),
            allow_list(&backend.response_headers),
            config,
        )
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Header names propagated from upstream responses.
    pub fn allowed_headers(&self) -> &[HeaderName] {
        &self.headers
    }

    /// Fully decode and format an upstream response.
    pub async fn parse<B>(
        &self,
        cancel: &CancellationToken,
        response: http::Response<B>,
    ) -> Result<Response, ParseError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let encoding = ContentEncoding::from_headers(&parts.headers);

        tracing::debug!(
            backend = %self.backend,
            status = %parts.status,
            encoding = encoding.as_str(),
            "Parsing upstream response"
        );

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(backend = %self.backend, "Parse cancelled while reading body");
                metrics::record_parse(&self.backend, ParseOutcome::Cancelled);
                return Err(ParseError::Cancelled);
            }
            collected = body.collect() => match collected {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    let e: BoxError = e.into();
                    tracing::warn!(backend = %self.backend, error = %e, "Upstream body failed");
                    metrics::record_parse(&self.backend, ParseOutcome::BodyError);
                    return Err(ParseError::Body(e));
                }
            },
        };

        let decoded = {
            let mut reader = encoding.decompress(raw.reader());
            self.config.decoder.decode(&mut *reader)
        };
        let data = match decoded {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(backend = %self.backend, error = %e, "Failed to decode upstream response");
                metrics::record_parse(&self.backend, ParseOutcome::DecodeError);
                return Err(e.into());
            }
        };

        let metadata = Metadata {
            status_code: parts.status,
            headers: project_headers(&self.headers, &parts.headers),
        };
        let response = self
            .config
            .formatter
            .format(Response::decoded(data, metadata));

        metrics::record_parse(&self.backend, ParseOutcome::Decoded);
        tracing::debug!(
            backend = %self.backend,
            keys = response.data.len(),
            "Upstream response parsed"
        );
        Ok(response)
    }
}

/// Wrap an upstream response without decoding it.
///
/// Status and the full header map are copied verbatim. The body is handed to
/// a [`ResponseStream`] bound to a child of `cancel`; whoever reads it owns
/// closing it.
pub fn passthrough<B>(cancel: &CancellationToken, response: http::Response<B>) -> Response
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    Response::streaming(
        ResponseStream::new(body, cancel.child_token()),
        Metadata {
            status_code: parts.status,
            headers: parts.headers,
        },
    )
}
