//! Per-backend parser wiring.
//!
//! # Responsibilities
//! - Build one parser per configured backend (decoder + formatter + allow-list)
//! - Dispatch upstream responses to the decode or passthrough path
//! - Swap the whole registry atomically on config reload

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::Bytes;
use http_body::Body;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{BackendConfig, GatewayConfig};
use crate::encoding::decoder_for;
use crate::observability::metrics;
use crate::proxy::formatter::PropertyFormatter;
use crate::proxy::parser::{passthrough, ParseError, ParserConfig, ResponseParser};
use crate::proxy::response::Response;
use crate::proxy::BoxError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no parser configured for backend `{0}`")]
    UnknownBackend(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// How a single backend's responses are normalized.
#[derive(Debug, Clone)]
pub enum BackendParser {
    Decode(ResponseParser),
    Passthrough,
}

impl BackendParser {
    pub fn from_backend(backend: &BackendConfig) -> Self {
        match decoder_for(backend.encoding, backend.is_collection) {
            Some(decoder) => {
                let formatter = Arc::new(PropertyFormatter::from_backend(backend));
                BackendParser::Decode(ResponseParser::from_backend(
                    backend,
                    ParserConfig::new(decoder, formatter),
                ))
            }
            None => BackendParser::Passthrough,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, BackendParser::Passthrough)
    }
}

/// Immutable set of backend parsers.
#[derive(Debug, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, BackendParser>,
}

impl ParserRegistry {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let parsers = config
            .backends
            .iter()
            .map(|b| (b.name.clone(), BackendParser::from_backend(b)))
            .collect();
        Self { parsers }
    }

    pub fn get(&self, backend: &str) -> Option<&BackendParser> {
        self.parsers.get(backend)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Normalize an upstream response with the named backend's parser.
    pub async fn normalize<B>(
        &self,
        backend: &str,
        cancel: &CancellationToken,
        response: http::Response<B>,
    ) -> Result<Response, RegistryError>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match self.get(backend) {
            Some(BackendParser::Decode(parser)) => Ok(parser.parse(cancel, response).await?),
            Some(BackendParser::Passthrough) => {
                metrics::record_passthrough(backend);
                tracing::debug!(backend = %backend, "Passing upstream response through");
                Ok(passthrough(cancel, response))
            }
            None => Err(RegistryError::UnknownBackend(backend.to_string())),
        }
    }
}

/// A registry that can be replaced while readers hold the previous one.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<ArcSwap<ParserRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(ParserRegistry::from_config(config))
    }

    /// Snapshot of the current registry.
    pub fn load(&self) -> Arc<ParserRegistry> {
        self.inner.load_full()
    }

    /// Rebuild from a new configuration and swap it in.
    pub fn reload(&self, config: &GatewayConfig) {
        let registry = ParserRegistry::from_config(config);
        tracing::info!(backends = registry.len(), "Parser registry reloaded");
        self.inner.store(Arc::new(registry));
    }
}
