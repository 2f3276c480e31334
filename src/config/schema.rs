//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Root configuration for the response gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Backend definitions, one response parser each.
    pub backends: Vec<BackendConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Look up a backend by name.
    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name == name)
    }
}

/// How a backend's response body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum EncodingKind {
    /// JSON object (or array, for collection backends).
    #[default]
    #[serde(rename = "json")]
    Json,
    /// Any JSON document; non-objects are wrapped.
    #[serde(rename = "safejson")]
    SafeJson,
    /// Raw UTF-8 text under the `content` key.
    #[serde(rename = "string")]
    String,
    /// Body is streamed to the caller untouched.
    #[serde(rename = "no-op")]
    NoOp,
}

impl EncodingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingKind::Json => "json",
            EncodingKind::SafeJson => "safejson",
            EncodingKind::String => "string",
            EncodingKind::NoOp => "no-op",
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Body encoding of the backend's responses.
    #[serde(default)]
    pub encoding: EncodingKind,

    /// Whether the backend returns a JSON array instead of an object.
    #[serde(default)]
    pub is_collection: bool,

    /// Upstream response headers allowed through to the gateway response.
    #[serde(default)]
    pub response_headers: Vec<String>,

    /// Dot-path of a sub-object that replaces the whole payload.
    #[serde(default)]
    pub target: Option<String>,

    /// Dot-paths of fields to keep. Takes precedence over `deny`.
    #[serde(default)]
    pub allow: Vec<String>,

    /// Dot-paths of fields to drop.
    #[serde(default)]
    pub deny: Vec<String>,

    /// Top-level key renames (old name → new name).
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,

    /// Wrap the payload under this key.
    #[serde(default)]
    pub group: Option<String>,
}

impl BackendConfig {
    /// A backend with only the required fields set.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            encoding: EncodingKind::default(),
            is_collection: false,
            response_headers: Vec::new(),
            target: None,
            allow: Vec::new(),
            deny: Vec::new(),
            mapping: BTreeMap::new(),
            group: None,
        }
    }

    /// Base URL of the backend.
    pub fn base_url(&self) -> Result<url::Url, url::ParseError> {
        if self.address.contains("://") {
            url::Url::parse(&self.address)
        } else {
            url::Url::parse(&format!("http://{}", self.address))
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time until response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
