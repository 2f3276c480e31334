//! Gateway configuration.
//!
//! ```text
//! gateway.toml
//!     → loader::parse_config (toml → GatewayConfig)
//!     → validation::validate_config (every error collected)
//!     → proxy::ParserRegistry::from_config
//!
//! watcher::ConfigWatcher
//!     → same parse + validate on file change, unchanged contents skipped
//!     → proxy::SharedRegistry::reload
//! ```
//!
//! A config that fails validation on reload is logged and dropped; the
//! running registry stays in place.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::BackendConfig;
pub use schema::EncodingKind;
pub use schema::GatewayConfig;
