//! Upstream response normalization for an API gateway.

pub mod config;
pub mod encoding;
pub mod observability;
pub mod proxy;

pub use config::schema::GatewayConfig;
pub use proxy::{passthrough, ParserConfig, Response, ResponseParser, SharedRegistry};
