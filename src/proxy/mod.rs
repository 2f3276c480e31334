//! Upstream response normalization subsystem.
//!
//! # Data Flow
//! ```text
//! upstream http::Response
//!     → registry.rs (pick the backend's parser)
//!     → parser.rs (decode path, or passthrough)
//!         → headers.rs (allow-list projection)
//!         → formatter.rs (target / allow / deny / mapping / group)
//!         → stream.rs (passthrough body handle)
//!     → response.rs (gateway-internal Response)
//! ```

pub mod formatter;
pub mod headers;
pub mod parser;
pub mod registry;
pub mod response;
pub mod stream;

/// Type-erased error from an upstream body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use formatter::{EntityFormatter, IdentityFormatter, PropertyFormatter};
pub use parser::{passthrough, ParseError, ParserConfig, ResponseParser};
pub use registry::{BackendParser, ParserRegistry, RegistryError, SharedRegistry};
pub use response::{Metadata, Response};
pub use stream::{ResponseStream, StreamError};
