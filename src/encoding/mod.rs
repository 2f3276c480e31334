//! Body encoding subsystem.
//!
//! # Data Flow
//! ```text
//! upstream body bytes
//!     → detect.rs (Content-Encoding → decompressor)
//!     → decoder.rs (bytes → structured payload)
//! ```
//!
//! # Design Decisions
//! - Only gzip is decompressed; other encodings pass through
//! - Decompression errors surface on first read, as decode errors
//! - Decoders are injected capabilities, never chosen by the parser itself

pub mod decoder;
pub mod detect;

pub use decoder::{decoder_for, DecodeError, Decoder, Payload};
pub use detect::ContentEncoding;
