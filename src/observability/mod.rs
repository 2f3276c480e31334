//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! parser, stream and registry produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (parse outcome counters)
//! ```
//!
//! # Design Decisions
//! - Backend name is attached to every event and counter
//! - Metrics are cheap (facade calls are no-ops without a recorder)

pub mod logging;
pub mod metrics;
