//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Capture hooks and the proxy produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (blob and request counters)
//!     → span.rs (span identity, trace propagation, blob key tags)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows from inbound headers to outbound calls
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod span;

pub use span::ActiveSpan;
