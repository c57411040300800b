//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Rewrite pass and proxy handler produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON optional)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The rewrite core only talks to a RewriteObserver; the observers here
//!   bridge it to tracing and metrics
//! - Request ID flows through the trace layer
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
