//! Response header rewriting core.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     [RewriteConfig] (header, regex, replacement)
//!     → rule.rs (compile every pattern, fail fast)
//!     → RuleSet (ordered, immutable, shared by all requests)
//!
//! Per request:
//!     handler.rs (HeaderRewrite::handle)
//!     → writer.rs (InterceptedResponse wraps the host's sink)
//!     → downstream handler sets headers through the wrapper
//!     → commit(status): RuleSet::rewrite runs, then the real sink commits
//!     → body writes pass straight through
//! ```
//!
//! # Design Decisions
//! - Rules run in declaration order; a later rule sees the output of an
//!   earlier one when both target the same header
//! - Substitution is global per value; values keep their position and count
//! - A missing header is a skip, never an error
//! - Rewriting never fails a response; events go to an injected observer

pub mod handler;
pub mod observer;
pub mod rule;
pub mod writer;

pub use handler::{build, HeaderRewrite, ResponseHandler};
pub use observer::{NoopObserver, RewriteEvent, RewriteObserver, TracingObserver};
pub use rule::{ConfigurationError, RewriteConfig, RewriteRule, RuleSet};
pub use writer::{BufferedResponse, InterceptedResponse, ResponseSink, WriterState};
