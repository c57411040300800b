//! Response header rewriting proxy library.
//!
//! Rewrites outgoing response header values with ordered regular expression
//! rules, at the moment the response head is committed.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rewrite::{build, ConfigurationError, HeaderRewrite, RewriteConfig, RuleSet};
