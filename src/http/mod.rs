//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, tracing)
//!     → proxy handler forwards to the upstream
//!     → middleware.rs (rewrite pass at commit, i.e. when the response
//!       head leaves the inner service)
//!     → Send to client
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{rewrite_headers_middleware, RewriteState};
pub use server::{HttpServer, ServerError};
