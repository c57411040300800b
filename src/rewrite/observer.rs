//! Observability hooks for the rewrite pass.
//!
//! The rewrite pass never logs on its own. It reports what it did to a
//! [`RewriteObserver`] handed in at construction, so hosts choose where the
//! events end up (tracing, metrics, a test recorder).

use axum::http::HeaderValue;
use std::sync::Arc;

/// Something the rewrite pass did to one header.
#[derive(Debug, Clone, Copy)]
pub enum RewriteEvent<'a> {
    /// The response carried no value for the rule's header.
    NoValues { header: &'a str },

    /// The pattern did not match this value; it was re-added unchanged.
    Unmatched {
        header: &'a str,
        value: &'a HeaderValue,
    },

    /// The value was replaced.
    Rewritten {
        header: &'a str,
        original: &'a HeaderValue,
        rewritten: &'a HeaderValue,
    },

    /// The substitution produced bytes that are not a legal header value,
    /// so the original value was kept.
    ValueRejected {
        header: &'a str,
        original: &'a HeaderValue,
    },
}

impl RewriteEvent<'_> {
    /// Header name as declared by the rule.
    pub fn header(&self) -> &str {
        match self {
            RewriteEvent::NoValues { header }
            | RewriteEvent::Unmatched { header, .. }
            | RewriteEvent::Rewritten { header, .. }
            | RewriteEvent::ValueRejected { header, .. } => header,
        }
    }
}

/// Receives events from the rewrite pass.
///
/// Called inline on the request path, so implementations should be cheap.
pub trait RewriteObserver: Send + Sync {
    fn on_event(&self, event: &RewriteEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RewriteObserver for NoopObserver {
    fn on_event(&self, _event: &RewriteEvent<'_>) {}
}

/// Emits events as `tracing` records tagged with the middleware instance.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    instance: String,
}

impl TracingObserver {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }
}

impl RewriteObserver for TracingObserver {
    fn on_event(&self, event: &RewriteEvent<'_>) {
        match event {
            RewriteEvent::NoValues { header } => {
                tracing::debug!(instance = %self.instance, header = %header, "No values at header");
            }
            RewriteEvent::Unmatched { header, .. } => {
                tracing::trace!(instance = %self.instance, header = %header, "No match found");
            }
            // Only the rewritten value is logged; the original is usually what
            // the rule exists to hide.
            RewriteEvent::Rewritten { header, rewritten, .. } => {
                tracing::debug!(
                    instance = %self.instance,
                    header = %header,
                    value = ?rewritten,
                    "Header rewritten"
                );
            }
            RewriteEvent::ValueRejected { header, .. } => {
                tracing::warn!(
                    instance = %self.instance,
                    header = %header,
                    "Replacement is not a valid header value, keeping original"
                );
            }
        }
    }
}

impl<T: RewriteObserver + ?Sized> RewriteObserver for Arc<T> {
    fn on_event(&self, event: &RewriteEvent<'_>) {
        (**self).on_event(event)
    }
}

/// Fans every event out to both observers, left first.
impl<A: RewriteObserver, B: RewriteObserver> RewriteObserver for (A, B) {
    fn on_event(&self, event: &RewriteEvent<'_>) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}
