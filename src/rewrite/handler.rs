//! Middleware construction and the per-request entry point.

use axum::http::Request;
use bytes::Bytes;

use crate::rewrite::observer::{RewriteObserver, TracingObserver};
use crate::rewrite::rule::{ConfigurationError, RewriteConfig, RuleSet};
use crate::rewrite::writer::{InterceptedResponse, ResponseSink};

/// A handler that writes its response through a [`ResponseSink`].
///
/// Handlers are expected to set headers, call `commit`, then write the body.
pub trait ResponseHandler: Send + Sync {
    fn handle(&self, request: &Request<Bytes>, sink: &mut dyn ResponseSink);
}

impl<F> ResponseHandler for F
where
    F: Fn(&Request<Bytes>, &mut dyn ResponseSink) + Send + Sync,
{
    fn handle(&self, request: &Request<Bytes>, sink: &mut dyn ResponseSink) {
        self(request, sink)
    }
}

/// Rewrites response headers of the wrapped handler.
pub struct HeaderRewrite<H> {
    name: String,
    next: H,
    rules: RuleSet,
    observer: Box<dyn RewriteObserver>,
}

/// Compile `rewrites` and wrap `next`.
///
/// Events are reported through a [`TracingObserver`] named after the
/// instance; use [`HeaderRewrite::with_observer`] to change that.
pub fn build<H: ResponseHandler>(
    next: H,
    rewrites: &[RewriteConfig],
    name: impl Into<String>,
) -> Result<HeaderRewrite<H>, ConfigurationError> {
    let name = name.into();
    let rules = RuleSet::compile(rewrites)?;

    tracing::info!(instance = %name, rules = rules.len(), "Header rewrite middleware built");

    Ok(HeaderRewrite {
        observer: Box::new(TracingObserver::new(name.clone())),
        name,
        next,
        rules,
    })
}

impl<H> HeaderRewrite<H> {
    pub fn with_observer(mut self, observer: impl RewriteObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

impl<H: ResponseHandler> ResponseHandler for HeaderRewrite<H> {
    fn handle(&self, request: &Request<Bytes>, sink: &mut dyn ResponseSink) {
        let mut writer = InterceptedResponse::new(sink, &self.rules, self.observer.as_ref());
        self.next.handle(request, &mut writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::observer::tests::RecordingObserver;
    use crate::rewrite::writer::BufferedResponse;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    fn upstream(request: &Request<Bytes>, sink: &mut dyn ResponseSink) {
        let headers = sink.headers_mut();
        headers.insert("x-trace", HeaderValue::from_static("secret-42"));
        headers.insert("x-path", HeaderValue::from_str(request.uri().path()).unwrap());
        sink.commit(StatusCode::ACCEPTED);
        sink.write(b"done").unwrap();
    }

    fn request(path: &str) -> Request<Bytes> {
        Request::builder().uri(path).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_build_and_handle() {
        let middleware = build(
            upstream,
            &[RewriteConfig::new("X-Trace", r"secret-(\d+)", "redacted-$1")],
            "redact",
        )
        .unwrap();
        assert_eq!(middleware.name(), "redact");
        assert_eq!(middleware.rules().len(), 1);

        let mut sink = BufferedResponse::new();
        middleware.handle(&request("/orders"), &mut sink);

        assert_eq!(sink.status(), Some(StatusCode::ACCEPTED));
        let sent = sink.sent_headers().unwrap();
        assert_eq!(sent["x-trace"], "redacted-42");
        assert_eq!(sent["x-path"], "/orders");
        assert_eq!(sink.body(), b"done");
    }

    #[test]
    fn test_build_fails_on_bad_pattern() {
        let result = build(
            upstream,
            &[RewriteConfig::new("X-Trace", "(unclosed", "x")],
            "broken",
        );
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidPattern { ref header, .. }) if header == "X-Trace"
        ));
    }

    #[test]
    fn test_empty_rules_pass_through() {
        let middleware = build(upstream, &[], "noop").unwrap();

        let mut direct = BufferedResponse::new();
        upstream(&request("/a"), &mut direct);

        let mut wrapped = BufferedResponse::new();
        middleware.handle(&request("/a"), &mut wrapped);

        assert_eq!(wrapped.sent_headers(), direct.sent_headers());
        assert_eq!(wrapped.body(), direct.body());
    }

    #[test]
    fn test_custom_observer_sees_events() {
        let observer = Arc::new(RecordingObserver::default());
        let middleware = build(
            upstream,
            &[
                RewriteConfig::new("X-Trace", r"secret-(\d+)", "redacted-$1"),
                RewriteConfig::new("X-Absent", ".*", ""),
            ],
            "observed",
        )
        .unwrap()
        .with_observer(observer.clone());

        middleware.handle(&request("/"), &mut BufferedResponse::new());

        assert_eq!(
            observer.take(),
            vec![
                "rewritten X-Trace secret-42 -> redacted-42",
                "none X-Absent",
            ]
        );
    }

    #[test]
    fn test_middlewares_nest() {
        let inner = build(
            upstream,
            &[RewriteConfig::new("X-Trace", "secret", "inner")],
            "inner",
        )
        .unwrap();
        let outer = build(
            inner,
            &[RewriteConfig::new("X-Trace", "inner", "outer")],
            "outer",
        )
        .unwrap();

        let mut sink = BufferedResponse::new();
        outer.handle(&request("/"), &mut sink);

        assert_eq!(sink.sent_headers().unwrap()["x-trace"], "outer-42");
    }
}
