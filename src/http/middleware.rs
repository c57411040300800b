//! Header rewrite middleware for axum.
//!
//! In axum a response's head is final once the inner service returns it, so
//! that is where the intercepting writer commits.

use std::io;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{response::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::rewrite::{InterceptedResponse, ResponseSink, RewriteObserver, RuleSet};

/// Shared state of the rewrite middleware.
///
/// The rule set can be replaced at runtime; each request works on the
/// snapshot it loaded when it arrived.
#[derive(Clone)]
pub struct RewriteState {
    rules: Arc<ArcSwap<RuleSet>>,
    observer: Arc<dyn RewriteObserver>,
}

impl RewriteState {
    pub fn new(rules: RuleSet, observer: impl RewriteObserver + 'static) -> Self {
        Self {
            rules: Arc::new(ArcSwap::from_pointee(rules)),
            observer: Arc::new(observer),
        }
    }

    /// Current rule set.
    pub fn rules(&self) -> Arc<RuleSet> {
        self.rules.load_full()
    }

    /// Swap in a new rule set for requests that arrive from now on.
    pub fn replace_rules(&self, rules: RuleSet) {
        self.rules.store(Arc::new(rules));
    }
}

/// Sink over the head of a response produced by an inner service.
///
/// The body stays with the response as a stream, so writes are refused.
struct ResponseHead<'a> {
    parts: &'a mut Parts,
    committed: bool,
}

impl<'a> ResponseHead<'a> {
    fn new(parts: &'a mut Parts) -> Self {
        Self {
            parts,
            committed: false,
        }
    }
}

impl ResponseSink for ResponseHead<'_> {
    fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    fn commit(&mut self, status: StatusCode) {
        self.parts.status = status;
        self.committed = true;
    }

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "response body is streamed by the inner service",
        ))
    }

    fn is_committed(&self) -> bool {
        self.committed
    }
}

/// Middleware function rewriting the headers of every response.
pub async fn rewrite_headers_middleware(
    State(state): State<RewriteState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let rules = state.rules();
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let status = parts.status;
    let mut head = ResponseHead::new(&mut parts);
    InterceptedResponse::new(&mut head, &rules, state.observer.as_ref()).commit(status);

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{NoopObserver, RewriteConfig};
    use axum::{
        http::HeaderValue,
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn leaky() -> impl IntoResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", HeaderValue::from_static("secret-42"));
        headers.append("set-cookie", HeaderValue::from_static("a1"));
        headers.append("set-cookie", HeaderValue::from_static("b1"));
        headers.append("set-cookie", HeaderValue::from_static("a2"));
        (StatusCode::IM_A_TEAPOT, headers, "body")
    }

    fn app(state: RewriteState) -> Router {
        Router::new()
            .route("/", get(leaky))
            .layer(middleware::from_fn_with_state(state, rewrite_headers_middleware))
    }

    fn get_root() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn rules(configs: &[RewriteConfig]) -> RuleSet {
        RuleSet::compile(configs).unwrap()
    }

    #[tokio::test]
    async fn test_rewrites_response_headers() {
        let state = RewriteState::new(
            rules(&[
                RewriteConfig::new("X-Trace", r"secret-(\d+)", "redacted-$1"),
                RewriteConfig::new("Set-Cookie", "a", "X"),
            ]),
            NoopObserver,
        );

        let response = app(state).oneshot(get_root()).await.unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()["x-trace"], "redacted-42");
        let cookies: Vec<_> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["X1", "b1", "X2"]);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"body");
    }

    #[tokio::test]
    async fn test_empty_rules_pass_through() {
        let state = RewriteState::new(RuleSet::empty(), NoopObserver);

        let response = app(state).oneshot(get_root()).await.unwrap();

        assert_eq!(response.headers()["x-trace"], "secret-42");
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 3);
    }

    #[tokio::test]
    async fn test_replaced_rules_apply_to_later_requests() {
        let state = RewriteState::new(RuleSet::empty(), NoopObserver);
        let app = app(state.clone());

        let before = app.clone().oneshot(get_root()).await.unwrap();
        assert_eq!(before.headers()["x-trace"], "secret-42");

        state.replace_rules(rules(&[RewriteConfig::new("X-Trace", "secret", "public")]));
        assert_eq!(state.rules().len(), 1);

        let after = app.oneshot(get_root()).await.unwrap();
        assert_eq!(after.headers()["x-trace"], "public-42");
    }

    #[test]
    fn test_response_head_refuses_body_writes() {
        let (mut parts, _) = Response::new(Body::empty()).into_parts();
        let mut head = ResponseHead::new(&mut parts);

        let err = head.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(!head.is_committed());

        head.commit(StatusCode::NOT_FOUND);
        assert!(head.is_committed());
        assert_eq!(parts.status, StatusCode::NOT_FOUND);
    }
}
