//! HTTP server setup and upstream forwarding.
//!
//! # Responsibilities
//! - Compile the rewrite rules before accepting traffic
//! - Create the Axum Router and wire up middleware
//! - Forward every request to the configured upstream
//! - Swap rule sets when a reloaded configuration arrives
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::middleware::{rewrite_headers_middleware, RewriteState};
use crate::observability::metrics::{self, MetricsObserver};
use crate::rewrite::{ConfigurationError, RuleSet, TracingObserver};

/// Errors that keep the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Rules(#[from] ConfigurationError),

    #[error("invalid upstream address {0:?}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// HTTP server fronting a single upstream.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    rewrite: RewriteState,
}

impl HttpServer {
    /// Create a new server. Fails if any rewrite pattern does not compile.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let rules = RuleSet::compile(&config.rewrites)?;
        tracing::info!(
            instance = %config.name,
            rules = rules.len(),
            "Rewrite rules compiled"
        );

        let observer = (
            TracingObserver::new(config.name.clone()),
            MetricsObserver::new(config.name.clone()),
        );
        let rewrite = RewriteState::new(rules, observer);

        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::Upstream(config.upstream.address.clone()))?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, state, rewrite.clone());

        Ok(Self {
            router,
            config,
            rewrite,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The rewrite layer sits just inside tracing so it sees the head exactly
    /// as the client will, request ID and timeout responses included.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState, rewrite: RewriteState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::from_fn_with_state(
                rewrite,
                rewrite_headers_middleware,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` replace the rule set;
    /// one whose rules fail to compile is logged and ignored.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let rewrite = self.rewrite.clone();
        tokio::spawn(async move {
            while let Some(update) = config_updates.recv().await {
                match RuleSet::compile(&update.rewrites) {
                    Ok(rules) => {
                        tracing::info!(rules = rules.len(), "Rewrite rules reloaded");
                        rewrite.replace_rules(rules);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "Reloaded rewrite rules rejected, keeping current rule set"
                        );
                    }
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handle on the live rule set.
    pub fn rewrite_state(&self) -> &RewriteState {
        &self.rewrite
    }
}

/// Forwards the request to the upstream and returns its response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, "Could not build upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };

    tracing::debug!(method = %method, uri = %parts.uri, "Forwarding request");

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, upstream = %state.upstream, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
