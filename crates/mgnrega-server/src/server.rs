use std::{net::SocketAddr, sync::Arc};

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    aggregator::Aggregator,
    cache::TieredCache,
    config::{AppConfig, QuerySettings},
    handlers,
    upstream::UpstreamClient,
};

/// Shared handler state. The cache lives inside the aggregator and is shared
/// by reference, never through a global.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub query: Arc<QuerySettings>,
}

pub struct MgnregaServer {
    addr: SocketAddr,
    app: Router,
}

/// Wire the aggregator from configuration, using `cache` when given and
/// probing the configured tiers otherwise.
pub fn build_state(cfg: &AppConfig, cache: Option<Arc<TieredCache>>) -> anyhow::Result<AppState> {
    let cache = cache.unwrap_or_else(|| Arc::new(TieredCache::from_config(&cfg.cache)));
    let upstream = UpstreamClient::from_config(&cfg.upstream)?;
    if !upstream.is_configured() {
        tracing::warn!("upstream resource id or API key missing; uncached queries will fail");
    }

    let aggregator = Aggregator::new(cache, upstream)
        .with_weights(cfg.reconcile.weights)
        .with_ttl(cfg.cache.ttl())
        .with_max_pages(cfg.query.max_pages);

    Ok(AppState {
        aggregator: Arc::new(aggregator),
        query: Arc::new(cfg.query.clone()),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        // Query API
        .route("/api/mgnrega", get(handlers::mgnrega_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                                span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive()),
        )
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(build_router(build_state(cfg, None)?))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    cache: Option<Arc<TieredCache>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            cache: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use an existing cache instead of probing `cache` configuration.
    pub fn with_cache(mut self, cache: Arc<TieredCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> anyhow::Result<MgnregaServer> {
        let state = build_state(&self.config, self.cache)?;
        Ok(MgnregaServer {
            addr: self.addr,
            app: build_router(state),
        })
    }
}

impl MgnregaServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
