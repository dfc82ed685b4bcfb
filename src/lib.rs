pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod services;

use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::services::{
    cache::{Clock, EpgCache, SystemClock},
    epg::EpgService,
    fetcher::ResourceFetcher,
    fragment::FragmentRewriter,
    relay::StreamRelay,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub fetcher: ResourceFetcher,
    pub epg: EpgService,
    pub relay: StreamRelay,
    pub rewriter: FragmentRewriter,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// State whose EPG cache reads time from `clock`
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let fetcher = ResourceFetcher::new(&config)?;
        let cache = EpgCache::new(config.epg_cache_ttl(), config.epg_cache_max_entries, clock);
        let epg = EpgService::new(fetcher.clone(), cache);
        let relay = StreamRelay::new(&config)?;
        let rewriter = FragmentRewriter::new(&config.base_url)?;

        Ok(Self {
            config,
            fetcher,
            epg,
            relay,
            rewriter,
            start_time: Instant::now(),
        })
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    // JSON endpoints are compressed; relayed media passes through untouched
    let api = Router::new()
        .route("/playlist", get(routes::playlist::get_playlist))
        .route("/epg", get(routes::epg::get_epg))
        .layer(CompressionLayer::new());

    let mut app = Router::new()
        // Health endpoints
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/live", get(routes::health::live))
        // Stream relay
        .route("/proxy", get(routes::proxy::proxy_stream))
        .route("/rewrite", get(routes::rewrite::rewrite_fragment))
        .merge(api);

    // Pre-built frontend owns `/`, with index.html for client-side routes
    match state.config.static_dir.as_deref() {
        Some(dir) => {
            let index = Path::new(dir).join("index.html");
            app = app.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
        }
        None => app = app.route("/", get(routes::health::root)),
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
