mod config;
mod errors;
mod forecast;
mod routes;
mod state;
mod volume;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::volume::cache::RedisVolumeCache;
use crate::volume::client::HttpVolumeSource;
use crate::volume::{NoSeasonalData, SeasonalVolumeResolver, SeasonalVolumeSource};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Uplift API v{}", env!("CARGO_PKG_VERSION"));

    let volume_source = build_volume_source(&config)?;
    info!("Seasonal volume source initialized (backend: {})", volume_source.backend());

    let volume_resolver = SeasonalVolumeResolver::new(
        volume_source,
        config.volume_batch_size,
        Duration::from_millis(config.volume_batch_timeout_ms),
        chrono::Duration::seconds(config.volume_cache_ttl_secs as i64),
    );

    let state = AppState {
        config: config.clone(),
        volume_resolver: Arc::new(volume_resolver),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Upstream lookup service if configured, optionally fronted by the Redis cache.
fn build_volume_source(config: &Config) -> Result<Arc<dyn SeasonalVolumeSource>> {
    let upstream: Arc<dyn SeasonalVolumeSource> = match &config.volume_service_url {
        Some(url) => Arc::new(HttpVolumeSource::new(
            url.clone(),
            config.volume_service_api_key.clone(),
        )?),
        None => Arc::new(NoSeasonalData),
    };

    match &config.redis_url {
        Some(redis_url) => Ok(Arc::new(RedisVolumeCache::new(
            redis_url,
            upstream,
            config.volume_cache_ttl_secs,
        )?)),
        None => Ok(upstream),
    }
}
