use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only the port and tuning knobs have defaults; the volume service and
/// Redis cache are enabled by setting their URLs.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub redis_url: Option<String>,
    pub volume_service_url: Option<String>,
    pub volume_service_api_key: Option<String>,
    pub volume_cache_ttl_secs: u64,
    pub volume_batch_size: usize,
    pub volume_batch_timeout_ms: u64,
    pub default_region: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            redis_url: optional_env("REDIS_URL"),
            volume_service_url: optional_env("VOLUME_SERVICE_URL"),
            volume_service_api_key: optional_env("VOLUME_SERVICE_API_KEY"),
            volume_cache_ttl_secs: parse_env("VOLUME_CACHE_TTL_SECS", 7 * 24 * 60 * 60)?,
            volume_batch_size: parse_env::<usize>("VOLUME_BATCH_SIZE", 100)?.clamp(1, 1000),
            volume_batch_timeout_ms: parse_env("VOLUME_BATCH_TIMEOUT_MS", 10_000)?,
            default_region: optional_env("DEFAULT_REGION").unwrap_or_else(|| "us".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
