use std::sync::Arc;

use crate::config::Config;
use crate::volume::SeasonalVolumeResolver;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Batched seasonal lookups. Backend chosen at startup (none, http, redis+http).
    pub volume_resolver: Arc<SeasonalVolumeResolver>,
}
