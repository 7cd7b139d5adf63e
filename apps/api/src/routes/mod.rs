pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::forecast::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Forecast API
        .route("/api/v1/forecast", post(handlers::handle_forecast))
        .route("/api/v1/forecast/defaults", get(handlers::handle_defaults))
        .route("/api/v1/forecast/validate", post(handlers::handle_validate))
        // CTR curve helper
        .route("/api/v1/ctr/curve", post(handlers::handle_ctr_curve))
        .with_state(state)
}
