//! Axum route handlers for the Forecast API.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::forecast::ctr::{curve_from_measurements, MeasuredCurve, PositionMeasurement};
use crate::forecast::engine::run_forecast;
use crate::forecast::ingest::{validate_rows, ColumnMapping, RawRows, ValidatedRows, ValidationSummary};
use crate::forecast::models::{ProjectionParameters, ProjectionResults};
use crate::forecast::params::{resolve_parameters, ForecastOptions};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub rows: RawRows,
    #[serde(default)]
    pub mapping: ColumnMapping,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    pub rows: RawRows,
    #[serde(default)]
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub options: ForecastOptions,
    /// Market for seasonal lookups. Defaults to the configured region.
    pub region: Option<String>,
    /// Caller-supplied CTR curve (positions 1..=20). Built-in defaults when absent.
    pub ctr_values: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub calculation_id: Uuid,
    pub region: String,
    pub validation: ValidationSummary,
    pub parameters: ProjectionParameters,
    pub results: ProjectionResults,
}

#[derive(Debug, Serialize)]
pub struct DefaultsResponse {
    pub parameters: ProjectionParameters,
    pub volume_backend: &'static str,
    pub default_region: String,
}

#[derive(Debug, Deserialize)]
pub struct CtrCurveRequest {
    pub measurements: Vec<PositionMeasurement>,
    #[serde(default)]
    pub enforce_monotonic: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/forecast/defaults
///
/// Fully-defaulted parameters as they would resolve for an empty dataset.
pub async fn handle_defaults(
    State(state): State<AppState>,
) -> Result<Json<DefaultsResponse>, AppError> {
    let parameters = resolve_parameters(
        &ForecastOptions::default(),
        &[],
        None,
        Utc::now().date_naive(),
    )?;
    Ok(Json(DefaultsResponse {
        parameters,
        volume_backend: state.volume_resolver.backend(),
        default_region: state.config.default_region.clone(),
    }))
}

/// POST /api/v1/forecast/validate
///
/// Runs only the row validator so the client can preview normalized rows.
pub async fn handle_validate(
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidatedRows>, AppError> {
    Ok(Json(validate_rows(&request.rows, &request.mapping)?))
}

/// POST /api/v1/forecast
///
/// Full pipeline: validate → resolve parameters → resolve volumes → project → aggregate.
pub async fn handle_forecast(
    State(state): State<AppState>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResponse>, AppError> {
    let validated = validate_rows(&request.rows, &request.mapping)?;

    let parameters = resolve_parameters(
        &request.options,
        &validated.rows,
        request.ctr_values.as_deref(),
        Utc::now().date_naive(),
    )?;

    let region = request
        .region
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(state.config.default_region.as_str())
        .to_string();

    let results = run_forecast(
        validated.rows,
        parameters.clone(),
        &state.volume_resolver,
        &region,
    )
    .await?;

    Ok(Json(ForecastResponse {
        calculation_id: Uuid::new_v4(),
        region,
        validation: validated.summary,
        parameters,
        results,
    }))
}

/// POST /api/v1/ctr/curve
///
/// Builds a 20-point CTR curve from measured click/impression data.
pub async fn handle_ctr_curve(
    Json(request): Json<CtrCurveRequest>,
) -> Result<Json<MeasuredCurve>, AppError> {
    if request.measurements.is_empty() {
        return Err(AppError::Validation(
            "measurements cannot be empty".to_string(),
        ));
    }
    Ok(Json(curve_from_measurements(
        &request.measurements,
        request.enforce_monotonic,
    )))
}
