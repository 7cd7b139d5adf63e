//! Forecast orchestration.
//!
//! 1. Volume sourcing (Average: flat; Seasonal: one batched resolver pass)
//! 2. `spawn_blocking` → `compute_projection` (CPU-bound; rayon fan-out per keyword)
//! 3. Aggregation
//!
//! `compute_projection` is pure and synchronous so it can be tested without a runtime.

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::errors::AppError;
use crate::forecast::aggregate::{aggregate, KeywordProjection};
use crate::forecast::models::{
    KeywordRow, MonthlyVolumeSeries, ProjectionParameters, ProjectionResults, VolumeMode,
};
use crate::forecast::traffic::project_keyword;
use crate::volume::SeasonalVolumeResolver;

/// Volume series per normalized keyword, according to the parameters' mode.
pub async fn resolve_volume_series(
    rows: &[KeywordRow],
    params: &ProjectionParameters,
    resolver: &SeasonalVolumeResolver,
    region: &str,
) -> HashMap<String, MonthlyVolumeSeries> {
    match params.mode {
        VolumeMode::Average => rows
            .iter()
            .map(|r| (r.normalized_key(), MonthlyVolumeSeries::Flat(r.volume)))
            .collect(),
        VolumeMode::Seasonal => resolver.batch_resolve(rows, region).await,
    }
}

/// Projects and aggregates every row. Rows without a series use their flat volume.
pub fn compute_projection(
    rows: &[KeywordRow],
    params: &ProjectionParameters,
    series: &HashMap<String, MonthlyVolumeSeries>,
) -> ProjectionResults {
    let projections: Vec<KeywordProjection> = rows
        .par_iter()
        .map(|row| {
            let series = series
                .get(&row.normalized_key())
                .cloned()
                .unwrap_or(MonthlyVolumeSeries::Flat(row.volume));
            let months = project_keyword(row, params, &series);
            KeywordProjection {
                row: row.clone(),
                series,
                months,
            }
        })
        .collect();

    aggregate(projections, &params.scoring)
}

/// Full calculation for one request.
pub async fn run_forecast(
    rows: Vec<KeywordRow>,
    params: ProjectionParameters,
    resolver: &SeasonalVolumeResolver,
    region: &str,
) -> Result<ProjectionResults, AppError> {
    let started = Instant::now();
    let series = resolve_volume_series(&rows, &params, resolver, region).await;

    let keyword_count = rows.len();
    let months_ahead = params.months_ahead;
    let mode = params.mode;

    let results = tokio::task::spawn_blocking(move || compute_projection(&rows, &params, &series))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in forecast: {e}")))?;

    info!(
        keywords = keyword_count,
        months_ahead,
        mode = ?mode,
        region,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "forecast computed"
    );

    Ok(results)
}
