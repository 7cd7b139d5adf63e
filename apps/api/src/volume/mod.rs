//! Seasonal Volume Resolver: adapter over an external monthly-volume store.
//!
//! `SeasonalVolumeSource` is the capability boundary: any backend that can answer
//! "12 monthly volumes for these keywords in this region". `AppState` carries the
//! resolver, which batches lookups once per calculation, bounds every batch with a
//! timeout, and degrades to the flat uploaded volume on a miss, stale record or failure.

pub mod cache;
pub mod client;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::forecast::models::{KeywordRow, MonthlyVolumeSeries, VolumeSourceTag};

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("volume service error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("could not decode volume payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// One keyword's seasonal pattern as stored upstream. Keyed by normalized keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalVolumeRecord {
    pub keyword: String,
    /// Calendar months January..December.
    pub monthly_volumes: Vec<f64>,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait SeasonalVolumeSource: Send + Sync {
    /// Short label for logs (e.g. "http", "redis+http", "none").
    fn backend(&self) -> &'static str;

    /// Looks up normalized keywords. Missing keys are misses, not errors.
    async fn batch_lookup(
        &self,
        keywords: &[String],
        region: &str,
    ) -> Result<HashMap<String, SeasonalVolumeRecord>, VolumeError>;
}

/// Source used when no volume service is configured. Every lookup misses.
pub struct NoSeasonalData;

#[async_trait]
impl SeasonalVolumeSource for NoSeasonalData {
    fn backend(&self) -> &'static str {
        "none"
    }

    async fn batch_lookup(
        &self,
        _keywords: &[String],
        _region: &str,
    ) -> Result<HashMap<String, SeasonalVolumeRecord>, VolumeError> {
        Ok(HashMap::new())
    }
}

#[derive(Clone)]
pub struct SeasonalVolumeResolver {
    source: Arc<dyn SeasonalVolumeSource>,
    batch_size: usize,
    batch_timeout: Duration,
    max_age: chrono::Duration,
}

impl SeasonalVolumeResolver {
    pub fn new(
        source: Arc<dyn SeasonalVolumeSource>,
        batch_size: usize,
        batch_timeout: Duration,
        max_age: chrono::Duration,
    ) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            batch_timeout,
            max_age,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.source.backend()
    }

    /// Resolves a 12-month series for every row, keyed by normalized keyword.
    ///
    /// Distinct keywords are looked up once, in batches of `batch_size`. A batch
    /// that errors or times out is logged and its keywords fall back.
    pub async fn batch_resolve(
        &self,
        rows: &[KeywordRow],
        region: &str,
    ) -> HashMap<String, MonthlyVolumeSeries> {
        let distinct: Vec<String> = rows
            .iter()
            .map(KeywordRow::normalized_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut found: HashMap<String, SeasonalVolumeRecord> = HashMap::new();
        for (batch_no, batch) in distinct.chunks(self.batch_size).enumerate() {
            let lookup = self.source.batch_lookup(batch, region);
            let outcome = match tokio::time::timeout(self.batch_timeout, lookup).await {
                Ok(result) => result,
                Err(_) => Err(VolumeError::Timeout(self.batch_timeout)),
            };

            match outcome {
                Ok(records) => {
                    debug!(
                        batch = batch_no,
                        requested = batch.len(),
                        matched = records.len(),
                        backend = self.source.backend(),
                        "seasonal volume batch resolved"
                    );
                    found.extend(records);
                }
                Err(e) => {
                    warn!(
                        batch = batch_no,
                        requested = batch.len(),
                        backend = self.source.backend(),
                        "seasonal volume batch failed, using flat volumes: {e}"
                    );
                }
            }
        }

        let now = Utc::now();
        rows.iter()
            .map(|row| {
                let key = row.normalized_key();
                let series = found
                    .get(&key)
                    .and_then(|record| self.usable_volumes(record, now))
                    .map(|monthly_volumes| MonthlyVolumeSeries::Seasonal {
                        monthly_volumes,
                        source: VolumeSourceTag::Cache,
                    })
                    .unwrap_or_else(|| MonthlyVolumeSeries::fallback(row.volume));
                (key, series)
            })
            .collect()
    }

    /// The record's 12 volumes, or `None` when it is stale or malformed.
    fn usable_volumes(&self, record: &SeasonalVolumeRecord, now: DateTime<Utc>) -> Option<[f64; 12]> {
        if now.signed_duration_since(record.fetched_at) > self.max_age {
            return None;
        }
        let volumes: [f64; 12] = record.monthly_volumes.as_slice().try_into().ok()?;
        volumes
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            .then_some(volumes)
    }
}

/// In-memory source for tests.
#[cfg(test)]
pub struct StaticVolumeSource {
    pub records: HashMap<String, SeasonalVolumeRecord>,
    pub delay: Option<Duration>,
    pub fail: bool,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticVolumeSource {
    pub fn with_records(records: Vec<SeasonalVolumeRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.keyword.clone(), r)).collect(),
            delay: None,
            fail: false,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl SeasonalVolumeSource for StaticVolumeSource {
    fn backend(&self) -> &'static str {
        "static"
    }

    async fn batch_lookup(
        &self,
        keywords: &[String],
        _region: &str,
    ) -> Result<HashMap<String, SeasonalVolumeRecord>, VolumeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(VolumeError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(keywords
            .iter()
            .filter_map(|k| self.records.get(k).map(|r| (k.clone(), r.clone())))
            .collect())
    }
}
