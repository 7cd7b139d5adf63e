//! HTTP client for the seasonal-volume lookup service.
//!
//! The service takes a batch of normalized keywords plus a region and returns the
//! last twelve calendar months of search volume for each keyword it knows.
//! Retries on 429 and 5xx with exponential backoff; the resolver's per-batch
//! timeout still bounds the total time spent here.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::volume::{SeasonalVolumeRecord, SeasonalVolumeSource, VolumeError};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    keywords: &'a [String],
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    keyword: String,
    monthly_volumes: Vec<f64>,
}

#[derive(Clone)]
pub struct HttpVolumeSource {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpVolumeSource {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, VolumeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    async fn post_once(&self, body: &LookupRequest<'_>) -> Result<reqwest::Response, reqwest::Error> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await
    }
}

#[async_trait]
impl SeasonalVolumeSource for HttpVolumeSource {
    fn backend(&self) -> &'static str {
        "http"
    }

    async fn batch_lookup(
        &self,
        keywords: &[String],
        region: &str,
    ) -> Result<HashMap<String, SeasonalVolumeRecord>, VolumeError> {
        if keywords.is_empty() {
            return Ok(HashMap::new());
        }

        let body = LookupRequest { keywords, region };
        let mut last_error: Option<VolumeError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // 500ms, then 1s
                let delay = std::time::Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "volume lookup attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.post_once(&body).await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(VolumeError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                last_error = Some(VolumeError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(VolumeError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let payload: LookupResponse = response.json().await?;
            debug!(
                requested = keywords.len(),
                returned = payload.results.len(),
                region,
                "volume service responded"
            );
            return Ok(into_records(payload));
        }

        Err(last_error.unwrap_or(VolumeError::Api {
            status: 429,
            message: format!("gave up after {MAX_RETRIES} attempts"),
        }))
    }
}

fn into_records(payload: LookupResponse) -> HashMap<String, SeasonalVolumeRecord> {
    let fetched_at = Utc::now();
    payload
        .results
        .into_iter()
        .map(|r| {
            let key = crate::forecast::models::normalize_keyword(&r.keyword);
            let record = SeasonalVolumeRecord {
                keyword: key.clone(),
                monthly_volumes: r.monthly_volumes,
                fetched_at,
            };
            (key, record)
        })
        .collect()
}
