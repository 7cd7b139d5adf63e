//! Read-through seasonal volume cache backed by Redis.
//!
//! Hits are served from Redis; misses are forwarded to the wrapped source and
//! written back with `SETEX` so every entry carries an explicit TTL. Redis
//! failures are logged and the lookup goes straight to the wrapped source.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::volume::{SeasonalVolumeRecord, SeasonalVolumeSource, VolumeError};

const KEY_PREFIX: &str = "uplift:seasonal-volume";

pub struct RedisVolumeCache {
    client: redis::Client,
    inner: Arc<dyn SeasonalVolumeSource>,
    ttl_secs: u64,
    connection: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisVolumeCache {
    pub fn new(
        redis_url: &str,
        inner: Arc<dyn SeasonalVolumeSource>,
        ttl_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)
            .with_context(|| format!("invalid redis url for volume cache: {redis_url}"))?;
        Ok(Self {
            client,
            inner,
            ttl_secs: ttl_secs.max(1),
            connection: Mutex::new(None),
        })
    }

    /// The lock is never held across the connect, so an unreachable Redis
    /// does not serialize concurrent lookups behind one pending attempt.
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, VolumeError> {
        if let Some(conn) = self.connection.lock().await.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| VolumeError::Cache(e.to_string()))?;
        Ok(self.connection.lock().await.get_or_insert(conn).clone())
    }

    async fn reset_connection(&self) {
        *self.connection.lock().await = None;
    }

    async fn read(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<String>>, VolumeError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        cmd.query_async::<_, Vec<Option<String>>>(&mut conn)
            .await
            .map_err(|e| VolumeError::Cache(e.to_string()))
    }

    async fn write(&self, entries: &[(String, String)]) -> Result<(), VolumeError> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for (key, payload) in entries {
            pipe.cmd("SETEX").arg(key).arg(self.ttl_secs).arg(payload).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| VolumeError::Cache(e.to_string()))
    }
}

pub fn cache_key(region: &str, keyword: &str) -> String {
    format!("{KEY_PREFIX}:v1:{}:{keyword}", region.trim().to_lowercase())
}

/// Decodes cached payloads, silently skipping corrupt entries (they behave as misses).
fn decode_hits(
    keywords: &[String],
    payloads: Vec<Option<String>>,
) -> (HashMap<String, SeasonalVolumeRecord>, Vec<String>) {
    let mut hits = HashMap::new();
    let mut misses = Vec::new();

    for (keyword, payload) in keywords.iter().zip(payloads.into_iter()) {
        match payload.and_then(|p| serde_json::from_str::<SeasonalVolumeRecord>(&p).ok()) {
            Some(record) => {
                hits.insert(keyword.clone(), record);
            }
            None => misses.push(keyword.clone()),
        }
    }
    (hits, misses)
}

#[async_trait]
impl SeasonalVolumeSource for RedisVolumeCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn batch_lookup(
        &self,
        keywords: &[String],
        region: &str,
    ) -> Result<HashMap<String, SeasonalVolumeRecord>, VolumeError> {
        if keywords.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = keywords.iter().map(|k| cache_key(region, k)).collect();
        let (mut hits, misses) = match self.read(&keys).await {
            Ok(payloads) => decode_hits(keywords, payloads),
            Err(e) => {
                warn!("volume cache read failed, bypassing cache: {e}");
                self.reset_connection().await;
                (HashMap::new(), keywords.to_vec())
            }
        };

        debug!(
            hits = hits.len(),
            misses = misses.len(),
            region,
            "volume cache lookup"
        );

        if misses.is_empty() {
            return Ok(hits);
        }

        let fetched = self.inner.batch_lookup(&misses, region).await?;

        let mut entries = Vec::with_capacity(fetched.len());
        for (keyword, record) in &fetched {
            let payload = serde_json::to_string(record)?;
            entries.push((cache_key(region, keyword), payload));
        }
        if !entries.is_empty() {
            if let Err(e) = self.write(&entries).await {
                warn!("volume cache write failed: {e}");
                self.reset_connection().await;
            }
        }

        hits.extend(fetched);
        Ok(hits)
    }
}
