//! Remote war API access.
//!
//! `WarApi` is the seam the coordinator polls through; `HttpWarApi` is the
//! production implementation: retry with exponential backoff, a fallback
//! host once the primary is exhausted, a short-TTL response cache, and a
//! rate-limiting pause after every fetch that actually went out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::cache::SnapshotCache;
use super::config::Settings;
use super::error::WatchError;
use super::model::{NewsItem, Order, PlanetInfo, PlanetNames, WarStatus};

#[async_trait]
pub trait WarApi: Send + Sync {
    async fn major_orders(&self) -> Result<Vec<Order>, WatchError>;
    async fn news(&self, from_ts: i64) -> Result<Vec<NewsItem>, WatchError>;
    async fn war_status(&self) -> Result<WarStatus, WatchError>;
    /// Planet index → name map. Failure degrades to an empty map; callers
    /// fall back to "Planet #N" labels.
    async fn planet_names(&self) -> PlanetNames;
}

pub struct HttpWarApi {
    http: reqwest::Client,
    primary: String,
    fallback: Option<String>,
    cache: SnapshotCache,
    retries: u32,
    backoff: Duration,
    rate_sleep: Duration,
    names: RwLock<Option<PlanetNames>>,
}

impl HttpWarApi {
    pub fn new(settings: &Settings) -> Result<Self, WatchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("war-watcher/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            primary: settings.api_primary.trim_end_matches('/').to_string(),
            fallback: settings
                .api_fallback
                .as_ref()
                .map(|f| f.trim_end_matches('/').to_string()),
            cache: SnapshotCache::new(Duration::from_secs(settings.cache_ttl_secs)),
            retries: settings.fetch_retries.max(1),
            backoff: Duration::from_millis(settings.fetch_backoff_ms),
            rate_sleep: Duration::from_millis(settings.rate_sleep_ms),
            names: RwLock::new(None),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value, WatchError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(WatchError::Status {
                code: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json::<Value>().await?)
    }

    async fn get_with_retry(&self, url: &str) -> Result<Value, WatchError> {
        let mut last_err = None;
        for attempt in 0..self.retries {
            match self.get_json(url).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    log::debug!("fetch attempt {} failed for {}: {}", attempt + 1, url, err);
                    last_err = Some(err);
                    if attempt + 1 < self.retries {
                        tokio::time::sleep(self.backoff * 2u32.saturating_pow(attempt)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| WatchError::Exhausted(url.to_string())))
    }

    /// Cache-first fetch. Only a real remote round-trip is followed by the
    /// rate-limit pause; cache hits return immediately.
    async fn fetch(&self, path: &str) -> Result<Value, WatchError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached);
        }

        let primary_url = format!("{}{}", self.primary, path);
        let value = match self.get_with_retry(&primary_url).await {
            Ok(value) => value,
            Err(primary_err) => match &self.fallback {
                Some(base) => {
                    log::warn!("primary exhausted for {}: {}; trying fallback", path, primary_err);
                    self.get_with_retry(&format!("{}{}", base, path)).await?
                }
                None => return Err(primary_err),
            },
        };

        self.cache.put(path, value.clone());
        tokio::time::sleep(self.rate_sleep).await;
        Ok(value)
    }
}

#[async_trait]
impl WarApi for HttpWarApi {
    async fn major_orders(&self) -> Result<Vec<Order>, WatchError> {
        let value = self.fetch("/war/major-orders").await?;
        Ok(serde_json::from_value::<Option<Vec<Order>>>(value)?.unwrap_or_default())
    }

    async fn news(&self, from_ts: i64) -> Result<Vec<NewsItem>, WatchError> {
        let value = self.fetch(&format!("/war/news?from={}", from_ts)).await?;
        Ok(serde_json::from_value::<Option<Vec<NewsItem>>>(value)?.unwrap_or_default())
    }

    async fn war_status(&self) -> Result<WarStatus, WatchError> {
        let value = self.fetch("/war/status").await?;
        Ok(serde_json::from_value::<Option<WarStatus>>(value)?.unwrap_or_default())
    }

    async fn planet_names(&self) -> PlanetNames {
        {
            let cached = self.names.read().await;
            if let Some(names) = cached.as_ref() {
                return names.clone();
            }
        }

        let loaded = match self.fetch("/planets").await {
            Ok(value) => serde_json::from_value::<HashMap<String, PlanetInfo>>(value)
                .map_err(WatchError::from),
            Err(err) => Err(err),
        };

        match loaded {
            Ok(raw) => {
                let map: HashMap<i32, String> = raw
                    .into_iter()
                    .filter_map(|(index, info)| index.parse::<i32>().ok().map(|i| (i, info.name)))
                    .collect();
                let names = PlanetNames::from(map);
                *self.names.write().await = Some(names.clone());
                names
            }
            Err(err) => {
                log::warn!("failed to load planet names: {}", err);
                PlanetNames::default()
            }
        }
    }
}
