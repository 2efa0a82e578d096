//! Cache document fetching
//!
//! Controllers publish their scene and level caches as hex-text documents
//! over plain HTTP (`/scenes.htm` and `/levels.htm`).

use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, TransportError};
use rako_core::cache::{parse_level_cache, parse_scene_cache};
use rako_core::{LevelCacheEntry, SceneCacheEntry};

/// HTTP client for the controller's cache documents
pub struct CacheClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl CacheClient {
    /// Client for a controller's built-in web server
    pub fn new(controller: IpAddr) -> Self {
        Self::with_base_url(&format!("http://{controller}"))
    }

    /// Client for an arbitrary base URL
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Fetch and parse the scene cache
    pub async fn fetch_scenes(&self) -> Result<Vec<SceneCacheEntry>> {
        let body = self.fetch_document("scenes.htm").await?;
        Ok(parse_scene_cache(&body))
    }

    /// Fetch and parse the level cache
    pub async fn fetch_levels(&self) -> Result<Vec<LevelCacheEntry>> {
        let body = self.fetch_document("levels.htm").await?;
        Ok(parse_level_cache(&body))
    }

    async fn fetch_document(&self, name: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, name);
        debug!("fetching {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}
