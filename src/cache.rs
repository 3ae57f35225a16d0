use std::path::PathBuf;

use reqwest::Client;

use crate::sync::SyncError;

/// Stale-while-revalidate response cache keyed by URL.
///
/// `fetch` returns the cached body immediately when one exists and refreshes
/// the entry in the background; on a miss it waits for the network. Entries
/// persist as files in the cache directory across runs.
#[derive(Clone)]
pub struct FetchCache {
    http: Client,
    pub(crate) dir: PathBuf,
}

impl FetchCache {
    pub fn new(http: Client, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            log::error!("Failed to create cache directory: {}", e);
        }
        Self { http, dir }
    }

    /// Default cache location under the local data directory.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("~/.cache"))
            .join("feed")
    }

    pub(crate) fn entry_path(&self, url: &str) -> PathBuf {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        self.dir.join(format!("{:016x}", hasher.finish()))
    }

    /// Warm the cache with a fixed manifest of URLs at startup. Individual
    /// failures are logged and skipped.
    pub async fn precache(&self, urls: &[&str]) {
        for url in urls {
            if let Err(e) = self.refresh(url).await {
                log::warn!("Precache of {} failed: {}", url, e);
            }
        }
        log::info!("Precached {} URLs", urls.len());
    }

    /// Fetch a URL with stale-while-revalidate semantics.
    pub async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        match std::fs::read_to_string(self.entry_path(url)) {
            Ok(cached) => {
                let cache = self.clone();
                let url = url.to_string();
                tokio::spawn(async move {
                    if let Err(e) = cache.refresh(&url).await {
                        log::debug!("Background refresh of {} failed: {}", url, e);
                    }
                });
                Ok(cached)
            }
            Err(_) => self.refresh(url).await,
        }
    }

    async fn refresh(&self, url: &str) -> Result<String, SyncError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SyncError::Status {
                context: "cache fetch",
                status,
            });
        }
        let body = resp.text().await?;
        if let Err(e) = std::fs::write(self.entry_path(url), &body) {
            log::error!("Failed to write cache entry for {}: {}", url, e);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(name: &str) -> FetchCache {
        let dir = std::env::temp_dir().join(format!("feed-cache-test-{}-{}", std::process::id(), name));
        FetchCache::new(Client::new(), dir)
    }

    #[test]
    fn entry_paths_are_stable_and_distinct() {
        let cache = cache("paths");
        assert_eq!(
            cache.entry_path("https://example.com/a"),
            cache.entry_path("https://example.com/a")
        );
        assert_ne!(
            cache.entry_path("https://example.com/a"),
            cache.entry_path("https://example.com/b")
        );
        let _ = std::fs::remove_dir_all(&cache.dir);
    }

    #[tokio::test]
    async fn hit_returns_cached_body_even_when_refresh_fails() {
        let cache = cache("hit");
        // Port 9 (discard) refuses connections, so only the cached copy can
        // satisfy this fetch.
        let url = "http://127.0.0.1:9/asset.js";
        std::fs::write(cache.entry_path(url), "cached body").unwrap();
        assert_eq!(cache.fetch(url).await.unwrap(), "cached body");
        let _ = std::fs::remove_dir_all(&cache.dir);
    }

    #[tokio::test]
    async fn precache_skips_unreachable_urls() {
        let cache = cache("precache");
        cache
            .precache(&["http://127.0.0.1:9/a.js", "http://127.0.0.1:9/b.js"])
            .await;
        assert!(std::fs::read_dir(&cache.dir).unwrap().next().is_none());
        let _ = std::fs::remove_dir_all(&cache.dir);
    }

    #[tokio::test]
    async fn miss_with_unreachable_network_fails() {
        let cache = cache("miss");
        assert!(cache.fetch("http://127.0.0.1:9/missing.js").await.is_err());
        let _ = std::fs::remove_dir_all(&cache.dir);
    }
}
