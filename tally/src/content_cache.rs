use crate::domain::{cached_key, count_key, int_or_zero};
use crate::ports::{Fetcher, KeyValueStore};
use async_trait::async_trait;
use bytes::Bytes;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Memoizes a [`Fetcher`] in the store for a fixed TTL and counts the
/// fetches that actually went to the underlying fetcher.
///
/// Content lives at `cached:<url>` and the miss counter at `count:<url>`.
/// Hits leave the counter untouched.
pub struct ContentCache<F> {
    fetcher: F,
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl<F: Fetcher> ContentCache<F> {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

    pub fn new(fetcher: F, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_ttl(fetcher, store, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(fetcher: F, store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            fetcher,
            store,
            ttl,
        }
    }

    pub async fn get_page(&self, url: &str) -> Result<String> {
        let page_key = cached_key(url);

        if let Some(raw) = self.store.get(&page_key).await? {
            match String::from_utf8(raw.to_vec()) {
                Ok(content) => {
                    debug!("Cache hit for '{}'", url);
                    return Ok(content);
                }
                Err(_) => warn!("Cached content for '{}' is not UTF-8, refetching", url),
            }
        }

        // Nothing is written unless the fetch succeeds
        let content = self.fetcher.fetch(url).await?;

        let fetches = self.store.incr(&count_key(url)).await?;
        self.store
            .set(&page_key, Bytes::copy_from_slice(content.as_bytes()))
            .await?;
        self.store.expire(&page_key, self.ttl).await?;

        debug!(
            "Cache miss for '{}', fetched {} time(s), cached for {:?}",
            url, fetches, self.ttl
        );

        Ok(content)
    }

    /// Number of fetches that missed the cache for `url`
    pub async fn access_count(&self, url: &str) -> Result<i64> {
        let raw = self.store.get(&count_key(url)).await?;
        Ok(int_or_zero(raw.as_deref()))
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for ContentCache<F> {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.get_page(url).await
    }
}

impl<F> std::fmt::Debug for ContentCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("ttl", &self.ttl)
            .finish()
    }
}
