#![deny(clippy::all)]

use crate::domain::OperationIdentity;
use async_trait::async_trait;
use bytes::Bytes;
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points: the store behind the counters and
// history lists, the operation being instrumented, and the page fetcher.

/// Port for the key-value store holding counters, history lists and cached pages
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Value stored at `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Replace the value at `key`, clearing any expiry
    async fn set(&self, key: &str, value: Bytes) -> Result<()>;

    /// Atomically increment the integer at `key`, treating absent as 0
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Append to the list at `key`, returning its new length
    async fn rpush(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Append every `(key, value)` pair as one atomic step
    async fn rpush_many(&self, entries: Vec<(String, Bytes)>) -> Result<()>;

    /// Inclusive range of the list at `key`; negative indices count from the end
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>>;

    /// Expire `key` after `ttl`. Returns false when the key does not exist
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key
    async fn flush_db(&self) -> Result<()>;
}

/// An async single-argument operation with a stable identity
#[async_trait]
pub trait Operation<In>: Send + Sync
where
    In: Send + 'static,
{
    type Out: Send;

    fn identity(&self) -> &OperationIdentity;

    async fn call(&self, input: In) -> Result<Self::Out>;
}

/// Port for retrieving page content by URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
