use crate::domain::{OperationIdentity, StoredValue, ValueKind, int_or_zero};
use crate::instrument::{CountingOperation, HistoryOperation, OperationExt};
use crate::ports::{KeyValueStore, Operation};
use crate::replay::{ReplayReport, ReplayReporter};
use async_trait::async_trait;
use bytes::Bytes;
use shared::{Error, Result};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Writes a value under a fresh random key and returns the key
pub struct StoreValue {
    identity: OperationIdentity,
    store: Arc<dyn KeyValueStore>,
}

#[async_trait]
impl Operation<StoredValue> for StoreValue {
    type Out = String;

    fn identity(&self) -> &OperationIdentity {
        &self.identity
    }

    async fn call(&self, value: StoredValue) -> Result<String> {
        let key = Uuid::new_v4().to_string();
        self.store.set(&key, value.encode()).await?;
        Ok(key)
    }
}

/// Value cache whose `store` calls are counted and logged
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
    store_op: HistoryOperation<CountingOperation<StoreValue>>,
}

impl Cache {
    pub const STORE_IDENTITY: &'static str = "Cache.store";

    /// Flush the store and start a fresh cache on it
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        store.flush_db().await?;
        info!("Store flushed, cache ready");
        Ok(Self::attach(store))
    }

    /// Use the store as is, keeping existing values and history
    pub fn attach(store: Arc<dyn KeyValueStore>) -> Self {
        let store_op = StoreValue {
            identity: OperationIdentity::new(Self::STORE_IDENTITY),
            store: store.clone(),
        }
        .counted(store.clone())
        .with_history(store.clone());

        Self { store, store_op }
    }

    pub fn store_identity() -> OperationIdentity {
        OperationIdentity::new(Self::STORE_IDENTITY)
    }

    /// Store `value` under a random key and return that key
    pub async fn store(&self, value: impl Into<StoredValue>) -> Result<String> {
        self.store_op.call(value.into()).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.store.get(key).await
    }

    /// Read `key` and convert it with `f`
    pub async fn get_with<T>(&self, key: &str, f: impl FnOnce(Bytes) -> T) -> Result<Option<T>> {
        Ok(self.store.get(key).await?.map(f))
    }

    /// Read `key` as UTF-8 text
    pub async fn get_str(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).await? {
            Some(raw) => String::from_utf8(raw.to_vec())
                .map(Some)
                .map_err(|_| Error::InvalidUtf8(key.to_string())),
            None => Ok(None),
        }
    }

    /// Read `key` as an integer; absent or non-numeric values read as 0
    pub async fn get_int(&self, key: &str) -> Result<i64> {
        let raw = self.store.get(key).await?;
        Ok(int_or_zero(raw.as_deref()))
    }

    pub async fn get_as(&self, key: &str, kind: ValueKind) -> Result<Option<StoredValue>> {
        match self.store.get(key).await? {
            Some(raw) => StoredValue::decode(kind, key, raw).map(Some),
            None => Ok(None),
        }
    }

    /// Call history of [`Cache::store`]
    pub async fn replay(&self) -> Result<ReplayReport> {
        ReplayReporter::new(self.store.clone())
            .report(&Self::store_identity())
            .await
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("identity", &Self::STORE_IDENTITY)
            .finish()
    }
}
