use crate::clock::{Clock, SystemClock};
use crate::ports::KeyValueStore;
use async_trait::async_trait;
use bytes::Bytes;
use shared::{Error, Result};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

enum Value {
    Str(Bytes),
    List(Vec<Bytes>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-process key-value store with string and list values and lazy expiry
pub struct MemoryStore {
    // Maps key -> entry; one lock so multi-key appends are atomic
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty store that asks `clock` whether entries have expired
    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: Arc::new(clock),
        }
    }

    /// Drop `key` if its deadline has passed, so writers never see stale entries
    fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
    }

    fn list_mut<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Result<&'a mut Vec<Bytes>> {
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(Value::List(Vec::new())));

        match &mut entry.value {
            Value::List(items) => Ok(items),
            Value::Str(_) => Err(Error::WrongType(key.to_string())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => Ok(None),
            Some(Entry {
                value: Value::Str(raw),
                ..
            }) => Ok(Some(raw.clone())),
            Some(_) => Err(Error::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry::new(Value::Str(value)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now);

        match entries.get_mut(key) {
            None => {
                entries.insert(key.to_string(), Entry::new(Value::Str(Bytes::from("1"))));
                Ok(1)
            }
            Some(Entry {
                value: Value::Str(raw),
                ..
            }) => {
                let next = std::str::from_utf8(raw)
                    .ok()
                    .and_then(|text| text.parse::<i64>().ok())
                    .and_then(|current| current.checked_add(1))
                    .ok_or_else(|| Error::NotAnInteger(key.to_string()))?;
                *raw = Bytes::from(next.to_string());
                Ok(next)
            }
            Some(_) => Err(Error::WrongType(key.to_string())),
        }
    }

    async fn rpush(&self, key: &str, value: Bytes) -> Result<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now);

        let items = Self::list_mut(&mut entries, key)?;
        items.push(value);
        Ok(items.len() as u64)
    }

    async fn rpush_many(&self, batch: Vec<(String, Bytes)>) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        // Validate every target first: either all appends land or none do
        for (key, _) in &batch {
            Self::purge_expired(&mut entries, key, now);
            if let Some(Entry {
                value: Value::Str(_),
                ..
            }) = entries.get(key)
            {
                return Err(Error::WrongType(key.clone()));
            }
        }

        for (key, value) in batch {
            Self::list_mut(&mut entries, &key)?.push(value);
        }

        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        let items = match entries.get(key) {
            Some(entry) if entry.is_expired(now) => return Ok(Vec::new()),
            Some(Entry {
                value: Value::List(items),
                ..
            }) => items,
            Some(_) => return Err(Error::WrongType(key.to_string())),
            None => return Ok(Vec::new()),
        };

        Ok(match resolve_range(items.len(), start, stop) {
            Some((first, last)) => items[first..=last].to_vec(),
            None => Vec::new(),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now);

        match entries.get_mut(key) {
            Some(entry) => {
                // A deadline past what `Instant` can hold never arrives
                entry.expires_at = now.checked_add(ttl);
                debug!("Key '{}' expires in {:?}", key, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn flush_db(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        debug!("Flushing {} key(s)", entries.len());
        entries.clear();
        Ok(())
    }
}

/// Inclusive `[start, stop]` window over a list of `len` items, Redis style
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start >= len || stop < 0 || start > stop {
        return None;
    }

    Some((start as usize, stop as usize))
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.entries.try_read().map(|entries| entries.len()).ok();
        f.debug_struct("MemoryStore").field("keys", &keys).finish()
    }
}
