#![deny(clippy::all)]

//! Call counting, call history and memoized page caching on top of a
//! key-value store.

pub mod cache;
pub mod clock;
pub mod content_cache;
pub mod domain;
pub mod fetch;
pub mod instrument;
pub mod ports;
pub mod replay;
pub mod storage;

pub use cache::Cache;
pub use content_cache::ContentCache;
pub use domain::{OperationIdentity, StoredValue, ValueKind};
pub use instrument::{CountingOperation, FnOperation, HistoryOperation, OperationExt};
pub use ports::{Fetcher, KeyValueStore, Operation};
pub use replay::{ReplayReport, ReplayReporter};
pub use storage::MemoryStore;
