//! Wrappers that record calls of an [`Operation`] in the store.
//!
//! [`CountingOperation`] bumps the counter named by the operation's identity
//! before delegating, so failed attempts are counted too.
//! [`HistoryOperation`] logs the input and output of every successful call
//! and hands back the output's string form. The two wrappers compose in
//! either order:
//!
//! ```ignore
//! let op = FnOperation::new("Cache.store", store_fn)
//!     .counted(store.clone())
//!     .with_history(store.clone());
//! ```

pub mod counting;
pub mod func;
pub mod history;

pub use counting::CountingOperation;
pub use func::FnOperation;
pub use history::HistoryOperation;

use crate::ports::{KeyValueStore, Operation};
use std::sync::Arc;

/// Builder methods for layering instrumentation onto any operation
pub trait OperationExt<In>: Operation<In> + Sized
where
    In: Send + 'static,
{
    /// Count every invocation under the operation's identity
    fn counted(self, store: Arc<dyn KeyValueStore>) -> CountingOperation<Self> {
        CountingOperation::new(self, store)
    }

    /// Log input and output of every completed invocation
    fn with_history(self, store: Arc<dyn KeyValueStore>) -> HistoryOperation<Self> {
        HistoryOperation::new(self, store)
    }
}

impl<In, Op> OperationExt<In> for Op
where
    In: Send + 'static,
    Op: Operation<In>,
{
}
