use crate::domain::{OperationIdentity, int_or_zero};
use crate::ports::{KeyValueStore, Operation};
use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;
use tracing::debug;

/// Increments the identity's counter on every invocation, then delegates
pub struct CountingOperation<Op> {
    inner: Op,
    store: Arc<dyn KeyValueStore>,
}

impl<Op> CountingOperation<Op> {
    pub fn new(inner: Op, store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, store }
    }
}

/// Current value of the call counter for `identity`, 0 when never called
pub async fn call_count(store: &dyn KeyValueStore, identity: &OperationIdentity) -> Result<i64> {
    let raw = store.get(identity.counter_key()).await?;
    Ok(int_or_zero(raw.as_deref()))
}

#[async_trait]
impl<In, Op> Operation<In> for CountingOperation<Op>
where
    In: Send + 'static,
    Op: Operation<In>,
{
    type Out = Op::Out;

    fn identity(&self) -> &OperationIdentity {
        self.inner.identity()
    }

    async fn call(&self, input: In) -> Result<Op::Out> {
        let identity = self.inner.identity();

        // Counted on entry: attempts that fail still show up
        let count = self.store.incr(identity.counter_key()).await?;
        debug!("{} invoked ({} call(s) so far)", identity, count);

        self.inner.call(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{FnOperation, OperationExt};
    use crate::storage::MemoryStore;
    use shared::Error;

    fn double() -> FnOperation<impl Fn(i64) -> std::future::Ready<Result<i64>>> {
        FnOperation::new("math.double", |n: i64| std::future::ready(Ok(n * 2)))
    }

    #[tokio::test]
    async fn test_never_called_reads_zero() {
        let store = MemoryStore::new();
        let count = call_count(&store, &OperationIdentity::new("never.called"))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_counting_passes_output_through() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let op = double().counted(store.clone());

        assert_eq!(op.call(21).await.unwrap(), 42);
        assert_eq!(op.call(1).await.unwrap(), 2);
        assert_eq!(op.call(0).await.unwrap(), 0);

        let count = call_count(store.as_ref(), &OperationIdentity::new("math.double")).await.unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_counting_records_failed_attempts() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let op = FnOperation::new("always.fails", |_: ()| async {
            Err::<(), _>(Error::Internal("boom".to_string()))
        })
        .counted(store.clone());

        let result = op.call(()).await;
        assert!(matches!(result, Err(Error::Internal(msg)) if msg == "boom"));

        let count = call_count(store.as_ref(), &OperationIdentity::new("always.fails")).await.unwrap();
        assert_eq!(count, 1);
    }
}
