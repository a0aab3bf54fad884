use crate::domain::OperationIdentity;
use crate::ports::{KeyValueStore, Operation};
use async_trait::async_trait;
use bytes::Bytes;
use shared::Result;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use tracing::debug;

/// Logs the input as a one-element `Debug` tuple (`("foo",)`) and `Display`
/// of the output of every completed call to `<identity>:inputs` / `<identity>:outputs`, and returns the
/// output's string form.
pub struct HistoryOperation<Op> {
    inner: Op,
    store: Arc<dyn KeyValueStore>,
}

impl<Op> HistoryOperation<Op> {
    pub fn new(inner: Op, store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl<In, Op> Operation<In> for HistoryOperation<Op>
where
    In: Debug + Send + 'static,
    Op: Operation<In>,
    Op::Out: Display,
{
    type Out = String;

    fn identity(&self) -> &OperationIdentity {
        self.inner.identity()
    }

    async fn call(&self, input: In) -> Result<String> {
        let identity = self.inner.identity();
        // Rendered as the argument tuple, so replay reads `id(*(arg,)) -> out`
        let input_repr = format!("({input:?},)");

        let output = match self.inner.call(input).await {
            Ok(output) => output.to_string(),
            Err(e) => {
                debug!("{}{} failed, history left untouched: {}", identity, input_repr, e);
                return Err(e);
            }
        };

        // Both sides in one append so the lists stay positionally paired
        self.store
            .rpush_many(vec![
                (identity.inputs_key(), Bytes::from(input_repr)),
                (identity.outputs_key(), Bytes::from(output.clone())),
            ])
            .await?;

        Ok(output)
    }
}
