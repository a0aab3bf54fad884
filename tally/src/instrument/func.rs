use crate::domain::OperationIdentity;
use crate::ports::Operation;
use async_trait::async_trait;
use shared::Result;
use std::future::Future;

/// Adapts an async closure into an [`Operation`]
pub struct FnOperation<F> {
    identity: OperationIdentity,
    f: F,
}

impl<F> FnOperation<F> {
    pub fn new(identity: impl Into<OperationIdentity>, f: F) -> Self {
        Self {
            identity: identity.into(),
            f,
        }
    }
}

#[async_trait]
impl<In, Out, F, Fut> Operation<In> for FnOperation<F>
where
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out>> + Send + 'static,
{
    type Out = Out;

    fn identity(&self) -> &OperationIdentity {
        &self.identity
    }

    async fn call(&self, input: In) -> Result<Out> {
        (self.f)(input).await
    }
}

impl<F> std::fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnOperation")
            .field("identity", &self.identity)
            .finish()
    }
}
