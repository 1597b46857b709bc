use crate::access::CallbackFuture;
use crate::{Document, Operation, RequestContext};
use futures::future::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a custom validator: `Ok(())` accepts the value, `Err(message)`
/// rejects it with a field-scoped message.
pub type Verdict = Result<(), String>;

/// Arguments passed to a custom field validator.
#[derive(Debug, Clone)]
pub struct ValidateArgs {
    pub field: String,
    pub value: Value,
    pub sibling_data: Document,
    pub operation: Operation,
    pub context: RequestContext,
}

/// Custom field validator.
///
/// A rejection is collected with every other field error. An `Err` from the
/// outer `anyhow::Result` is a failure of the validator itself and
/// propagates to the caller.
#[derive(Clone)]
pub struct FieldValidator(Arc<dyn Fn(ValidateArgs) -> CallbackFuture<Verdict> + Send + Sync>);

impl FieldValidator {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ValidateArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Verdict>> + Send + 'static,
    {
        Self(Arc::new(move |args: ValidateArgs| f(args).boxed()))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ValidateArgs) -> Verdict + Send + Sync + 'static,
    {
        Self(Arc::new(move |args: ValidateArgs| {
            let verdict = f(&args);
            futures::future::ready(Ok::<_, anyhow::Error>(verdict)).boxed()
        }))
    }

    pub async fn validate(&self, args: ValidateArgs) -> anyhow::Result<Verdict> {
        (self.0)(args).await
    }
}

impl fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldValidator(..)")
    }
}
