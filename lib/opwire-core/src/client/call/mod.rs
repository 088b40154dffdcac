use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{CallError, CallResponse, ClientInner, Input};

mod execution;

/// A pending call of one operation.
///
/// Configure the input with the `with_*` methods, then `.await` the call, or
/// hand the outcome to a callback with [`ApiCall::on_complete`].
///
/// # Example
///
/// ```rust,no_run
/// # use opwire_core::ApiClient;
/// # use serde_json::json;
/// # async fn example(client: ApiClient) -> Result<(), Box<dyn std::error::Error>> {
/// let created = client
///     .call("addPet")
///     .with_param("pet", json!({ "name": "kitty" }))
///     .await?;
/// assert_eq!(created.status(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(derive_more::Debug)]
pub struct ApiCall {
    #[debug(skip)]
    pub(super) inner: Arc<ClientInner>,
    pub(super) operation_id: String,
    pub(super) input: Input,
    /// Skip the cache for this call only.
    pub(super) fresh: bool,
}

impl ApiCall {
    pub(super) fn new(inner: Arc<ClientInner>, operation_id: String) -> Self {
        Self {
            inner,
            operation_id,
            input: Input::default(),
            fresh: false,
        }
    }

    /// Id of the operation to call.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Replaces the whole input.
    #[must_use]
    pub fn with_input(mut self, input: Input) -> Self {
        self.input = input;
        self
    }

    /// Sets the value of one parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(name, value);
        self
    }

    /// Sets the raw payload of a `file` parameter.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.input = self.input.with_file(name, content);
        self
    }

    /// Skips the cache for this call, without touching the client-wide flag.
    #[must_use]
    pub fn fresh(mut self) -> Self {
        self.fresh = true;
        self
    }

    /// Runs the call on a new task and hands its outcome to `callback`.
    ///
    /// The callback runs exactly once, never before this method returns, even
    /// for cache hits and invalid input.
    ///
    /// Must be called within a Tokio runtime.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<CallResponse, CallError>) + Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.await;
            callback(outcome);
        })
    }
}
