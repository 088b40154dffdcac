use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

use crate::spec::{OperationDef, Specification};

mod builder;
pub use self::builder::ApiClientBuilder;

mod cache;
use self::cache::OperationCache;

mod call;
pub use self::call::ApiCall;

mod channel;
use self::channel::PendingRegistry;
#[cfg(feature = "websocket")]
pub use self::channel::WebSocketChannel;
pub use self::channel::{ChannelError, ChannelRequest, MessageChannel};

mod error;
pub use self::error::{ApiClientError, CallError, ErrorRecord};

mod input;
pub use self::input::Input;

mod parameters;

mod request;
pub use self::request::{PreparedRequest, RejectedRequest, RequestBody};

mod response;
pub use self::response::{CallResponse, ResponseBody, ResponseSource};

#[cfg(test)]
mod integration_tests;

/// Client exposing the operations of a [`Specification`].
///
/// Each operation is invoked by id with [`ApiClient::call`], the returned
/// [`ApiCall`] is awaited for its result. A call is answered, in order:
///
/// 1. from the operation cache, for `GET` operations, unless the client or
///    the call is marked fresh;
/// 2. over the attached [`MessageChannel`], while it is open;
/// 3. over HTTP.
///
/// Every failure is reported as a [`CallError`] carrying a list of
/// [`ErrorRecord`].
///
/// The client is cheap to clone, clones share the cache and the channel.
///
/// # Example
///
/// ```rust,no_run
/// use opwire_core::{ApiClient, Input, Specification};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let spec: Specification = std::fs::read_to_string("petstore.json")?.parse()?;
/// let client = ApiClient::builder().with_host("localhost:3000").build(spec)?;
///
/// let pets = client
///     .call("listPets")
///     .with_param("limit", 10)
///     .await?;
/// println!("{}", pets.text());
///
/// // bypass the cache once
/// let pets = client.fresh().call("listPets").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct AttachedChannel {
    generation: u64,
    channel: Arc<dyn MessageChannel>,
}

#[derive(derive_more::Debug)]
pub(in crate::client) struct ClientInner {
    http: reqwest::Client,
    base_uri: Url,
    specification: Specification,
    cache: OperationCache,
    fresh: AtomicBool,
    #[debug(skip)]
    channel: Mutex<Option<AttachedChannel>>,
    channel_generation: AtomicU64,
    pending: Arc<PendingRegistry>,
    channel_timeout: Option<Duration>,
}

impl ClientInner {
    /// Reads and clears the client-wide fresh flag.
    fn take_fresh(&self) -> bool {
        self.fresh.swap(false, Ordering::AcqRel)
    }

    /// The attached channel, if it is still open.
    fn open_channel(&self) -> Option<(u64, Arc<dyn MessageChannel>)> {
        let attached = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        attached
            .as_ref()
            .filter(|it| it.channel.is_open())
            .map(|it| (it.generation, Arc::clone(&it.channel)))
    }
}

impl ApiClient {
    /// Creates a builder to configure the client origin and transports.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub(in crate::client) fn new(
        http: reqwest::Client,
        base_uri: Url,
        specification: Specification,
        channel_timeout: Option<Duration>,
    ) -> Self {
        let inner = ClientInner {
            http,
            base_uri,
            specification,
            cache: OperationCache::default(),
            fresh: AtomicBool::new(false),
            channel: Mutex::new(None),
            channel_generation: AtomicU64::new(0),
            pending: Arc::new(PendingRegistry::default()),
            channel_timeout,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The origin HTTP requests are sent to.
    pub fn base_uri(&self) -> &Url {
        &self.inner.base_uri
    }

    /// The loaded specification.
    pub fn specification(&self) -> &Specification {
        &self.inner.specification
    }

    /// The callable operations, in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDef> + '_ {
        self.inner.specification.operations()
    }

    /// Looks up an operation by id.
    pub fn operation(&self, operation_id: &str) -> Option<&OperationDef> {
        self.inner.specification.operation(operation_id)
    }

    /// Starts a call of the operation.
    ///
    /// An unknown operation id is reported when the call is awaited.
    pub fn call(&self, operation_id: impl Into<String>) -> ApiCall {
        ApiCall::new(Arc::clone(&self.inner), operation_id.into())
    }

    /// Calls the operation and hands the outcome to `callback`, exactly once
    /// and never before this method returns.
    ///
    /// Must be called within a Tokio runtime.
    pub fn dispatch<F>(
        &self,
        operation_id: impl Into<String>,
        input: Input,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<CallResponse, CallError>) + Send + 'static,
    {
        self.call(operation_id).with_input(input).on_complete(callback)
    }

    /// Builds the HTTP request of a call without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownOperation`] or [`CallError::Binding`].
    pub fn prepare(&self, operation_id: &str, input: &Input) -> Result<PreparedRequest, CallError> {
        let operation = self
            .operation(operation_id)
            .ok_or_else(|| CallError::unknown_operation(operation_id))?;
        request::build_request(self.inner.specification.base_path(), operation, input)
            .map_err(CallError::binding)
    }

    /// Makes the next call skip the cache.
    ///
    /// The flag is cleared by the next dispatched call, whatever its operation
    /// and transport.
    pub fn fresh(&self) -> &Self {
        self.inner.fresh.store(true, Ordering::Release);
        self
    }

    /// The last cached response of the operation.
    pub fn cached(&self, operation_id: &str) -> Option<CallResponse> {
        self.inner
            .cache
            .latest(operation_id)
            .map(|it| it.with_source(ResponseSource::Cache))
    }

    /// Attaches a message channel.
    ///
    /// `events` yields the reply events of the channel, they are routed to the
    /// pending calls by a background task. When `events` ends, the calls still
    /// waiting on this channel fail with a transport error. Attaching another
    /// channel replaces this one for new calls.
    ///
    /// Must be called within a Tokio runtime.
    pub fn use_channel<C>(&self, channel: C, events: mpsc::UnboundedReceiver<Value>) -> &Self
    where
        C: MessageChannel,
    {
        let generation = self.inner.channel_generation.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut attached = self.inner.channel.lock().unwrap_or_else(PoisonError::into_inner);
            *attached = Some(AttachedChannel {
                generation,
                channel: Arc::new(channel),
            });
        }
        debug!(generation, "channel attached");

        tokio::spawn(channel::route_events(
            Arc::clone(&self.inner.pending),
            generation,
            events,
        ));
        self
    }

    /// Number of calls sent over a channel and still waiting for a reply.
    pub fn pending_channel_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of cached responses.
    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }
}
