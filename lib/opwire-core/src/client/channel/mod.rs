//! Message channel transport.
//!
//! Once a [`MessageChannel`] is attached to the client, calls that miss the
//! cache are sent as [`ChannelRequest`] messages. Replies arrive on a separate
//! event stream, the router task matches each `{ id, code, body }` event with
//! its pending call by correlation id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::input::Input;
use super::response::{CallResponse, ResponseSource};

#[cfg(feature = "websocket")]
mod websocket;
#[cfg(feature = "websocket")]
pub use self::websocket::WebSocketChannel;

/// A bidirectional message transport, such as a WebSocket.
///
/// Implementations only send; replies are fed to the client through the
/// event receiver given to [`ApiClient::use_channel`](crate::ApiClient::use_channel).
pub trait MessageChannel: Send + Sync + 'static {
    /// Returns `true` while messages can be sent.
    fn is_open(&self) -> bool;

    /// Sends one request message.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] when the message cannot be sent; the call is
    /// then reported as a transport failure.
    fn send(&self, message: ChannelRequest) -> Result<(), ChannelError>;
}

/// Request message: `{ "id": 1, "op": "listPets", "params": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRequest {
    /// Correlation id, unique per client, starting at 1.
    pub id: u64,
    /// Operation id.
    pub op: String,
    /// The raw call input.
    pub params: Input,
}

/// Errors raised by a [`MessageChannel`].
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ChannelError {
    /// The channel is not open anymore.
    #[display("Channel is closed")]
    #[from(skip)]
    Closed,

    /// The message cannot be encoded.
    #[display("Cannot encode channel message: {_0}")]
    Encode(serde_json::Error),

    /// The channel cannot be established.
    #[display("Cannot connect channel: {reason}")]
    #[from(skip)]
    Connect {
        /// Description of the failure.
        reason: String,
    },
}

/// Reply event: `{ "id": 1, "code": 200, "body": ... }`.
#[derive(Debug, Default, Deserialize)]
struct ChannelResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug)]
struct PendingRequest {
    operation_id: String,
    method: Method,
    url: String,
    generation: u64,
    created_at: Instant,
    sender: oneshot::Sender<CallResponse>,
}

impl PendingRequest {
    fn complete(self, response: CallResponse) {
        if self.sender.send(response).is_err() {
            debug!(operation_id = %self.operation_id, "pending call dropped before its reply");
        }
    }

    fn unobserved(&self) -> CallResponse {
        CallResponse::unobserved(
            &self.operation_id,
            &self.method,
            &self.url,
            ResponseSource::Channel,
        )
    }
}

/// Calls sent over a channel and waiting for their reply, by correlation id.
#[derive(Debug)]
pub(in crate::client) struct PendingRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, PendingRequest>>,
}

impl Default for PendingRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::default(),
        }
    }
}

impl PendingRegistry {
    /// Allocates a correlation id and records the pending call.
    pub(in crate::client) fn register(
        &self,
        operation_id: &str,
        method: &Method,
        url: &str,
        generation: u64,
    ) -> (u64, oneshot::Receiver<CallResponse>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        let pending = PendingRequest {
            operation_id: operation_id.to_string(),
            method: method.clone(),
            url: url.to_string(),
            generation,
            created_at: Instant::now(),
            sender,
        };

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id, pending);
        (id, receiver)
    }

    /// Forgets a pending call, returns `false` if it was already completed.
    pub(in crate::client) fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id).is_some()
    }

    /// Gives up on a pending call whose reply did not come in time.
    ///
    /// A reply routed after the deadline but before the entry was removed is
    /// still returned.
    pub(in crate::client) fn expire(
        &self,
        id: u64,
        receiver: &mut oneshot::Receiver<CallResponse>,
    ) -> Option<CallResponse> {
        if self.remove(id) {
            return None;
        }
        receiver.try_recv().ok()
    }

    /// Completes the pending call matching the event.
    ///
    /// Events without a non-zero `id` and `code`, or with an unknown `id`, are
    /// ignored and `false` is returned.
    pub(in crate::client) fn route(&self, event: Value) -> bool {
        let response = match serde_json::from_value::<ChannelResponse>(event) {
            Ok(response) => response,
            Err(err) => {
                debug!(%err, "ignoring malformed channel event");
                return false;
            }
        };

        let (Some(id), Some(code)) = (response.id, response.code) else {
            debug!("ignoring channel event without id or code");
            return false;
        };
        if id == 0 || code == 0 {
            debug!(id, code, "ignoring channel event with empty id or code");
            return false;
        }

        let pending = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.remove(&id)
        };
        let Some(pending) = pending else {
            debug!(id, code, "no pending call for channel event");
            return false;
        };

        debug!(
            id,
            code,
            operation_id = %pending.operation_id,
            elapsed = ?pending.created_at.elapsed(),
            "...receiving"
        );
        let response = CallResponse::from_channel(
            &pending.operation_id,
            &pending.method,
            &pending.url,
            code,
            response.body,
        );
        pending.complete(response);
        true
    }

    /// Fails every pending call sent over the given channel generation.
    pub(in crate::client) fn drain_generation(&self, generation: u64) -> usize {
        let drained = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let ids = entries
                .iter()
                .filter(|(_, pending)| pending.generation == generation)
                .map(|(id, _)| *id)
                .collect::<Vec<_>>();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id))
                .collect::<Vec<_>>()
        };

        let count = drained.len();
        for pending in drained {
            let response = pending.unobserved();
            pending.complete(response);
        }
        count
    }

    pub(in crate::client) fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }
}

/// Background task routing reply events until the event stream ends.
pub(in crate::client) async fn route_events(
    registry: std::sync::Arc<PendingRegistry>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<Value>,
) {
    while let Some(event) = events.recv().await {
        registry.route(event);
    }

    let drained = registry.drain_generation(generation);
    if drained > 0 {
        warn!(generation, drained, "channel closed with pending calls");
    } else {
        debug!(generation, "channel closed");
    }
}
