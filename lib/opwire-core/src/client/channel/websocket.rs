use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::{ChannelError, ChannelRequest, MessageChannel};

/// A [`MessageChannel`] over a WebSocket connection.
///
/// Requests are written as JSON text frames, every text or binary frame that
/// parses as JSON is forwarded to the event receiver returned by
/// [`WebSocketChannel::connect`].
///
/// # Example
///
/// ```rust,no_run
/// # use opwire_core::{ApiClient, Specification, WebSocketChannel};
/// # async fn example(spec: Specification) -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::builder().build(spec)?;
/// let (channel, events) = WebSocketChannel::connect("ws://localhost:3000/ws").await?;
/// client.use_channel(channel, events);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    outgoing: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Opens the connection and starts its reader and writer tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the handshake fails.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Value>), ChannelError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|err| ChannelError::Connect {
                reason: err.to_string(),
            })?;
        debug!(%url, "websocket connected");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (events, events_rx) = mpsc::unbounded_channel::<Value>();
        let open = Arc::new(AtomicBool::new(true));

        let writer_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(err) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %err, "Failed to send websocket message.");
                    break;
                }
            }
            writer_open.store(false, Ordering::Release);
            let _ = sink.close().await;
        });

        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                let payload = match message {
                    Ok(Message::Text(text)) => serde_json::from_str::<Value>(text.as_str()),
                    Ok(Message::Binary(data)) => serde_json::from_slice::<Value>(&data),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(err) => {
                        warn!(error = %err, "Websocket error.");
                        break;
                    }
                };
                match payload {
                    Ok(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => debug!(%err, "ignoring non JSON websocket frame"),
                }
            }
            reader_open.store(false, Ordering::Release);
        });

        Ok((Self { outgoing, open }, events_rx))
    }
}

impl MessageChannel for WebSocketChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.outgoing.is_closed()
    }

    fn send(&self, message: ChannelRequest) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        let text = serde_json::to_string(&message)?;
        self.outgoing.send(text).map_err(|_| ChannelError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::response::Response;
    use axum::routing::get;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::client::input::Input;

    async fn echo_ids(mut socket: WebSocket) {
        while let Some(Ok(message)) = socket.recv().await {
            let AxumMessage::Text(text) = message else {
                continue;
            };
            let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                continue;
            };
            let reply = json!({ "id": request["id"], "code": 200, "body": request["params"] });
            if socket
                .send(AxumMessage::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    }

    async fn ws_handler(upgrade: WebSocketUpgrade) -> Response {
        upgrade.on_upgrade(echo_ids)
    }

    #[tokio::test]
    async fn test_websocket_round_trip() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let app = Router::new().route("/ws", get(ws_handler));
            let _ = axum::serve(listener, app).await;
        });

        let (channel, mut events) = WebSocketChannel::connect(&format!("ws://{addr}/ws")).await?;
        assert!(channel.is_open());

        channel.send(ChannelRequest {
            id: 7,
            op: "listPets".to_string(),
            params: Input::new().with("limit", 2),
        })?;

        let event = events.recv().await.expect("reply event");
        assert_eq!(event, json!({ "id": 7, "code": 200, "body": { "limit": 2 } }));
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let result = WebSocketChannel::connect("ws://127.0.0.1:1/ws").await;

        assert!(matches!(result, Err(ChannelError::Connect { .. })));
    }
}
