use std::future::{Future, IntoFuture};
use std::pin::Pin;

use tracing::{debug, warn};

use super::ApiCall;
use crate::client::channel::{ChannelRequest, MessageChannel};
use crate::client::parameters::resolve_path;
use crate::client::request::{PreparedRequest, build_request};
use crate::client::response::{CallResponse, ResponseSource, normalize};
use crate::client::{CallError, ClientInner, ErrorRecord, Input};
use crate::spec::OperationDef;

impl ApiCall {
    async fn exchange(self) -> Result<CallResponse, CallError> {
        let Self {
            inner,
            operation_id,
            input,
            fresh,
        } = self;

        // cleared by every dispatch, whatever path it takes
        let fresh = inner.take_fresh() || fresh;

        let Some(operation) = inner.specification.operation(&operation_id) else {
            debug!(%operation_id, "unknown operation");
            tokio::task::yield_now().await;
            return Err(CallError::unknown_operation(&operation_id));
        };

        let prepared = build_request(inner.specification.base_path(), operation, &input);

        if !fresh
            && operation.is_cacheable()
            && let Ok(request) = &prepared
            && let Some(cached) = inner.cache.get(&request.cache_key())
        {
            debug!(url = request.url(), "cached");
            tokio::task::yield_now().await;
            return Ok(cached.with_source(ResponseSource::Cache));
        }

        if let Some((generation, channel)) = inner.open_channel() {
            return send_over_channel(&inner, generation, channel.as_ref(), operation, input).await;
        }

        match prepared {
            Ok(request) => send_over_http(&inner, operation, request).await,
            Err(rejected) => {
                tokio::task::yield_now().await;
                Err(CallError::binding(rejected))
            }
        }
    }
}

async fn send_over_http(
    inner: &ClientInner,
    operation: &OperationDef,
    request: PreparedRequest,
) -> Result<CallResponse, CallError> {
    let url = match inner.base_uri.join(request.url()) {
        Ok(url) => url,
        Err(err) => {
            let record = ErrorRecord::new(format!("Invalid URL: {err}"), request.url());
            tokio::task::yield_now().await;
            return Err(CallError::binding(request.reject(record)));
        }
    };

    let http_request = request.to_reqwest(url);
    debug!(?http_request, "sending...");
    let response = match inner.http.execute(http_request).await {
        Ok(response) => {
            debug!(?response, "...receiving");
            CallResponse::from_http(
                request.operation_id(),
                request.method(),
                request.url(),
                response,
            )
            .await
        }
        Err(err) => {
            warn!(error = %err, url = request.url(), "request failed");
            CallResponse::unobserved(
                request.operation_id(),
                request.method(),
                request.url(),
                ResponseSource::Http,
            )
        }
    };

    if operation.is_cacheable() && response.is_success() {
        inner
            .cache
            .put(operation.id(), request.cache_key(), response.clone());
    }

    normalize(response)
}

async fn send_over_channel(
    inner: &ClientInner,
    generation: u64,
    channel: &dyn MessageChannel,
    operation: &OperationDef,
    input: Input,
) -> Result<CallResponse, CallError> {
    let url = channel_url(inner.specification.base_path(), operation, &input);
    let (id, mut receiver) = inner
        .pending
        .register(operation.id(), operation.method(), &url, generation);
    let message = ChannelRequest {
        id,
        op: operation.id().to_string(),
        params: input,
    };

    debug!(id, operation_id = operation.id(), generation, "sending...");
    if let Err(err) = channel.send(message) {
        warn!(error = %err, id, "channel send failed");
        inner.pending.remove(id);
        tokio::task::yield_now().await;
        return normalize(unobserved(operation, &url));
    }

    let reply = match inner.channel_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(reply) => reply.ok(),
            Err(_) => {
                let reply = inner.pending.expire(id, &mut receiver);
                if reply.is_none() {
                    warn!(id, ?timeout, operation_id = operation.id(), "channel reply timed out");
                }
                reply
            }
        },
        None => receiver.await.ok(),
    };

    normalize(reply.unwrap_or_else(|| unobserved(operation, &url)))
}

/// The resolved path of a channel call, the raw template when some path
/// value is missing.
fn channel_url(base_path: &str, operation: &OperationDef, input: &Input) -> String {
    let mut errors = Vec::new();
    let path = resolve_path(operation.path(), operation.parameters(), input, &mut errors);
    if errors.is_empty() {
        format!("{base_path}{path}")
    } else {
        format!("{base_path}{}", operation.path())
    }
}

fn unobserved(operation: &OperationDef, url: &str) -> CallResponse {
    CallResponse::unobserved(
        operation.id(),
        operation.method(),
        url,
        ResponseSource::Channel,
    )
}

impl IntoFuture for ApiCall {
    type Output = Result<CallResponse, CallError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exchange())
    }
}
