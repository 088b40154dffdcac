//! Responses and their normalization into success or [`CallError`].

use http::header::HeaderMap;
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ApiClientError, CallError, ErrorRecord};

mod output;
pub use self::output::ResponseBody;

/// Status used when no status could be observed.
pub(in crate::client) const UNOBSERVED_STATUS: u16 = 0;

/// Status reported for transport failures.
pub(in crate::client) const TRANSPORT_FAILURE_STATUS: u16 = 408;

const SUCCESS_STATUS: u16 = 200;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ResponseSource {
    /// Received over HTTP.
    #[display("http")]
    Http,
    /// Received over the attached message channel.
    #[display("channel")]
    Channel,
    /// Replayed from the operation cache.
    #[display("cache")]
    Cache,
}

/// The response of an operation call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    operation_id: String,
    method: Option<Method>,
    status: u16,
    url: String,
    headers: HeaderMap,
    body: ResponseBody,
    source: ResponseSource,
}

impl CallResponse {
    /// Reads a received HTTP response.
    pub(in crate::client) async fn from_http(
        operation_id: &str,
        method: &Method,
        url: &str,
        response: reqwest::Response,
    ) -> Self {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(text) => ResponseBody::decode(text),
            Err(err) => {
                warn!(%err, %url, "failed to read response body");
                ResponseBody::Empty
            }
        };

        Self {
            operation_id: operation_id.to_string(),
            method: Some(method.clone()),
            status,
            url: url.to_string(),
            headers,
            body,
            source: ResponseSource::Http,
        }
    }

    pub(in crate::client) fn from_channel(
        operation_id: &str,
        method: &Method,
        url: &str,
        code: u16,
        body: Value,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            method: Some(method.clone()),
            status: code,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: ResponseBody::from_value(body),
            source: ResponseSource::Channel,
        }
    }

    /// A response without any observable status.
    pub(in crate::client) fn unobserved(
        operation_id: &str,
        method: &Method,
        url: &str,
        source: ResponseSource,
    ) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            method: Some(method.clone()),
            status: UNOBSERVED_STATUS,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            source,
        }
    }

    pub(in crate::client) fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Id of the called operation.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Method of the called operation.
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// The status code, `0` when none was observed and `408` once normalized.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The request URL, relative to the client origin.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response headers, empty for channel responses.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The decoded body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// The transport, or the cache, that produced the response.
    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// Only `200` is a success.
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// The body as text.
    pub fn text(&self) -> String {
        self.body.to_text()
    }

    /// Deserializes a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::UnsupportedJsonOutput`] when the body is not
    /// JSON, and [`ApiClientError::JsonError`] with the failing path when it
    /// does not match `T`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use opwire_core::{ApiClient, Input, Specification};
    /// # use serde::Deserialize;
    /// # #[derive(Deserialize)]
    /// # struct Pet { name: String }
    /// # async fn example(client: ApiClient) -> Result<(), Box<dyn std::error::Error>> {
    /// let response = client
    ///     .call("showPetById")
    ///     .with_param("petId", 42)
    ///     .await?;
    /// let pet: Pet = response.as_json()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn as_json<T>(&self) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
    {
        let ResponseBody::Json(value) = &self.body else {
            return Err(ApiClientError::UnsupportedJsonOutput { body: self.text() });
        };

        serde_path_to_error::deserialize(value).map_err(|err| ApiClientError::JsonError {
            path: err.path().to_string(),
            error: err.into_inner(),
            body: value.to_string(),
        })
    }
}

/// Splits a response into success or one of the error kinds.
///
/// A response without observable status is reported with status `408`.
pub(in crate::client) fn normalize(mut response: CallResponse) -> Result<CallResponse, CallError> {
    if response.is_success() {
        return Ok(response);
    }

    if let Some(items) = response.body.structured_errors() {
        debug!(status = response.status, ?items, "structured server errors");
        let items = items.to_vec();
        let errors = items.iter().map(ErrorRecord::from_server_item).collect();
        return Err(CallError::ServerStructured {
            errors,
            items,
            response: Box::new(response),
        });
    }

    if response.status == UNOBSERVED_STATUS {
        response.status = TRANSPORT_FAILURE_STATUS;
        let errors = vec![ErrorRecord::unexpected_status(
            TRANSPORT_FAILURE_STATUS,
            &response.url,
        )];
        return Err(CallError::Transport {
            errors,
            response: Box::new(response),
        });
    }

    debug!(status = response.status, url = %response.url, "unexpected status");
    let errors = vec![ErrorRecord::unexpected_status(response.status, &response.url)];
    Err(CallError::ServerUnstructured {
        errors,
        response: Box::new(response),
    })
}
