use bytes::Bytes;
use headers::{ContentType, HeaderMapExt};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use reqwest::{Body, Request};
use tracing::debug;
use url::Url;

use super::error::ErrorRecord;
use super::input::Input;
use super::parameters::{bind, encode_pairs, resolve_path};
use crate::spec::OperationDef;

/// Encoded request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No payload.
    Empty,
    /// JSON text of the `body` parameter.
    Json(String),
    /// `application/x-www-form-urlencoded` text of the `formData` parameters.
    Form(String),
    /// Raw payload of the `file` parameter.
    File(Bytes),
}

impl RequestBody {
    /// Returns `true` for [`RequestBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn to_body(&self) -> Option<Body> {
        match self {
            Self::Empty => None,
            Self::Json(text) | Self::Form(text) => Some(Body::from(text.clone())),
            Self::File(content) => Some(Body::from(content.clone())),
        }
    }
}

/// A fully bound request, ready to be sent.
///
/// `url` is relative to the client origin unless the specification base path
/// is an absolute URL.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    operation_id: String,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: RequestBody,
}

impl PreparedRequest {
    /// Id of the called operation.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// HTTP method of the operation.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Base path, resolved path and query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `Content-Type` first, then the header parameters.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The encoded payload.
    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Key of this request in the operation cache.
    pub(in crate::client) fn cache_key(&self) -> String {
        format!("{}:{}", self.method, self.url)
    }

    pub(in crate::client) fn reject(self, record: ErrorRecord) -> RejectedRequest {
        RejectedRequest {
            operation_id: self.operation_id,
            method: self.method,
            url: self.url,
            errors: vec![record],
        }
    }

    pub(in crate::client) fn to_reqwest(&self, url: Url) -> Request {
        let mut request = Request::new(self.method.clone(), url);
        *request.headers_mut() = self.headers.clone();
        *request.body_mut() = self.body.to_body();
        request
    }
}

/// A request that was not sent because its input did not bind.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
#[display("{method} {url}")]
pub struct RejectedRequest {
    operation_id: String,
    method: Method,
    url: String,
    errors: Vec<ErrorRecord>,
}

impl RejectedRequest {
    /// Id of the called operation.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// HTTP method of the operation.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Base path and path, as far as it could be resolved.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// One record per missing or invalid parameter.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }
}

fn push_error(errors: &mut Vec<ErrorRecord>, record: ErrorRecord) {
    if !errors.contains(&record) {
        errors.push(record);
    }
}

fn build_headers(
    pairs: &[(String, String)],
    content_type: Option<ContentType>,
    errors: &mut Vec<ErrorRecord>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = content_type {
        headers.typed_insert(content_type);
    }

    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => push_error(errors, ErrorRecord::invalid_header(name)),
        }
    }

    headers
}

/// Builds the request of an operation call.
///
/// # Errors
///
/// Returns a [`RejectedRequest`] listing every missing or invalid parameter;
/// nothing must be sent in that case.
pub(in crate::client) fn build_request(
    base_path: &str,
    operation: &OperationDef,
    input: &Input,
) -> Result<PreparedRequest, RejectedRequest> {
    let mut errors = Vec::new();
    let path = resolve_path(operation.path(), operation.parameters(), input, &mut errors);
    let mut url = format!("{base_path}{path}");

    let bound = bind(operation.parameters(), input);
    for record in bound.errors {
        push_error(&mut errors, record);
    }

    let (content_type, body) = if let Some(json) = &bound.json {
        (Some(ContentType::json()), RequestBody::Json(json.to_string()))
    } else if !bound.form.is_empty() {
        (
            Some(ContentType::form_url_encoded()),
            RequestBody::Form(encode_pairs(&bound.form)),
        )
    } else if let Some(content) = bound.file {
        (None, RequestBody::File(content))
    } else {
        (None, RequestBody::Empty)
    };
    let headers = build_headers(&bound.headers, content_type, &mut errors);

    if !errors.is_empty() {
        debug!(%url, ?errors, "request rejected");
        return Err(RejectedRequest {
            operation_id: operation.id().to_string(),
            method: operation.method().clone(),
            url,
            errors,
        });
    }

    if !bound.query.is_empty() {
        url.push('?');
        url.push_str(&encode_pairs(&bound.query));
    }

    Ok(PreparedRequest {
        operation_id: operation.id().to_string(),
        method: operation.method().clone(),
        url,
        headers,
        body,
    })
}
