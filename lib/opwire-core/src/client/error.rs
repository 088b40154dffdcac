use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::RejectedRequest;
use super::response::CallResponse;

/// Message used when a request fails without a structured error list.
fn unexpected_message(status: u16) -> String {
    format!("Something very bad happened! Try again later. ({status})")
}

/// Errors that can occur when building an [`ApiClient`](crate::ApiClient) or
/// reading a response.
///
/// Failures of an operation call are reported with [`CallError`] instead.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiClientError {
    /// URL parsing error when building the base URI.
    UrlError(url::ParseError),

    /// HTTP protocol error from the http crate.
    ///
    /// Occurs when the scheme, host and port do not form a valid URI.
    HttpError(http::Error),

    /// JSON serialization/deserialization error.
    JsonValueError(serde_json::Error),

    /// The specification document does not have the expected shape.
    #[display("Invalid specification at '{path}': {error}")]
    #[from(skip)]
    InvalidSpecification {
        /// Location of the problem inside the document.
        path: String,
        /// Description of the problem.
        error: String,
    },

    /// The specification document is not valid YAML.
    #[display("Invalid YAML specification: {error}")]
    #[from(skip)]
    YamlError {
        /// Description of the parsing failure.
        error: String,
    },

    /// Operation input must be a JSON object.
    #[display("Invalid input: expected a JSON object. Got: {value}")]
    #[from(skip)]
    InvalidInput {
        /// The rejected value.
        value: serde_json::Value,
    },

    /// JSON response deserialization failure.
    #[display("Failed to deserialize JSON at '{path}': {error}\n{body}")]
    #[from(skip)]
    JsonError {
        /// Path inside the body where the error occurred.
        path: String,
        /// The underlying JSON parsing error.
        error: serde_json::Error,
        /// The response body that failed to parse.
        body: String,
    },

    /// The response body cannot be read as JSON.
    #[display("Unsupported output for JSON: {body}")]
    #[from(skip)]
    UnsupportedJsonOutput {
        /// The response body received.
        body: String,
    },
}

/// A single `{ message, path }` error, the one shape every call failure is
/// reported with.
///
/// Extra members of structured server errors are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::Display)]
#[display("{message} ({path})")]
pub struct ErrorRecord {
    /// Human readable description.
    #[serde(default)]
    pub message: String,
    /// JSON pointer of the offending input, or the request URL.
    #[serde(default)]
    pub path: String,
    /// Any other member sent by the server.
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorRecord {
    /// Creates a record without extra members.
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub(in crate::client) fn missing_input(name: &str) -> Self {
        Self::new(format!("Missing input: {name}"), format!("/{name}"))
    }

    pub(in crate::client) fn invalid_header(name: &str) -> Self {
        Self::new(format!("Invalid header: {name}"), format!("/{name}"))
    }

    pub(in crate::client) fn unexpected_status(status: u16, url: &str) -> Self {
        Self::new(unexpected_message(status), url)
    }

    /// Reads one item of a server `errors` list, whatever its shape.
    ///
    /// Non-string `message` or `path` members are kept as JSON text, items
    /// that are not objects become the message.
    pub(in crate::client) fn from_server_item(item: &Value) -> Self {
        let Value::Object(members) = item else {
            return Self::new(member_text(item), "");
        };

        let mut extra = members.clone();
        let message = extra.remove("message").map(|it| member_text(&it));
        let path = extra.remove("path").map(|it| member_text(&it));
        Self {
            message: message.unwrap_or_default(),
            path: path.unwrap_or_default(),
            extra,
        }
    }
}

fn member_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Why an operation call failed.
///
/// Every variant exposes its errors as a list of [`ErrorRecord`] through
/// [`CallError::errors`], so callers can handle a single shape whatever the
/// origin of the failure.
#[derive(Debug, Clone, derive_more::Error, derive_more::Display)]
pub enum CallError {
    /// No operation with this id in the specification.
    #[display("Unknown operation: {operation_id}")]
    UnknownOperation {
        /// The requested operation id.
        operation_id: String,
        /// A single record naming the operation.
        errors: Vec<ErrorRecord>,
    },

    /// The input does not satisfy the operation parameters, nothing was sent.
    #[display("Invalid input for {request}: {}", join_errors(errors))]
    Binding {
        /// One record per missing or invalid parameter.
        errors: Vec<ErrorRecord>,
        /// The request as far as it could be built.
        request: RejectedRequest,
    },

    /// No status could be observed (connection failure, timeout, closed channel).
    #[display("Transport failure: {}", join_errors(errors))]
    Transport {
        /// A single synthesized record.
        errors: Vec<ErrorRecord>,
        /// The response, with status forced to `408`.
        response: Box<CallResponse>,
    },

    /// Non-200 response whose body carries a non-empty `errors` list.
    #[display("Server error ({}): {}", response.status(), join_errors(errors))]
    ServerStructured {
        /// One record per item of the `errors` list.
        errors: Vec<ErrorRecord>,
        /// The `errors` list of the body, unchanged.
        items: Vec<Value>,
        /// The received response.
        response: Box<CallResponse>,
    },

    /// Non-200 response without structured errors.
    #[display("Server error ({}): {}", response.status(), join_errors(errors))]
    ServerUnstructured {
        /// A single synthesized record.
        errors: Vec<ErrorRecord>,
        /// The received response.
        response: Box<CallResponse>,
    },
}

fn join_errors(errors: &[ErrorRecord]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CallError {
    pub(in crate::client) fn unknown_operation(operation_id: &str) -> Self {
        Self::UnknownOperation {
            operation_id: operation_id.to_string(),
            errors: vec![ErrorRecord::new(
                format!("Unknown operation: {operation_id}"),
                "/",
            )],
        }
    }

    pub(in crate::client) fn binding(request: RejectedRequest) -> Self {
        let errors = request.errors().to_vec();
        Self::Binding { errors, request }
    }

    /// The error records, whatever the failure kind.
    pub fn errors(&self) -> &[ErrorRecord] {
        match self {
            Self::UnknownOperation { errors, .. }
            | Self::Binding { errors, .. }
            | Self::Transport { errors, .. }
            | Self::ServerStructured { errors, .. }
            | Self::ServerUnstructured { errors, .. } => errors,
        }
    }

    /// The response that produced the error, when a transport was used.
    pub fn response(&self) -> Option<&CallResponse> {
        match self {
            Self::Transport { response, .. }
            | Self::ServerStructured { response, .. }
            | Self::ServerUnstructured { response, .. } => Some(response),
            Self::UnknownOperation { .. } | Self::Binding { .. } => None,
        }
    }

    /// The `errors` list sent by the server, as received.
    pub fn server_errors(&self) -> Option<&[Value]> {
        match self {
            Self::ServerStructured { items, .. } => Some(items),
            _ => None,
        }
    }

    /// The response status, `408` for transport failures.
    pub fn status(&self) -> Option<u16> {
        self.response().map(CallResponse::status)
    }

    /// The method of the failed call, when known.
    pub fn method(&self) -> Option<&Method> {
        match self {
            Self::Binding { request, .. } => Some(request.method()),
            _ => self.response().and_then(CallResponse::method),
        }
    }

    /// Returns `true` when nothing was sent because the input was invalid.
    pub fn is_binding(&self) -> bool {
        matches!(self, Self::Binding { .. })
    }

    /// Consumes the error, keeping only the records.
    pub fn into_errors(self) -> Vec<ErrorRecord> {
        match self {
            Self::UnknownOperation { errors, .. }
            | Self::Binding { errors, .. }
            | Self::Transport { errors, .. }
            | Self::ServerStructured { errors, .. }
            | Self::ServerUnstructured { errors, .. } => errors,
        }
    }
}
