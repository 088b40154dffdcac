//! Specification model: operations, parameters and path templates.
//!
//! A [`Specification`] is derived once from a Swagger-style JSON document
//! (`basePath` + `paths`) and never mutated afterwards. Fetching the document is
//! left to the caller; this module only turns an already-parsed value into the
//! operation registry used by [`ApiClient`](crate::ApiClient).

use std::str::FromStr;

use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ApiClientError;

mod template;
pub use self::template::{PathSegment, PathTemplate};

#[cfg(feature = "yaml")]
mod yaml;

/// Keys of a path item that describe an operation.
const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Path item key holding parameters shared by every operation of the path.
const SHARED_PARAMETERS: &str = "parameters";

/// Where a parameter value goes in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ParameterLocation {
    /// Substituted into the URL template.
    #[display("path")]
    Path,
    /// Appended to the query string.
    #[display("query")]
    Query,
    /// Sent as a request header.
    #[display("header")]
    Header,
    /// Encoded as the JSON request body.
    #[display("body")]
    Body,
    /// Encoded as an `application/x-www-form-urlencoded` field.
    #[display("formData")]
    FormData,
    /// Sent as the raw request payload.
    #[display("file")]
    File,
}

impl ParameterLocation {
    /// Parses the `in` field of a parameter declaration.
    ///
    /// Returns `None` for locations this client does not know about.
    pub fn parse(value: &str) -> Option<Self> {
        let location = match value {
            "path" => Self::Path,
            "query" => Self::Query,
            "header" => Self::Header,
            "body" => Self::Body,
            "formData" => Self::FormData,
            "file" => Self::File,
            _ => return None,
        };
        Some(location)
    }
}

/// A declared operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    name: String,
    location: ParameterLocation,
    required: bool,
    default: Option<Value>,
}

impl ParameterDef {
    /// Creates an optional parameter without default value.
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            required: false,
            default: None,
        }
    }

    /// Marks the parameter as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value used when the caller does not provide one.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Name matched against the input keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `in` of the declaration.
    pub fn location(&self) -> ParameterLocation {
        self.location
    }

    /// Returns `true` if a value must be provided.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The declared `default`.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// One callable operation: a method, a URL template and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDef {
    id: String,
    method: Method,
    path: PathTemplate,
    parameters: Vec<ParameterDef>,
}

impl OperationDef {
    /// Creates an operation from its parts.
    pub fn new(
        id: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        parameters: Vec<ParameterDef>,
    ) -> Self {
        Self {
            id: id.into(),
            method,
            path: PathTemplate::parse(path),
            parameters,
        }
    }

    /// The `operationId`, or the id derived from method and path.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HTTP method, upper case.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL template relative to the base path.
    pub fn path(&self) -> &PathTemplate {
        &self.path
    }

    /// Declared parameters, path-level ones first.
    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    /// Only `GET` responses are stored in the operation cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

/// A loaded API description.
///
/// # Example
///
/// ```rust
/// use opwire_core::Specification;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let spec: Specification = r#"{
///     "basePath": "/api/",
///     "paths": {
///         "/pets/{petId}": {
///             "get": {
///                 "operationId": "showPetById",
///                 "parameters": [{ "name": "petId", "in": "path", "required": true }]
///             }
///         }
///     }
/// }"#
/// .parse()?;
///
/// assert_eq!(spec.base_path(), "/api");
/// assert!(spec.operation("showPetById").is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specification {
    base_path: String,
    host: Option<String>,
    schemes: Vec<String>,
    operations: IndexMap<String, OperationDef>,
}

impl Specification {
    /// Creates a specification from already-derived operations.
    pub fn new(base_path: impl Into<String>, operations: impl IntoIterator<Item = OperationDef>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        let operations = operations
            .into_iter()
            .map(|operation| (operation.id.clone(), operation))
            .collect();
        Self {
            base_path,
            host: None,
            schemes: Vec::new(),
            operations,
        }
    }

    /// Derives the operation table from a parsed JSON document.
    ///
    /// Path templates that do not start with `/` and path item keys that are not
    /// HTTP methods are skipped. Parameters declared on the path item are shared
    /// by all of its operations, an operation-level declaration with the same
    /// `name` and `in` replaces the shared one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::InvalidSpecification`] when the document or one
    /// of its operations does not have the expected shape.
    pub fn from_value(value: Value) -> Result<Self, ApiClientError> {
        let raw: RawSpecification =
            serde_path_to_error::deserialize(value).map_err(|err| {
                ApiClientError::InvalidSpecification {
                    path: err.path().to_string(),
                    error: err.into_inner().to_string(),
                }
            })?;

        let mut operations = IndexMap::new();
        for (template, item) in raw.paths {
            if !template.starts_with('/') {
                debug!(%template, "skip path without leading slash");
                continue;
            }

            let shared = match item.get(SHARED_PARAMETERS) {
                Some(value) => parse_at::<Vec<RawParameter>>(
                    value,
                    &format!("paths.{template}.{SHARED_PARAMETERS}"),
                )?,
                None => Vec::new(),
            };

            for (key, value) in &item {
                if !HTTP_METHODS.contains(&key.as_str()) {
                    continue;
                }
                let raw_operation =
                    parse_at::<RawOperation>(value, &format!("paths.{template}.{key}"))?;
                let operation = raw_operation.into_operation(key, &template, &shared)?;
                debug!(id = operation.id(), method = %operation.method(), %template, "add operation");
                if let Some(previous) = operations.insert(operation.id.clone(), operation) {
                    warn!(id = previous.id(), "duplicated operation id, last declaration wins");
                }
            }
        }

        Ok(Self {
            base_path: raw.base_path.trim_end_matches('/').to_string(),
            host: raw.host,
            schemes: raw.schemes,
            operations,
        })
    }

    /// Parses a JSON document, see [`Specification::from_value`].
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or not a valid specification.
    pub fn from_json_str(text: &str) -> Result<Self, ApiClientError> {
        let value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Prefix of every request URL, without trailing slash.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// The `host` declared by the document, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The `schemes` declared by the document.
    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Looks up an operation by id.
    pub fn operation(&self, id: &str) -> Option<&OperationDef> {
        self.operations.get(id)
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationDef> + '_ {
        self.operations.values()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` without any operation.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl FromStr for Specification {
    type Err = ApiClientError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::from_json_str(text)
    }
}

impl TryFrom<Value> for Specification {
    type Error = ApiClientError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn parse_at<T>(value: &Value, prefix: &str) -> Result<T, ApiClientError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_path_to_error::deserialize(value).map_err(|err| {
        let inner = err.path().to_string();
        let path = if inner == "." {
            prefix.to_string()
        } else {
            format!("{prefix}.{inner}")
        };
        ApiClientError::InvalidSpecification {
            path,
            error: err.into_inner().to_string(),
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpecification {
    #[serde(default)]
    base_path: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    schemes: Vec<String>,
    #[serde(default)]
    paths: IndexMap<String, IndexMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOperation {
    #[serde(default)]
    operation_id: Option<String>,
    #[serde(default)]
    parameters: Vec<RawParameter>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
}

impl RawOperation {
    fn into_operation(
        self,
        method: &str,
        template: &str,
        shared: &[RawParameter],
    ) -> Result<OperationDef, ApiClientError> {
        let method_name = method.to_ascii_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|err| {
            ApiClientError::InvalidSpecification {
                path: format!("paths.{template}.{method}"),
                error: err.to_string(),
            }
        })?;
        let id = self
            .operation_id
            .unwrap_or_else(|| slug::slugify(format!("{method} {template}")));

        let mut declared: Vec<RawParameter> = shared.to_vec();
        for parameter in self.parameters {
            let existing = declared
                .iter_mut()
                .find(|it| it.name == parameter.name && it.location == parameter.location);
            match existing {
                Some(slot) => *slot = parameter,
                None => declared.push(parameter),
            }
        }

        let parameters = declared
            .into_iter()
            .filter_map(|raw| {
                let Some(location) = ParameterLocation::parse(&raw.location) else {
                    debug!(name = raw.name, location = raw.location, %id, "drop parameter with unknown location");
                    return None;
                };
                Some(ParameterDef {
                    name: raw.name,
                    location,
                    required: raw.required,
                    default: raw.default,
                })
            })
            .collect();

        Ok(OperationDef {
            id,
            method,
            path: PathTemplate::parse(template),
            parameters,
        })
    }
}
