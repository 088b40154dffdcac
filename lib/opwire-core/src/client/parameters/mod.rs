//! Parameter binding: matching caller input to declared parameters.
//!
//! [`bind`] resolves the effective value of every declared parameter (input,
//! then declared default) and sorts it into the bucket of its location.
//! Path parameters are only checked here, [`resolve_path`] substitutes them.

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use super::error::ErrorRecord;
use super::input::Input;
use crate::spec::{ParameterDef, ParameterLocation};

mod param;
pub(in crate::client) use self::param::{encode_pairs, value_to_string};

mod path;
pub(in crate::client) use self::path::resolve_path;

/// Input values sorted by parameter location.
#[derive(Debug, Clone, Default, PartialEq)]
pub(in crate::client) struct BoundParameters {
    pub(in crate::client) query: Vec<(String, String)>,
    pub(in crate::client) headers: Vec<(String, String)>,
    pub(in crate::client) form: Vec<(String, String)>,
    pub(in crate::client) json: Option<Value>,
    pub(in crate::client) file: Option<Bytes>,
    pub(in crate::client) errors: Vec<ErrorRecord>,
}

enum Resolved<'a> {
    Value(&'a Value),
    File(&'a Bytes),
}

fn resolve<'a>(parameter: &'a ParameterDef, input: &'a Input) -> Option<Resolved<'a>> {
    let name = parameter.name();
    if parameter.location() == ParameterLocation::File
        && let Some(content) = input.file(name)
    {
        return Some(Resolved::File(content));
    }
    input
        .get(name)
        .or_else(|| parameter.default_value())
        .map(Resolved::Value)
}

/// Binds the input against the declared parameters, in declaration order.
pub(in crate::client) fn bind(parameters: &[ParameterDef], input: &Input) -> BoundParameters {
    let mut bound = BoundParameters::default();

    for parameter in parameters {
        let name = parameter.name();
        let Some(resolved) = resolve(parameter, input) else {
            if parameter.is_required() {
                bound.errors.push(ErrorRecord::missing_input(name));
            }
            continue;
        };

        match (parameter.location(), resolved) {
            (ParameterLocation::Path, _) => {}
            (ParameterLocation::File, Resolved::File(content)) => {
                bound.file = Some(content.clone());
            }
            (ParameterLocation::File, Resolved::Value(Value::String(text))) => {
                bound.file = Some(Bytes::from(text.clone()));
            }
            (ParameterLocation::File, Resolved::Value(value)) => {
                bound.file = Some(Bytes::from(value_to_string(value)));
            }
            (ParameterLocation::Body, Resolved::Value(value)) => {
                if bound.json.is_some() {
                    debug!(name, "body parameter replaces a previous one");
                }
                bound.json = Some(value.clone());
            }
            (ParameterLocation::FormData, Resolved::Value(value)) => {
                bound.form.push((name.to_string(), value_to_string(value)));
            }
            (ParameterLocation::Header, Resolved::Value(value)) => {
                bound.headers.push((name.to_string(), value_to_string(value)));
            }
            (ParameterLocation::Query, Resolved::Value(value)) => {
                bound.query.push((name.to_string(), value_to_string(value)));
            }
            (_, Resolved::File(_)) => {}
        }
    }

    bound
}
