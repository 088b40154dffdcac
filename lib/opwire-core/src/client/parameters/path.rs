use serde_json::Value;
use tracing::debug;

use super::param::{encode_component, value_to_string};
use crate::client::error::ErrorRecord;
use crate::client::input::Input;
use crate::spec::{ParameterDef, ParameterLocation, PathSegment, PathTemplate};

/// Value for a placeholder: the input, else the default of the path parameter
/// declared with the same name.
fn placeholder_value<'a>(
    name: &str,
    parameters: &'a [ParameterDef],
    input: &'a Input,
) -> Option<&'a Value> {
    input.get(name).or_else(|| {
        parameters
            .iter()
            .find(|it| it.location() == ParameterLocation::Path && it.name() == name)
            .and_then(ParameterDef::default_value)
    })
}

/// Substitutes every placeholder of the template.
///
/// Values are percent-encoded. Each missing value records a `Missing input`
/// error and leaves its placeholder empty.
pub(in crate::client) fn resolve_path(
    template: &PathTemplate,
    parameters: &[ParameterDef],
    input: &Input,
    errors: &mut Vec<ErrorRecord>,
) -> String {
    let mut path = String::with_capacity(template.as_str().len());

    for segment in template.segments() {
        match segment {
            PathSegment::Literal(text) => path.push_str(text),
            PathSegment::Placeholder(name) => match placeholder_value(name, parameters, input) {
                Some(value) => path.push_str(&encode_component(&value_to_string(value))),
                None => {
                    debug!(%name, %template, "missing path argument");
                    errors.push(ErrorRecord::missing_input(name));
                }
            },
        }
    }

    path
}
