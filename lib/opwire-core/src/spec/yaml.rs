//! YAML input support using serde-saphyr.
//!
//! Only available when the `yaml` feature is enabled.

use serde_json::Value;

use super::Specification;
use crate::ApiClientError;

impl Specification {
    /// Parses a YAML document, see [`Specification::from_value`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::YamlError`] if the text is not valid YAML, or an
    /// [`ApiClientError::InvalidSpecification`] if the document has the wrong shape.
    pub fn from_yaml_str(text: &str) -> Result<Self, ApiClientError> {
        let value: Value =
            serde_saphyr::from_str(text).map_err(|err| ApiClientError::YamlError {
                error: err.to_string(),
            })?;
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::ParameterLocation;

    #[test]
    fn should_parse_yaml_specification() {
        let spec = Specification::from_yaml_str(
            r"
basePath: /api
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - name: limit
          in: query
          default: 10
",
        )
        .expect("valid YAML specification");

        let operation = spec.operation("listPets").expect("listPets operation");
        assert_eq!(operation.method(), Method::GET);
        let [limit] = operation.parameters() else {
            panic!("expected a single parameter");
        };
        assert_eq!(limit.location(), ParameterLocation::Query);
        assert_eq!(limit.default_value(), Some(&Value::from(10)));
    }

    #[test]
    fn should_reject_invalid_yaml() {
        let result = Specification::from_yaml_str("paths: [unclosed");

        assert!(matches!(result, Err(ApiClientError::YamlError { .. })));
    }
}
