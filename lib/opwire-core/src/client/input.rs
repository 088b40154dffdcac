use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::ApiClientError;

/// The values supplied for one operation call, by parameter name.
///
/// JSON values feed every parameter location, raw payloads added with
/// [`Input::with_file`] feed `file` parameters.
///
/// # Example
///
/// ```rust
/// use opwire_core::Input;
/// use serde_json::json;
///
/// let input = Input::new()
///     .with("limit", 10)
///     .with("tags", json!(["cat", "dog"]))
///     .with_file("photo", b"\x89PNG".to_vec());
///
/// assert_eq!(input.get("limit"), Some(&json!(10)));
/// assert!(input.file("photo").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    values: IndexMap<String, Value>,
    files: IndexMap<String, Bytes>,
}

impl Input {
    /// Creates an empty input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a JSON value for the parameter `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds any serializable value for the parameter `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn try_with<T>(self, name: impl Into<String>, value: &T) -> Result<Self, ApiClientError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        Ok(self.with(name, value))
    }

    /// Adds a raw payload for the `file` parameter `name`.
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Sets the JSON value of the parameter `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// The JSON value of the parameter `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// The raw payload of the `file` parameter `name`.
    pub fn file(&self, name: &str) -> Option<&Bytes> {
        self.files.get(name)
    }

    /// Returns `true` without any value or payload.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.files.is_empty()
    }
}

impl TryFrom<Value> for Input {
    type Error = ApiClientError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            Value::Null => Ok(Self::default()),
            value => Err(ApiClientError::InvalidInput { value }),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Input
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self {
            values,
            files: IndexMap::new(),
        }
    }
}

/// Serialized as a single object, file payloads as base64 strings.
impl Serialize for Input {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len() + self.files.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        for (name, content) in &self.files {
            map.serialize_entry(name, &STANDARD.encode(content))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_build_input_from_json_object() {
        let input = Input::try_from(json!({ "a": 1, "b": "two" })).expect("object input");

        assert_eq!(input.get("a"), Some(&json!(1)));
        assert_eq!(input.get("b"), Some(&json!("two")));
        assert!(input.get("c").is_none());
    }

    #[test]
    fn should_accept_null_as_empty_input() {
        let input = Input::try_from(Value::Null).expect("null input");

        assert!(input.is_empty());
    }

    #[test]
    fn should_reject_non_object_input() {
        let result = Input::try_from(json!([1, 2]));

        assert!(matches!(result, Err(ApiClientError::InvalidInput { .. })));
    }

    #[test]
    fn should_serialize_values_then_files() {
        let input = Input::new()
            .with("name", "kitty")
            .with("age", 3)
            .with_file("photo", b"hi".to_vec());

        let value = serde_json::to_value(&input).expect("serializable input");

        insta::assert_json_snapshot!(value, @r#"
        {
          "name": "kitty",
          "age": 3,
          "photo": "aGk="
        }
        "#);
    }

    #[test]
    fn should_serialize_custom_types() {
        #[derive(serde::Serialize)]
        struct Pet {
            name: &'static str,
        }

        let input = Input::new()
            .try_with("pet", &Pet { name: "kitty" })
            .expect("serializable pet");

        assert_eq!(input.get("pet"), Some(&json!({ "name": "kitty" })));
    }

    #[test]
    fn should_replace_existing_value() {
        let mut input = Input::new().with("limit", 10);
        input.insert("limit", 20);

        assert_eq!(input.get("limit"), Some(&json!(20)));
    }
}
