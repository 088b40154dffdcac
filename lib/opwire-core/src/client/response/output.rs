use serde_json::Value;

/// Decoded body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// No content.
    Empty,
    /// A body that parsed as a JSON object or array, or a channel payload.
    Json(Value),
    /// Any other content.
    Text(String),
}

impl ResponseBody {
    /// Decodes a body received over HTTP.
    ///
    /// Text that looks like a JSON object or array and parses as such is kept
    /// as JSON, anything else stays text.
    pub(in crate::client) fn decode(text: String) -> Self {
        let trimmed = text.trim_start();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(value) = serde_json::from_str(trimmed)
        {
            return Self::Json(value);
        }

        Self::Text(text)
    }

    pub(in crate::client) fn from_value(value: Value) -> Self {
        if value.is_null() {
            Self::Empty
        } else {
            Self::Json(value)
        }
    }

    /// Returns `true` for [`ResponseBody::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The JSON value, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Empty | Self::Text(_) => None,
        }
    }

    /// The body as sent by the server, JSON re-serialized.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    /// The non-empty `errors` list of a JSON object body, items of any shape.
    pub(in crate::client) fn structured_errors(&self) -> Option<&[Value]> {
        let items = self.as_value()?.get("errors")?.as_array()?;
        (!items.is_empty()).then_some(items.as_slice())
    }
}
