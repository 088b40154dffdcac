use std::sync::LazyLock;

use regex::Regex;

/// Regular expression for matching path placeholders in the format `{name}`.
static RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?<name>\w+)}").expect("a valid regex"));

/// A piece of a [`PathTemplate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Text copied verbatim into the resolved path, separators included.
    Literal(String),
    /// A `{name}` placeholder substituted with the input value named `name`.
    Placeholder(String),
}

/// A URL template such as `/pets/{petId}/photos`, split once into literal and
/// placeholder pieces.
///
/// ```rust
/// use opwire_core::{PathSegment, PathTemplate};
///
/// let template = PathTemplate::parse("/pets/{petId}.json");
/// assert_eq!(
///     template.segments(),
///     [
///         PathSegment::Literal("/pets/".to_string()),
///         PathSegment::Placeholder("petId".to_string()),
///         PathSegment::Literal(".json".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("{raw}")]
pub struct PathTemplate {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PathTemplate {
    /// Splits the template into literal and placeholder segments.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in RE.captures_iter(&raw) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };
            if let Some(text) = raw.get(last..whole.start()).filter(|text| !text.is_empty()) {
                segments.push(PathSegment::Literal(text.to_string()));
            }
            segments.push(PathSegment::Placeholder(name.as_str().to_string()));
            last = whole.end();
        }

        if let Some(text) = raw.get(last..).filter(|text| !text.is_empty()) {
            segments.push(PathSegment::Literal(text.to_string()));
        }

        Self { raw, segments }
    }

    /// The template as written in the specification.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The ordered literal and placeholder segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Names of the placeholders, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::Placeholder(name) => Some(name.as_str()),
            PathSegment::Literal(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_plain_path_as_single_literal() {
        let template = PathTemplate::parse("/pets");

        assert_eq!(
            template.segments(),
            [PathSegment::Literal("/pets".to_string())]
        );
        assert_eq!(template.placeholders().count(), 0);
    }

    #[test]
    fn should_split_placeholders() {
        let template = PathTemplate::parse("/users/{user_id}/posts/{post_id}");

        insta::assert_debug_snapshot!(template.segments(), @r#"
        [
            Literal(
                "/users/",
            ),
            Placeholder(
                "user_id",
            ),
            Literal(
                "/posts/",
            ),
            Placeholder(
                "post_id",
            ),
        ]
        "#);
    }

    #[test]
    fn should_support_repeated_and_adjacent_placeholders() {
        let template = PathTemplate::parse("/test/{id}/{id}{ext}");

        let names: Vec<_> = template.placeholders().collect();
        assert_eq!(names, ["id", "id", "ext"]);
    }

    #[test]
    fn should_ignore_non_identifier_braces() {
        let template = PathTemplate::parse("/files/{not-a-name}");

        assert_eq!(
            template.segments(),
            [PathSegment::Literal("/files/{not-a-name}".to_string())]
        );
    }

    #[test]
    fn should_display_raw_template() {
        let template = PathTemplate::parse("/pets/{petId}");

        assert_eq!(template.to_string(), "/pets/{petId}");
    }
}
