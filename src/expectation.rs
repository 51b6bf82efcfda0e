//! Expected values.
//!
//! An [`Expected`] mirrors the shape of a JSON value but may also hold a
//! wildcard or a path query at any position. Plain data converts with
//! `Expected::from(value)`; strings are always compared literally, so there is
//! no reserved syntax to escape.

use std::fmt;

use serde_json::Value;

/// The expected side of an assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// Matches anything, including an absent value.
    Wildcard,
    /// Matches the value found at this path of the assertion root.
    PathQuery(QueryPath),
    /// Compared by value. Arrays and objects are compared structurally.
    Literal(Value),
    List(Vec<Expected>),
    Map(Vec<(String, Expected)>),
}

impl Expected {
    pub fn any() -> Self {
        Expected::Wildcard
    }

    /// A path query; see [`QueryPath::parse`].
    pub fn path(query: &str) -> Self {
        Expected::PathQuery(QueryPath::parse(query))
    }

    pub fn list<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expected>,
    {
        Expected::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, E)>,
        K: Into<String>,
        E: Into<Expected>,
    {
        Expected::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// True for arrays and objects, in either tagged or literal form.
    pub fn is_structured(&self) -> bool {
        match self {
            Expected::List(_) | Expected::Map(_) => true,
            Expected::Literal(value) => value.is_array() || value.is_object(),
            _ => false,
        }
    }

    /// The elements, when this expectation is a sequence.
    pub fn as_list(&self) -> Option<&[Expected]> {
        match self {
            Expected::List(items) => Some(items),
            _ => None,
        }
    }

    /// A plain value for display; wildcards and path queries print as tags.
    pub fn to_display_value(&self) -> Value {
        match self {
            Expected::Wildcard => Value::String("<any>".to_string()),
            Expected::PathQuery(path) => Value::String(format!("<path {}>", path)),
            Expected::Literal(value) => value.clone(),
            Expected::List(items) => {
                Value::Array(items.iter().map(Expected::to_display_value).collect())
            }
            Expected::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_display_value()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Expected {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Expected::List(items.into_iter().map(Expected::from).collect()),
            Value::Object(map) => Expected::Map(
                map.into_iter()
                    .map(|(key, value)| (key, Expected::from(value)))
                    .collect(),
            ),
            scalar => Expected::Literal(scalar),
        }
    }
}

/// A dot-separated path resolved against the assertion root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPath {
    text: String,
    segments: Vec<String>,
}

impl QueryPath {
    /// Parses `a.b.0`; a leading `$` segment names the root and is dropped.
    ///
    /// ```rust
    /// use declaratest::expectation::QueryPath;
    /// assert_eq!(QueryPath::parse("$.a.b").segments(), &["a", "b"]);
    /// assert_eq!(QueryPath::parse("a.b").segments(), &["a", "b"]);
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments.first().is_some_and(|first| first == "$") {
            segments.remove(0);
        }
        Self {
            text: text.to_string(),
            segments,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for QueryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
