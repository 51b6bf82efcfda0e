//! Deep structural assertions.
//!
//! [`Asserter::assert`] compares an actual value against an [`Expected`]
//! tree. Arrays and objects are compared key by key (array indices are keys),
//! wildcards match anything, and path queries must resolve, against the root
//! of the actual value, to the very value found at their position.

use std::ptr;

use serde_json::Value;
use thiserror::Error;

use crate::expectation::{Expected, QueryPath};
use crate::render::{Inspector, Render, RenderLimits};

/// How keys present in the actual value but missing from the expected one are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraKeyPolicy {
    /// Reported at the top level only; nested structures may carry extra keys.
    #[default]
    TopLevelOnly,
    /// Reported at every depth.
    EveryDepth,
}

/// Why an assertion failed. Messages embed rendered values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("actual {actual} does not match expected {expected}")]
    Mismatch { actual: String, expected: String },

    #[error("{inner} for '{key}' in {actual}")]
    AtKey {
        key: String,
        actual: String,
        inner: Box<AssertionError>,
    },

    #[error("path '{path}' not found in {scope}")]
    PathNotFound { path: String, scope: String },

    #[error("path '{path}' resolved to {resolved} instead of {actual}")]
    PathMismatch {
        path: String,
        resolved: String,
        actual: String,
    },

    #[error("key '{key}' does not exist in expected but is in actual which is {actual}")]
    ExtraKey { key: String, actual: String },

    #[error("key '{key}' in actual does not exist in expected")]
    NestedExtraKey { key: String },
}

impl AssertionError {
    fn is_path_failure(&self) -> bool {
        matches!(
            self,
            AssertionError::PathNotFound { .. } | AssertionError::PathMismatch { .. }
        )
    }
}

/// Compares values using a renderer for failure messages.
pub struct Asserter<'r> {
    renderer: &'r dyn Render,
    extra_keys: ExtraKeyPolicy,
}

impl<'r> Asserter<'r> {
    pub fn new(renderer: &'r dyn Render) -> Self {
        Self {
            renderer,
            extra_keys: ExtraKeyPolicy::default(),
        }
    }

    pub fn with_extra_keys(mut self, policy: ExtraKeyPolicy) -> Self {
        self.extra_keys = policy;
        self
    }

    /// Asserts `actual` against `expected`; `actual` is also the root for path queries.
    pub fn assert(&self, actual: &Value, expected: &Expected) -> Result<(), AssertionError> {
        self.assert_in(actual, expected, actual)
    }

    /// Compares `actual` against `expected`, resolving path queries against `root`.
    pub fn assert_in(&self, actual: &Value, expected: &Expected, root: &Value) -> Result<(), AssertionError> {
        self.assert_at(Some(actual), expected, root)
    }

    fn assert_at(
        &self,
        actual: Option<&Value>,
        expected: &Expected,
        root: &Value,
    ) -> Result<(), AssertionError> {
        match expected {
            Expected::Wildcard => Ok(()),
            Expected::PathQuery(path) => self.assert_path(actual, path, root),
            Expected::Literal(value) if value.is_array() || value.is_object() => {
                self.assert_at(actual, &Expected::from(value.clone()), root)
            }
            Expected::List(_) | Expected::Map(_) => match actual {
                Some(actual) if actual.is_array() || actual.is_object() => {
                    self.assert_structure(actual, expected, root)
                }
                _ => Err(self.mismatch(actual, expected)),
            },
            Expected::Literal(value) => match actual {
                Some(actual) if same_scalar(actual, value) => Ok(()),
                _ => Err(self.mismatch(actual, expected)),
            },
        }
    }

    fn assert_structure(
        &self,
        actual: &Value,
        expected: &Expected,
        root: &Value,
    ) -> Result<(), AssertionError> {
        for (key, item) in expected_entries(expected) {
            if let Err(err) = self.assert_at(child(actual, &key), item, root) {
                if err.is_path_failure() {
                    return Err(err);
                }
                return Err(AssertionError::AtKey {
                    key,
                    actual: self.renderer.render(actual, RenderLimits::SNAPSHOT),
                    inner: Box::new(err),
                });
            }
        }

        let top = ptr::eq(actual, root);
        if !top && self.extra_keys == ExtraKeyPolicy::TopLevelOnly {
            return Ok(());
        }
        for key in keys(actual) {
            if expected_child(expected, &key).is_some() {
                continue;
            }
            return Err(if top {
                AssertionError::ExtraKey {
                    key,
                    actual: self.renderer.render(actual, RenderLimits::SNAPSHOT),
                }
            } else {
                AssertionError::NestedExtraKey { key }
            });
        }
        Ok(())
    }

    fn assert_path(
        &self,
        actual: Option<&Value>,
        path: &QueryPath,
        root: &Value,
    ) -> Result<(), AssertionError> {
        let mut queried = root;
        for segment in path.segments() {
            queried = child(queried, segment).ok_or_else(|| AssertionError::PathNotFound {
                path: path.to_string(),
                scope: self.renderer.render(queried, RenderLimits::depth(1)),
            })?;
        }
        if identical(queried, actual) {
            return Ok(());
        }
        Err(AssertionError::PathMismatch {
            path: path.to_string(),
            resolved: self.renderer.render(queried, RenderLimits::depth(1)),
            actual: self.renderer.render_opt(actual, RenderLimits::depth(1)),
        })
    }

    fn mismatch(&self, actual: Option<&Value>, expected: &Expected) -> AssertionError {
        AssertionError::Mismatch {
            actual: self.renderer.render_opt(actual, RenderLimits::UNLIMITED),
            expected: self
                .renderer
                .render(&expected.to_display_value(), RenderLimits::UNLIMITED),
        }
    }
}

/// Asserts with the default renderer and extra-key policy.
///
/// ```rust
/// use declaratest::assertion::assert_value;
/// use declaratest::expectation::Expected;
/// use serde_json::json;
///
/// assert!(assert_value(&json!({"a": 1}), &Expected::from(json!({"a": 1}))).is_ok());
/// assert!(assert_value(&json!(7), &Expected::any()).is_ok());
/// ```
pub fn assert_value(actual: &Value, expected: &Expected) -> Result<(), AssertionError> {
    Asserter::new(&Inspector::default()).assert(actual, expected)
}

fn same_scalar(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => a == b,
    }
}

/// Identity in the sense of a path query: the same place in the root, or equal scalars.
fn identical(resolved: &Value, actual: Option<&Value>) -> bool {
    match actual {
        Some(actual) => ptr::eq(resolved, actual) || same_scalar(resolved, actual),
        None => false,
    }
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

fn keys(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => (0..items.len()).map(|index| index.to_string()).collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn expected_entries(expected: &Expected) -> Vec<(String, &Expected)> {
    match expected {
        Expected::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Expected::Map(entries) => entries.iter().map(|(key, item)| (key.clone(), item)).collect(),
        _ => Vec::new(),
    }
}

fn expected_child<'e>(expected: &'e Expected, key: &str) -> Option<&'e Expected> {
    match expected {
        Expected::List(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        Expected::Map(entries) => entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, item)| item),
        _ => None,
    }
}
