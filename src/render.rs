//! Value-to-text rendering.
//!
//! Rendering is an injected capability: assertion messages, failure context
//! snapshots and fixed `output:` entries all go through a [`Render`]
//! implementation. [`Inspector`] is the default one; it prints JSON-compatible
//! literals, short structures on one line and long ones broken across lines.

use serde_json::Value;

use crate::literal::sanitize;

/// Depth and length limits for one rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderLimits {
    /// Nesting levels shown below the top; deeper structures print as `[Array]`/`[Object]`.
    pub depth: Option<usize>,
    /// Array elements shown before the rest are summarised.
    pub max_items: Option<usize>,
}

impl RenderLimits {
    pub const UNLIMITED: RenderLimits = RenderLimits {
        depth: None,
        max_items: None,
    };

    /// Limits used for the context snapshot attached to a failing key.
    pub const SNAPSHOT: RenderLimits = RenderLimits {
        depth: Some(1),
        max_items: Some(16),
    };

    pub fn depth(depth: usize) -> Self {
        Self {
            depth: Some(depth),
            max_items: None,
        }
    }
}

/// Turns values into text.
pub trait Render {
    fn render(&self, value: &Value, limits: RenderLimits) -> String;

    /// Renders `value` with every continuation line prefixed by `indent`.
    fn render_indented(&self, value: &Value, limits: RenderLimits, indent: &str) -> String {
        let rendered = self.render(value, limits);
        sanitize(&rendered, |text| text.replace('\n', &format!("\n{}", indent)))
    }

    /// Renders an optional value, where `None` stands for an absent one.
    fn render_opt(&self, value: Option<&Value>, limits: RenderLimits) -> String {
        match value {
            Some(value) => self.render(value, limits),
            None => "undefined".to_string(),
        }
    }
}

/// The default renderer.
#[derive(Debug, Clone)]
pub struct Inspector {
    /// Structures whose one-line form is longer than this are broken across lines.
    pub break_length: usize,
    /// Indentation used for each nesting level of a broken structure.
    pub indent: String,
}

impl Default for Inspector {
    fn default() -> Self {
        Self {
            break_length: 72,
            indent: "  ".to_string(),
        }
    }
}

impl Inspector {
    fn render_at(&self, value: &Value, limits: RenderLimits, level: usize) -> String {
        let exhausted = limits.depth.is_some_and(|depth| level > depth);
        match value {
            Value::Array(items) if items.is_empty() => "[]".to_string(),
            Value::Object(map) if map.is_empty() => "{}".to_string(),
            Value::Array(_) if exhausted => "[Array]".to_string(),
            Value::Object(_) if exhausted => "[Object]".to_string(),
            Value::Array(items) => {
                let shown = limits.max_items.unwrap_or(items.len()).min(items.len());
                let mut parts: Vec<String> = items[..shown]
                    .iter()
                    .map(|item| self.render_at(item, limits, level + 1))
                    .collect();
                let hidden = items.len() - shown;
                if hidden > 0 {
                    parts.push(format!(
                        "... {} more item{}",
                        hidden,
                        if hidden == 1 { "" } else { "s" }
                    ));
                }
                self.layout('[', ']', parts)
            }
            Value::Object(map) => {
                let parts = map
                    .iter()
                    .map(|(key, item)| {
                        format!(
                            "{}: {}",
                            Value::String(key.clone()),
                            self.render_at(item, limits, level + 1)
                        )
                    })
                    .collect();
                self.layout('{', '}', parts)
            }
            scalar => scalar.to_string(),
        }
    }

    fn layout(&self, open: char, close: char, parts: Vec<String>) -> String {
        let inline = format!("{} {} {}", open, parts.join(", "), close);
        if inline.len() <= self.break_length && !inline.contains('\n') {
            return inline;
        }
        let nested: Vec<String> = parts
            .iter()
            .map(|part| format!("{}{}", self.indent, part.replace('\n', &format!("\n{}", self.indent))))
            .collect();
        format!("{}\n{}\n{}", open, nested.join(",\n"), close)
    }
}

impl Render for Inspector {
    fn render(&self, value: &Value, limits: RenderLimits) -> String {
        let spaced = self.render_at(value, limits, 0);
        sanitize(&spaced, collapse)
    }
}

/// Drops the padding space just inside `{ }` and `[ ]` on a single line.
/// Indentation in front of a closing bracket on its own line is kept.
fn collapse(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' && i > 0 && i + 1 < chars.len() {
            let (prev, next) = (chars[i - 1], chars[i + 1]);
            let after_open = matches!(prev, '[' | '{') && !next.is_whitespace();
            let before_close = matches!(next, ']' | '}') && !prev.is_whitespace();
            if after_open || before_close {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(value: Value, limits: RenderLimits) -> String {
        Inspector::default().render(&value, limits)
    }

    #[test]
    fn scalars_render_as_json() {
        assert_eq!(render(json!(7), RenderLimits::UNLIMITED), "7");
        assert_eq!(render(json!("a\"b"), RenderLimits::UNLIMITED), r#""a\"b""#);
        assert_eq!(render(json!(null), RenderLimits::UNLIMITED), "null");
    }

    #[test]
    fn short_structures_collapse_onto_one_line() {
        let out = render(json!({"a": [1, 2], "b": "x y"}), RenderLimits::UNLIMITED);
        assert_eq!(out, r#"{"a": [1, 2], "b": "x y"}"#);
    }

    #[test]
    fn string_content_is_not_collapsed() {
        let out = render(json!(["[ keep ]", "{ this }"]), RenderLimits::UNLIMITED);
        assert_eq!(out, r#"["[ keep ]", "{ this }"]"#);
    }

    #[test]
    fn depth_limit_summarises_nested_structures() {
        let value = json!({"a": {"b": {"c": 1}}, "l": [[1]]});
        assert_eq!(render(value.clone(), RenderLimits::depth(0)), r#"{"a": [Object], "l": [Array]}"#);
        assert_eq!(
            render(value, RenderLimits::depth(1)),
            r#"{"a": {"b": [Object]}, "l": [[Array]]}"#
        );
    }

    #[test]
    fn max_items_summarises_long_arrays() {
        let limits = RenderLimits {
            depth: None,
            max_items: Some(2),
        };
        assert_eq!(render(json!([1, 2, 3, 4]), limits), "[1, 2, ... 2 more items]");
        assert_eq!(render(json!([1, 2, 3]), limits), "[1, 2, ... 1 more item]");
    }

    #[test]
    fn long_structures_break_across_lines() {
        let long = "x".repeat(80);
        let out = render(json!([long.clone(), 1]), RenderLimits::UNLIMITED);
        assert_eq!(out, format!("[\n  \"{}\",\n  1\n]", long));
    }

    #[test]
    fn nested_closing_brackets_keep_their_indentation() {
        let long = "z".repeat(80);
        let out = render(json!([{"k": long.clone()}]), RenderLimits::UNLIMITED);
        assert_eq!(out, format!("[\n  {{\n    \"k\": \"{}\"\n  }}\n]", long));
    }

    #[test]
    fn render_indented_prefixes_continuation_lines() {
        let long = "y".repeat(80);
        let out = Inspector::default().render_indented(&json!([long.clone()]), RenderLimits::UNLIMITED, "    ");
        assert_eq!(out, format!("[\n      \"{}\"\n    ]", long));
    }
}
