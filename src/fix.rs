//! Fix mode: capture actual results and write them back into the document
//! that declares the test tree.
//!
//! The declaring document is treated as text. Starting at the entry marker
//! (`suite!(` by default) the patch walks down one key per path segment,
//! matching each key by its indentation and following it to the end of its
//! braces, then replaces the `output:` array sitting directly inside the
//! leaf's block with the rendered results. All matching happens on shielded text, so
//! braces and brackets inside string literals never confuse the walk.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::err_msg;
use crate::errors::TesterError;
use crate::literal::Tokenizer;
use crate::render::{Render, RenderLimits};
use crate::store::TextStore;

/// Indentation used when the document has no indented line.
const DEFAULT_TAB: &str = "  ";

static OUTPUT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\boutput\s*:").expect("output key pattern is valid"));

/// The group path named for fixing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixTarget {
    segments: Vec<String>,
}

impl FixTarget {
    /// Parses a dot-separated path of group names, `*` matching any one group.
    ///
    /// Only one exact group may be fixed, so multiple selectors, negation,
    /// alternatives and index ranges are all rejected.
    pub fn parse(text: &str) -> Result<Self, TesterError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(err_msg!(Configuration, "must specify exact test group to fix; * allowed"));
        }
        if text.contains(',') {
            return Err(err_msg!(
                Configuration,
                "can't fix multiple test groups at once, got '{}'",
                text
            ));
        }
        if text.starts_with('!') {
            return Err(err_msg!(Configuration, "can't fix an excluded test group, got '{}'", text));
        }
        if text.contains('#') {
            return Err(err_msg!(
                Configuration,
                "can't fix individual tests; fix the whole group instead of '{}'",
                text
            ));
        }
        if text.contains('/') {
            return Err(err_msg!(
                Configuration,
                "can't fix alternative test groups, got '{}'",
                text
            ));
        }
        let segments: Vec<String> = text.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(err_msg!(Configuration, "empty group name in fix target '{}'", text));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl std::fmt::Display for FixTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Tracks how deep the traversal is relative to the fix target.
#[derive(Debug, Clone)]
pub struct FixCursor {
    target: FixTarget,
    depth: usize,
}

impl FixCursor {
    pub fn new(target: FixTarget) -> Self {
        Self { target, depth: 0 }
    }

    pub fn target(&self) -> &FixTarget {
        &self.target
    }

    /// Steps into the child group `name`.
    pub fn descend(&mut self, name: &str) -> Result<(), TesterError> {
        match self.target.segments.get(self.depth) {
            Some(segment) if segment == "*" || segment == name => {
                self.depth += 1;
                Ok(())
            }
            Some(segment) => Err(err_msg!(
                Configuration,
                "fix target '{}' expects '{}' but reached '{}'",
                self.target,
                segment,
                name
            )),
            None => Err(err_msg!(
                Configuration,
                "must specify exact test group to fix, not a parent; * allowed"
            )),
        }
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// True once every segment of the target has been matched.
    pub fn at_target(&self) -> bool {
        self.depth == self.target.depth()
    }

    pub fn reset(&mut self) {
        self.depth = 0;
    }
}

/// Rewrites the `output:` entry of one leaf inside a declaring document.
pub struct DocumentPatch<'a> {
    marker: &'a str,
    renderer: &'a dyn Render,
    tokenizer: Tokenizer,
}

impl<'a> DocumentPatch<'a> {
    pub fn new(marker: &'a str, renderer: &'a dyn Render) -> Self {
        Self {
            marker,
            renderer,
            tokenizer: Tokenizer::double_quoted(),
        }
    }

    /// Replaces the delimiters that quote literals in the document.
    pub fn with_delimiters(mut self, delimiters: &[char]) -> Result<Self, TesterError> {
        self.tokenizer = Tokenizer::new(delimiters)?;
        Ok(self)
    }

    /// Returns `document` with the output of the leaf at `path` set to `results`.
    pub fn apply(&self, document: &str, path: &[String], results: &[Value]) -> Result<String, TesterError> {
        if results.is_empty() {
            return Err(err_msg!(FixStructural, "empty test results for fix; aborting"));
        }
        let tab = indent_unit(document);
        self.tokenizer
            .try_sanitize(document, |masked| self.rewrite(masked, &tab, path, results))
    }

    fn rewrite(&self, masked: &str, tab: &str, path: &[String], results: &[Value]) -> Result<String, TesterError> {
        let mut content = masked.to_string();
        let dotted = path.join(".");

        let entry = compile(&format!(r"(?m)^([ \t]*).*?{}", regex::escape(self.marker)))?;
        let (mut indent, mut head) = match entry.captures(&content) {
            Some(found) => (found[1].to_string(), found.get(0).map_or(0, |m| m.end())),
            None => return Err(err_msg!(FixStructural, "couldn't find '{}'", self.marker)),
        };
        let mut end = content.len();

        for key in path {
            let not_found = || {
                err_msg!(
                    FixStructural,
                    "couldn't fix tests; no '{}' key found from {}",
                    key,
                    dotted
                )
            };
            let pattern = String::from("(?m)^(")
                + &regex::escape(&format!("{}{}", indent, tab))
                + ")"
                + &regex::escape(key)
                + r":(\s*\{\s*\})?";
            let key_line = compile(&pattern)?;
            let found = key_line
                .captures_at(&content[..end], head)
                .ok_or_else(not_found)?;
            let key_indent = found[1].to_string();
            let key_end = found.get(0).map_or(head, |m| m.end());
            let empty = found.get(2).map(|m| m.start());
            indent = key_indent;

            let open = match empty {
                Some(start) => {
                    let open = start + content[start..].find('{').ok_or_else(not_found)?;
                    let inserted = format!("{{\n{}{}output: []\n{}}}", indent, tab, indent);
                    end = end - (key_end - open) + inserted.len();
                    content.replace_range(open..key_end, &inserted);
                    open
                }
                None => content[key_end..end]
                    .find(|c: char| !c.is_whitespace())
                    .map(|offset| key_end + offset)
                    .filter(|&open| content[open..].starts_with('{'))
                    .ok_or_else(not_found)?,
            };
            let close = matching_bracket(&content, open)
                .filter(|&close| close < end)
                .ok_or_else(not_found)?;
            head = open + 1;
            end = close;
        }

        let no_output = || err_msg!(FixStructural, "couldn't fix tests; no 'output' key in {}", dotted);
        let keys = direct_output_keys(&content, head, end);
        let (start, after) = match keys.as_slice() {
            [only] => *only,
            [] => return Err(no_output()),
            _ => {
                return Err(err_msg!(
                    FixStructural,
                    "couldn't fix tests; more than one 'output' key in {}",
                    dotted
                ))
            }
        };
        let open = content[after..end]
            .find(|c: char| !c.is_whitespace())
            .map(|offset| after + offset)
            .filter(|&open| content[open..].starts_with('['))
            .ok_or_else(no_output)?;
        let close = matching_bracket(&content, open)
            .filter(|&close| close < end)
            .ok_or_else(no_output)?;

        let inner = format!("{}{}", indent, tab);
        let entry_indent = format!("{}{}", inner, tab);
        let rendered: Vec<String> = results
            .iter()
            .map(|result| {
                self.renderer
                    .render_indented(result, RenderLimits::UNLIMITED, &entry_indent)
            })
            .collect();
        let replacement = format!(
            "output: [\n{entry_indent}{}\n{inner}]",
            rendered.join(&format!(",\n{}", entry_indent))
        );
        debug!(path = %dotted, results = results.len(), "rewriting output entry");
        content.replace_range(start..=close, &replacement);
        Ok(content)
    }
}

/// Reads, patches and writes the declaring document, remembering the latest
/// text so repeated fixes in one run build on each other.
pub struct FixRewriter {
    store: Box<dyn TextStore>,
    document: PathBuf,
    marker: String,
    latest: Option<String>,
}

impl FixRewriter {
    pub fn new(store: Box<dyn TextStore>, document: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        Self {
            store,
            document: document.into(),
            marker: marker.into(),
            latest: None,
        }
    }

    pub fn document(&self) -> &Path {
        &self.document
    }

    /// The most recently written text, if any fix succeeded since the last reset.
    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    pub fn reset(&mut self) {
        self.latest = None;
    }

    pub fn fix(&mut self, renderer: &dyn Render, path: &[String], results: &[Value]) -> Result<(), TesterError> {
        let current = match &self.latest {
            Some(text) => text.clone(),
            None => self.store.read(&self.document)?,
        };
        let patched = DocumentPatch::new(&self.marker, renderer).apply(&current, path, results)?;
        self.store.write(&self.document, &patched)?;
        info!(
            document = %self.document.display(),
            path = %path.join("."),
            "fixed test outputs"
        );
        self.latest = Some(patched);
        Ok(())
    }
}

impl std::fmt::Debug for FixRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixRewriter")
            .field("document", &self.document)
            .field("marker", &self.marker)
            .field("cached", &self.latest.is_some())
            .finish()
    }
}

/// First run of leading spaces or tabs on a non-blank line.
fn indent_unit(document: &str) -> String {
    document
        .lines()
        .find_map(|line| {
            let trimmed = line.trim_start_matches([' ', '\t']);
            let width = line.len() - trimmed.len();
            (width > 0 && !trimmed.is_empty()).then(|| {
                let first = line.as_bytes()[0];
                line.bytes().take_while(|&b| b == first).map(char::from).collect()
            })
        })
        .unwrap_or_else(|| DEFAULT_TAB.to_string())
}

/// Index of the bracket closing the `[` or `{` at `open`.
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let (left, right) = match text[open..].chars().next()? {
        '[' => ('[', ']'),
        '{' => ('{', '}'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (offset, c) in text[open..].char_indices() {
        if c == left {
            depth += 1;
        } else if c == right {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(open + offset);
            }
        }
    }
    None
}

/// Spans of the `output:` keys sitting directly in `text[head..end]`, outside
/// any nested brackets. Paths such as `output::f` are not keys.
fn direct_output_keys(text: &str, head: usize, end: usize) -> Vec<(usize, usize)> {
    let block = &text[..end];
    OUTPUT_KEY
        .find_iter(&block[head..])
        .map(|m| (head + m.start(), head + m.end()))
        .filter(|&(_, after)| !block[after..].starts_with(':'))
        .filter(|&(start, _)| {
            let mut depth = 0isize;
            for c in block[head..start].chars() {
                match c {
                    '{' | '[' | '(' => depth += 1,
                    '}' | ']' | ')' => depth -= 1,
                    _ => {}
                }
            }
            depth == 0
        })
        .collect()
}

fn compile(pattern: &str) -> Result<Regex, TesterError> {
    Regex::new(pattern).map_err(|e| err_msg!(Configuration, "invalid fix pattern: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::render::Inspector;
    use crate::store::MemoryStore;
    use serde_json::json;

    const DOCUMENT: &str = r#"fn tree() -> TestNode {
    suite!({
        math: {
            add: {
                test: add,
                input: [[1, 2], [3, 4]],
                output: [3, 8],
            },
            pending: {},
        },
        text: {
            test: upper,
            input: ["a ] b", "c"],
            output: [
                "old",
                "older",
            ],
        },
    })
}
"#;

    fn path(text: &str) -> Vec<String> {
        text.split('.').map(str::to_string).collect()
    }

    fn patch(document: &str, target: &str, results: &[Value]) -> Result<String, TesterError> {
        let inspector = Inspector::default();
        DocumentPatch::new("suite!(", &inspector).apply(document, &path(target), results)
    }

    #[test]
    fn fix_target_accepts_exact_paths_and_wildcards() {
        let target = FixTarget::parse("g1.*.leaf").unwrap();
        assert_eq!(target.segments(), &["g1", "*", "leaf"]);
        assert_eq!(target.to_string(), "g1.*.leaf");
    }

    #[test]
    fn fix_target_rejects_anything_but_one_group() {
        for bad in ["g1,g2", "!g1", "g1#2", "g1/g2", "", "g1..x"] {
            let err = FixTarget::parse(bad).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::Configuration, "{bad}");
        }
    }

    #[test]
    fn cursor_walks_to_the_target() {
        let mut cursor = FixCursor::new(FixTarget::parse("g1.*").unwrap());
        cursor.descend("g1").unwrap();
        assert!(!cursor.at_target());
        cursor.descend("anything").unwrap();
        assert!(cursor.at_target());
        let err = cursor.descend("deeper").unwrap_err();
        assert_eq!(
            err.message(),
            "must specify exact test group to fix, not a parent; * allowed"
        );
        cursor.ascend();
        cursor.ascend();
        assert!(cursor.descend("g2").is_err());
    }

    #[test]
    fn replaces_a_single_line_output() {
        let fixed = patch(DOCUMENT, "math.add", &[json!(3), json!(7)]).unwrap();
        assert!(fixed.contains(
            "                input: [[1, 2], [3, 4]],\n                output: [\n                    3,\n                    7\n                ],\n"
        ));
        assert!(!fixed.contains("[3, 8]"));
        assert!(fixed.contains("\"old\""));
    }

    #[test]
    fn replaces_a_multi_line_output_around_literals() {
        let fixed = patch(DOCUMENT, "text", &[json!("A ] B"), json!("C")]).unwrap();
        assert!(fixed.contains(
            "            output: [\n                \"A ] B\",\n                \"C\"\n            ],\n"
        ));
        assert!(!fixed.contains("older"));
        assert!(fixed.contains("input: [\"a ] b\", \"c\"]"));
    }

    #[test]
    fn empty_group_gets_an_output_inserted() {
        let fixed = patch(DOCUMENT, "math.pending", &[json!({"ok": true})]).unwrap();
        assert!(fixed.contains(
            "            pending: {\n                output: [\n                    {\"ok\": true}\n                ]\n            },"
        ));
    }

    #[test]
    fn one_line_leaf_is_fixed_in_place_not_in_its_sibling() {
        let document = "suite!({\n  a: { test: sum_args, input: [[1, 1]], output: [9] },\n  b: {\n    test: sum_args,\n    input: [[1, 1]],\n    output: [0],\n  },\n})\n";
        let fixed = patch(document, "a", &[json!(2)]).unwrap();
        assert!(fixed.contains(
            "  a: { test: sum_args, input: [[1, 1]], output: [\n      2\n    ] },\n"
        ));
        assert!(fixed.contains("    output: [0],\n"));
        assert!(!fixed.contains("[9]"));
    }

    #[test]
    fn one_line_leaf_without_output_does_not_borrow_the_next_one() {
        let document = "suite!({\n  a: { test: sum_args, input: [[1, 1]] },\n  b: {\n    output: [0],\n  },\n})\n";
        let err = patch(document, "a", &[json!(2)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FixStructural);
        assert_eq!(err.message(), "couldn't fix tests; no 'output' key in a");
    }

    #[test]
    fn nested_and_path_like_outputs_are_not_the_leaf_output() {
        let document = "suite!({\n  a: {\n    test: output::check,\n    inner: { output: [5] },\n    output: [1],\n  },\n})\n";
        let fixed = patch(document, "a", &[json!(3)]).unwrap();
        assert!(fixed.contains("    inner: { output: [5] },\n    output: [\n      3\n    ],\n"));
    }

    #[test]
    fn duplicate_output_keys_are_refused() {
        let document = "suite!({\n  a: {\n    output: [1],\n    output: [2],\n  },\n})\n";
        let err = patch(document, "a", &[json!(3)]).unwrap_err();
        assert_eq!(err.message(), "couldn't fix tests; more than one 'output' key in a");
    }

    #[test]
    fn single_quoted_literals_need_their_delimiter() {
        let document = "suite!({\n  a: {\n    input: ['x } y'],\n    output: [1],\n  },\n})\n";
        let inspector = Inspector::default();
        let rust = DocumentPatch::new("suite!(", &inspector);
        assert!(rust.apply(document, &path("a"), &[json!(2)]).is_err());
        let quoted = DocumentPatch::new("suite!(", &inspector)
            .with_delimiters(&['"', '\''])
            .unwrap();
        let fixed = quoted.apply(document, &path("a"), &[json!(2)]).unwrap();
        assert!(fixed.contains("    input: ['x } y'],\n    output: [\n      2\n    ],\n"));
    }

    #[test]
    fn missing_key_is_a_structural_error() {
        let err = patch(DOCUMENT, "math.nope", &[json!(1)]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::FixStructural);
        assert_eq!(err.message(), "couldn't fix tests; no 'nope' key found from math.nope");
    }

    #[test]
    fn key_in_a_sibling_group_is_not_found() {
        assert!(patch(DOCUMENT, "text.add", &[json!(1)]).is_err());
    }

    #[test]
    fn group_without_output_is_a_structural_error() {
        let err = patch(DOCUMENT, "math", &[json!(1)]).unwrap_err();
        assert_eq!(err.message(), "couldn't fix tests; no 'output' key in math");
    }

    #[test]
    fn empty_results_and_missing_marker_abort() {
        let err = patch(DOCUMENT, "math.add", &[]).unwrap_err();
        assert_eq!(err.message(), "empty test results for fix; aborting");
        let err = patch("no tree here", "math.add", &[json!(1)]).unwrap_err();
        assert_eq!(err.message(), "couldn't find 'suite!('");
    }

    #[test]
    fn indent_unit_comes_from_the_first_indented_line() {
        assert_eq!(indent_unit("a\n\n\tb\n  c"), "\t");
        assert_eq!(indent_unit("a\n    b"), "    ");
        assert_eq!(indent_unit("flat"), "  ");
    }

    #[test]
    fn rewriter_caches_the_latest_text() {
        let store = MemoryStore::new().with_document("suite.rs", DOCUMENT);
        let mut rewriter = FixRewriter::new(Box::new(store.clone()), "suite.rs", "suite!(");
        let inspector = Inspector::default();
        rewriter.fix(&inspector, &path("math.add"), &[json!(3), json!(7)]).unwrap();
        store.insert("suite.rs", "stale");
        rewriter.fix(&inspector, &path("text"), &[json!("A"), json!("C")]).unwrap();
        let written = store.get("suite.rs").unwrap();
        assert!(written.contains("                    7\n"));
        assert!(written.contains("                \"C\"\n"));
        assert_eq!(rewriter.latest(), Some(written.as_str()));
    }

    #[test]
    fn failed_fix_leaves_the_document_untouched() {
        let store = MemoryStore::new().with_document("suite.rs", DOCUMENT);
        let mut rewriter = FixRewriter::new(Box::new(store.clone()), "suite.rs", "suite!(");
        let inspector = Inspector::default();
        assert!(rewriter.fix(&inspector, &path("math.nope"), &[json!(1)]).is_err());
        assert_eq!(store.get("suite.rs").as_deref(), Some(DOCUMENT));
        assert!(rewriter.latest().is_none());
    }
}
