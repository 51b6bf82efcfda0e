//! Selector filter.
//!
//! A filter is a comma-separated list of selectors, each an optional `!`
//! followed by a dot-separated path. A path segment is `*` or a
//! `/`-separated list of names, each name optionally suffixed with `#n` or
//! `#n-m` to restrict a leaf to a 1-based inclusive range of its inputs.
//!
//! ```text
//! selectors := selector (',' selector)*
//! selector  := ['!'] path
//! path      := segment ('.' segment)*
//! segment   := '*' | alt ('/' alt)*
//! alt       := name ['#' range]
//! range     := number ['-' number]
//! ```
//!
//! Filtering builds a shadow tree of visibility records over the whole test
//! tree, applies the selectors to it left to right, then prunes the real tree.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::err_msg;
use crate::errors::TesterError;
use crate::tree::{Slot, TestNode};

static ALTERNATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^#]+)(?:#(?P<start>\d+)(?:-(?P<end>\d+))?)?$")
        .expect("alternative pattern is valid")
});

/// A 1-based inclusive range of test indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunRange {
    pub start: usize,
    pub end: usize,
}

impl RunRange {
    pub fn new(start: usize, end: usize) -> Result<Self, TesterError> {
        if start == 0 {
            return Err(err_msg!(Configuration, "test indices start at 1, got {}", start));
        }
        if end < start {
            return Err(err_msg!(Configuration, "range {}-{} ends before it starts", start, end));
        }
        Ok(Self { start, end })
    }

    pub fn single(ordinal: usize) -> Result<Self, TesterError> {
        Self::new(ordinal, ordinal)
    }

    /// Whether the 1-based `ordinal` lies in the range.
    pub fn contains(&self, ordinal: usize) -> bool {
        self.start <= ordinal && ordinal <= self.end
    }
}

impl fmt::Display for RunRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One name in a segment, with its optional range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    pub name: String,
    pub range: Option<RunRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Wildcard,
    Alternatives(Vec<Alternative>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selector {
    pub negated: bool,
    pub path: Vec<Segment>,
    /// The path as written, without the negation or range suffixes.
    pub text: String,
}

impl Selector {
    fn parse(raw: &str) -> Result<Self, TesterError> {
        let trimmed = raw.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(err_msg!(Configuration, "empty selector in filter"));
        }
        let path = body
            .split('.')
            .map(|segment| parse_segment(segment, body))
            .collect::<Result<Vec<_>, _>>()?;
        let text = path
            .iter()
            .map(|segment| match segment {
                Segment::Wildcard => "*".to_string(),
                Segment::Alternatives(alternatives) => alternatives
                    .iter()
                    .map(|alternative| alternative.name.as_str())
                    .collect::<Vec<_>>()
                    .join("/"),
            })
            .collect::<Vec<_>>()
            .join(".");
        Ok(Self {
            negated,
            path,
            text,
        })
    }
}

fn parse_segment(segment: &str, selector: &str) -> Result<Segment, TesterError> {
    if segment == "*" {
        return Ok(Segment::Wildcard);
    }
    segment
        .split('/')
        .map(|alternative| parse_alternative(alternative, selector))
        .collect::<Result<Vec<_>, _>>()
        .map(Segment::Alternatives)
}

fn parse_alternative(text: &str, selector: &str) -> Result<Alternative, TesterError> {
    let captures = ALTERNATIVE.captures(text).ok_or_else(|| {
        err_msg!(
            Configuration,
            "malformed segment '{}' in selector '{}'",
            text,
            selector
        )
    })?;
    let number = |name: &str| -> Result<Option<usize>, TesterError> {
        captures
            .name(name)
            .map(|m| {
                m.as_str().parse::<usize>().map_err(|e| {
                    err_msg!(Configuration, "bad index '{}' in selector '{}': {}", m.as_str(), selector, e)
                })
            })
            .transpose()
    };
    let range = match number("start")? {
        Some(start) => Some(RunRange::new(start, number("end")?.unwrap_or(start))?),
        None => None,
    };
    Ok(Alternative {
        name: captures["name"].to_string(),
        range,
    })
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    selectors: Vec<Selector>,
}

impl Filter {
    pub fn parse(text: &str) -> Result<Self, TesterError> {
        let selectors = text
            .split(',')
            .map(Selector::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Prunes `tree` down to what the selectors make visible.
    pub fn apply(&self, tree: &mut TestNode) -> Result<(), TesterError> {
        let default = self.selectors.first().is_some_and(|selector| selector.negated);
        let mut records = FilterRecord::mirror(tree, default);
        for selector in &self.selectors {
            debug!(selector = %selector.text, negated = selector.negated, "applying selector");
            apply_selector(&mut records, selector, 0)?;
        }
        prune(tree, &records);
        Ok(())
    }
}

impl FromStr for Filter {
    type Err = TesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

/// Shadow entry for one node of the test tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRecord {
    pub visible: bool,
    pub range: Option<RunRange>,
    pub children: Vec<(String, FilterRecord)>,
}

impl FilterRecord {
    /// Records for every child of `node`, all with visibility `visible`.
    pub fn mirror(node: &TestNode, visible: bool) -> Vec<(String, FilterRecord)> {
        node.children()
            .iter()
            .map(|(name, child)| {
                (
                    name.clone(),
                    FilterRecord {
                        visible,
                        range: None,
                        children: FilterRecord::mirror(child, visible),
                    },
                )
            })
            .collect()
    }

    fn spread(&mut self, visible: bool) {
        self.visible = visible;
        for (_, child) in &mut self.children {
            child.spread(visible);
        }
    }
}

fn apply_selector(
    records: &mut [(String, FilterRecord)],
    selector: &Selector,
    index: usize,
) -> Result<(), TesterError> {
    let show = !selector.negated;
    let Some(segment) = selector.path.get(index) else {
        for (_, record) in records.iter_mut() {
            record.spread(show);
        }
        return Ok(());
    };
    let last = index + 1 == selector.path.len();
    let targets: Vec<(String, Option<RunRange>)> = match segment {
        Segment::Wildcard => records.iter().map(|(name, _)| (name.clone(), None)).collect(),
        Segment::Alternatives(alternatives) => alternatives
            .iter()
            .map(|alternative| (alternative.name.clone(), alternative.range))
            .collect(),
    };
    for (name, range) in targets {
        let record = records
            .iter_mut()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, record)| record)
            .ok_or_else(|| {
                err_msg!(
                    SelectorNotFound,
                    "requested test '{}' not found using '{}'",
                    selector.text,
                    name
                )
            })?;
        if show {
            record.visible = true;
        } else if last {
            record.visible = false;
        }
        if range.is_some() {
            record.range = range;
        }
        apply_selector(&mut record.children, selector, index + 1)?;
    }
    Ok(())
}

fn prune(node: &mut TestNode, records: &[(String, FilterRecord)]) {
    node.children_mut().retain(|(name, _)| {
        records
            .iter()
            .any(|(record_name, record)| record_name == name && record.visible)
    });
    for (name, child) in node.children_mut().iter_mut() {
        let Some((_, record)) = records.iter().find(|(record_name, _)| record_name == name) else {
            continue;
        };
        if let Some(range) = record.range {
            child.select = Slot::Set(range);
        }
        prune(child, &record.children);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> TestNode {
        TestNode::new()
            .child(
                "g1",
                TestNode::new()
                    .child("sub", TestNode::new())
                    .child("other", TestNode::new()),
            )
            .child("g2", TestNode::new().child("sub", TestNode::new()))
    }

    fn names(node: &TestNode) -> Vec<&str> {
        node.children().iter().map(|(name, _)| name.as_str()).collect()
    }

    fn filtered(filter: &str) -> TestNode {
        let mut tree = tree();
        Filter::parse(filter).unwrap().apply(&mut tree).unwrap();
        tree
    }

    #[test]
    fn parses_ranges_and_alternatives() {
        let filter = Filter::parse("a.b#2-3/c#4, !d.*").unwrap();
        let selectors = filter.selectors();
        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[0].text, "a.b/c");
        assert_eq!(
            selectors[0].path[1],
            Segment::Alternatives(vec![
                Alternative {
                    name: "b".to_string(),
                    range: Some(RunRange { start: 2, end: 3 }),
                },
                Alternative {
                    name: "c".to_string(),
                    range: Some(RunRange { start: 4, end: 4 }),
                },
            ])
        );
        assert!(selectors[1].negated);
        assert_eq!(selectors[1].path[1], Segment::Wildcard);
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in ["", "a,", "a..b", "a#", "a#x", "a#0", "a#3-2", "a#1-2-3"] {
            let err = Filter::parse(bad).unwrap_err();
            assert_eq!(err.kind(), &crate::errors::ErrorKind::Configuration, "{bad}");
        }
    }

    #[test]
    fn include_keeps_only_the_selected_group() {
        let tree = filtered("g1");
        assert_eq!(names(&tree), ["g1"]);
        assert_eq!(names(tree.get("g1").unwrap()), ["sub", "other"]);
    }

    #[test]
    fn negation_hides_only_the_selected_group() {
        let tree = filtered("!g1");
        assert_eq!(names(&tree), ["g2"]);
        assert_eq!(names(tree.get("g2").unwrap()), ["sub"]);
    }

    #[test]
    fn nested_include_keeps_ancestors_but_not_siblings() {
        let tree = filtered("g1.sub");
        assert_eq!(names(&tree), ["g1"]);
        assert_eq!(names(tree.get("g1").unwrap()), ["sub"]);
    }

    #[test]
    fn wildcard_matches_every_child() {
        let tree = filtered("*.sub");
        assert_eq!(names(&tree), ["g1", "g2"]);
        assert_eq!(names(tree.get("g1").unwrap()), ["sub"]);
        assert_eq!(names(tree.get("g2").unwrap()), ["sub"]);
    }

    #[test]
    fn later_selectors_override_earlier_ones() {
        let tree = filtered("g1, !g1.other");
        assert_eq!(names(&tree), ["g1"]);
        assert_eq!(names(tree.get("g1").unwrap()), ["sub"]);
    }

    #[test]
    fn alternatives_select_several_siblings() {
        let tree = filtered("g1/g2.sub");
        assert_eq!(names(&tree), ["g1", "g2"]);
        assert_eq!(names(tree.get("g1").unwrap()), ["sub"]);
    }

    #[test]
    fn ranges_attach_to_the_matched_node() {
        let tree = filtered("g1.sub#2-3");
        let sub = tree.get("g1").unwrap().get("sub").unwrap();
        assert_eq!(sub.selected_range(), Some(RunRange { start: 2, end: 3 }));
        let tree = filtered("g2#4");
        assert_eq!(tree.get("g2").unwrap().selected_range(), Some(RunRange { start: 4, end: 4 }));
    }

    #[test]
    fn unknown_segment_is_reported() {
        let mut tree = tree();
        let err = Filter::parse("g1.nope").unwrap().apply(&mut tree).unwrap_err();
        assert_eq!(err.kind(), &crate::errors::ErrorKind::SelectorNotFound);
        assert_eq!(err.message(), "requested test 'g1.nope' not found using 'nope'");
    }

    #[test]
    fn run_range_contains_is_inclusive() {
        let range = RunRange::new(2, 3).unwrap();
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(!range.contains(4));
    }
}
