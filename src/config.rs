//! Run configuration.

use std::path::PathBuf;

use crate::assertion::ExtraKeyPolicy;

/// Entry marker of a tree declared with the `suite!` macro.
pub const DEFAULT_ENTRY_MARKER: &str = "suite!(";

/// Configuration for one [`Tester`](crate::executor::Tester).
#[derive(Debug, Clone)]
pub struct TesterConfig {
    /// Selector expression restricting what runs.
    pub filter: Option<String>,
    /// Group path whose leaf outputs are rewritten instead of asserted.
    pub fix: Option<String>,
    /// Document that declares the tree; required when fixing.
    pub document: Option<PathBuf>,
    /// Text that opens the tree declaration inside the document.
    pub entry_marker: String,
    pub extra_keys: ExtraKeyPolicy,
    pub use_colors: bool,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            filter: None,
            fix: None,
            document: None,
            entry_marker: DEFAULT_ENTRY_MARKER.to_string(),
            extra_keys: ExtraKeyPolicy::default(),
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl TesterConfig {
    /// Reads `FILTER`, `FIXING`, `FIXING_DOCUMENT` and `NO_COLOR` from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from a variable lookup.
    ///
    /// `FIXING` names the group to fix. A bare flag (`1`, `true`, `yes`) fixes
    /// the group named by `FILTER` instead; with no `FILTER` the fix target is
    /// left empty, which the tester rejects. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            filter: var("FILTER"),
            document: var("FIXING_DOCUMENT").map(PathBuf::from),
            ..Self::default()
        };
        if var("NO_COLOR").is_some() {
            config.use_colors = false;
        }
        config.fix = match var("FIXING") {
            Some(flag) if matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes") => {
                Some(config.filter.take().unwrap_or_default())
            }
            other => other,
        };
        config
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_fix(mut self, target: impl Into<String>, document: impl Into<PathBuf>) -> Self {
        self.fix = Some(target.into());
        self.document = Some(document.into());
        self
    }

    pub fn with_entry_marker(mut self, marker: impl Into<String>) -> Self {
        self.entry_marker = marker.into();
        self
    }

    pub fn with_extra_keys(mut self, policy: ExtraKeyPolicy) -> Self {
        self.extra_keys = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_filter_and_fix_target() {
        let config = TesterConfig::from_lookup(lookup(&[
            ("FILTER", "a.b"),
            ("FIXING", "c.d"),
            ("FIXING_DOCUMENT", "tests/suite.rs"),
        ]));
        assert_eq!(config.filter.as_deref(), Some("a.b"));
        assert_eq!(config.fix.as_deref(), Some("c.d"));
        assert_eq!(config.document, Some(PathBuf::from("tests/suite.rs")));
    }

    #[test]
    fn fixing_flag_takes_the_filter_as_target() {
        let config = TesterConfig::from_lookup(lookup(&[("FILTER", "a.b"), ("FIXING", "true")]));
        assert_eq!(config.filter, None);
        assert_eq!(config.fix.as_deref(), Some("a.b"));
    }

    #[test]
    fn fixing_flag_without_filter_keeps_an_empty_target() {
        let config = TesterConfig::from_lookup(lookup(&[("FIXING", "1"), ("FIXING_DOCUMENT", "x.rs")]));
        assert_eq!(config.filter, None);
        assert_eq!(config.fix.as_deref(), Some(""));
    }

    #[test]
    fn empty_values_are_unset() {
        let config = TesterConfig::from_lookup(lookup(&[("FILTER", " "), ("NO_COLOR", "1")]));
        assert_eq!(config.filter, None);
        assert_eq!(config.fix, None);
        assert!(!config.use_colors);
    }
}
