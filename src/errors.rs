//! Error handling for the harness.
//!
//! Every failure produced while configuring, filtering, executing or fixing a
//! test tree is a [`TesterError`]. Errors carry a classification
//! ([`ErrorKind`]) and a message; as a failure travels up the tree each level
//! prepends its own context ("on 2nd test", "on 'group' test") while the kind
//! stays untouched, so the final status line can still name what went wrong.
//!
//! # Construction
//!
//! - Use `err_msg!` for message-only errors: `err_msg!(Configuration, "bad {}", x)`.
//! - Use [`TesterError::raised`] from a test callable to fail with a named kind.
//! - Assertion failures are built by the assertion engine and converted with `?`.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::assertion::AssertionError;

/// Type-safe classification of every failure the harness can report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad filter or fix arguments, reserved-name collisions, undefined options.
    Configuration,
    /// A selector references a node that does not exist.
    SelectorNotFound,
    /// Value mismatch, missing or extra key, unresolved or mismatched path query.
    AssertionMismatch,
    /// Generator misuse or early termination.
    GeneratorProtocol,
    /// The expected textual structure was absent while rewriting a document.
    FixStructural,
    /// A failure raised by the callable under test, named by the callable.
    Raised(String),
}

impl ErrorKind {
    /// Returns the name printed in front of a failure message.
    pub fn name(&self) -> &str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::SelectorNotFound => "SelectorNotFoundError",
            ErrorKind::AssertionMismatch => "AssertionMismatchError",
            ErrorKind::GeneratorProtocol => "GeneratorProtocolError",
            ErrorKind::FixStructural => "FixStructuralError",
            ErrorKind::Raised(name) => name,
        }
    }

    /// Stable diagnostic code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "declaratest::configuration",
            ErrorKind::SelectorNotFound => "declaratest::selector",
            ErrorKind::AssertionMismatch => "declaratest::assertion",
            ErrorKind::GeneratorProtocol => "declaratest::generator",
            ErrorKind::FixStructural => "declaratest::fix",
            ErrorKind::Raised(_) => "declaratest::raised",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The single error type of the harness.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct TesterError {
    kind: ErrorKind,
    message: String,
}

impl TesterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A failure raised by code under test. `name` plays the role of the
    /// error's type and is what an expected-failure output is matched against.
    pub fn raised(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Raised(name.into()), message)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prepends `context` to the message, keeping the kind.
    ///
    /// ```rust
    /// use declaratest::errors::{ErrorKind, TesterError};
    /// let e = TesterError::new(ErrorKind::AssertionMismatch, "boom").annotate("on 2nd test");
    /// assert_eq!(e.to_string(), "on 2nd test: boom");
    /// assert_eq!(e.kind(), &ErrorKind::AssertionMismatch);
    /// ```
    pub fn annotate(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// The status line shown for a run that ended with this error.
    pub fn status_line(&self) -> String {
        format!("{}: {}", self.kind.name(), self.message)
    }
}

impl Diagnostic for TesterError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.kind {
            ErrorKind::Configuration => {
                "check the FILTER/FIXING settings and the option names used in the test tree"
            }
            ErrorKind::SelectorNotFound => "selectors are dot-separated group names; use '*' to match any group",
            ErrorKind::FixStructural => {
                "fixing needs the tree declared with one key per line and an `output: [...]` entry per leaf"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

impl From<AssertionError> for TesterError {
    fn from(err: AssertionError) -> Self {
        TesterError::new(ErrorKind::AssertionMismatch, err.to_string())
    }
}

/// Builds a [`TesterError`] of the given kind from a format string.
#[macro_export]
macro_rules! err_msg {
    ($kind:ident, $($arg:tt)*) => {
        $crate::errors::TesterError::new($crate::errors::ErrorKind::$kind, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_builds_breadcrumb_and_keeps_kind() {
        let err = err_msg!(GeneratorProtocol, "generator finished after {} yields", 1)
            .annotate("on 2nd test")
            .annotate("on 'inner' test")
            .annotate("on 'outer' test");
        assert_eq!(
            err.message(),
            "on 'outer' test: on 'inner' test: on 2nd test: generator finished after 1 yields"
        );
        assert_eq!(err.kind(), &ErrorKind::GeneratorProtocol);
    }

    #[test]
    fn status_line_uses_kind_name() {
        let err = TesterError::raised("RangeError", "too big");
        assert_eq!(err.status_line(), "RangeError: too big");
        let err = err_msg!(Configuration, "option \"test\" is set to \"undefined\"");
        assert_eq!(
            err.status_line(),
            "ConfigurationError: option \"test\" is set to \"undefined\""
        );
    }

    #[test]
    fn diagnostics_expose_codes() {
        let err = err_msg!(FixStructural, "no output");
        let code = Diagnostic::code(&err).map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("declaratest::fix"));
        assert!(Diagnostic::help(&err).is_some());
    }
}
