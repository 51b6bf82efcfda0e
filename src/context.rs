//! State of one run, visible to the callable under test.

use std::fmt;

use serde_json::Value;

use crate::selector::RunRange;
use crate::tree::{Outputs, TestFn};

/// The keyword options in effect at a node, after inheritance.
#[derive(Clone, Default)]
pub struct Options {
    pub test: Option<TestFn>,
    pub input: Option<Value>,
    pub output: Option<Outputs>,
    pub select: Option<RunRange>,
}

impl Options {
    /// True once `test`, `input` and `output` are all known.
    pub fn is_runnable(&self) -> bool {
        self.test.is_some() && self.input.is_some() && self.output.is_some()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("test", &self.test.as_ref().map(|_| "<fn>"))
            .field("input", &self.input)
            .field("output", &self.output)
            .field("select", &self.select)
            .finish()
    }
}

/// Where the run currently is. Reset when a run starts and cleared when it ends.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub(crate) options: Options,
    pub(crate) name: Option<String>,
    pub(crate) path: Vec<String>,
    pub(crate) index: Option<usize>,
}

impl ExecutionContext {
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Name of the leaf being run.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Names from the root down to the leaf being run.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// 0-based index of the input being run.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Leaves entered.
    pub groups: usize,
    /// Inputs executed.
    pub tests: usize,
}
