//! The recursive, option-inheriting test executor.
//!
//! [`Tester::run`] walks the (filtered) tree depth-first in declaration
//! order. Each node resolves the keyword options against what its ancestors
//! set; a node where `test`, `input` and `output` all resolve is a leaf and
//! runs once per selected input. Failures travel back up the tree, picking up
//! the ordinal of the failing test and the name of every enclosing group, and
//! end the run with a single status line.

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::assertion::Asserter;
use crate::config::TesterConfig;
use crate::context::{ExecutionContext, Options, RunStats};
use crate::err_msg;
use crate::errors::TesterError;
use crate::expectation::Expected;
use crate::fix::{FixCursor, FixRewriter, FixTarget};
use crate::output::{ConsolePrinter, StatusPrinter};
use crate::render::{Inspector, Render, RenderLimits};
use crate::selector::{Filter, RunRange};
use crate::store::{FileStore, TextStore};
use crate::tree::{Keyword, Outcome, Outputs, Producer, TestFn, TestNode};

/// English ordinal of `n`: `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

/// How one run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    stats: RunStats,
    error: Option<TesterError>,
}

impl RunReport {
    /// A run that failed before anything was executed.
    pub fn failed(error: TesterError) -> Self {
        Self {
            stats: RunStats::default(),
            error: Some(error),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn error(&self) -> Option<&TesterError> {
        self.error.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }

    /// `Ran X test group(s) and Y test(s).`, singular when a count is exactly 1.
    pub fn summary(&self) -> String {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        format!(
            "Ran {} test group{} and {} test{}.",
            self.stats.groups,
            plural(self.stats.groups),
            self.stats.tests,
            plural(self.stats.tests)
        )
    }

    /// The failure line when the run failed, the summary otherwise.
    pub fn status_line(&self) -> String {
        match &self.error {
            Some(error) => error.status_line(),
            None => self.summary(),
        }
    }

    /// Turns the report into a `Result`, for use inside `#[test]` functions.
    pub fn into_result(self) -> Result<RunStats, TesterError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.stats),
        }
    }
}

/// Runs test trees. All run state lives here, so separate testers are independent.
pub struct Tester {
    config: TesterConfig,
    filter: Option<Filter>,
    cursor: Option<FixCursor>,
    rewriter: Option<FixRewriter>,
    renderer: Box<dyn Render>,
    printer: Box<dyn StatusPrinter>,
    context: ExecutionContext,
    stats: RunStats,
}

impl Tester {
    /// A tester whose fixes, if any, are written to disk.
    pub fn new(config: TesterConfig) -> Result<Self, TesterError> {
        Self::with_store(config, Box::new(FileStore))
    }

    /// Validates `config`; fixes are written through `store`.
    pub fn with_store(config: TesterConfig, store: Box<dyn TextStore>) -> Result<Self, TesterError> {
        let target = config.fix.as_deref().map(FixTarget::parse).transpose()?;
        let (cursor, rewriter, filter_text) = match target {
            Some(target) => {
                if let Some(filter) = config.filter.as_deref() {
                    if filter.trim() != target.to_string() {
                        return Err(err_msg!(
                            Configuration,
                            "filter '{}' and fix target '{}' must name the same test group",
                            filter,
                            target
                        ));
                    }
                }
                let document = config.document.clone().ok_or_else(|| {
                    err_msg!(
                        Configuration,
                        "fixing '{}' needs the document that declares the tests",
                        target
                    )
                })?;
                let text = target.to_string();
                let rewriter = FixRewriter::new(store, document, config.entry_marker.clone());
                (Some(FixCursor::new(target)), Some(rewriter), Some(text))
            }
            None => (None, None, config.filter.clone()),
        };
        let filter = filter_text.as_deref().map(Filter::parse).transpose()?;
        let printer = Box::new(ConsolePrinter::new(config.use_colors));
        Ok(Self {
            config,
            filter,
            cursor,
            rewriter,
            renderer: Box::new(Inspector::default()),
            printer,
            context: ExecutionContext::default(),
            stats: RunStats::default(),
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Render>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_printer(mut self, printer: Box<dyn StatusPrinter>) -> Self {
        self.printer = printer;
        self
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    pub fn is_fixing(&self) -> bool {
        self.cursor.is_some()
    }

    /// Text of the declaring document after the latest fix of the last run.
    pub fn fixed_document(&self) -> Option<&str> {
        self.rewriter.as_ref().and_then(FixRewriter::latest)
    }

    /// Runs `tree`, prints one status line and reports how the run ended.
    ///
    /// Never fails: every error ends up in the report.
    pub fn run(&mut self, tree: &TestNode) -> RunReport {
        self.context = ExecutionContext::default();
        self.stats = RunStats::default();
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.reset();
        }
        if let Some(rewriter) = self.rewriter.as_mut() {
            rewriter.reset();
        }

        let result = self
            .prepare(tree)
            .and_then(|tree| self.visit(&tree, &Options::default()));
        self.context = ExecutionContext::default();

        let report = RunReport {
            stats: self.stats,
            error: result.err(),
        };
        match &report.error {
            Some(error) => warn!(kind = %error.kind(), "test run failed"),
            None => info!(
                groups = report.stats.groups,
                tests = report.stats.tests,
                "test run passed"
            ),
        }
        self.printer.print(&report);
        report
    }

    fn prepare(&self, tree: &TestNode) -> Result<TestNode, TesterError> {
        tree.validate()?;
        let mut tree = tree.clone();
        if let Some(filter) = &self.filter {
            debug!(selectors = filter.selectors().len(), "filtering test tree");
            filter.apply(&mut tree)?;
        }
        Ok(tree)
    }

    fn visit(&mut self, node: &TestNode, inherited: &Options) -> Result<(), TesterError> {
        let mut options = Options {
            test: node.test.resolve(Keyword::Test, &inherited.test)?,
            input: node.input.resolve(Keyword::Input, &inherited.input)?,
            output: node.output.resolve(Keyword::Output, &inherited.output)?,
            select: node.select.resolve(Keyword::Select, &inherited.select)?,
        };
        let at_target = self.cursor.as_ref().is_some_and(FixCursor::at_target);
        if at_target && !node.has_output() {
            options.output = Some(Outputs::empty());
        }

        if let (Some(test), Some(input), Some(output)) = (&options.test, &options.input, &options.output) {
            let (test, input, output) = (test.clone(), input.clone(), output.clone());
            self.context.options = options.clone();
            self.context.name = self.context.path.last().cloned();
            let result = self.run_leaf(&test, &input, &output, options.select);
            self.context.index = None;
            return result;
        }

        for (name, child) in node.children() {
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.descend(name)?;
            }
            self.context.path.push(name.clone());
            let result = self.visit(child, &options);
            self.context.path.pop();
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.ascend();
            }
            result.map_err(|e| e.annotate(format!("on '{}' test", name)))?;
        }
        Ok(())
    }

    fn run_leaf(
        &mut self,
        test: &TestFn,
        input: &Value,
        output: &Outputs,
        select: Option<RunRange>,
    ) -> Result<(), TesterError> {
        if let Some(cursor) = &self.cursor {
            if !cursor.at_target() {
                return Err(err_msg!(
                    Configuration,
                    "fix target '{}' goes deeper than the test group '{}'",
                    cursor.target(),
                    self.context.path.join(".")
                ));
            }
        }
        let inputs = input
            .as_array()
            .ok_or_else(|| err_msg!(Configuration, "input must be an array"))?;
        self.stats.groups += 1;
        debug!(path = %self.context.path.join("."), inputs = inputs.len(), "running test group");

        let selected = |index: usize| select.map_or(true, |range| range.contains(index + 1));
        match output {
            Outputs::Failure(kind) => {
                if self.cursor.is_some() {
                    return Err(err_msg!(
                        Configuration,
                        "can't fix a test group that expects a {} failure",
                        kind
                    ));
                }
                // The first selected input decides: a matching failure ends the leaf.
                let Some((index, args)) = inputs.iter().enumerate().find(|(index, _)| selected(*index)) else {
                    return Ok(());
                };
                self.stats.tests += 1;
                self.context.index = Some(index);
                match invoke(test, args, &self.context).and_then(drain) {
                    Err(error) if error.kind() == kind => {
                        trace!(index, "expected failure raised");
                        Ok(())
                    }
                    Err(error) => Err(error.annotate(format!("on {} test", ordinal(index + 1)))),
                    Ok(actual) => Err(err_msg!(
                        AssertionMismatch,
                        "expected a {} failure but the test returned {}",
                        kind,
                        self.renderer.render(&actual, RenderLimits::depth(2))
                    )
                    .annotate(format!("on {} test", ordinal(index + 1)))),
                }
            }
            Outputs::Each(expected) => {
                let fixing = self.cursor.is_some();
                let expected = expected
                    .as_list()
                    .ok_or_else(|| err_msg!(Configuration, "output must be an array"))?;
                let mut captured = Vec::new();
                for (index, args) in inputs.iter().enumerate().filter(|(index, _)| selected(*index)) {
                    self.stats.tests += 1;
                    self.context.index = Some(index);
                    trace!(index, "running test");
                    let on_test = |e: TesterError| e.annotate(format!("on {} test", ordinal(index + 1)));
                    match invoke(test, args, &self.context).map_err(on_test)? {
                        Outcome::Value(actual) if fixing => captured.push(actual),
                        Outcome::Value(actual) => self.check(&actual, expected.get(index)).map_err(on_test)?,
                        Outcome::Yields(producer) => {
                            let yields = self.check_yields(producer, expected.get(index), index)?;
                            if fixing {
                                captured.push(Value::Array(yields));
                            }
                        }
                    }
                }
                if let Some(rewriter) = self.rewriter.as_mut() {
                    rewriter.fix(self.renderer.as_ref(), &self.context.path, &captured)?;
                }
                Ok(())
            }
        }
    }

    fn check(&self, actual: &Value, expected: Option<&Expected>) -> Result<(), TesterError> {
        let Some(expected) = expected else {
            return Err(err_msg!(
                AssertionMismatch,
                "actual {} does not match expected undefined",
                self.renderer.render(actual, RenderLimits::UNLIMITED)
            ));
        };
        Asserter::new(self.renderer.as_ref())
            .with_extra_keys(self.config.extra_keys)
            .assert(actual, expected)?;
        Ok(())
    }

    /// Drives a generator, checking each yield unless fixing. Returns the yields.
    fn check_yields(
        &self,
        mut producer: Producer,
        expected: Option<&Expected>,
        index: usize,
    ) -> Result<Vec<Value>, TesterError> {
        let fixing = self.cursor.is_some();
        let on_test = |e: TesterError| e.annotate(format!("on {} test", ordinal(index + 1)));
        let expected: &[Expected] = match expected.and_then(Expected::as_list) {
            Some(list) => list,
            None if fixing => &[],
            None => {
                return Err(on_test(err_msg!(
                    GeneratorProtocol,
                    "can't use a generator unless each output is an array"
                )))
            }
        };

        let mut yields = Vec::new();
        for step in 0.. {
            let on_yield = |e: TesterError| {
                e.annotate(format!("on {} test, {} yield", ordinal(index + 1), ordinal(step + 1)))
            };
            let Some(value) = producer(step).map_err(on_yield)? else {
                if !fixing && step < expected.len() {
                    return Err(on_test(err_msg!(
                        GeneratorProtocol,
                        "generator returned 'undefined' before the {} yield was checked",
                        ordinal(step + 1)
                    )));
                }
                break;
            };
            if !fixing {
                let Some(item) = expected.get(step) else {
                    return Err(on_yield(err_msg!(
                        GeneratorProtocol,
                        "generator yielded more than the {} expected value{}",
                        expected.len(),
                        if expected.len() == 1 { "" } else { "s" }
                    )));
                };
                self.check(&value, Some(item)).map_err(on_yield)?;
            }
            yields.push(value);
        }
        Ok(yields)
    }
}

impl std::fmt::Debug for Tester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tester")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("cursor", &self.cursor)
            .field("rewriter", &self.rewriter)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Calls `test`, spreading an array input into separate arguments.
fn invoke(test: &TestFn, args: &Value, context: &ExecutionContext) -> Result<Outcome, TesterError> {
    match args {
        Value::Array(items) => test(items, context),
        other => test(std::slice::from_ref(other), context),
    }
}

/// Runs a generator to its end; a plain value is returned as is.
fn drain(outcome: Outcome) -> Result<Value, TesterError> {
    match outcome {
        Outcome::Value(value) => Ok(value),
        Outcome::Yields(mut producer) => {
            let mut yields = Vec::new();
            while let Some(value) = producer(yields.len())? {
                yields.push(value);
            }
            Ok(Value::Array(yields))
        }
    }
}
