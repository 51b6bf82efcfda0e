//! The test tree.
//!
//! A [`TestNode`] is a named-children group that may also carry any of the
//! four keyword options (`test`, `input`, `output`, `select`). Options are
//! inherited by descendants; a node whose resolved options include `test`,
//! `input` and `output` is a runnable leaf.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::err_msg;
use crate::errors::{ErrorKind, TesterError};
use crate::expectation::Expected;
use crate::selector::RunRange;

/// The callable under test. Receives the (spread) input arguments and the
/// context of the current run.
pub type TestFn =
    Arc<dyn Fn(&[Value], &ExecutionContext) -> Result<Outcome, TesterError> + Send + Sync>;

/// Produces the `n`th yield of a generator-style leaf; `None` ends the sequence.
pub type Producer = Box<dyn FnMut(usize) -> Result<Option<Value>, TesterError>>;

/// What one invocation of a test callable returned.
pub enum Outcome {
    Value(Value),
    /// A generator-style result, asserted yield by yield.
    Yields(Producer),
}

impl Outcome {
    pub fn value(value: impl Into<Value>) -> Self {
        Outcome::Value(value.into())
    }

    pub fn yields<F>(producer: F) -> Self
    where
        F: FnMut(usize) -> Result<Option<Value>, TesterError> + 'static,
    {
        Outcome::Yields(Box::new(producer))
    }

    /// A generator yielding `items` in order.
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        let mut items = items.into_iter();
        Outcome::yields(move |_| Ok(items.next()))
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Outcome::Yields(_) => f.write_str("Yields(<producer>)"),
        }
    }
}

/// Wraps a plain function of the arguments into a [`TestFn`]-compatible closure.
pub fn returning<F>(f: F) -> impl Fn(&[Value], &ExecutionContext) -> Result<Outcome, TesterError> + Send + Sync + 'static
where
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
{
    move |args: &[Value], _: &ExecutionContext| Ok(Outcome::Value(f(args)))
}

/// The expected results of a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Outputs {
    /// One expectation per input; must be a list.
    Each(Expected),
    /// The callable is expected to fail with this kind.
    Failure(ErrorKind),
}

impl Outputs {
    pub fn failure(kind: ErrorKind) -> Self {
        Outputs::Failure(kind)
    }

    /// An empty expectation list, the starting point of a fix.
    pub fn empty() -> Self {
        Outputs::Each(Expected::List(Vec::new()))
    }
}

impl From<Value> for Outputs {
    fn from(value: Value) -> Self {
        Outputs::Each(Expected::from(value))
    }
}

impl From<Expected> for Outputs {
    fn from(expected: Expected) -> Self {
        Outputs::Each(expected)
    }
}

impl From<Vec<Expected>> for Outputs {
    fn from(items: Vec<Expected>) -> Self {
        Outputs::Each(Expected::List(items))
    }
}

/// The reserved option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Test,
    Input,
    Output,
    Select,
}

impl Keyword {
    pub const ALL: [Keyword; 4] = [Keyword::Test, Keyword::Input, Keyword::Output, Keyword::Select];

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Test => "test",
            Keyword::Input => "input",
            Keyword::Output => "output",
            Keyword::Select => "select",
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        Keyword::ALL.iter().any(|keyword| keyword.as_str() == name)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One option on one node.
#[derive(Clone)]
pub enum Slot<T> {
    Unset,
    /// Present but explicitly undefined; resolving it is an error.
    Undefined,
    Set(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unset
    }
}

impl<T: Clone> Slot<T> {
    /// Own value, else the inherited one.
    pub(crate) fn resolve(&self, keyword: Keyword, inherited: &Option<T>) -> Result<Option<T>, TesterError> {
        match self {
            Slot::Unset => Ok(inherited.clone()),
            Slot::Undefined => Err(err_msg!(
                Configuration,
                "option \"{}\" is set to \"undefined\"",
                keyword
            )),
            Slot::Set(value) => Ok(Some(value.clone())),
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Slot::Unset)
    }
}

/// A group of named children, possibly carrying keyword options.
#[derive(Clone, Default)]
pub struct TestNode {
    pub(crate) test: Slot<TestFn>,
    pub(crate) input: Slot<Value>,
    pub(crate) output: Slot<Outputs>,
    pub(crate) select: Slot<RunRange>,
    children: Vec<(String, TestNode)>,
}

impl TestNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value], &ExecutionContext) -> Result<Outcome, TesterError> + Send + Sync + 'static,
    {
        self.test = Slot::Set(Arc::new(f));
        self
    }

    /// The argument sets, one per test; an element that is itself an array is
    /// spread into separate arguments.
    pub fn input(mut self, input: Value) -> Self {
        self.input = Slot::Set(input);
        self
    }

    pub fn output(mut self, output: impl Into<Outputs>) -> Self {
        self.output = Slot::Set(output.into());
        self
    }

    /// Declares that the callable is expected to fail with `kind`.
    pub fn expect_failure(mut self, kind: ErrorKind) -> Self {
        self.output = Slot::Set(Outputs::Failure(kind));
        self
    }

    /// Restricts the leaf to the 1-based inclusive `range` of inputs.
    pub fn select(mut self, range: RunRange) -> Self {
        self.select = Slot::Set(range);
        self
    }

    /// Marks `keyword` as present but undefined.
    pub fn undefined(mut self, keyword: Keyword) -> Self {
        match keyword {
            Keyword::Test => self.test = Slot::Undefined,
            Keyword::Input => self.input = Slot::Undefined,
            Keyword::Output => self.output = Slot::Undefined,
            Keyword::Select => self.select = Slot::Undefined,
        }
        self
    }

    pub fn child(mut self, name: impl Into<String>, node: TestNode) -> Self {
        self.children.push((name.into(), node));
        self
    }

    pub fn children(&self) -> &[(String, TestNode)] {
        &self.children
    }

    pub fn get(&self, name: &str) -> Option<&TestNode> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, node)| node)
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<(String, TestNode)> {
        &mut self.children
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_unset()
    }

    pub fn selected_range(&self) -> Option<RunRange> {
        match self.select {
            Slot::Set(range) => Some(range),
            _ => None,
        }
    }

    /// Rejects reserved keywords and duplicates used as child names, anywhere in the tree.
    pub fn validate(&self) -> Result<(), TesterError> {
        for (index, (name, child)) in self.children.iter().enumerate() {
            if Keyword::is_reserved(name) {
                return Err(err_msg!(
                    Configuration,
                    "'{}' is a reserved option name and cannot name a test group",
                    name
                ));
            }
            if self.children[..index].iter().any(|(other, _)| other == name) {
                return Err(err_msg!(Configuration, "test group '{}' is declared twice", name));
            }
            child
                .validate()
                .map_err(|e| e.annotate(format!("in '{}'", name)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TestNode");
        for keyword in Keyword::ALL {
            let state = match keyword {
                Keyword::Test => slot_state(&self.test),
                Keyword::Input => slot_state(&self.input),
                Keyword::Output => slot_state(&self.output),
                Keyword::Select => slot_state(&self.select),
            };
            if let Some(state) = state {
                debug.field(keyword.as_str(), &state);
            }
        }
        let names: Vec<&str> = self.children.iter().map(|(name, _)| name.as_str()).collect();
        debug.field("children", &names).finish()
    }
}

fn slot_state<T>(slot: &Slot<T>) -> Option<&'static str> {
    match slot {
        Slot::Unset => None,
        Slot::Undefined => Some("undefined"),
        Slot::Set(_) => Some("set"),
    }
}

/// Builds a [`TestNode`] from an object-literal style declaration.
///
/// Keys are group names or the keywords `test` (an expression), `input` and
/// `output` (JSON literals). Declaring a tree this way also makes it
/// rewritable in fix mode, since the declaration is the text the fixer edits.
///
/// ```rust
/// use declaratest::{suite, returning};
/// use serde_json::json;
///
/// let tree = suite!({
///     add: {
///         test: returning(|args| json!(args[0].as_i64().unwrap() + args[1].as_i64().unwrap())),
///         input: [[1, 2], [3, 4]],
///         output: [3, 7],
///     },
/// });
/// assert!(tree.get("add").is_some());
/// ```
#[macro_export]
macro_rules! suite {
    ({ $($body:tt)* }) => {{
        #[allow(unused_mut)]
        let mut node = $crate::TestNode::new();
        $crate::suite!(@entries node; $($body)*);
        node
    }};
    (@entries $node:ident;) => {};
    (@entries $node:ident; test: $f:expr $(, $($rest:tt)*)?) => {
        $node = $node.test($f);
        $crate::suite!(@entries $node; $($($rest)*)?);
    };
    (@entries $node:ident; input: $v:tt $(, $($rest:tt)*)?) => {
        $node = $node.input($crate::serde_json::json!($v));
        $crate::suite!(@entries $node; $($($rest)*)?);
    };
    (@entries $node:ident; output: $v:tt $(, $($rest:tt)*)?) => {
        $node = $node.output($crate::serde_json::json!($v));
        $crate::suite!(@entries $node; $($($rest)*)?);
    };
    (@entries $node:ident; $name:ident: { $($child:tt)* } $(, $($rest:tt)*)?) => {
        $node = $node.child(stringify!($name), $crate::suite!({ $($child)* }));
        $crate::suite!(@entries $node; $($($rest)*)?);
    };
}
