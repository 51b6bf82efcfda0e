//! Declarative test trees.
//!
//! Tests are declared as a tree of named groups whose leaves carry a callable
//! (`test`), its argument sets (`input`) and the expected results (`output`).
//! Options set on a group are inherited by everything below it. A run can be
//! narrowed with a selector filter, and in fix mode the actual results of one
//! group are written back into the document that declares the tree.
//!
//! ```rust
//! use declaratest::{suite, returning, Tester, TesterConfig};
//! use serde_json::json;
//!
//! let tree = suite!({
//!     math: {
//!         test: returning(|args| json!(args[0].as_i64().unwrap() * 2)),
//!         input: [1, 2, 3],
//!         output: [2, 4, 6],
//!     },
//! });
//! let mut tester = Tester::new(TesterConfig::default()).unwrap();
//! assert!(tester.run(&tree).passed());
//! ```

pub mod assertion;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod expectation;
pub mod fix;
pub mod literal;
pub mod output;
pub mod render;
pub mod selector;
pub mod store;
pub mod tree;

pub use serde_json;
pub use serde_json::Value;

pub use crate::config::TesterConfig;
pub use crate::context::{ExecutionContext, RunStats};
pub use crate::errors::{ErrorKind, TesterError};
pub use crate::executor::{RunReport, Tester};
pub use crate::expectation::Expected;
pub use crate::tree::{returning, Keyword, Outcome, Outputs, TestNode};

/// Runs `tree` with the configuration found in the environment.
pub fn run(tree: &TestNode) -> RunReport {
    match Tester::new(TesterConfig::from_env()) {
        Ok(mut tester) => tester.run(tree),
        Err(error) => {
            let report = RunReport::failed(error);
            println!("{}", report.status_line());
            report
        }
    }
}
