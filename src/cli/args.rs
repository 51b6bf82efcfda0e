//! Command-line arguments for the `declaratest` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_ENTRY_MARKER;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "declaratest",
    version,
    about = "Tools for declarative test trees: patch expected outputs, inspect selectors, render values."
)]
pub struct DeclaratestArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite the `output:` entry of one test group in a declaring document.
    Patch {
        /// The document that declares the test tree.
        #[arg(required = true)]
        file: PathBuf,
        /// Dot-separated path of the test group to patch.
        #[arg(long)]
        path: String,
        /// JSON array of results, one per test.
        #[arg(long)]
        results: String,
        /// Text that opens the tree declaration.
        #[arg(long, default_value = DEFAULT_ENTRY_MARKER)]
        marker: String,
        /// Print a diff instead of writing the document.
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse a filter expression and print its selectors as JSON.
    Selectors {
        filter: String,
    },
    /// Render a JSON value the way assertion messages and fixes show it.
    Render {
        value: String,
        /// Nesting levels to show before summarising.
        #[arg(long)]
        depth: Option<usize>,
        /// Array elements to show before summarising.
        #[arg(long)]
        max_items: Option<usize>,
    },
}
