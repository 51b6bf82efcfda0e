//! The `declaratest` command-line interface.

use std::path::Path;
use std::process;

use clap::Parser;
use serde_json::Value;
use tracing::debug;

use crate::cli::args::{Command, DeclaratestArgs};
use crate::err_msg;
use crate::errors::TesterError;
use crate::fix::DocumentPatch;
use crate::render::{Inspector, Render, RenderLimits};
use crate::selector::Filter;
use crate::store::{FileStore, TextStore};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = DeclaratestArgs::parse();
    let use_colors = std::env::var_os("NO_COLOR").is_none() && atty::is(atty::Stream::Stdout);

    let result = match args.command {
        Command::Patch {
            file,
            path,
            results,
            marker,
            dry_run,
        } => handle_patch(&file, &path, &results, &marker, dry_run, use_colors),
        Command::Selectors { filter } => handle_selectors(&filter),
        Command::Render {
            value,
            depth,
            max_items,
        } => handle_render(&value, RenderLimits { depth, max_items }),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        process::exit(1);
    }
}

fn parse_json(text: &str, what: &str) -> Result<Value, TesterError> {
    serde_json::from_str(text).map_err(|e| err_msg!(Configuration, "invalid JSON for {}: {}", what, e))
}

/// Handles the `patch` subcommand.
fn handle_patch(
    file: &Path,
    path: &str,
    results: &str,
    marker: &str,
    dry_run: bool,
    use_colors: bool,
) -> Result<(), TesterError> {
    let results = match parse_json(results, "--results")? {
        Value::Array(items) => items,
        _ => return Err(err_msg!(Configuration, "--results must be a JSON array")),
    };
    let segments: Vec<String> = path.split('.').map(str::to_string).collect();
    let mut store = FileStore;
    let before = store.read(file)?;
    let inspector = Inspector::default();
    let after = DocumentPatch::new(marker, &inspector).apply(&before, &segments, &results)?;
    debug!(file = %file.display(), path, dry_run, "patched document");
    if dry_run {
        output::print_document_diff(&before, &after, use_colors);
    } else {
        store.write(file, &after)?;
        println!("Patched {} in {}.", path, file.display());
    }
    Ok(())
}

/// Handles the `selectors` subcommand.
fn handle_selectors(filter: &str) -> Result<(), TesterError> {
    let filter = Filter::parse(filter)?;
    let value = serde_json::to_value(&filter)
        .map_err(|e| err_msg!(Configuration, "couldn't serialise filter: {}", e))?;
    output::print_json(&value);
    Ok(())
}

/// Handles the `render` subcommand.
fn handle_render(value: &str, limits: RenderLimits) -> Result<(), TesterError> {
    let value = parse_json(value, "value")?;
    println!("{}", Inspector::default().render(&value, limits));
    Ok(())
}
