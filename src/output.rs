//! Status line printing.
//!
//! A run ends with exactly one status line: the failure (`<Kind>: <message>`)
//! or the summary (`Ran X test groups and Y tests.`). Where it goes is up to
//! the [`StatusPrinter`] the [`Tester`](crate::executor::Tester) was given.

use std::io::Write;
use std::sync::{Arc, Mutex};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::executor::RunReport;

pub trait StatusPrinter {
    fn print(&mut self, report: &RunReport);
}

/// Prints to stdout, colouring the failure kind red and the summary green.
#[derive(Debug, Clone, Copy)]
pub struct ConsolePrinter {
    choice: ColorChoice,
}

impl ConsolePrinter {
    pub fn new(use_colors: bool) -> Self {
        let choice = if use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self { choice }
    }
}

impl StatusPrinter for ConsolePrinter {
    fn print(&mut self, report: &RunReport) {
        let mut stdout = StandardStream::stdout(self.choice);
        match report.error() {
            Some(error) => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
                let _ = write!(stdout, "{}", error.kind().name());
                let _ = stdout.reset();
                let _ = writeln!(stdout, ": {}", error.message());
            }
            None => {
                let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)));
                let _ = writeln!(stdout, "{}", report.summary());
                let _ = stdout.reset();
            }
        }
    }
}

/// Collects status lines in memory. Clones share the same lines.
#[derive(Debug, Clone, Default)]
pub struct BufferPrinter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lines().pop()
    }
}

impl StatusPrinter for BufferPrinter {
    fn print(&mut self, report: &RunReport) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report.status_line());
    }
}
