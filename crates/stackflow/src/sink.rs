//! Console rendering of progress lines

use colored::{ColoredString, Colorize};
use stackflow_cloud::ProgressSink;

/// Prints progress lines to stdout, highlighting step results
#[derive(Debug, Default)]
pub struct ConsoleSink;

fn style(line: &str) -> ColoredString {
    if line.ends_with("succeeded!") {
        line.green().bold()
    } else if line.starts_with("Failed") || line.starts_with("error:") {
        line.red()
    } else if line.starts_with("Starting")
        || line.starts_with("Selected stack")
        || line.starts_with("Created stack")
    {
        line.cyan()
    } else if line.starts_with('+') {
        line.green()
    } else if line.starts_with('~') {
        line.yellow()
    } else if line.starts_with('-') {
        line.red()
    } else {
        line.normal()
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&mut self, line: &str) {
        println!("{}", style(line));
    }
}
