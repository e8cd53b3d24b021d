//! Progress reporting for long running stack operations
//!
//! Operations push human readable lines into a [`ProgressSink`]. Sinks are
//! purely observational: a sink that fails to write drops the line.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for progress text
pub trait ProgressSink: Send {
    fn emit(&mut self, line: &str);
}

/// Writes each line to an `io::Write` (stdout, a file, ...)
pub struct WriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ProgressSink for WriterSink<W> {
    fn emit(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{}", line);
        let _ = self.writer.flush();
    }
}

/// Forwards progress to `tracing` at info level
#[derive(Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&mut self, line: &str) {
        tracing::info!(target: "stackflow::progress", "{}", line);
    }
}

/// Discards progress
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _line: &str) {}
}

/// Keeps every line in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl ProgressSink for BufferSink {
    fn emit(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Sends every line to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl ProgressSink for FanoutSink {
    fn emit(&mut self, line: &str) {
        for sink in &mut self.sinks {
            sink.emit(line);
        }
    }
}
