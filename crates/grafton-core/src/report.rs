// crates/grafton-core/src/report.rs
// ============================================================================
// Module: Run Reporter
// Description: Indented progress output for feature runs.
// Purpose: Render enter/exit nesting, block results, and the run summary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The [`Reporter`] renders a run as an indented outline. Entering a feature or
//! guarded block prints its title and indents by two spaces; a block's result
//! icon is appended to its title line when nothing was printed in between, or
//! printed under a repeated title otherwise. Informational lines honour the
//! configured [`LogLevel`]. Output goes to any [`Write`] sink; write errors are
//! ignored so reporting never changes the result of a run.
//!
//! The reporter is shared behind a mutex so test bodies can log through the
//! same handle the executor renders with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Icon appended to passing blocks.
pub const ICON_PASS: &str = "✔";
/// Icon appended to failing blocks.
pub const ICON_FAIL: &str = "✗";
/// Spaces added per nesting level.
const INDENT_STEP: usize = 2;

// ============================================================================
// SECTION: Log Levels
// ============================================================================

/// Informational log level, independent of test results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// No informational output.
    #[default]
    Off,
    /// Informational lines.
    Info,
    /// Informational lines plus HTTP traces.
    Verbose,
}

impl LogLevel {
    /// Returns true when a message at `level` should be printed.
    #[must_use]
    pub const fn shows(self, level: Self) -> bool {
        match self {
            Self::Off => false,
            Self::Info => !matches!(level, Self::Verbose),
            Self::Verbose => true,
        }
    }

    /// Returns the configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Info => "info",
            Self::Verbose => "verbose",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "off" => Ok(Self::Off),
            "info" => Ok(Self::Info),
            "verbose" => Ok(Self::Verbose),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

// ============================================================================
// SECTION: Reporter
// ============================================================================

/// Mutable rendering state.
struct ReporterState {
    /// Output sink.
    sink: Box<dyn Write + Send>,
    /// Current indentation in spaces.
    indent: usize,
    /// True while the cursor sits at the end of an entered title line.
    entered: bool,
}

impl ReporterState {
    /// Finishes an open title line.
    fn break_line(&mut self) {
        if self.entered {
            let _ = writeln!(self.sink);
            self.entered = false;
        }
    }

    /// Writes `message` at the current indentation, one line per line.
    fn print_indented(&mut self, message: &str) {
        self.break_line();
        let prefix = " ".repeat(self.indent);
        for line in message.strip_suffix('\n').unwrap_or(message).split('\n') {
            let _ = writeln!(self.sink, "{prefix}{line}");
        }
    }

    /// Writes a title without ending the line, then indents.
    fn enter(&mut self, title: &str) {
        self.break_line();
        let _ = write!(self.sink, "{}{title}", " ".repeat(self.indent));
        self.entered = true;
        self.indent += INDENT_STEP;
    }

    /// Closes the current level.
    fn exit(&mut self) {
        self.break_line();
        self.indent = self.indent.saturating_sub(INDENT_STEP);
    }
}

/// Shared, indented progress reporter.
pub struct Reporter {
    /// Configured informational level.
    level: LogLevel,
    /// Rendering state.
    state: Mutex<ReporterState>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").field("level", &self.level).finish_non_exhaustive()
    }
}

impl Reporter {
    /// Creates a reporter writing to `sink`.
    #[must_use]
    pub fn new(sink: Box<dyn Write + Send>, level: LogLevel) -> Self {
        Self {
            level,
            state: Mutex::new(ReporterState {
                sink,
                indent: 0,
                entered: false,
            }),
        }
    }

    /// Creates a reporter writing to stdout.
    #[must_use]
    pub fn stdout(level: LogLevel) -> Self {
        Self::new(Box::new(io::stdout()), level)
    }

    /// Creates a reporter writing to an in-memory buffer.
    #[must_use]
    pub fn buffered(level: LogLevel) -> (Self, MemorySink) {
        let sink = MemorySink::default();
        (Self::new(Box::new(sink.clone()), level), sink)
    }

    /// Returns the configured informational level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    /// Runs `action` with the locked rendering state.
    fn with_state(&self, action: impl FnOnce(&mut ReporterState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        action(&mut state);
        let _ = state.sink.flush();
    }

    /// Prints a title and opens a nesting level.
    pub fn enter(&self, title: &str) {
        self.with_state(|state| state.enter(title));
    }

    /// Closes the innermost nesting level.
    pub fn exit(&self) {
        self.with_state(ReporterState::exit);
    }

    /// Prints the result icon for the block entered as `name`.
    pub fn result(&self, name: &str, passed: bool) {
        self.with_state(|state| {
            if !state.entered {
                let depth = state.indent.saturating_sub(INDENT_STEP);
                let _ = write!(state.sink, "{}{name}", " ".repeat(depth));
            }
            let icon = if passed { ICON_PASS } else { ICON_FAIL };
            let _ = writeln!(state.sink, " {icon}");
            state.entered = false;
        });
    }

    /// Prints a failure message at the current indentation.
    pub fn failure(&self, message: &str) {
        self.with_state(|state| state.print_indented(message));
    }

    /// Prints an informational line at `info` level or above.
    pub fn info(&self, message: &str) {
        if self.level.shows(LogLevel::Info) {
            self.with_state(|state| state.print_indented(message));
        }
    }

    /// Prints a trace line at `verbose` level.
    pub fn verbose(&self, message: &str) {
        if self.level.shows(LogLevel::Verbose) {
            self.with_state(|state| state.print_indented(message));
        }
    }

    /// Prints the closing `N features, M failures` line.
    pub fn summary(&self, blocks: usize, failures: usize) {
        self.with_state(|state| {
            state.break_line();
            let _ = writeln!(state.sink);
            let _ = writeln!(state.sink, "{blocks} features, {failures} failures");
        });
    }
}

// ============================================================================
// SECTION: Memory Sink
// ============================================================================

/// Cloneable in-memory [`Write`] sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Captured bytes.
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Returns everything written so far, lossily decoded.
    #[must_use]
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
