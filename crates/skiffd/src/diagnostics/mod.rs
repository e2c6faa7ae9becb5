//! On-demand program status captures.
//!
//! Each capture echoes the capturing thread's backtrace to standard output
//! and rewrites a fixed report file with the process's thread table, the
//! kernel-side wait state of every thread, and that same backtrace. The
//! file is replaced atomically, so readers only ever see a complete report
//! from a single capture.

mod files;
mod report;

use std::backtrace::Backtrace;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

pub(crate) use report::render_thread_table;

/// Report file written by each capture, relative to the working directory.
pub const DIAGNOSTICS_FILE: &str = "skiffd.threads";

/// Errors raised while capturing program status.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// Formatting the report failed.
    #[error("failed to render program status: {source}")]
    Render {
        /// Underlying formatting error.
        #[from]
        source: fmt::Error,
    },
    /// The report could not be written.
    #[error("failed to write program status to '{path}': {source}")]
    Write {
        /// Destination of the report.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Writes program status reports.
#[derive(Debug)]
pub struct DiagnosticsCapturer {
    path: PathBuf,
    console: bool,
    captures: AtomicU64,
}

impl Default for DiagnosticsCapturer {
    fn default() -> Self {
        Self::new(DIAGNOSTICS_FILE)
    }
}

impl DiagnosticsCapturer {
    /// Capturer writing its report to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            console: true,
            captures: AtomicU64::new(0),
        }
    }

    /// Enables or disables the standard output echo.
    #[must_use]
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Destination of the report.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Captures program status and returns the report path.
    ///
    /// # Errors
    ///
    /// Returns [`DiagnosticsError`] when the report could not be rendered or
    /// written. The previous report, if any, is left untouched.
    pub fn capture(&self) -> Result<PathBuf, DiagnosticsError> {
        let sequence = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        let backtrace = Backtrace::force_capture();
        if self.console {
            echo(&backtrace);
        }
        let contents = report::render(sequence, &backtrace)?;
        files::atomic_write(&self.path, contents.as_bytes()).map_err(|source| {
            DiagnosticsError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(self.path.clone())
    }
}

fn echo(backtrace: &Backtrace) {
    let mut stdout = io::stdout().lock();
    // Standard output may be closed under a service manager.
    let _ = writeln!(stdout, "Program Status:\n{backtrace}");
    let _ = stdout.flush();
}
