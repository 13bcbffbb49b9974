//! Error types for the ripple-schemas crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error type for loading schema files (configuration, dependency maps).
///
/// Uses the canonical struct pattern with backtrace capture and `is_xxx()`
/// helper methods. A load failure is a configuration problem: callers abort
/// the run before any state is written.
#[derive(Debug)]
pub struct LoadError {
    kind: LoadErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum LoadErrorKind {
    /// Failed to deserialize the file contents.
    Deserialization(serde_json::Error),
    /// I/O error when reading the file.
    Io(std::io::Error),
}

impl LoadError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: LoadErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the file contents could not be deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, LoadErrorKind::Deserialization(_))
    }

    /// Returns true if the file could not be read.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, LoadErrorKind::Io(_))
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for LoadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadErrorKind::Deserialization(err) => {
                write!(f, "failed to deserialize input: {err}")
            }
            LoadErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Summary of what happened.
        writeln!(f, "{}", self.kind)?;

        // Backtrace (will be empty unless RUST_BACKTRACE is set).
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::Deserialization(err) => Some(err),
            LoadErrorKind::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        Self::new(LoadErrorKind::Io(err))
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(LoadErrorKind::Deserialization(err))
    }
}
