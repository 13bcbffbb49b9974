//! Error types for the ripple-store crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error type for checksum store operations.
///
/// Only two things can go wrong in a way callers must see: the run was
/// configured so that nothing can be resolved (fatal, checked before any
/// state is written), or the persisted file could not be written. Anomalies
/// while reading state degrade to a conservative result and are logged
/// instead.
#[derive(Debug)]
pub struct StoreError {
    kind: StoreErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum StoreErrorKind {
    /// The run configuration cannot work (e.g. no usable classpath root).
    Configuration(String),
    /// I/O error writing the persisted state.
    Io(std::io::Error),
}

impl StoreError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: StoreErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Creates a configuration error with the given message.
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Configuration(message.into()))
    }

    /// Returns true if this error is a fatal configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Configuration(_))
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, StoreErrorKind::Io(_))
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorKind::Configuration(message) => {
                write!(f, "invalid configuration: {message}")
            }
            StoreErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Summary of what happened.
        writeln!(f, "{}", self.kind)?;

        // Backtrace (will be empty unless RUST_BACKTRACE is set).
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            StoreErrorKind::Configuration(_) => None,
            StoreErrorKind::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::new(StoreErrorKind::Io(err))
    }
}
