//! Task error types.
//!
//! Every handler returns [`TaskError`]. The executor never inspects the
//! variant to decide what to do next; [`TaskError::kind`] exists for
//! reporting only.

use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while running a single task.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("path escapes target directory: {path}")]
    PathEscape { path: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("integrity check failed for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{context}: {source}")]
    Filesystem {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Coarse classification of a [`TaskError`], used in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PathEscape,
    Network,
    Integrity,
    Validation,
    Filesystem,
    Database,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::PathEscape => "path escape",
            ErrorKind::Network => "network",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Validation => "validation",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Database => "database",
        };
        f.write_str(name)
    }
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::PathEscape { .. } => ErrorKind::PathEscape,
            TaskError::Network(_) => ErrorKind::Network,
            TaskError::Integrity { .. } => ErrorKind::Integrity,
            TaskError::Validation(_) => ErrorKind::Validation,
            TaskError::Filesystem { .. } => ErrorKind::Filesystem,
            TaskError::Database(_) => ErrorKind::Database,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TaskError::Validation(message.into())
    }

    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TaskError::Filesystem {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for `io` with a "<verb> <path>" context.
    pub fn io_at(verb: &str, path: &Path, source: std::io::Error) -> Self {
        Self::io(format!("cannot {} {}", verb, path.display()), source)
    }
}

impl From<tokio::task::JoinError> for TaskError {
    fn from(e: tokio::task::JoinError) -> Self {
        TaskError::io("background task failed", std::io::Error::other(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let e = TaskError::PathEscape {
            path: "../x".into(),
        };
        assert_eq!(e.kind(), ErrorKind::PathEscape);
        assert_eq!(TaskError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            TaskError::Network("refused".into()).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_io_at_message() {
        let e = TaskError::io_at(
            "read",
            Path::new("/srv/a.txt"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let msg = e.to_string();
        assert!(msg.starts_with("cannot read /srv/a.txt"), "{}", msg);
        assert_eq!(e.kind(), ErrorKind::Filesystem);
    }
}
