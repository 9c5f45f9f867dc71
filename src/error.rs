//! Error types for forticfg.
//!
//! Parser and model errors are returned to the immediate caller. Transport
//! errors during a commit trigger a rollback before they surface, so the
//! commit variants carry both the original failure and the rollback outcome.

use crate::commit::{CommitFailure, ForcedCommitReport, RollbackFailure};
use crate::model::ConfigPath;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for forticfg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for forticfg.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Parser Errors
    // ========================================================================
    /// Configuration text does not follow the grammar.
    #[error("Syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based source line
        line: usize,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Model Errors
    // ========================================================================
    /// A path segment does not resolve to the node kind the operation needs.
    #[error("Invalid path '{path}': {message}")]
    InvalidPath {
        /// The path (or the prefix of it) that failed to resolve
        path: ConfigPath,
        /// Error message
        message: String,
    },

    /// An entry with this key already exists.
    #[error("Duplicate key '{key}' in table '{table}'")]
    DuplicateKey {
        /// Table path
        table: ConfigPath,
        /// Entry key
        key: String,
    },

    /// The table holds no entry with this key.
    #[error("Key '{key}' not found in table '{table}'")]
    KeyNotFound {
        /// Table path
        table: ConfigPath,
        /// Entry key
        key: String,
    },

    /// Internal invariant violation.
    #[error("Diff inconsistency (internal error): {0}")]
    DiffInconsistency(String),

    // ========================================================================
    // Transport / Commit Errors
    // ========================================================================
    /// Fetching configuration or sending a command failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A command failed; the executed prefix was rolled back.
    #[error("Commit failed and was rolled back: {0}")]
    CommitFailed(Box<CommitFailure>),

    /// A forced commit completed with failures; nothing was rolled back.
    #[error("Forced commit completed with errors: {0}")]
    ForcedCommit(Box<ForcedCommitReport>),

    /// Rollback itself failed; the device is in an unknown state.
    #[error("Rollback failed, device state unknown: {0}")]
    RollbackFailed(Box<RollbackFailure>),

    // ========================================================================
    // Settings / IO Errors
    // ========================================================================
    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new syntax error.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Creates a new invalid path error.
    pub fn invalid_path(path: ConfigPath, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path,
            message: message.into(),
        }
    }

    /// Creates a new duplicate key error.
    pub fn duplicate_key(table: ConfigPath, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            table,
            key: key.into(),
        }
    }

    /// Creates a new key not found error.
    pub fn key_not_found(table: ConfigPath, key: impl Into<String>) -> Self {
        Self::KeyNotFound {
            table,
            key: key.into(),
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// A rolled-back commit left the device as it was, so the caller may
    /// simply try again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_retryable(),
            Error::CommitFailed(_) => true,
            _ => false,
        }
    }

    /// Returns true if this error leaves the system in an unknown state or
    /// indicates a bug.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RollbackFailed(_) | Error::DiffInconsistency(_))
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommitFailed(_) | Error::ForcedCommit(_) => 2,
            Error::Transport(_) => 3,
            Error::Syntax { .. } => 4,
            Error::InvalidPath { .. } | Error::DuplicateKey { .. } | Error::KeyNotFound { .. } => 5,
            Error::RollbackFailed(_) => 6,
            Error::DiffInconsistency(_) => 7,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_messages() {
        let err = Error::syntax(12, "unmatched end");
        assert_eq!(err.to_string(), "Syntax error at line 12: unmatched end");

        let err = Error::duplicate_key(ConfigPath::from(["firewall policy"]), "3");
        assert_eq!(
            err.to_string(),
            "Duplicate key '3' in table 'firewall policy'"
        );
    }

    #[test]
    fn test_classification() {
        let timeout = Error::from(TransportError::Timeout(Duration::from_secs(5)));
        assert!(timeout.is_recoverable());
        assert!(!timeout.is_fatal());
        assert_eq!(timeout.exit_code(), 3);

        let internal = Error::DiffInconsistency("bad".into());
        assert!(internal.is_fatal());
        assert_eq!(internal.exit_code(), 7);

        assert_eq!(Error::syntax(1, "x").exit_code(), 4);
        assert_eq!(Error::Config("x".into()).exit_code(), 1);
    }
}
