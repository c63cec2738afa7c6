//! Error types for the Ferry engine.
//!
//! Only failures that stop a coordinator run surface as [`Error`]. Log
//! reading, progress parsing and listing problems are absorbed where they
//! happen and reported through `tracing` instead.

use crate::state::OperationState;
use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum Error {
    /// The external tool could not be started
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program that was being started
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// A one-shot invocation of the external tool exited unsuccessfully
    #[error("{verb} exited with {}: {stderr}", exit_label(*code))]
    CommandFailed {
        /// Tool verb that was run (`delete`, `mkdir`, ...)
        verb: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// File system or process I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `remote:path` string could not be interpreted
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// A transfer request was rejected before it started
    #[error("invalid request: {0}")]
    InvalidRequest(Cow<'static, str>),

    /// An operation lifecycle transition that is not allowed
    #[error("invalid state transition: {from} -> {to}")]
    InvalidState {
        /// State the run was in
        from: OperationState,
        /// State that was requested
        to: OperationState,
    },

    /// Engine configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),
}

impl Error {
    /// Create an invalid request error with static context
    #[must_use]
    pub const fn invalid_request(context: &'static str) -> Self {
        Error::InvalidRequest(Cow::Borrowed(context))
    }

    /// Create an invalid configuration error with static context
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        Error::InvalidConfig(Cow::Borrowed(context))
    }

    /// Returns true if the error came from starting the external tool
    #[must_use]
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Error::Launch { .. })
    }
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
