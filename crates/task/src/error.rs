//! Error types for tasks, records, and the store boundary.

use thiserror::Error;

use crate::status::RunStatus;

/// Errors that fail a task run as a whole.
///
/// Once a batch loop is running, failures are recorded in the run's
/// [`TaskOutcome`](crate::outcome::TaskOutcome) instead of escaping as
/// `TaskError` — this type covers the paths before and around the loop.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A required invocation argument is missing or malformed.
    ///
    /// Fatal before the loop starts: the host converts this into a failed
    /// report with a single error message and no processed records.
    #[error("configuration error: {message}")]
    Config {
        /// What was wrong with the invocation arguments.
        message: String,
    },

    /// A run status transition is not valid for the current status.
    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// An error from the record store boundary.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,
}

impl TaskError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-transition error from run statuses.
    pub fn invalid_transition(from: RunStatus, to: RunStatus) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Error type for per-record processing.
///
/// Distinguishes recoverable from fatal errors so the batch executor can
/// decide whether to continue the loop without the operation needing to
/// know anything about batch semantics.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RecordError {
    /// This record could not be processed; the batch should continue.
    ///
    /// The operation must leave the current unit of work clean before
    /// returning this, so the next record starts from a consistent state.
    #[error("recoverable: {error}")]
    Recoverable {
        /// Human-readable error message.
        error: String,
    },

    /// The batch cannot meaningfully continue past this record.
    ///
    /// Work committed before this point stands; the pending tail is
    /// abandoned and the run ends failed.
    #[error("fatal: {error}")]
    Fatal {
        /// Human-readable error message.
        error: String,
        /// Optional structured details about the failure.
        details: Option<serde_json::Value>,
    },
}

impl RecordError {
    /// Create a recoverable error.
    pub fn recoverable(msg: impl Into<String>) -> Self {
        Self::Recoverable { error: msg.into() }
    }

    /// Create a fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal {
            error: msg.into(),
            details: None,
        }
    }

    /// Create a fatal error with structured details.
    pub fn fatal_with_details(msg: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Fatal {
            error: msg.into(),
            details: Some(details),
        }
    }

    /// Returns `true` if the batch should continue past this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable { .. })
    }

    /// Returns `true` if this error must abort the batch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// A store failure inside an operation is fatal: the unit of work can no
/// longer be trusted, so the batch must stop.
impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        Self::fatal(err.to_string())
    }
}

/// Errors from the record store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening or draining a record source failed.
    #[error("query failed: {0}")]
    Query(String),

    /// Committing the current unit of work failed.
    #[error("commit failed: {0}")]
    Commit(String),

    /// Persisting a progress snapshot or report failed.
    #[error("persist failed: {0}")]
    Persist(String),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a commit error.
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::Commit(msg.into())
    }

    /// Create a persist error.
    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }
}
