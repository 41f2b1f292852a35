//! Engine error types.

use warden_core::TaskKeyError;

/// Errors from the host layer.
///
/// Everything that goes wrong inside a running batch lands in the run's
/// report; this type covers registration and launch plumbing only.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No task is registered under the requested key.
    #[error("no task registered under key '{key}'")]
    UnknownTask {
        /// The key that failed to resolve.
        key: String,
    },

    /// A task is already registered under this key.
    #[error("a task is already registered under key '{key}'")]
    DuplicateTask {
        /// The contested key.
        key: String,
    },

    /// The requested task key does not normalize to a valid key.
    #[error(transparent)]
    InvalidTaskKey(#[from] TaskKeyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_display() {
        let err = EngineError::UnknownTask {
            key: "score_refresh".into(),
        };
        assert_eq!(err.to_string(), "no task registered under key 'score_refresh'");
    }

    #[test]
    fn invalid_key_is_transparent() {
        let parse_err = "".parse::<warden_core::TaskKey>().unwrap_err();
        let err = EngineError::from(parse_err);
        assert!(matches!(err, EngineError::InvalidTaskKey(_)));
    }
}
