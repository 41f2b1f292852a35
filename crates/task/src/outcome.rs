//! Accumulated results of a task run.

use serde::{Deserialize, Serialize};

/// Attribute name for the count of committed records.
pub const ATTR_RECORDS_PROCESSED: &str = "records_processed";
/// Attribute name for the count of records the operation chose to skip.
pub const ATTR_RECORDS_SKIPPED: &str = "records_skipped";
/// Attribute name for the count of records that failed recoverably.
pub const ATTR_RECORDS_FAILED: &str = "records_failed";

/// Severity of a [`TaskMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Informational message.
    Info,
    /// Something noteworthy but not an error.
    Warn,
    /// A failure worth surfacing to the operator.
    Error,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One ordered message in a task outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Message severity.
    pub kind: MessageKind,
    /// Message text.
    pub text: String,
}

impl TaskMessage {
    /// Create a message.
    #[must_use]
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// The accumulated outcome of a single task run.
///
/// Collects ordered messages, named attributes (last write wins), and the
/// flag distinguishing a cooperative stop from a natural end. Created empty
/// when the run starts, appended to while it executes, and read by the host
/// once the run finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    messages: Vec<TaskMessage>,
    attributes: serde_json::Map<String, serde_json::Value>,
    terminated: bool,
}

impl TaskOutcome {
    /// Create an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, preserving insertion order.
    pub fn add_message(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.messages.push(TaskMessage::new(kind, text));
    }

    /// Append an informational message.
    pub fn info(&mut self, text: impl Into<String>) {
        self.add_message(MessageKind::Info, text);
    }

    /// Append a warning message.
    pub fn warn(&mut self, text: impl Into<String>) {
        self.add_message(MessageKind::Warn, text);
    }

    /// Append an error message.
    pub fn error(&mut self, text: impl Into<String>) {
        self.add_message(MessageKind::Error, text);
    }

    /// Set a named attribute; the last write wins.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Look up an attribute as an unsigned integer.
    #[must_use]
    pub fn attribute_u64(&self, name: &str) -> Option<u64> {
        self.attributes.get(name).and_then(serde_json::Value::as_u64)
    }

    /// Record whether the run stopped on a termination request.
    pub fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }

    /// Whether the run stopped on a termination request.
    #[must_use]
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// All messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[TaskMessage] {
        &self.messages
    }

    /// All attributes.
    #[must_use]
    pub fn attributes(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.attributes
    }

    /// Returns `true` if any error messages were recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Number of error messages recorded.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.kind == MessageKind::Error)
            .count()
    }
}
