//! Typed access to task invocation arguments.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Named invocation arguments for a task run.
///
/// Arguments arrive as a flat JSON object and are read through coercing
/// getters: schedulers and operator tooling are loose about types, so a
/// boolean may arrive as `"true"` and a list as a comma-separated string.
/// Strict callers can always drop down to [`TaskArgs::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskArgs {
    values: serde_json::Map<String, serde_json::Value>,
}

impl TaskArgs {
    /// Create an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an argument set from an existing JSON map.
    #[must_use]
    pub fn from_map(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Add an argument, replacing any previous value with the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Raw access to an argument value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.values.get(name)
    }

    /// Read a string argument.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(serde_json::Value::as_str)
    }

    /// Read a boolean argument, coercing `"true"` / `"false"` strings.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Read an integer argument, coercing numeric strings.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read a string-list argument.
    ///
    /// Accepts a JSON array of strings or a single comma-separated string;
    /// entries are trimmed and empty entries dropped.
    #[must_use]
    pub fn get_str_list(&self, name: &str) -> Option<Vec<String>> {
        match self.values.get(name)? {
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_owned)
                    .collect(),
            ),
            serde_json::Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Read a required string argument, or fail with a configuration error.
    pub fn require_str(&self, name: &str) -> Result<&str, TaskError> {
        match self.values.get(name) {
            None => Err(TaskError::config(format!(
                "missing required argument '{name}'"
            ))),
            Some(value) => value.as_str().ok_or_else(|| {
                TaskError::config(format!("argument '{name}' must be a string"))
            }),
        }
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
