use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ApiError {
    /// Human readable message from `detail`, which is either a plain string or
    /// a list of validation objects carrying `msg`.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
