//! The uniform result envelope returned by every operation.
//!
//! ```json
//! { "status": "success", "message": "...", "corpus_name": "...", ... }
//! ```
//!
//! `status` is `success`, `warning` (the call worked but there is nothing to
//! show, e.g. no query matches) or `error`. Operation-specific fields are
//! flattened next to `status` and `message`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: Status,
    pub message: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl OperationResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Status::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Status::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }

    /// Attach an operation-specific field.
    ///
    /// Values that fail to serialize are stored as `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.details.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_flat() {
        let result = OperationResult::warning("nothing yet")
            .with("results", Vec::<String>::new())
            .with("results_count", 0);
        assert_eq!(
            result.to_value(),
            json!({
                "status": "warning",
                "message": "nothing yet",
                "results": [],
                "results_count": 0
            })
        );
    }

    #[test]
    fn deserializes_back_into_details() {
        let parsed: OperationResult = serde_json::from_value(json!({
            "status": "error",
            "message": "boom",
            "corpus_name": "docs"
        }))
        .unwrap();
        assert!(parsed.is_error());
        assert_eq!(parsed.get("corpus_name"), Some(&json!("docs")));
    }
}
