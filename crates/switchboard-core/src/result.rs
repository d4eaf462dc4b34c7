//! Normalized operation results
//!
//! All handlers return exactly one shape: success with data, or failure with
//! a code from the error taxonomy and a human-readable message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, GateError, Result};

/// Error half of a normalized result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// The single result shape returned for every tool call
///
/// Exactly one of `data` and `error` is populated. The fields are private so
/// the invariant can only be established through [`OperationResult::ok`],
/// [`OperationResult::failure`] or a checked deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOperationResult")]
pub struct OperationResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct RawOperationResult {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl TryFrom<RawOperationResult> for OperationResult {
    type Error = String;

    fn try_from(raw: RawOperationResult) -> std::result::Result<Self, Self::Error> {
        match (raw.success, raw.error) {
            (true, None) => Ok(Self {
                success: true,
                data: Some(raw.data.unwrap_or(Value::Null)),
                error: None,
            }),
            (true, Some(_)) => Err("successful result must not carry an error".to_string()),
            (false, Some(error)) if raw.data.is_none() => Ok(Self {
                success: false,
                data: None,
                error: Some(error),
            }),
            (false, Some(_)) => Err("failed result must not carry data".to_string()),
            (false, None) => Err("failed result must carry an error".to_string()),
        }
    }
}

impl OperationResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &GateError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: err.kind().code().to_string(),
                message: err.message().to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        self.error.as_ref()
    }

    /// Kind of the error, if this is a failure with a known code
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().and_then(|e| ErrorKind::from_code(&e.code))
    }

    /// Human-readable text for the caller
    ///
    /// Failures render `error.message`; successes render strings verbatim
    /// and everything else as pretty JSON.
    pub fn text(&self) -> String {
        if let Some(error) = &self.error {
            return error.message.clone();
        }
        match &self.data {
            Some(Value::String(s)) => s.clone(),
            Some(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            None => String::new(),
        }
    }
}

/// Convert a backend outcome into the canonical result shape
pub fn normalize<T: Serialize>(outcome: Result<T>) -> OperationResult {
    match outcome {
        Ok(value) => match serde_json::to_value(value) {
            Ok(data) => OperationResult::ok(data),
            Err(e) => OperationResult::failure(&GateError::execution(format!(
                "Failed to encode result: {}",
                e
            ))),
        },
        Err(err) => OperationResult::failure(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_success() {
        let result = normalize(Ok(json!({"name": "alpha"})));
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&json!({"name": "alpha"})));
        assert!(result.error().is_none());
    }

    #[test]
    fn test_normalize_failure_uses_taxonomy_code() {
        let result = normalize::<()>(Err(GateError::not_found("server 'x' not found")));
        assert!(!result.is_success());
        assert!(result.data().is_none());
        let error = result.error().unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        assert_eq!(error.message, "server 'x' not found");
        assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_unit_success_still_has_data() {
        let result = normalize(Ok(()));
        assert!(result.is_success());
        assert_eq!(result.data(), Some(&Value::Null));
    }

    #[test]
    fn test_deserialize_rejects_broken_invariant() {
        let both = json!({
            "success": false,
            "data": 1,
            "error": {"code": "TIMEOUT", "message": "x"}
        });
        assert!(serde_json::from_value::<OperationResult>(both).is_err());

        let missing = json!({"success": false});
        assert!(serde_json::from_value::<OperationResult>(missing).is_err());

        let ok = json!({"success": true, "data": null});
        let parsed: OperationResult = serde_json::from_value(ok).unwrap();
        assert!(parsed.is_success());
    }

    #[test]
    fn test_text_prefers_error_message() {
        let result = OperationResult::failure(&GateError::timeout("docker compose up timed out"));
        assert_eq!(result.text(), "docker compose up timed out");

        let result = OperationResult::ok(json!("plain"));
        assert_eq!(result.text(), "plain");
    }
}
