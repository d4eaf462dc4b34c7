//! Response envelope shared by the CLI and HTTP package-manager adapters
//!
//! Both transports emit `{success, data, error: {code, message, details?}}`.
//! Decoding them through one function is what keeps the two adapters
//! interchangeable.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use switchboard_core::records::InstallOutcome;
use switchboard_core::{ErrorKind, GateError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<Value>,
}

impl Envelope {
    /// Backend error code, if the envelope reports a failure
    pub fn error_code(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        self.error.as_ref().map(|e| e.code.as_str())
    }

    /// The payload of a successful envelope, or the classified error
    pub fn into_data(self) -> Result<Value> {
        if self.success {
            return Ok(self.data);
        }
        match self.error {
            Some(error) => {
                let message = if error.message.is_empty() {
                    error.code.clone()
                } else {
                    error.message
                };
                Err(GateError::new(classify_code(&error.code), message))
            }
            None => Err(GateError::execution("Backend reported failure without an error")),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, what: &str) -> Result<T> {
        decode(self.into_data()?, what)
    }
}

/// Map a backend error code onto the taxonomy
pub fn classify_code(code: &str) -> ErrorKind {
    let code = code.to_ascii_uppercase();
    match code.as_str() {
        "NOT_FOUND" => ErrorKind::NotFound,
        "ALREADY_EXISTS" | "CONFLICT" | "ALREADY_SHARED" | "ALREADY_INSTALLED" => {
            ErrorKind::Conflict
        }
        "VALIDATION_FAILED" | "VALIDATION_ERROR" | "BAD_REQUEST" => ErrorKind::Validation,
        "TIMEOUT" => ErrorKind::Timeout,
        "UNAVAILABLE" | "SERVICE_UNAVAILABLE" => ErrorKind::BackendUnavailable,
        c if c.ends_with("_NOT_FOUND") => ErrorKind::NotFound,
        c if c.starts_with("INVALID_") => ErrorKind::Validation,
        _ => ErrorKind::BackendExecution,
    }
}

/// Fallback classification when an HTTP response carries no envelope
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        400 | 422 => ErrorKind::Validation,
        408 | 504 => ErrorKind::Timeout,
        502 | 503 => ErrorKind::BackendUnavailable,
        _ => ErrorKind::BackendExecution,
    }
}

pub fn decode<T: DeserializeOwned>(data: Value, what: &str) -> Result<T> {
    serde_json::from_value(data).map_err(|e| {
        GateError::execution(format!("Unexpected {} payload from backend: {}", what, e))
    })
}

/// Decode a list that may arrive bare or wrapped as `{key: [...]}`
pub fn decode_list<T: DeserializeOwned>(data: Value, key: &str) -> Result<Vec<T>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) if map.contains_key(key) => {
            decode(map.remove(key).unwrap_or(Value::Null), key)
        }
        other => decode(other, key),
    }
}

/// Turn an install envelope into an outcome
///
/// `ALREADY_INSTALLED` is the idempotent no-op, not an error.
pub fn install_outcome(name: &str, envelope: Envelope) -> Result<InstallOutcome> {
    if envelope.error_code().map(str::to_ascii_uppercase).as_deref() == Some("ALREADY_INSTALLED") {
        return Ok(InstallOutcome::no_op(name));
    }
    let data = envelope.into_data().map_err(|e| mention(e, "server", name))?;

    let already = data
        .get("already_installed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let mut outcome = if already {
        InstallOutcome::no_op(name)
    } else {
        InstallOutcome::fresh(name)
    };
    outcome.method = data.get("method").and_then(Value::as_str).map(String::from);
    if let Some(message) = data.get("message").and_then(Value::as_str) {
        outcome.message = message.to_string();
    }
    Ok(outcome)
}

/// Make sure a user-facing error names the resource it is about
pub fn mention(err: GateError, kind: &str, name: &str) -> GateError {
    if err.message().contains(name) {
        err
    } else {
        err.context(format!("{} '{}'", kind, name))
    }
}

/// Drop lines the package-manager CLI prints when stdin is not a terminal
pub fn strip_noise(output: &str) -> String {
    output
        .lines()
        .filter(|line| !line.contains("Warning: Input is not a terminal"))
        .filter(|line| !(line.contains("(fd=0)") && line.contains("Warning:")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find the envelope in CLI output
///
/// The whole output is tried first (pretty-printed JSON), then each line
/// from the end.
pub fn find_envelope(output: &str) -> Option<Envelope> {
    let cleaned = strip_noise(output);
    if let Ok(envelope) = serde_json::from_str::<Envelope>(cleaned.trim()) {
        return Some(envelope);
    }
    cleaned
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<Envelope>(line).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_classify_code() {
        assert_eq!(classify_code("NOT_FOUND"), ErrorKind::NotFound);
        assert_eq!(classify_code("PROFILE_NOT_FOUND"), ErrorKind::NotFound);
        assert_eq!(classify_code("ALREADY_EXISTS"), ErrorKind::Conflict);
        assert_eq!(classify_code("ALREADY_SHARED"), ErrorKind::Conflict);
        assert_eq!(classify_code("INVALID_NAME"), ErrorKind::Validation);
        assert_eq!(classify_code("bad_request"), ErrorKind::Validation);
        assert_eq!(classify_code("INTERNAL_ERROR"), ErrorKind::BackendExecution);
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(404), ErrorKind::NotFound);
        assert_eq!(classify_status(409), ErrorKind::Conflict);
        assert_eq!(classify_status(422), ErrorKind::Validation);
        assert_eq!(classify_status(500), ErrorKind::BackendExecution);
    }

    #[test]
    fn test_into_data_maps_error() {
        let err = envelope(json!({
            "success": false,
            "error": {"code": "SERVER_NOT_FOUND", "message": "Server 'ghost' not found"}
        }))
        .into_data()
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Server 'ghost' not found");
    }

    #[test]
    fn test_install_already_installed_is_no_op() {
        let outcome = install_outcome(
            "alpha",
            envelope(json!({
                "success": false,
                "error": {"code": "ALREADY_INSTALLED", "message": "already there"}
            })),
        )
        .unwrap();
        assert!(outcome.already_installed);

        let outcome =
            install_outcome("alpha", envelope(json!({"success": true, "data": {}}))).unwrap();
        assert!(!outcome.already_installed);
    }

    #[test]
    fn test_find_envelope_skips_noise() {
        let output = concat!(
            "Warning: Input is not a terminal (fd=0).\n",
            "Installing...\n",
            "{\"success\": true, \"data\": [1, 2]}\n",
        );
        let env = find_envelope(output).unwrap();
        assert!(env.success);
        assert_eq!(env.data, json!([1, 2]));

        let pretty = "{\n  \"success\": true,\n  \"data\": {\"a\": 1}\n}";
        assert_eq!(find_envelope(pretty).unwrap().data, json!({"a": 1}));

        assert!(find_envelope("plain text only").is_none());
    }

    #[test]
    fn test_decode_list_accepts_wrapped() {
        let names: Vec<String> = decode_list(json!({"servers": ["a", "b"]}), "servers").unwrap();
        assert_eq!(names, vec!["a", "b"]);
        let names: Vec<String> = decode_list(json!(["c"]), "servers").unwrap();
        assert_eq!(names, vec!["c"]);
    }

    #[test]
    fn test_mention_adds_resource_name() {
        let err = mention(GateError::not_found("Profile not found"), "profile", "web");
        assert_eq!(err.message(), "profile 'web': Profile not found");
        let err = mention(GateError::not_found("Profile 'web' not found"), "profile", "web");
        assert_eq!(err.message(), "Profile 'web' not found");
    }
}
