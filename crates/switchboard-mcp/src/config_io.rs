//! Config export and import
//!
//! An export is a versioned snapshot of the package manager's key/value
//! config. Secret-looking keys are left out of `values` and listed in
//! `redacted`; an import applies `values` and reports the redacted keys it
//! could not restore.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchboard_core::{GateError, Result};

pub const EXPORT_VERSION: u32 = 1;

/// Fragments that mark a key segment as secret wherever they appear in it
const SECRET_FRAGMENTS: &[&str] = &["token", "secret", "password", "passwd", "credential"];

/// True for keys such as `github_token`, `api_tokens`, `client_secrets`,
/// `registry.api_key` or `apiKey`
///
/// Segments ending in `key` or `keys` count as secret; a leading `key`
/// (`keyboard`) does not.
pub fn is_secret_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .any(|segment| {
            SECRET_FRAGMENTS.iter().any(|f| segment.contains(f))
                || segment.ends_with("key")
                || segment.ends_with("keys")
        })
        || lower.contains("api_key")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigExport {
    pub version: u32,
    pub exported_at: String,
    pub values: BTreeMap<String, Value>,
    #[serde(default)]
    pub redacted: Vec<String>,
}

impl ConfigExport {
    pub fn build(config: BTreeMap<String, Value>, redact: bool, now: DateTime<Utc>) -> Self {
        let mut values = BTreeMap::new();
        let mut redacted = Vec::new();
        for (key, value) in config {
            if redact && is_secret_key(&key) {
                redacted.push(key);
            } else {
                values.insert(key, value);
            }
        }
        Self {
            version: EXPORT_VERSION,
            exported_at: now.to_rfc3339(),
            values,
            redacted,
        }
    }
}

/// A validated import payload
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigImport {
    pub values: BTreeMap<String, Value>,
    pub redacted: Vec<String>,
}

impl ConfigImport {
    /// Accept an export object, or the same object as a JSON string
    ///
    /// The whole payload is checked here so that a bad entry fails the
    /// call before any value is written.
    pub fn parse(payload: Value) -> Result<Self> {
        let payload = match payload {
            Value::String(text) => serde_json::from_str::<Value>(&text).map_err(|e| {
                GateError::validation(format!("Argument 'payload' is not valid JSON: {}", e))
            })?,
            other => other,
        };
        let object = payload.as_object().ok_or_else(|| {
            GateError::validation("Argument 'payload' must be an exported config object")
        })?;

        if let Some(version) = object.get("version").and_then(Value::as_u64) {
            if version > u64::from(EXPORT_VERSION) {
                return Err(GateError::validation(format!(
                    "Unsupported export version {} (this gateway reads up to {})",
                    version, EXPORT_VERSION
                )));
            }
        }

        let values = match object.get("values") {
            Some(Value::Object(map)) => map.clone().into_iter().collect::<BTreeMap<_, _>>(),
            Some(_) => {
                return Err(GateError::validation("Payload field 'values' must be an object"))
            }
            None => return Err(GateError::validation("Payload is missing the 'values' object")),
        };
        if values.keys().any(|k| k.trim().is_empty()) {
            return Err(GateError::validation("Payload contains an empty config key"));
        }

        let redacted = match object.get("redacted") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|k| {
                    k.as_str().map(str::to_string).ok_or_else(|| {
                        GateError::validation("Payload field 'redacted' must list key names")
                    })
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(GateError::validation("Payload field 'redacted' must be a list")),
        };

        Ok(Self { values, redacted })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub applied: Vec<String>,
    pub redacted_skipped: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> BTreeMap<String, Value> {
        [
            ("theme", json!("dark")),
            ("max_parallel", json!(4)),
            ("github_token", json!("ghp_x")),
            ("registry.apiKey", json!("k")),
            ("keyboard", json!("us")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_secret_detection() {
        assert!(is_secret_key("github_token"));
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("db.password"));
        assert!(is_secret_key("registry.apiKey"));
        assert!(!is_secret_key("keyboard"));
        assert!(!is_secret_key("keyboard_layout"));
        assert!(!is_secret_key("theme"));
    }

    #[test]
    fn test_secret_detection_plural_and_compound() {
        assert!(is_secret_key("api_tokens"));
        assert!(is_secret_key("client_secrets"));
        assert!(is_secret_key("smtp.passwords"));
        assert!(is_secret_key("ssh_keys"));
        assert!(is_secret_key("privateKey"));
        assert!(is_secret_key("accessTokenTtl"));
        assert!(is_secret_key("aws_credentials"));
        assert!(!is_secret_key("log_level"));
        assert!(!is_secret_key("registry.url"));
    }

    #[test]
    fn test_export_redacts() {
        let export = ConfigExport::build(sample(), true, Utc::now());
        assert_eq!(export.redacted, vec!["github_token", "registry.apiKey"]);
        assert!(!export.values.contains_key("github_token"));
        assert!(export.values.contains_key("keyboard"));

        let plain = ConfigExport::build(sample(), false, Utc::now());
        assert_eq!(plain.values.len(), 5);
        assert!(plain.redacted.is_empty());
    }

    #[test]
    fn test_import_accepts_export_as_string() {
        let export = ConfigExport::build(sample(), true, Utc::now());
        let text = serde_json::to_string(&export).unwrap();
        let import = ConfigImport::parse(Value::String(text)).unwrap();
        assert_eq!(import.values, export.values);
        assert_eq!(import.redacted, export.redacted);
    }

    #[test]
    fn test_import_rejects_bad_payloads() {
        assert!(ConfigImport::parse(json!("not json")).is_err());
        assert!(ConfigImport::parse(json!({"theme": "dark"})).is_err());
        assert!(ConfigImport::parse(json!({"values": {"": 1}})).is_err());
        assert!(ConfigImport::parse(json!({"version": 99, "values": {}})).is_err());
        assert!(ConfigImport::parse(json!({"values": {}, "redacted": [1]})).is_err());
    }
}
