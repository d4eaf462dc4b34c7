//! Typed argument extraction
//!
//! Every accessor fails fast with a `VALIDATION_ERROR` naming the argument,
//! so a malformed call never reaches a backend.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use switchboard_core::{GateError, Result};

fn missing(key: &str) -> GateError {
    GateError::validation(format!("Missing required argument: {}", key))
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> GateError {
    GateError::validation(format!("Argument '{}' must be {}, got {}", key, expected, got))
}

/// Check a server or profile name: non-empty, no whitespace, no slashes
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        return Err(GateError::validation(format!(
            "Invalid {} name '{}': names must be non-empty and contain no whitespace or slashes",
            kind, name
        )));
    }
    Ok(())
}

/// Arguments of one tool call
#[derive(Debug, Clone, Default)]
pub struct Args {
    map: Map<String, Value>,
}

impl Args {
    pub fn new(map: Map<String, Value>) -> Self {
        Self { map }
    }

    /// Present and not null
    fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn opt_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(wrong_type(key, "a string", other)),
        }
    }

    pub fn string(&self, key: &str) -> Result<String> {
        self.opt_string(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                _ => Err(wrong_type(key, "a boolean", &Value::String(s.clone()))),
            },
            Some(other) => Err(wrong_type(key, "a boolean", other)),
        }
    }

    /// Boolean defaulting to false
    pub fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.opt_bool(key)?.unwrap_or(false))
    }

    fn opt_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| {
                    wrong_type(key, "a non-negative integer", &Value::Number(n.clone()))
                }),
            Some(Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| wrong_type(key, "a non-negative integer", &Value::String(s.clone()))),
            Some(other) => Err(wrong_type(key, "a non-negative integer", other)),
        }
    }

    /// Saturates at `u32::MAX`; callers clamp further
    pub fn opt_u32(&self, key: &str) -> Result<Option<u32>> {
        Ok(self.opt_u64(key)?.map(|n| u32::try_from(n).unwrap_or(u32::MAX)))
    }

    pub fn opt_port(&self, key: &str) -> Result<Option<u16>> {
        match self.opt_u64(key)? {
            None => Ok(None),
            Some(n) => u16::try_from(n)
                .ok()
                .filter(|p| *p > 0)
                .map(Some)
                .ok_or_else(|| {
                    GateError::validation(format!(
                        "Argument '{}' must be a port between 1 and 65535, got {}",
                        key, n
                    ))
                }),
        }
    }

    /// A list given as a JSON array of strings or a comma-separated string
    ///
    /// Blank entries are dropped; a missing argument is an empty list.
    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        let items: Vec<String> = match self.get(key) {
            None => Vec::new(),
            Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    other => Err(wrong_type(key, "a list of strings", other)),
                })
                .collect::<Result<_>>()?,
            Some(other) => return Err(wrong_type(key, "a list of strings", other)),
        };
        Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
    }

    /// A list of names, each checked with [`validate_name`]
    pub fn name_list(&self, key: &str, kind: &str) -> Result<Vec<String>> {
        let names = self.list(key)?;
        for name in &names {
            validate_name(kind, name)?;
        }
        Ok(names)
    }

    pub fn name(&self, key: &str, kind: &str) -> Result<String> {
        let name = self.string(key)?;
        validate_name(kind, &name)?;
        Ok(name)
    }

    pub fn opt_name(&self, key: &str, kind: &str) -> Result<Option<String>> {
        match self.opt_string(key)? {
            Some(name) => {
                validate_name(kind, &name)?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Any JSON value; must be present
    pub fn value(&self, key: &str) -> Result<Value> {
        self.get(key).cloned().ok_or_else(|| missing(key))
    }

    /// An environment map given as an object or as `K=V,K2=V2`
    pub fn env_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();
        match self.get(key) {
            None => {}
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    let value = match v {
                        Value::String(s) => s.clone(),
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    env.insert(k.clone(), value);
                }
            }
            Some(Value::String(s)) => {
                for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let (k, v) = pair.split_once('=').ok_or_else(|| {
                        GateError::validation(format!(
                            "Argument '{}' entry '{}' is not KEY=VALUE",
                            key, pair
                        ))
                    })?;
                    env.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
            Some(other) => return Err(wrong_type(key, "an object or KEY=VALUE list", other)),
        }
        if env.keys().any(|k| k.is_empty()) {
            return Err(GateError::validation(format!(
                "Argument '{}' has an empty variable name",
                key
            )));
        }
        Ok(env)
    }

    /// A project path, relative paths resolved against `root`
    pub fn path(&self, key: &str, root: &Path) -> Result<PathBuf> {
        Ok(match self.opt_string(key)? {
            Some(p) => {
                let p = PathBuf::from(p);
                if p.is_absolute() {
                    p
                } else {
                    root.join(p)
                }
            }
            None => root.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::ErrorKind;

    fn args(value: Value) -> Args {
        Args::new(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_list_accepts_array_or_csv() {
        let a = args(json!({"x": ["a", " b ", ""], "y": "c, d,,e", "z": 3}));
        assert_eq!(a.list("x").unwrap(), vec!["a", "b"]);
        assert_eq!(a.list("y").unwrap(), vec!["c", "d", "e"]);
        assert!(a.list("missing").unwrap().is_empty());
        assert_eq!(a.list("z").unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_name_validation() {
        let a = args(json!({"ok": "brave-search", "space": "a b", "slash": "a/b", "empty": ""}));
        assert_eq!(a.name("ok", "server").unwrap(), "brave-search");
        let err = a.name("space", "server").unwrap_err();
        assert!(err.message().contains("'a b'"));
        assert!(a.name("slash", "server").is_err());
        let err = a.name("empty", "server").unwrap_err();
        assert!(err.message().contains("Missing required argument: empty"));
    }

    #[test]
    fn test_numbers_and_flags() {
        let a = args(json!({
            "lines": "25",
            "neg": -1,
            "big": 10_000_000_000u64,
            "on": "true",
            "port": 70000
        }));
        assert_eq!(a.opt_u32("lines").unwrap(), Some(25));
        assert!(a.opt_u32("neg").is_err());
        assert_eq!(a.opt_u32("big").unwrap(), Some(u32::MAX));
        assert!(a.flag("on").unwrap());
        assert!(!a.flag("off").unwrap());
        assert!(a.opt_port("port").is_err());
    }

    #[test]
    fn test_env_map_forms() {
        let a = args(json!({"obj": {"A": "1", "B": 2}, "csv": "A=1, B=x=y", "bad": "A"}));
        let env = a.env_map("obj").unwrap();
        assert_eq!(env.get("B").map(String::as_str), Some("2"));
        let env = a.env_map("csv").unwrap();
        assert_eq!(env.get("B").map(String::as_str), Some("x=y"));
        assert!(a.env_map("bad").is_err());
    }

    #[test]
    fn test_relative_path_joins_root() {
        let a = args(json!({"path": "sub/dir"}));
        assert_eq!(a.path("path", Path::new("/work")).unwrap(), PathBuf::from("/work/sub/dir"));
        assert_eq!(a.path("other", Path::new("/work")).unwrap(), PathBuf::from("/work"));
    }
}
