//! Startup configuration
//!
//! Read once from the environment into an immutable [`GatewayConfig`]. Nothing
//! re-reads configuration per call.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading the startup configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot determine project root: {0}")]
    ProjectRoot(String),
}

/// Which package-manager adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Check API health once at startup, fall back to the CLI
    Auto,
    Http,
    Cli,
}

impl Transport {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Some(Transport::Auto),
            "http" | "api" => Some(Transport::Http),
            "cli" | "process" => Some(Transport::Cli),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Auto => "auto",
            Transport::Http => "http",
            Transport::Cli => "cli",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub transport: Transport,
    pub api_url: String,
    pub manager_bin: String,
    pub compose_bin: String,
    pub compose_dir: PathBuf,
    pub git_bin: String,
    pub daemon_container: String,
    pub daemon_service: String,
    pub project_root: PathBuf,
    pub default_servers: Vec<String>,
    pub global_profiles: Vec<String>,
    pub timeout: Duration,
    pub long_timeout: Duration,
}

pub const DEFAULT_API_URL: &str = "http://localhost:6275";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LONG_TIMEOUT_SECS: u64 = 900;

impl GatewayConfig {
    /// Defaults rooted at `project_root`
    pub fn with_root(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            transport: Transport::Auto,
            api_url: DEFAULT_API_URL.to_string(),
            manager_bin: "mcpm".to_string(),
            compose_bin: "docker".to_string(),
            compose_dir: project_root.clone(),
            git_bin: "git".to_string(),
            daemon_container: "mcp-daemon".to_string(),
            daemon_service: "mcpm-daemon".to_string(),
            project_root,
            default_servers: split_list("context7,brave-search,github"),
            global_profiles: split_list("memory"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            long_timeout: Duration::from_secs(DEFAULT_LONG_TIMEOUT_SECS),
        }
    }

    /// Read from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup, so tests never touch the real
    /// environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let project_root = match get("SWITCHBOARD_PROJECT_ROOT") {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().map_err(|e| ConfigError::ProjectRoot(e.to_string()))?,
        };
        let mut config = Self::with_root(project_root);

        if let Some(value) = get("SWITCHBOARD_TRANSPORT") {
            config.transport = Transport::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                var: "SWITCHBOARD_TRANSPORT",
                value: value.clone(),
                reason: "expected auto, http or cli".to_string(),
            })?;
        }
        if let Some(url) = get("SWITCHBOARD_API_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    var: "SWITCHBOARD_API_URL",
                    value: url,
                    reason: "expected an http(s) URL".to_string(),
                });
            }
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(bin) = get("SWITCHBOARD_MANAGER_BIN") {
            config.manager_bin = bin;
        }
        if let Some(bin) = get("SWITCHBOARD_COMPOSE_BIN") {
            config.compose_bin = bin;
        }
        if let Some(dir) = get("SWITCHBOARD_COMPOSE_DIR") {
            config.compose_dir = PathBuf::from(dir);
        }
        if let Some(bin) = get("SWITCHBOARD_GIT_BIN") {
            config.git_bin = bin;
        }
        if let Some(name) = get("SWITCHBOARD_DAEMON_CONTAINER") {
            config.daemon_container = name;
        }
        if let Some(name) = get("SWITCHBOARD_DAEMON_SERVICE") {
            config.daemon_service = name;
        }
        if let Some(list) = get("SWITCHBOARD_DEFAULT_SERVERS") {
            config.default_servers = split_list(&list);
        }
        if let Some(list) = get("SWITCHBOARD_GLOBAL_PROFILES") {
            config.global_profiles = split_list(&list);
        }
        if let Some(value) = get("SWITCHBOARD_TIMEOUT_SECS") {
            config.timeout = parse_secs("SWITCHBOARD_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("SWITCHBOARD_LONG_TIMEOUT_SECS") {
            config.long_timeout = parse_secs("SWITCHBOARD_LONG_TIMEOUT_SECS", &value)?;
        }

        Ok(config)
    }
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            GatewayConfig::from_lookup(lookup(&[("SWITCHBOARD_PROJECT_ROOT", "/work")])).unwrap();
        assert_eq!(config.transport, Transport::Auto);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.manager_bin, "mcpm");
        assert_eq!(config.compose_dir, PathBuf::from("/work"));
        assert_eq!(config.default_servers, vec!["context7", "brave-search", "github"]);
        assert_eq!(config.global_profiles, vec!["memory"]);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.long_timeout, Duration::from_secs(900));
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("SWITCHBOARD_PROJECT_ROOT", "/work"),
            ("SWITCHBOARD_TRANSPORT", "HTTP"),
            ("SWITCHBOARD_API_URL", "http://api:9000/"),
            ("SWITCHBOARD_DEFAULT_SERVERS", "alpha, ,beta"),
            ("SWITCHBOARD_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.api_url, "http://api:9000");
        assert_eq!(config.default_servers, vec!["alpha", "beta"]);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_fail() {
        let err = GatewayConfig::from_lookup(lookup(&[
            ("SWITCHBOARD_PROJECT_ROOT", "/work"),
            ("SWITCHBOARD_TRANSPORT", "carrier-pigeon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SWITCHBOARD_TRANSPORT"));

        let err = GatewayConfig::from_lookup(lookup(&[
            ("SWITCHBOARD_PROJECT_ROOT", "/work"),
            ("SWITCHBOARD_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SWITCHBOARD_TIMEOUT_SECS", .. }));

        assert!(GatewayConfig::from_lookup(lookup(&[
            ("SWITCHBOARD_PROJECT_ROOT", "/work"),
            ("SWITCHBOARD_LONG_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
    }
}
