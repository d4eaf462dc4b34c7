//! Backend records
//!
//! Pass-through data owned by the external backends. The gateway never
//! caches these between calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

// ============================================================================
// Package manager
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Result of the package manager's doctor check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorReport {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub checks: BTreeMap<String, HealthCheck>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl DoctorReport {
    pub fn healthy(&self) -> bool {
        self.status == "healthy" && self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ServerRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            group: None,
            installed: false,
            profiles: Vec::new(),
            transport: None,
            command: None,
            args: Vec::new(),
            url: None,
            env: BTreeMap::new(),
        }
    }
}

/// Outcome of an install
///
/// `already_installed` distinguishes the idempotent no-op from a fresh
/// install; neither is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    pub name: String,
    pub already_installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl InstallOutcome {
    pub fn fresh(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: format!("Installed '{}'", name),
            name,
            already_installed: false,
            method: None,
        }
    }

    pub fn no_op(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            message: format!("'{}' is already installed", name),
            name,
            already_installed: true,
            method: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerTransport {
    #[serde(rename = "stdio")]
    Stdio,
    #[serde(rename = "streamable-http")]
    StreamableHttp,
}

impl ServerTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerTransport::Stdio => "stdio",
            ServerTransport::StreamableHttp => "streamable-http",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "stdio" => Ok(ServerTransport::Stdio),
            "streamable-http" | "http" => Ok(ServerTransport::StreamableHttp),
            other => Err(GateError::validation(format!(
                "Invalid server type '{}'. Valid types: stdio, streamable-http",
                other
            ))),
        }
    }
}

/// Definition of a custom server for `server create` / `server edit`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<ServerTransport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerSpec {
    /// True when the spec carries nothing but the name
    pub fn is_empty_edit(&self) -> bool {
        self.transport.is_none()
            && self.command.is_none()
            && self.args.is_empty()
            && self.url.is_none()
            && self.env.is_empty()
            && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_servers: Vec<String>,
}

impl ProfileEdit {
    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.add_servers.is_empty() && self.remove_servers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientEdit {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_profiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_profiles: Vec<String>,
}

impl ClientEdit {
    pub fn is_empty(&self) -> bool {
        self.add_servers.is_empty()
            && self.remove_servers.is_empty()
            && self.add_profiles.is_empty()
            && self.remove_profiles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateOutcome {
    #[serde(default)]
    pub migrated: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub no_auth: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub auth: bool,
}

// ============================================================================
// Containers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    pub service: String,
    pub state: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub health: String,
    pub running: bool,
    pub healthy: bool,
    #[serde(default)]
    pub ports: Vec<String>,
}

impl ContainerRecord {
    /// Build a record, deriving the running and healthy flags
    pub fn derive(
        name: impl Into<String>,
        service: impl Into<String>,
        state: impl Into<String>,
        status: impl Into<String>,
        health: impl Into<String>,
    ) -> Self {
        let state = state.into();
        let health = health.into();
        let running = state.eq_ignore_ascii_case("running");
        let healthy = running && (health.is_empty() || health.eq_ignore_ascii_case("healthy"));
        Self {
            name: name.into(),
            service: service.into(),
            state,
            status: status.into(),
            health,
            running,
            healthy,
            ports: Vec::new(),
        }
    }
}

pub const DEFAULT_LOG_LINES: u32 = 100;
pub const MAX_LOG_LINES: u32 = 500;

/// A bounded log request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsRequest {
    pub service: Option<String>,
    pub requested: u32,
    pub lines: u32,
}

impl LogsRequest {
    pub fn new(service: Option<String>, lines: Option<u32>) -> Self {
        let requested = lines.unwrap_or(DEFAULT_LOG_LINES);
        Self {
            service,
            requested,
            lines: requested.clamp(1, MAX_LOG_LINES),
        }
    }

    pub fn clamped(&self) -> bool {
        self.lines != self.requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub lines: u32,
    pub requested: u32,
    pub clamped: bool,
    pub output: String,
}

impl LogsOutput {
    pub fn new(request: &LogsRequest, output: String) -> Self {
        Self {
            service: request.service.clone(),
            lines: request.lines,
            requested: request.requested,
            clamped: request.clamped(),
            output,
        }
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// Presence of the project configuration files the devops action manages
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectConfigs {
    pub git: bool,
    pub pre_commit: bool,
    pub gitleaks: bool,
    pub github_workflows: bool,
    pub pr_agent: bool,
    pub dependabot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub path: String,
    pub name: String,
    pub languages: Vec<String>,
    pub key_files: Vec<String>,
    pub configs: ProjectConfigs,
}

impl ProjectAnalysis {
    pub fn primary_language(&self) -> Option<&str> {
        self.languages.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    Created,
    Overwritten,
    Skipped,
}

// ============================================================================
// Composite calls
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub status: String,
    #[serde(default)]
    pub detail: String,
}

/// Aggregated report of a multi-step call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositeReport {
    pub steps: Vec<StepReport>,
    pub completed: bool,
}

impl CompositeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        step: impl Into<String>,
        status: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.steps.push(StepReport {
            step: step.into(),
            status: status.into(),
            detail: detail.into(),
        });
    }

    pub fn completed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == "ok")
            .map(|s| s.step.as_str())
            .collect()
    }

    /// Turn a step failure into the call's error, naming the finished steps
    pub fn fail_at(&self, step: &str, err: GateError) -> GateError {
        let done = self.completed_steps();
        let done = if done.is_empty() {
            "none".to_string()
        } else {
            done.join(", ")
        };
        GateError::new(
            err.kind(),
            format!("{} failed: {} (completed steps: {})", step, err.message(), done),
        )
    }

    pub fn finish(mut self) -> Self {
        self.completed = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_logs_request_clamps() {
        let req = LogsRequest::new(None, Some(10_000));
        assert_eq!(req.lines, MAX_LOG_LINES);
        assert_eq!(req.requested, 10_000);
        assert!(req.clamped());

        let req = LogsRequest::new(Some("api".into()), None);
        assert_eq!(req.lines, DEFAULT_LOG_LINES);
        assert!(!req.clamped());
    }

    #[test]
    fn test_container_flags() {
        let running = ContainerRecord::derive("c1", "api", "running", "Up 2 minutes", "");
        assert!(running.running);
        assert!(running.healthy);

        let unhealthy = ContainerRecord::derive("c2", "db", "running", "Up", "unhealthy");
        assert!(unhealthy.running);
        assert!(!unhealthy.healthy);

        let exited = ContainerRecord::derive("c3", "worker", "exited", "Exited (1)", "");
        assert!(!exited.running);
        assert!(!exited.healthy);
    }

    #[test]
    fn test_server_transport_parse() {
        assert_eq!(ServerTransport::parse("stdio").unwrap(), ServerTransport::Stdio);
        assert_eq!(
            ServerTransport::parse("streamable-http").unwrap(),
            ServerTransport::StreamableHttp
        );
        let err = ServerTransport::parse("sse").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("stdio, streamable-http"));
    }

    #[test]
    fn test_composite_failure_names_completed_steps() {
        let mut report = CompositeReport::new();
        report.push("build", "ok", "");
        let err = report.fail_at("up", GateError::unavailable("docker not reachable"));
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.message().contains("up failed"));
        assert!(err.message().contains("completed steps: build"));
    }

    #[test]
    fn test_edit_emptiness() {
        assert!(ProfileEdit::default().is_empty());
        assert!(ClientEdit::default().is_empty());
        let edit = ProfileEdit {
            add_servers: vec!["alpha".into()],
            ..Default::default()
        };
        assert!(!edit.is_empty());
    }
}
