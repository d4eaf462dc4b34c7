//! Backend interfaces
//!
//! Each backend domain is a capability trait. The dispatcher only ever holds
//! `Arc<dyn Trait>`; which adapter sits behind it is decided once at startup.
//!
//! Every operation takes a [`CallContext`] and must honor its deadline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::CallContext;
use crate::error::{GateError, Result};
use crate::records::{
    ClientEdit, ClientRecord, ContainerRecord, DoctorReport, InstallOutcome, LogsOutput,
    LogsRequest, MigrateOutcome, ProfileEdit, ProfileRecord, ProjectAnalysis, ServerRecord,
    ServerSpec, ShareOptions, ShareRecord, WriteOutcome,
};

// ============================================================================
// Process execution
// ============================================================================

/// A command to spawn
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a process that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// stdout followed by any stderr
    pub output: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Keep the output on exit 0, otherwise a `BACKEND_EXECUTION` error
    pub fn into_success(self, command: &str) -> Result<String> {
        if self.success() {
            return Ok(self.output);
        }
        let output = self.output.trim();
        Err(GateError::execution(format!(
            "{} exited with code {}: {}",
            command,
            self.exit_code,
            if output.is_empty() { "(no output)" } else { output }
        )))
    }
}

/// Local command execution
///
/// `run` returns `Ok` for any process that started, whatever its exit code.
/// A process that could not be spawned is `BACKEND_UNAVAILABLE`.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn run(&self, ctx: &CallContext, spec: CommandSpec) -> Result<ProcessOutput>;

    async fn execute(
        &self,
        ctx: &CallContext,
        program: &str,
        args: &[String],
    ) -> Result<ProcessOutput> {
        self.run(ctx, CommandSpec::new(program).args(args.iter().cloned()))
            .await
    }

    async fn execute_with_env(
        &self,
        ctx: &CallContext,
        program: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<ProcessOutput> {
        let mut spec = CommandSpec::new(program).args(args.iter().cloned());
        spec.env.extend(env.iter().cloned());
        self.run(ctx, spec).await
    }
}

// ============================================================================
// Package / profile / client / config management
// ============================================================================

#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn doctor(&self, ctx: &CallContext) -> Result<DoctorReport>;

    /// Installing an installed server is a flagged no-op, never an error
    async fn install(&self, ctx: &CallContext, name: &str) -> Result<InstallOutcome>;
    async fn uninstall(&self, ctx: &CallContext, name: &str) -> Result<()>;
    async fn list(&self, ctx: &CallContext) -> Result<Vec<ServerRecord>>;
    async fn search(&self, ctx: &CallContext, query: Option<&str>) -> Result<Vec<ServerRecord>>;

    /// Unknown names are `NOT_FOUND`
    async fn info(&self, ctx: &CallContext, name: &str) -> Result<ServerRecord>;
    async fn create_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord>;
    async fn edit_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord>;

    async fn profile_list(&self, ctx: &CallContext) -> Result<Vec<ProfileRecord>>;
    async fn profile_create(
        &self,
        ctx: &CallContext,
        name: &str,
        servers: &[String],
    ) -> Result<ProfileRecord>;
    async fn profile_edit(
        &self,
        ctx: &CallContext,
        name: &str,
        edit: &ProfileEdit,
    ) -> Result<ProfileRecord>;
    async fn profile_delete(&self, ctx: &CallContext, name: &str) -> Result<()>;

    async fn client_list(&self, ctx: &CallContext) -> Result<Vec<ClientRecord>>;
    async fn client_edit(
        &self,
        ctx: &CallContext,
        name: &str,
        edit: &ClientEdit,
    ) -> Result<ClientRecord>;

    async fn config_get(&self, ctx: &CallContext, key: &str) -> Result<Value>;
    async fn config_set(&self, ctx: &CallContext, key: &str, value: &Value) -> Result<()>;
    async fn config_list(&self, ctx: &CallContext) -> Result<BTreeMap<String, Value>>;
    async fn migrate(&self, ctx: &CallContext) -> Result<MigrateOutcome>;

    /// Sharing a server that is already shared is `CONFLICT`
    async fn share_start(
        &self,
        ctx: &CallContext,
        name: &str,
        options: &ShareOptions,
    ) -> Result<ShareRecord>;

    /// Stopping a server that is not shared is `NOT_FOUND`
    async fn share_stop(&self, ctx: &CallContext, name: &str) -> Result<()>;
    async fn share_list(&self, ctx: &CallContext) -> Result<Vec<ShareRecord>>;
}

// ============================================================================
// Container lifecycle
// ============================================================================

/// Compose-style container lifecycle
///
/// An empty `services` slice means every service.
#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    async fn compose_up(&self, ctx: &CallContext, services: &[String]) -> Result<String>;
    async fn compose_down(&self, ctx: &CallContext) -> Result<String>;
    async fn compose_restart(&self, ctx: &CallContext, services: &[String]) -> Result<String>;
    async fn compose_build(
        &self,
        ctx: &CallContext,
        services: &[String],
        no_cache: bool,
    ) -> Result<String>;
    async fn compose_stop(&self, ctx: &CallContext, services: &[String]) -> Result<String>;
    async fn compose_start(&self, ctx: &CallContext, services: &[String]) -> Result<String>;

    /// The request is already clamped; adapters pass `request.lines` through
    async fn compose_logs(&self, ctx: &CallContext, request: &LogsRequest) -> Result<LogsOutput>;

    /// One record per declared or running service
    ///
    /// Services that were never created are reported as not running.
    async fn compose_status(&self, ctx: &CallContext) -> Result<Vec<ContainerRecord>>;

    /// Run a process-supervisor command (`status`, `restart <name>`, ...)
    /// inside the daemon container
    async fn supervisor(
        &self,
        ctx: &CallContext,
        action: &str,
        target: Option<&str>,
    ) -> Result<String>;
}

// ============================================================================
// Version control
// ============================================================================

/// Operations on a path that is not a repository are `NOT_FOUND`
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn is_repo(&self, ctx: &CallContext, path: &Path) -> Result<bool>;
    async fn status(&self, ctx: &CallContext, path: &Path) -> Result<String>;
    async fn diff(&self, ctx: &CallContext, path: &Path, staged: bool) -> Result<String>;
    async fn init(&self, ctx: &CallContext, path: &Path) -> Result<String>;
}

// ============================================================================
// Project workspace
// ============================================================================

#[async_trait]
pub trait Workspace: Send + Sync {
    /// Scan a project directory; a missing directory is `NOT_FOUND`
    async fn analyze(&self, ctx: &CallContext, path: &Path) -> Result<ProjectAnalysis>;

    /// Write `contents` to `path`, leaving an existing file alone unless
    /// `overwrite` is set
    async fn write_file(
        &self,
        ctx: &CallContext,
        path: &Path,
        contents: &str,
        overwrite: bool,
    ) -> Result<WriteOutcome>;
}

/// The full set of backends the dispatcher routes onto
#[derive(Clone)]
pub struct Backends {
    pub process: Arc<dyn ProcessExecutor>,
    pub packages: Arc<dyn PackageManager>,
    pub containers: Arc<dyn ContainerOrchestrator>,
    pub vcs: Arc<dyn VersionControl>,
    pub workspace: Arc<dyn Workspace>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("docker")
            .arg("compose")
            .args(["logs", "--tail", "100"])
            .env("NO_COLOR", "true")
            .cwd("/srv");
        assert_eq!(spec.to_string(), "docker compose logs --tail 100");
        assert_eq!(spec.env, vec![("NO_COLOR".to_string(), "true".to_string())]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_non_zero_exit_is_execution_error() {
        let output = ProcessOutput {
            output: "boom".to_string(),
            exit_code: 2,
        };
        let err = output.into_success("git status").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendExecution);
        assert!(err.message().contains("exited with code 2"));
        assert!(err.message().contains("boom"));
    }
}
