//! Compose-based container lifecycle
//!
//! Wraps `<bin> compose ...` in the configured compose directory, plus
//! `supervisorctl` inside the daemon container for per-profile restarts.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use switchboard_core::records::{ContainerRecord, LogsOutput, LogsRequest};
use switchboard_core::{
    CallContext, CommandSpec, ContainerOrchestrator, GateError, ProcessExecutor, Result,
};

pub struct ComposeOrchestrator {
    exec: Arc<dyn ProcessExecutor>,
    bin: String,
    dir: PathBuf,
    daemon_container: String,
}

impl ComposeOrchestrator {
    pub fn new(
        exec: Arc<dyn ProcessExecutor>,
        bin: impl Into<String>,
        dir: impl Into<PathBuf>,
        daemon_container: impl Into<String>,
    ) -> Self {
        Self {
            exec,
            bin: bin.into(),
            dir: dir.into(),
            daemon_container: daemon_container.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.bin)
            .arg("compose")
            .args(args)
            .cwd(&self.dir)
    }

    async fn compose(&self, ctx: &CallContext, spec: CommandSpec) -> Result<String> {
        let label = spec.to_string();
        let output = self.exec.run(ctx, spec).await?;
        output.into_success(&label)
    }
}

/// One entry of `compose ps --format json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    health: String,
    #[serde(default)]
    publishers: Option<Vec<Publisher>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Publisher {
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(default)]
    target_port: u16,
    #[serde(default)]
    published_port: u16,
    #[serde(default)]
    protocol: String,
}

impl From<PsEntry> for ContainerRecord {
    fn from(entry: PsEntry) -> Self {
        let mut record = ContainerRecord::derive(
            entry.name,
            entry.service,
            entry.state,
            entry.status,
            entry.health,
        );
        record.ports = entry
            .publishers
            .unwrap_or_default()
            .iter()
            .filter(|p| p.published_port != 0)
            .map(|p| {
                let host = if p.url.is_empty() { "0.0.0.0" } else { p.url.as_str() };
                format!("{}:{}->{}/{}", host, p.published_port, p.target_port, p.protocol)
            })
            .collect();
        record
    }
}

/// Parse `compose ps --format json`
///
/// Older compose versions print one JSON array, newer ones one object per
/// line. Non-JSON lines (stderr noise) are ignored.
pub fn parse_ps(output: &str) -> Result<Vec<ContainerRecord>> {
    let trimmed = output.trim();
    if trimmed.starts_with('[') {
        let entries: Vec<PsEntry> = serde_json::from_str(trimmed)
            .map_err(|e| GateError::execution(format!("Unexpected compose ps output: {}", e)))?;
        return Ok(entries.into_iter().map(ContainerRecord::from).collect());
    }

    let mut records = Vec::new();
    for line in trimmed.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        let entry: PsEntry = serde_json::from_str(line)
            .map_err(|e| GateError::execution(format!("Unexpected compose ps output: {}", e)))?;
        records.push(entry.into());
    }
    Ok(records)
}

/// Add a not-running record for each declared service `ps` did not list
fn merge_declared(records: &mut Vec<ContainerRecord>, services: &str) {
    for service in services.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if records.iter().any(|r| r.service == service) {
            continue;
        }
        records.push(ContainerRecord::derive("", service, "missing", "not created", ""));
    }
}

#[async_trait]
impl ContainerOrchestrator for ComposeOrchestrator {
    async fn compose_up(&self, ctx: &CallContext, services: &[String]) -> Result<String> {
        let spec = self.command(["up", "-d"]).args(services.iter().cloned());
        self.compose(ctx, spec).await
    }

    async fn compose_down(&self, ctx: &CallContext) -> Result<String> {
        self.compose(ctx, self.command(["down"])).await
    }

    async fn compose_restart(&self, ctx: &CallContext, services: &[String]) -> Result<String> {
        let spec = self.command(["restart"]).args(services.iter().cloned());
        self.compose(ctx, spec).await
    }

    async fn compose_build(
        &self,
        ctx: &CallContext,
        services: &[String],
        no_cache: bool,
    ) -> Result<String> {
        let mut spec = self.command(["build"]);
        if no_cache {
            spec = spec.arg("--no-cache");
        }
        self.compose(ctx, spec.args(services.iter().cloned())).await
    }

    async fn compose_stop(&self, ctx: &CallContext, services: &[String]) -> Result<String> {
        let spec = self.command(["stop"]).args(services.iter().cloned());
        self.compose(ctx, spec).await
    }

    async fn compose_start(&self, ctx: &CallContext, services: &[String]) -> Result<String> {
        let spec = self.command(["start"]).args(services.iter().cloned());
        self.compose(ctx, spec).await
    }

    async fn compose_logs(&self, ctx: &CallContext, request: &LogsRequest) -> Result<LogsOutput> {
        let mut spec = self
            .command(["logs", "--no-color", "--tail"])
            .arg(request.lines.to_string());
        if let Some(service) = &request.service {
            spec = spec.arg(service.clone());
        }
        let output = self.compose(ctx, spec).await?;
        Ok(LogsOutput::new(request, output))
    }

    async fn compose_status(&self, ctx: &CallContext) -> Result<Vec<ContainerRecord>> {
        let output = self
            .compose(ctx, self.command(["ps", "--all", "--format", "json"]))
            .await?;
        let mut records = parse_ps(&output)?;

        match self.compose(ctx, self.command(["config", "--services"])).await {
            Ok(services) => merge_declared(&mut records, &services),
            Err(e) => debug!("compose config --services failed: {}", e),
        }
        Ok(records)
    }

    async fn supervisor(
        &self,
        ctx: &CallContext,
        action: &str,
        target: Option<&str>,
    ) -> Result<String> {
        let mut spec = CommandSpec::new(&self.bin).args([
            "exec",
            self.daemon_container.as_str(),
            "supervisorctl",
            action,
        ]);
        if let Some(target) = target {
            spec = spec.arg(target);
        }
        let label = spec.to_string();
        let output = self.exec.run(ctx, spec).await?;

        // supervisorctl status exits 3 when any program is not running
        if action == "status" && output.exit_code == 3 {
            debug!("{}: some programs are not running", label);
            return Ok(output.output);
        }
        output.into_success(&label)
    }
}
