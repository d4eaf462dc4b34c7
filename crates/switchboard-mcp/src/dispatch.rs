//! Dispatcher
//!
//! Validates a call into an [`Invocation`], routes it onto the backend
//! interfaces and normalizes the outcome. Holds no state between calls.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use switchboard_core::{
    normalize, Backends, CallContext, GateError, GatewayConfig, OperationResult, Result,
};

use crate::actions::{
    ClientCall, ConfigCall, Invocation, ProfileCall, ProjectCall, ServerCall, ShareCall,
};
use crate::config_io::{ConfigExport, ImportReport};
use crate::devops;

/// Serialize a handler's result into the `data` payload
pub(crate) fn to_data<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| GateError::execution(format!("Failed to encode result: {}", e)))
}

/// Lines the supervisor prints that are not process status
const SUPERVISOR_NOISE: &[&str] = &["No token data found"];

#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) backends: Backends,
    pub(crate) config: Arc<GatewayConfig>,
}

impl Dispatcher {
    pub fn new(backends: Backends, config: GatewayConfig) -> Self {
        Self {
            backends,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handle one tool call under the configured deadline
    pub async fn call(&self, tool: &str, arguments: Map<String, Value>) -> OperationResult {
        let ctx = CallContext::new(self.config.timeout);
        self.call_with(&ctx, tool, arguments).await
    }

    /// Handle one tool call under `ctx`
    ///
    /// Long-running calls get a fresh deadline from the long timeout but keep
    /// the caller's cancellation token.
    pub async fn call_with(
        &self,
        ctx: &CallContext,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> OperationResult {
        let invocation = match Invocation::parse(tool, arguments, &self.config.project_root) {
            Ok(invocation) => invocation,
            Err(e) => {
                warn!("Rejected {} call: {}", tool, e);
                return OperationResult::failure(&e);
            }
        };

        let (tool, action) = (invocation.tool(), invocation.action());
        info!("Dispatching {} {}", tool, action);

        let ctx = if invocation.is_long_running() {
            ctx.extended(self.config.long_timeout)
        } else {
            ctx.clone()
        };

        let outcome = self.invoke(&ctx, invocation).await;
        if let Err(e) = &outcome {
            warn!("{} {} failed ({}): {}", tool, action, e.kind(), e);
        }
        normalize(outcome)
    }

    /// Run an already validated call
    pub async fn invoke(&self, ctx: &CallContext, invocation: Invocation) -> Result<Value> {
        match invocation {
            Invocation::Server(call) => self.server(ctx, call).await,
            Invocation::Profile(call) => self.profile(ctx, call).await,
            Invocation::Client(call) => self.client(ctx, call).await,
            Invocation::Config(call) => self.config_call(ctx, call).await,
            Invocation::Project(call) => self.project(ctx, call).await,
            Invocation::System(call) => self.system(ctx, call).await,
            Invocation::Share(call) => self.share(ctx, call).await,
            Invocation::Status => self.status(ctx).await,
        }
    }

    // ========================================================================
    // SERVER
    // ========================================================================

    async fn server(&self, ctx: &CallContext, call: ServerCall) -> Result<Value> {
        let packages = &self.backends.packages;
        match call {
            ServerCall::List => to_data(packages.list(ctx).await?),
            ServerCall::Info { name } => to_data(packages.info(ctx, &name).await?),
            ServerCall::Install { name } => to_data(packages.install(ctx, &name).await?),
            ServerCall::Uninstall { name } => {
                packages.uninstall(ctx, &name).await?;
                Ok(json!({"name": name, "uninstalled": true}))
            }
            ServerCall::Search { query } => to_data(packages.search(ctx, query.as_deref()).await?),
            ServerCall::Create(spec) => to_data(packages.create_server(ctx, &spec).await?),
            ServerCall::Edit(spec) => to_data(packages.edit_server(ctx, &spec).await?),
        }
    }

    // ========================================================================
    // PROFILE
    // ========================================================================

    async fn profile(&self, ctx: &CallContext, call: ProfileCall) -> Result<Value> {
        let packages = &self.backends.packages;
        match call {
            ProfileCall::List => to_data(packages.profile_list(ctx).await?),
            ProfileCall::Create { name, servers } => {
                to_data(packages.profile_create(ctx, &name, &servers).await?)
            }
            ProfileCall::Edit { name, edit } => {
                to_data(packages.profile_edit(ctx, &name, &edit).await?)
            }
            ProfileCall::Delete { name } => {
                packages.profile_delete(ctx, &name).await?;
                Ok(json!({"name": name, "deleted": true}))
            }
            ProfileCall::Suggest { path, testing } => {
                let project = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                let existing = packages.profile_list(ctx).await?;
                let project_profile = existing
                    .iter()
                    .map(|p| p.name.as_str())
                    .find(|name| {
                        !project.is_empty() && name.to_ascii_lowercase().contains(&project)
                    })
                    .unwrap_or("p-new")
                    .to_string();

                let mut profiles = vec![project_profile.clone()];
                for global in &self.config.global_profiles {
                    if !profiles.contains(global) {
                        profiles.push(global.clone());
                    }
                }
                if testing {
                    profiles.push("testing-all-tools".to_string());
                }
                Ok(json!({
                    "project": project,
                    "project_profile": project_profile,
                    "profiles": profiles,
                }))
            }
            ProfileCall::Restart { profile } => match profile {
                Some(profile) => {
                    let program = format!("mcpm-{}", profile);
                    let output = self
                        .backends
                        .containers
                        .supervisor(ctx, "restart", Some(&program))
                        .await
                        .map_err(|e| {
                            e.context(format!("Failed to restart profile '{}'", profile))
                        })?;
                    Ok(json!({"restarted": profile, "output": output}))
                }
                None => {
                    let service = self.config.daemon_service.clone();
                    let output = self
                        .backends
                        .containers
                        .compose_restart(ctx, std::slice::from_ref(&service))
                        .await
                        .map_err(|e| e.context("Failed to restart all profiles"))?;
                    Ok(json!({"restarted": "all", "service": service, "output": output}))
                }
            },
        }
    }

    // ========================================================================
    // CLIENT
    // ========================================================================

    async fn client(&self, ctx: &CallContext, call: ClientCall) -> Result<Value> {
        let packages = &self.backends.packages;
        match call {
            ClientCall::List => to_data(packages.client_list(ctx).await?),
            ClientCall::Edit { name, edit } => {
                to_data(packages.client_edit(ctx, &name, &edit).await?)
            }
        }
    }

    // ========================================================================
    // CONFIG
    // ========================================================================

    async fn config_call(&self, ctx: &CallContext, call: ConfigCall) -> Result<Value> {
        let packages = &self.backends.packages;
        match call {
            ConfigCall::Get { key } => {
                let value = packages.config_get(ctx, &key).await?;
                Ok(json!({"key": key, "value": value}))
            }
            ConfigCall::Set { key, value } => {
                packages.config_set(ctx, &key, &value).await?;
                Ok(json!({"key": key, "value": value, "updated": true}))
            }
            ConfigCall::List => to_data(packages.config_list(ctx).await?),
            ConfigCall::Migrate => to_data(packages.migrate(ctx).await?),
            ConfigCall::Export { redact } => {
                let values = packages.config_list(ctx).await?;
                to_data(ConfigExport::build(values, redact, Utc::now()))
            }
            ConfigCall::Import(import) => {
                let mut report = ImportReport {
                    applied: Vec::new(),
                    redacted_skipped: import.redacted.clone(),
                };
                for (key, value) in &import.values {
                    debug!("Importing config key {}", key);
                    if let Err(e) = packages.config_set(ctx, key, value).await {
                        let done = if report.applied.is_empty() {
                            "none".to_string()
                        } else {
                            report.applied.join(", ")
                        };
                        return Err(GateError::new(
                            e.kind(),
                            format!(
                                "Import stopped at '{}': {} (applied: {})",
                                key,
                                e.message(),
                                done
                            ),
                        ));
                    }
                    report.applied.push(key.clone());
                }
                to_data(report)
            }
        }
    }

    // ========================================================================
    // PROJECT
    // ========================================================================

    async fn project(&self, ctx: &CallContext, call: ProjectCall) -> Result<Value> {
        match call {
            ProjectCall::Analyze { path } => {
                to_data(self.backends.workspace.analyze(ctx, &path).await?)
            }
            ProjectCall::Diff { path, staged } => {
                let vcs = &self.backends.vcs;
                let status = vcs.status(ctx, &path).await?;
                let diff = vcs.diff(ctx, &path, staged).await?;
                Ok(json!({
                    "path": path.display().to_string(),
                    "staged": staged,
                    "status": status,
                    "diff": diff,
                }))
            }
            ProjectCall::Devops(request) => to_data(
                devops::apply(
                    ctx,
                    self.backends.vcs.as_ref(),
                    self.backends.workspace.as_ref(),
                    &request,
                )
                .await?,
            ),
            ProjectCall::Test { path, languages } => self.project_test(ctx, &path, languages).await,
        }
    }

    // ========================================================================
    // SHARE
    // ========================================================================

    async fn share(&self, ctx: &CallContext, call: ShareCall) -> Result<Value> {
        let packages = &self.backends.packages;
        match call {
            ShareCall::Start { name, options } => {
                to_data(packages.share_start(ctx, &name, &options).await?)
            }
            ShareCall::Stop { name } => {
                packages.share_stop(ctx, &name).await?;
                Ok(json!({"name": name, "stopped": true}))
            }
            ShareCall::List => to_data(packages.share_list(ctx).await?),
        }
    }

    // ========================================================================
    // STATUS
    // ========================================================================

    /// Health of every backend; failures are reported in the data
    async fn status(&self, ctx: &CallContext) -> Result<Value> {
        let doctor = self.backends.packages.doctor(ctx).await;
        let containers = self.backends.containers.compose_status(ctx).await;
        let supervisor = self.backends.containers.supervisor(ctx, "status", None).await;

        let manager_ok = doctor.as_ref().map(|r| r.healthy()).unwrap_or(false);
        let containers_ok = containers
            .as_ref()
            .map(|list| list.iter().all(|c| c.healthy))
            .unwrap_or(false);

        let section = |outcome: Result<Value>| match outcome {
            Ok(data) => json!({"ok": true, "data": data}),
            Err(e) => json!({
                "ok": false,
                "error": {"code": e.kind().code(), "message": e.message()}
            }),
        };
        let supervisor = supervisor.map(|out| {
            let lines: Vec<&str> = out
                .lines()
                .filter(|l| !l.trim().is_empty())
                .filter(|l| !SUPERVISOR_NOISE.iter().any(|n| l.contains(n)))
                .collect();
            Value::from(lines)
        });

        Ok(json!({
            "healthy": manager_ok && containers_ok,
            "transport": self.config.transport.as_str(),
            "package_manager": section(doctor.and_then(to_data)),
            "containers": section(containers.and_then(to_data)),
            "supervisor": section(supervisor),
        }))
    }
}
