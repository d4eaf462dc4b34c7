//! System lifecycle and multi-step calls
//!
//! Composite calls run their steps in order under one long deadline and
//! report `{steps, completed}`. The first failing step ends the call with
//! that step's error kind; the message lists the steps that did complete.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info};

use switchboard_core::records::CompositeReport;
use switchboard_core::{CallContext, CommandSpec, GateError, Result};

use crate::actions::SystemCall;
use crate::dispatch::{to_data, Dispatcher};

/// Lines of command output kept in a step's detail
const DETAIL_LINES: usize = 20;

fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// Record a step outcome, turning a failure into the call's error
fn record<T>(
    report: &mut CompositeReport,
    step: &str,
    outcome: Result<T>,
    detail: impl FnOnce(&T) -> String,
) -> Result<T> {
    match outcome {
        Ok(value) => {
            report.push(step, "ok", detail(&value));
            Ok(value)
        }
        Err(e) => {
            report.push(step, "failed", e.message());
            Err(report.fail_at(step, e))
        }
    }
}

const SUPPORTED_LANGUAGES: &[&str] = &["rust", "go", "node", "typescript", "javascript", "python"];

/// The test command for a language
fn test_command(language: &str) -> Option<CommandSpec> {
    match language {
        "rust" => Some(CommandSpec::new("cargo").arg("test")),
        "go" => Some(CommandSpec::new("go").args(["test", "./..."])),
        "node" | "typescript" | "javascript" => Some(CommandSpec::new("npm").arg("test")),
        "python" => Some(CommandSpec::new("pytest")),
        _ => None,
    }
}

fn services_label(services: &[String]) -> Value {
    if services.is_empty() {
        json!("all")
    } else {
        json!(services)
    }
}

impl Dispatcher {
    pub(crate) async fn system(&self, ctx: &CallContext, call: SystemCall) -> Result<Value> {
        let containers = &self.backends.containers;
        match call {
            SystemCall::Bootstrap => self.bootstrap(ctx).await,
            SystemCall::Restart { services } => {
                let output = containers.compose_restart(ctx, &services).await?;
                Ok(json!({"restarted": services_label(&services), "output": output}))
            }
            SystemCall::RestartInfra => {
                let mut report = CompositeReport::new();
                let down = containers.compose_down(ctx).await;
                record(&mut report, "compose down", down, |o| tail(o, DETAIL_LINES))?;
                let up = containers.compose_up(ctx, &[]).await;
                record(&mut report, "compose up", up, |o| tail(o, DETAIL_LINES))?;
                to_data(report.finish())
            }
            SystemCall::Rebuild { services, no_cache } => {
                let mut report = CompositeReport::new();
                record(
                    &mut report,
                    "compose build",
                    containers.compose_build(ctx, &services, no_cache).await,
                    |o| tail(o, DETAIL_LINES),
                )?;
                record(
                    &mut report,
                    "compose up",
                    containers.compose_up(ctx, &services).await,
                    |o| tail(o, DETAIL_LINES),
                )?;
                to_data(report.finish())
            }
            SystemCall::Stop { services } => {
                let output = containers.compose_stop(ctx, &services).await?;
                Ok(json!({"stopped": services_label(&services), "output": output}))
            }
            SystemCall::Start { services } => {
                let output = containers.compose_start(ctx, &services).await?;
                Ok(json!({"started": services_label(&services), "output": output}))
            }
            SystemCall::DockerLogs(request) => {
                to_data(containers.compose_logs(ctx, &request).await?)
            }
            SystemCall::DockerStatus => to_data(containers.compose_status(ctx).await?),
            SystemCall::Build { services, no_cache } => {
                let output = containers.compose_build(ctx, &services, no_cache).await?;
                Ok(json!({
                    "built": services_label(&services),
                    "no_cache": no_cache,
                    "output": output,
                }))
            }
        }
    }

    /// doctor, then install the default servers, then bring the stack up
    async fn bootstrap(&self, ctx: &CallContext) -> Result<Value> {
        let packages = &self.backends.packages;
        let mut report = CompositeReport::new();

        record(&mut report, "doctor", packages.doctor(ctx).await, |r| r.status.clone())?;

        for server in &self.config.default_servers {
            let step = format!("install {}", server);
            record(&mut report, &step, packages.install(ctx, server).await, |o| {
                if o.already_installed {
                    "already installed".to_string()
                } else {
                    "installed".to_string()
                }
            })?;
        }

        record(
            &mut report,
            "compose up",
            self.backends.containers.compose_up(ctx, &[]).await,
            |o| tail(o, DETAIL_LINES),
        )?;

        info!("Bootstrap finished with {} steps", report.steps.len());
        to_data(report.finish())
    }

    /// Run each language's test suite in `path` as one composite call
    pub(crate) async fn project_test(
        &self,
        ctx: &CallContext,
        path: &Path,
        languages: Vec<String>,
    ) -> Result<Value> {
        for language in &languages {
            if test_command(language).is_none() {
                return Err(GateError::validation(format!(
                    "project test: unsupported language '{}' (supported: {})",
                    language,
                    SUPPORTED_LANGUAGES.join(", ")
                )));
            }
        }

        let languages = if languages.is_empty() {
            self.backends.workspace.analyze(ctx, path).await?.languages
        } else {
            languages
        };

        let mut suites: Vec<(String, CommandSpec)> = Vec::new();
        for language in &languages {
            if let Some(command) = test_command(language) {
                let command = command.cwd(path);
                if !suites.iter().any(|(_, c)| c.to_string() == command.to_string()) {
                    suites.push((language.clone(), command));
                }
            }
        }
        if suites.is_empty() {
            return Err(GateError::not_found(format!(
                "No test suite found for project '{}' (detected languages: {})",
                path.display(),
                if languages.is_empty() { "none".to_string() } else { languages.join(", ") }
            )));
        }

        let mut report = CompositeReport::new();
        for (language, command) in suites {
            let line = command.to_string();
            let step = format!("{}: {}", language, line);
            debug!("Running test suite {}", step);
            let outcome = match self.backends.process.run(ctx, command).await {
                Ok(output) => output.into_success(&line),
                Err(e) => Err(e),
            };
            record(&mut report, &step, outcome, |o| tail(o, DETAIL_LINES))?;
        }
        to_data(report.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\n", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
        assert_eq!(tail("", 5), "");
    }

    #[test]
    fn test_record_failure_lists_completed_steps() {
        let mut report = CompositeReport::new();
        record(&mut report, "one", Ok::<_, GateError>(()), |_| String::new()).unwrap();
        let err = record::<()>(&mut report, "two", Err(GateError::timeout("slow")), |_| {
            String::new()
        })
        .unwrap_err();
        assert_eq!(err.kind(), switchboard_core::ErrorKind::Timeout);
        assert_eq!(err.message(), "two failed: slow (completed steps: one)");
        assert_eq!(report.steps[1].status, "failed");
    }
}
