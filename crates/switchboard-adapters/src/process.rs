//! Local process execution
//!
//! Spawns commands with tokio, captures stdout and stderr into one string and
//! reports the exit code. The child is killed if the call's deadline elapses.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use switchboard_core::{CallContext, CommandSpec, GateError, ProcessExecutor, ProcessOutput, Result};

#[derive(Debug, Clone, Default)]
pub struct LocalProcessExecutor;

impl LocalProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(program: &str, err: io::Error) -> GateError {
    let hint = if err.kind() == io::ErrorKind::NotFound {
        "is it installed and on PATH?"
    } else {
        "check that the backend is available"
    };
    GateError::unavailable(format!("Failed to start '{}': {} ({})", program, err, hint))
}

/// stdout, then stderr tagged the same way the tool output has always been
fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let mut result = String::from_utf8_lossy(stdout).to_string();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        if !result.is_empty() && !result.ends_with('\n') {
            result.push('\n');
        }
        result.push_str(&format!("[stderr]: {}", stderr));
    }
    result
}

#[async_trait]
impl ProcessExecutor for LocalProcessExecutor {
    async fn run(&self, ctx: &CallContext, spec: CommandSpec) -> Result<ProcessOutput> {
        let label = spec.to_string();
        debug!("Running: {}", label);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            warn!("Failed to spawn {}: {}", spec.program, e);
            spawn_error(&spec.program, e)
        })?;

        ctx.run(&label, async {
            let output = child.wait_with_output().await.map_err(|e| {
                GateError::execution(format!("Failed to collect output of {}: {}", label, e))
            })?;
            let exit_code = output.status.code().unwrap_or(-1);
            if exit_code != 0 {
                debug!("{} exited with code {}", label, exit_code);
            }
            Ok(ProcessOutput {
                output: combine(&output.stdout, &output.stderr),
                exit_code,
            })
        })
        .await
    }
}
