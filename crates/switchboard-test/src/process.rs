//! Fake process executor

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use switchboard_core::{CallContext, CommandSpec, ProcessExecutor, ProcessOutput, Result};

use crate::calls::{recorder_api, CallLog, Recorder};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CannedOutput {
    exit_code: i32,
    output: String,
}

/// Records every command line as a `run` call with one argument: the full
/// command line (`program arg1 arg2 ...`)
///
/// Commands without a canned response exit 0 with no output.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessExecutor {
    recorder: Recorder,
    delay: Arc<Mutex<Option<Duration>>>,
}

recorder_api!(FakeProcessExecutor);

impl FakeProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            recorder: Recorder::new(log),
            delay: Arc::default(),
        }
    }

    /// Answer `command_line` with this exit code and output
    pub fn respond(&self, command_line: &str, exit_code: i32, output: &str) {
        self.recorder.stubs.stub_with(
            "run",
            &[command_line],
            CannedOutput {
                exit_code,
                output: output.to_string(),
            },
        );
    }

    /// Answer every command without a specific response
    pub fn respond_all(&self, exit_code: i32, output: &str) {
        self.recorder.stubs.stub(
            "run",
            CannedOutput {
                exit_code,
                output: output.to_string(),
            },
        );
    }

    /// Make every command take this long, so deadlines can be exercised
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut guard) = self.delay.lock() {
            *guard = Some(delay);
        }
    }

    /// Every command line run so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == "run")
            .filter_map(|c| c.args.into_iter().next())
            .collect()
    }
}

#[async_trait]
impl ProcessExecutor for FakeProcessExecutor {
    async fn run(&self, ctx: &CallContext, spec: CommandSpec) -> Result<ProcessOutput> {
        let line = spec.to_string();
        let canned: Option<Result<CannedOutput>> = self.recorder.begin("run", vec![line.clone()]);
        let delay = self.delay.lock().ok().and_then(|d| *d);

        ctx.run(&line, async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match canned {
                Some(Ok(out)) => Ok(ProcessOutput {
                    output: out.output,
                    exit_code: out.exit_code,
                }),
                Some(Err(e)) => Err(e),
                None => Ok(ProcessOutput {
                    output: String::new(),
                    exit_code: 0,
                }),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{ErrorKind, GateError};

    fn ctx() -> CallContext {
        CallContext::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_scoped_response() {
        let exec = FakeProcessExecutor::new();
        exec.respond("git status", 1, "fatal");
        let out = exec.execute(&ctx(), "git", &["status".to_string()]).await.unwrap();
        assert_eq!(out.exit_code, 1);

        let out = exec.execute(&ctx(), "git", &["log".to_string()]).await.unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(exec.call_count("run"), 2);
        assert_eq!(exec.commands(), vec!["git status", "git log"]);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let exec = FakeProcessExecutor::new();
        exec.fail_with("run", &["mcpm ls"], GateError::unavailable("mcpm not found"));
        let err = exec.execute(&ctx(), "mcpm", &["ls".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_delay_hits_deadline() {
        let exec = FakeProcessExecutor::new();
        exec.set_delay(Duration::from_secs(5));
        let err = exec
            .execute(&CallContext::new(Duration::from_millis(20)), "sleep", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
