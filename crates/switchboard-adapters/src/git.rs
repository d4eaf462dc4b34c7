//! Version control through the git CLI
//!
//! Every command runs as `git -C <path> ...`. Anything but `is_repo` and
//! `init` first checks that the path is a work tree, so an empty diff is never
//! mistaken for a clean repository.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use switchboard_core::{
    CallContext, CommandSpec, GateError, ProcessExecutor, Result, VersionControl,
};

pub struct GitVersionControl {
    exec: Arc<dyn ProcessExecutor>,
    bin: String,
}

impl GitVersionControl {
    pub fn new(exec: Arc<dyn ProcessExecutor>, bin: impl Into<String>) -> Self {
        Self {
            exec,
            bin: bin.into(),
        }
    }

    fn command(&self, path: &Path, args: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.bin)
            .arg("-C")
            .arg(path.to_string_lossy().to_string())
            .args(args.iter().copied())
    }

    async fn git(&self, ctx: &CallContext, path: &Path, args: &[&str]) -> Result<String> {
        let spec = self.command(path, args);
        let label = spec.to_string();
        self.exec.run(ctx, spec).await?.into_success(&label)
    }

    async fn require_repo(&self, ctx: &CallContext, path: &Path) -> Result<()> {
        if self.is_repo(ctx, path).await? {
            Ok(())
        } else {
            Err(GateError::not_found(format!(
                "'{}' is not a git repository",
                path.display()
            )))
        }
    }
}

#[async_trait]
impl VersionControl for GitVersionControl {
    async fn is_repo(&self, ctx: &CallContext, path: &Path) -> Result<bool> {
        let spec = self.command(path, &["rev-parse", "--is-inside-work-tree"]);
        let output = self.exec.run(ctx, spec).await?;
        Ok(output.success() && output.output.lines().next().map(str::trim) == Some("true"))
    }

    async fn status(&self, ctx: &CallContext, path: &Path) -> Result<String> {
        self.require_repo(ctx, path).await?;
        self.git(ctx, path, &["status", "--short", "--branch"]).await
    }

    async fn diff(&self, ctx: &CallContext, path: &Path, staged: bool) -> Result<String> {
        self.require_repo(ctx, path).await?;
        if staged {
            self.git(ctx, path, &["diff", "--staged"]).await
        } else {
            self.git(ctx, path, &["diff"]).await
        }
    }

    async fn init(&self, ctx: &CallContext, path: &Path) -> Result<String> {
        self.git(ctx, path, &["init"]).await
    }
}
