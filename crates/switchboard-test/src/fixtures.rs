//! Ready-made backend sets for tests

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::records::ServerRecord;
use switchboard_core::{Backends, CallContext};

use crate::calls::CallLog;
use crate::containers::FakeContainers;
use crate::packages::FakePackageManager;
use crate::process::FakeProcessExecutor;
use crate::vcs::{FakeVersionControl, FakeWorkspace};

/// One fake per backend, all writing to a single [`CallLog`]
///
/// Keep the struct around to set up state and inspect calls; hand
/// [`FakeBackends::backends`] to the code under test.
#[derive(Debug, Clone)]
pub struct FakeBackends {
    pub log: CallLog,
    pub process: FakeProcessExecutor,
    pub packages: FakePackageManager,
    pub containers: FakeContainers,
    pub vcs: FakeVersionControl,
    pub workspace: FakeWorkspace,
}

impl Default for FakeBackends {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackends {
    pub fn new() -> Self {
        let log = CallLog::new();
        Self {
            process: FakeProcessExecutor::with_log(log.clone()),
            packages: FakePackageManager::with_log(log.clone()),
            containers: FakeContainers::with_log(log.clone()),
            vcs: FakeVersionControl::with_log(log.clone()),
            workspace: FakeWorkspace::with_log(log.clone()),
            log,
        }
    }

    #[must_use]
    pub fn with_packages(
        mut self,
        f: impl FnOnce(FakePackageManager) -> FakePackageManager,
    ) -> Self {
        self.packages = f(self.packages);
        self
    }

    #[must_use]
    pub fn with_containers(mut self, f: impl FnOnce(FakeContainers) -> FakeContainers) -> Self {
        self.containers = f(self.containers);
        self
    }

    #[must_use]
    pub fn with_vcs(mut self, f: impl FnOnce(FakeVersionControl) -> FakeVersionControl) -> Self {
        self.vcs = f(self.vcs);
        self
    }

    #[must_use]
    pub fn with_workspace(mut self, f: impl FnOnce(FakeWorkspace) -> FakeWorkspace) -> Self {
        self.workspace = f(self.workspace);
        self
    }

    pub fn backends(&self) -> Backends {
        Backends {
            process: Arc::new(self.process.clone()),
            packages: Arc::new(self.packages.clone()),
            containers: Arc::new(self.containers.clone()),
            vcs: Arc::new(self.vcs.clone()),
            workspace: Arc::new(self.workspace.clone()),
        }
    }

    /// Calls across every backend
    pub fn total_calls(&self) -> usize {
        self.log.total()
    }
}

/// A context with a generous deadline
pub fn test_context() -> CallContext {
    CallContext::new(Duration::from_secs(10))
}

/// An installed server record with a description
pub fn server_record(name: &str) -> ServerRecord {
    let mut record = ServerRecord::new(name);
    record.description = format!("{} server", name);
    record.installed = true;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_log_orders_calls_across_backends() {
        let fakes = FakeBackends::new()
            .with_packages(|p| p.with_installed(&["alpha"]))
            .with_containers(|c| c.with_services(&["api"]));
        let backends = fakes.backends();
        let ctx = test_context();

        backends.packages.list(&ctx).await.unwrap();
        backends.containers.compose_status(&ctx).await.unwrap();
        backends.packages.info(&ctx, "alpha").await.unwrap();

        let ops: Vec<String> = fakes.log.calls().into_iter().map(|c| c.operation).collect();
        assert_eq!(ops, vec!["list", "compose_status", "info"]);
        assert_eq!(fakes.total_calls(), 3);
        assert_eq!(fakes.packages.call_count("list"), 1);
    }
}
