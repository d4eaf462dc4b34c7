//! Switchboard Adapters
//!
//! Concrete implementations of the backend interfaces: local processes, the
//! package manager's CLI and HTTP API, compose, git and the local filesystem.

pub mod cli;
pub mod compose;
pub mod envelope;
pub mod git;
pub mod http;
pub mod process;
pub mod workspace;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use switchboard_core::{
    Backends, GatewayConfig, PackageManager, ProcessExecutor, Result, Transport,
};

pub use cli::CliPackageManager;
pub use compose::ComposeOrchestrator;
pub use git::GitVersionControl;
pub use http::HttpPackageManager;
pub use process::LocalProcessExecutor;
pub use workspace::LocalWorkspace;

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Pick the package-manager adapter for the configured transport
///
/// `auto` checks API health once; the choice holds for the life of the process.
pub async fn select_packages(
    config: &GatewayConfig,
    process: Arc<dyn ProcessExecutor>,
) -> Result<Arc<dyn PackageManager>> {
    let cli = || -> Arc<dyn PackageManager> {
        Arc::new(CliPackageManager::new(process.clone(), config.manager_bin.clone()))
    };

    match config.transport {
        Transport::Cli => {
            info!("Package manager transport: cli ({})", config.manager_bin);
            Ok(cli())
        }
        Transport::Http => {
            info!("Package manager transport: http ({})", config.api_url);
            Ok(Arc::new(HttpPackageManager::new(config.api_url.clone())?))
        }
        Transport::Auto => {
            let http = HttpPackageManager::new(config.api_url.clone())?;
            if http.health_check(HEALTH_CHECK_TIMEOUT).await {
                info!("Package manager API reachable at {}, using http", config.api_url);
                Ok(Arc::new(http))
            } else {
                warn!(
                    "Package manager API not reachable at {}, falling back to cli ({})",
                    config.api_url, config.manager_bin
                );
                Ok(cli())
            }
        }
    }
}

/// Build every backend from the startup configuration
pub async fn build_backends(config: &GatewayConfig) -> Result<Backends> {
    let process: Arc<dyn ProcessExecutor> = Arc::new(LocalProcessExecutor::new());
    let packages = select_packages(config, process.clone()).await?;

    Ok(Backends {
        containers: Arc::new(ComposeOrchestrator::new(
            process.clone(),
            config.compose_bin.clone(),
            config.compose_dir.clone(),
            config.daemon_container.clone(),
        )),
        vcs: Arc::new(GitVersionControl::new(process.clone(), config.git_bin.clone())),
        workspace: Arc::new(LocalWorkspace::new()),
        packages,
        process,
    })
}
