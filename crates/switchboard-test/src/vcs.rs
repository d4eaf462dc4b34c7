//! Fake version control and project workspace

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use switchboard_core::records::{ProjectAnalysis, ProjectConfigs, WriteOutcome};
use switchboard_core::{CallContext, GateError, Result, VersionControl, Workspace};

use crate::calls::{recorder_api, CallLog, Recorder};

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn not_a_repo(path: &Path) -> GateError {
    GateError::not_found(format!("'{}' is not a git repository", path.display()))
}

#[derive(Debug, Default)]
struct RepoState {
    repos: BTreeSet<PathBuf>,
    diffs: BTreeMap<PathBuf, String>,
}

/// Git stand-in: paths are repositories only once registered or `init`ed
#[derive(Debug, Clone, Default)]
pub struct FakeVersionControl {
    recorder: Recorder,
    state: Arc<Mutex<RepoState>>,
}

recorder_api!(FakeVersionControl);

impl FakeVersionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            recorder: Recorder::new(log),
            state: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_repo(self, path: impl Into<PathBuf>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.repos.insert(path.into());
        }
        self
    }

    #[must_use]
    pub fn with_diff(self, path: impl Into<PathBuf>, diff: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            let path = path.into();
            state.repos.insert(path.clone());
            state.diffs.insert(path, diff.to_string());
        }
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, RepoState>> {
        self.state
            .lock()
            .map_err(|_| GateError::execution("fake repository state poisoned"))
    }
}

#[async_trait]
impl VersionControl for FakeVersionControl {
    async fn is_repo(&self, _ctx: &CallContext, path: &Path) -> Result<bool> {
        if let Some(canned) = self.recorder.begin("is_repo", vec![path_arg(path)]) {
            return canned;
        }
        Ok(self.state()?.repos.contains(path))
    }

    async fn status(&self, _ctx: &CallContext, path: &Path) -> Result<String> {
        if let Some(canned) = self.recorder.begin("status", vec![path_arg(path)]) {
            return canned;
        }
        let state = self.state()?;
        if !state.repos.contains(path) {
            return Err(not_a_repo(path));
        }
        let mut out = "## main".to_string();
        if state.diffs.get(path).is_some_and(|d| !d.is_empty()) {
            out.push_str("\n M src/lib.rs");
        }
        Ok(out)
    }

    async fn diff(&self, _ctx: &CallContext, path: &Path, staged: bool) -> Result<String> {
        let mut args = vec![path_arg(path)];
        if staged {
            args.push("--staged".to_string());
        }
        if let Some(canned) = self.recorder.begin("diff", args) {
            return canned;
        }
        let state = self.state()?;
        if !state.repos.contains(path) {
            return Err(not_a_repo(path));
        }
        Ok(state.diffs.get(path).cloned().unwrap_or_default())
    }

    async fn init(&self, _ctx: &CallContext, path: &Path) -> Result<String> {
        if let Some(canned) = self.recorder.begin("init", vec![path_arg(path)]) {
            return canned;
        }
        self.state()?.repos.insert(path.to_path_buf());
        Ok(format!("Initialized empty Git repository in {}/.git/", path.display()))
    }
}

#[derive(Debug, Default)]
struct WorkspaceState {
    projects: BTreeMap<PathBuf, ProjectAnalysis>,
    files: BTreeMap<PathBuf, String>,
}

/// Project directories and written files, all in memory
#[derive(Debug, Clone, Default)]
pub struct FakeWorkspace {
    recorder: Recorder,
    state: Arc<Mutex<WorkspaceState>>,
}

recorder_api!(FakeWorkspace);

impl FakeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            recorder: Recorder::new(log),
            state: Arc::default(),
        }
    }

    /// Register a project directory with the given languages, most prominent
    /// first
    #[must_use]
    pub fn with_project(self, path: impl Into<PathBuf>, languages: &[&str]) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let analysis = ProjectAnalysis {
            path: path.display().to_string(),
            name,
            languages: languages.iter().map(|l| l.to_string()).collect(),
            key_files: Vec::new(),
            configs: ProjectConfigs::default(),
        };
        if let Ok(mut state) = self.state.lock() {
            state.projects.insert(path, analysis);
        }
        self
    }

    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.files.insert(path.into(), contents.to_string());
        }
        self
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.files.get(path.as_ref()).cloned())
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .map(|s| s.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn state(&self) -> Result<MutexGuard<'_, WorkspaceState>> {
        self.state
            .lock()
            .map_err(|_| GateError::execution("fake workspace state poisoned"))
    }
}

fn configs_for(dir: &Path, files: &BTreeMap<PathBuf, String>) -> ProjectConfigs {
    let has = |rel: &str| {
        let target = dir.join(rel);
        files.keys().any(|f| f == &target || f.starts_with(&target))
    };
    ProjectConfigs {
        git: has(".git"),
        pre_commit: has(".pre-commit-config.yaml"),
        gitleaks: has(".gitleaks.toml"),
        github_workflows: has(".github/workflows"),
        pr_agent: has(".github/workflows/pr_agent.yml"),
        dependabot: has(".github/dependabot.yml"),
    }
}

#[async_trait]
impl Workspace for FakeWorkspace {
    async fn analyze(&self, _ctx: &CallContext, path: &Path) -> Result<ProjectAnalysis> {
        if let Some(canned) = self.recorder.begin("analyze", vec![path_arg(path)]) {
            return canned;
        }
        let state = self.state()?;
        let mut analysis = state
            .projects
            .get(path)
            .cloned()
            .ok_or_else(|| {
                GateError::not_found(format!("project path '{}' does not exist", path.display()))
            })?;
        analysis.configs = configs_for(path, &state.files);
        analysis.key_files = state
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        Ok(analysis)
    }

    async fn write_file(
        &self,
        _ctx: &CallContext,
        path: &Path,
        contents: &str,
        overwrite: bool,
    ) -> Result<WriteOutcome> {
        let mut args = vec![path_arg(path)];
        if overwrite {
            args.push("--overwrite".to_string());
        }
        if let Some(canned) = self.recorder.begin("write_file", args) {
            return canned;
        }
        let mut state = self.state()?;
        let outcome = match (state.files.contains_key(path), overwrite) {
            (true, false) => return Ok(WriteOutcome::Skipped),
            (true, true) => WriteOutcome::Overwritten,
            (false, _) => WriteOutcome::Created,
        };
        state.files.insert(path.to_path_buf(), contents.to_string());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use switchboard_core::ErrorKind;

    fn ctx() -> CallContext {
        CallContext::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_non_repo_is_not_found() {
        let vcs = FakeVersionControl::new();
        let err = vcs.status(&ctx(), Path::new("/work/app")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!vcs.is_repo(&ctx(), Path::new("/work/app")).await.unwrap());

        vcs.init(&ctx(), Path::new("/work/app")).await.unwrap();
        assert!(vcs.is_repo(&ctx(), Path::new("/work/app")).await.unwrap());
    }

    #[tokio::test]
    async fn test_diff_is_recorded_with_flag() {
        let vcs = FakeVersionControl::new().with_diff("/work/app", "+added");
        let diff = vcs.diff(&ctx(), Path::new("/work/app"), true).await.unwrap();
        assert_eq!(diff, "+added");
        assert!(vcs.was_called("diff", &["/work/app", "--staged"]));
    }

    #[tokio::test]
    async fn test_write_file_semantics() {
        let ws = FakeWorkspace::new();
        let path = Path::new("/work/app/.gitignore");
        let created = ws.write_file(&ctx(), path, "a", false).await.unwrap();
        assert_eq!(created, WriteOutcome::Created);
        let skipped = ws.write_file(&ctx(), path, "b", false).await.unwrap();
        assert_eq!(skipped, WriteOutcome::Skipped);
        assert_eq!(ws.file(path).unwrap(), "a");
        let overwritten = ws.write_file(&ctx(), path, "c", true).await.unwrap();
        assert_eq!(overwritten, WriteOutcome::Overwritten);
        assert_eq!(ws.file(path).unwrap(), "c");
    }

    #[tokio::test]
    async fn test_analyze_sees_written_configs() {
        let ws = FakeWorkspace::new()
            .with_project("/work/app", &["rust"])
            .with_file("/work/app/.pre-commit-config.yaml", "repos: []");
        let analysis = ws.analyze(&ctx(), Path::new("/work/app")).await.unwrap();
        assert_eq!(analysis.name, "app");
        assert!(analysis.configs.pre_commit);
        assert!(!analysis.configs.gitleaks);

        let err = ws.analyze(&ctx(), Path::new("/work/missing")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
