//! Local project workspace
//!
//! Scans a project directory and writes generated configuration files.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use switchboard_core::records::{ProjectAnalysis, ProjectConfigs, WriteOutcome};
use switchboard_core::{CallContext, GateError, Result, Workspace};

/// Marker files and the language they imply, in detection order
const LANGUAGE_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("go.mod", "go"),
    ("tsconfig.json", "typescript"),
    ("package.json", "node"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("setup.py", "python"),
    ("Gemfile", "ruby"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
];

const KEY_FILES: &[&str] = &[
    "Cargo.toml",
    "go.mod",
    "package.json",
    "tsconfig.json",
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "Gemfile",
    "pom.xml",
    "build.gradle",
    "Dockerfile",
    "docker-compose.yml",
    "compose.yaml",
    "Makefile",
    "README.md",
    ".gitignore",
];

#[derive(Debug, Clone, Default)]
pub struct LocalWorkspace;

impl LocalWorkspace {
    pub fn new() -> Self {
        Self
    }
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn scan(path: &Path) -> Result<ProjectAnalysis> {
    let meta = fs::metadata(path).await.map_err(|_| {
        GateError::not_found(format!("project path '{}' does not exist", path.display()))
    })?;
    if !meta.is_dir() {
        return Err(GateError::validation(format!(
            "project path '{}' is not a directory",
            path.display()
        )));
    }

    let mut languages: Vec<String> = Vec::new();
    for (marker, language) in LANGUAGE_MARKERS {
        if exists(&path.join(marker)).await && !languages.iter().any(|l| l == language) {
            languages.push(language.to_string());
        }
    }

    let mut key_files = Vec::new();
    for file in KEY_FILES {
        if exists(&path.join(file)).await {
            key_files.push(file.to_string());
        }
    }

    let workflows = path.join(".github").join("workflows");
    let configs = ProjectConfigs {
        git: exists(&path.join(".git")).await,
        pre_commit: exists(&path.join(".pre-commit-config.yaml")).await,
        gitleaks: exists(&path.join(".gitleaks.toml")).await,
        github_workflows: exists(&workflows).await,
        pr_agent: exists(&workflows.join("pr_agent.yml")).await,
        dependabot: exists(&path.join(".github").join("dependabot.yml")).await,
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(ProjectAnalysis {
        path: path.display().to_string(),
        name,
        languages,
        key_files,
        configs,
    })
}

async fn write(path: &Path, contents: &str, overwrite: bool) -> Result<WriteOutcome> {
    let existed = exists(path).await;
    if existed && !overwrite {
        return Ok(WriteOutcome::Skipped);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            GateError::execution(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    fs::write(path, contents)
        .await
        .map_err(|e| GateError::execution(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(if existed {
        WriteOutcome::Overwritten
    } else {
        WriteOutcome::Created
    })
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn analyze(&self, ctx: &CallContext, path: &Path) -> Result<ProjectAnalysis> {
        ctx.run("project analyze", scan(path)).await
    }

    async fn write_file(
        &self,
        ctx: &CallContext,
        path: &Path,
        contents: &str,
        overwrite: bool,
    ) -> Result<WriteOutcome> {
        ctx.run("write file", write(path, contents, overwrite)).await
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
    async fn test_analyze_detects_languages_and_configs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join(".pre-commit-config.yaml"), "repos: []\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".github/workflows")).unwrap();

        let analysis = LocalWorkspace::new().analyze(&ctx(), dir.path()).await.unwrap();
        assert_eq!(analysis.languages, vec!["rust", "node"]);
        assert_eq!(analysis.primary_language(), Some("rust"));
        assert!(analysis.key_files.contains(&"Cargo.toml".to_string()));
        assert!(analysis.configs.pre_commit);
        assert!(analysis.configs.github_workflows);
        assert!(!analysis.configs.git);
        assert!(!analysis.configs.pr_agent);
    }

    #[tokio::test]
    async fn test_analyze_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalWorkspace::new()
            .analyze(&ctx(), &dir.path().join("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("nope"));
    }

    #[tokio::test]
    async fn test_write_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(".github/workflows/pr_agent.yml");
        let ws = LocalWorkspace::new();

        let first = ws.write_file(&ctx(), &target, "a", false).await.unwrap();
        assert_eq!(first, WriteOutcome::Created);
        let second = ws.write_file(&ctx(), &target, "b", false).await.unwrap();
        assert_eq!(second, WriteOutcome::Skipped);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "a");
        assert_eq!(
            ws.write_file(&ctx(), &target, "c", true).await.unwrap(),
            WriteOutcome::Overwritten
        );
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "c");
    }
}
