//! Project DevOps stack
//!
//! `project devops` makes sure a project is a git repository and writes a
//! pre-commit config (with gitleaks), an optional AI review workflow and a
//! default `.gitignore`.

use serde::{Deserialize, Serialize};

use switchboard_core::records::WriteOutcome;
use switchboard_core::{CallContext, Result, VersionControl, Workspace};

use crate::actions::DevopsRequest;

const PRE_COMMIT_BASE: &str = "\
# See https://pre-commit.com for more information
repos:
  - repo: https://github.com/pre-commit/pre-commit-hooks
    rev: v4.5.0
    hooks:
      - id: trailing-whitespace
      - id: end-of-file-fixer
      - id: check-yaml
      - id: check-added-large-files
      - id: check-merge-conflict

  - repo: https://github.com/gitleaks/gitleaks
    rev: v8.18.2
    hooks:
      - id: gitleaks
";

const PRE_COMMIT_PYTHON: &str = "
  - repo: https://github.com/astral-sh/ruff-pre-commit
    rev: v0.3.0
    hooks:
      - id: ruff
        args: [ --fix ]
      - id: ruff-format
";

const PRE_COMMIT_GO: &str = "
  - repo: https://github.com/dnephin/pre-commit-golang
    rev: v0.5.1
    hooks:
      - id: go-fmt
";

const PRE_COMMIT_NODE: &str = "
  - repo: https://github.com/pre-commit/mirrors-prettier
    rev: v4.0.0
    hooks:
      - id: prettier
";

const PRE_COMMIT_RUST: &str = "
  - repo: https://github.com/doublify/pre-commit-rust
    rev: v1.0
    hooks:
      - id: fmt
      - id: clippy
";

pub const PR_AGENT_WORKFLOW: &str = r#"name: AI Code Review

on:
  pull_request:
    types: [opened, reopened, ready_for_review, synchronize]
  issue_comment:
    types: [created, edited]

permissions:
  issues: write
  pull-requests: write
  contents: read

jobs:
  pr_agent:
    runs-on: ubuntu-latest
    name: PR Agent
    if: ${{ github.event.sender.type != 'Bot' }}
    steps:
      - id: pr-agent
        uses: Codium-ai/pr-agent@main
        env:
          OPENAI_KEY: ${{ secrets.OPENAI_API_KEY }}
          GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}
          PR_REVIEW__REQUIRE_TESTS_REVIEW: "true"
"#;

pub const DEFAULT_GITIGNORE: &str =
    ".env\n.venv/\nnode_modules/\ndist/\ntarget/\n*.log\n.DS_Store\n";

/// Pre-commit config for a project type; unknown types get the base hooks
pub fn pre_commit_config(project_type: Option<&str>) -> String {
    let extra = match project_type {
        Some("python") => PRE_COMMIT_PYTHON,
        Some("go") => PRE_COMMIT_GO,
        Some("node" | "typescript" | "javascript") => PRE_COMMIT_NODE,
        Some("rust") => PRE_COMMIT_RUST,
        _ => "",
    };
    format!("{}{}", PRE_COMMIT_BASE, extra)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file: String,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevopsReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    /// `initialized` or `existing`
    pub git: String,
    pub files: Vec<FileReport>,
}

/// Apply the stack to `request.path`
///
/// A missing project directory fails before anything is written. Without an
/// explicit project type the primary detected language is used.
pub async fn apply(
    ctx: &CallContext,
    vcs: &dyn VersionControl,
    workspace: &dyn Workspace,
    request: &DevopsRequest,
) -> Result<DevopsReport> {
    let analysis = workspace.analyze(ctx, &request.path).await?;
    let project_type = request
        .project_type
        .clone()
        .or_else(|| analysis.primary_language().map(str::to_string));

    let git = if vcs.is_repo(ctx, &request.path).await? {
        "existing"
    } else {
        vcs.init(ctx, &request.path).await?;
        "initialized"
    };

    let mut plan: Vec<(&str, String, bool)> = vec![(
        ".pre-commit-config.yaml",
        pre_commit_config(project_type.as_deref()),
        request.force,
    )];
    if request.enable_ai_review {
        plan.push((".github/workflows/pr_agent.yml", PR_AGENT_WORKFLOW.to_string(), request.force));
    }
    // An existing .gitignore is never replaced
    plan.push((".gitignore", DEFAULT_GITIGNORE.to_string(), false));

    let mut files = Vec::new();
    for (file, contents, overwrite) in plan {
        let outcome = workspace
            .write_file(ctx, &request.path.join(file), &contents, overwrite)
            .await?;
        files.push(FileReport {
            file: file.to_string(),
            outcome,
        });
    }

    Ok(DevopsReport {
        path: request.path.display().to_string(),
        project_type,
        git: git.to_string(),
        files,
    })
}
