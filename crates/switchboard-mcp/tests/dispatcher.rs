//! End-to-end dispatcher behaviour against the in-memory backends

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use switchboard_adapters::{ComposeOrchestrator, LocalProcessExecutor, LocalWorkspace};
use switchboard_core::{ErrorKind, GateError, GatewayConfig, OperationResult};
use switchboard_mcp::actions::ToolName;
use switchboard_mcp::Dispatcher;
use switchboard_test::FakeBackends;

fn dispatcher(fakes: &FakeBackends) -> Dispatcher {
    Dispatcher::new(fakes.backends(), GatewayConfig::with_root("/work"))
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn call(d: &Dispatcher, tool: &str, value: Value) -> OperationResult {
    d.call(tool, args(value)).await
}

fn data(result: &OperationResult) -> &Value {
    assert!(result.is_success(), "expected success, got {}", result.text());
    result.data().unwrap()
}

#[tokio::test]
async fn test_invalid_action_lists_valid_actions_for_every_tool() {
    let fakes = FakeBackends::new();
    let d = dispatcher(&fakes);

    for tool in ToolName::ALL.iter().filter(|t| **t != ToolName::Status) {
        let result = call(&d, tool.as_str(), json!({"action": "frobnicate"})).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
        let message = result.text();
        assert!(message.contains("Invalid action 'frobnicate'"), "{}", message);
        for action in tool.actions() {
            assert!(message.contains(action), "{} missing from: {}", action, message);
        }
    }
    assert_eq!(fakes.total_calls(), 0);
}

#[tokio::test]
async fn test_missing_arguments_never_reach_a_backend() {
    let fakes = FakeBackends::new();
    let d = dispatcher(&fakes);

    let cases = [
        ("server", json!({"action": "info"})),
        ("server", json!({"action": "install"})),
        ("server", json!({"action": "create", "name": "x"})),
        ("server", json!({"action": "create", "name": "x", "type": "stdio"})),
        ("server", json!({"action": "edit", "name": "x"})),
        ("profile", json!({"action": "create"})),
        ("profile", json!({"action": "edit", "name": "web"})),
        ("client", json!({"action": "edit", "name": "cursor"})),
        ("config", json!({"action": "get"})),
        ("config", json!({"action": "set", "key": "k"})),
        ("config", json!({"action": "import"})),
        ("share", json!({"action": "start"})),
        ("share", json!({"action": "start", "name": "alpha", "port": 70000})),
        ("server", json!({})),
    ];
    for (tool, value) in cases {
        let result = call(&d, tool, value.clone()).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Validation), "{} {}", tool, value);
    }
    assert_eq!(fakes.total_calls(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_validation_error() {
    let fakes = FakeBackends::new();
    let result = call(&dispatcher(&fakes), "teleport", json!({"action": "list"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
    assert!(result.text().contains("Known tools: server, profile"));
}

#[tokio::test]
async fn test_reads_do_not_mutate() {
    let fakes = FakeBackends::new()
        .with_packages(|p| {
            p.with_installed(&["alpha"])
                .with_profile("web", &["alpha"])
                .with_client("cursor")
                .with_config("log_level", json!("info"))
        })
        .with_containers(|c| c.with_running(&["mcpm-daemon"]));
    let d = dispatcher(&fakes);

    for _ in 0..2 {
        data(&call(&d, "server", json!({"action": "list"})).await);
        data(&call(&d, "server", json!({"action": "info", "name": "alpha"})).await);
        data(&call(&d, "profile", json!({"action": "list"})).await);
        data(&call(&d, "client", json!({"action": "list"})).await);
        data(&call(&d, "config", json!({"action": "list"})).await);
        data(&call(&d, "system", json!({"action": "docker_status"})).await);
        data(&call(&d, "status", json!({})).await);
    }
    assert_eq!(fakes.packages.mutation_count(), 0);
    assert_eq!(fakes.containers.mutation_count(), 0);
}

#[tokio::test]
async fn test_install_twice_is_a_no_op_the_second_time() {
    let fakes = FakeBackends::new();
    let d = dispatcher(&fakes);

    let first = call(&d, "server", json!({"action": "install", "name": "alpha"})).await;
    assert_eq!(data(&first)["already_installed"], false);
    assert_eq!(fakes.packages.call_count("install"), 1);

    let second = call(&d, "server", json!({"action": "install", "name": "alpha"})).await;
    assert_eq!(data(&second)["already_installed"], true);
    assert_eq!(fakes.packages.call_count("install"), 2);
    assert_eq!(fakes.packages.mutation_count(), 1);

    let info = call(&d, "server", json!({"action": "info", "name": "alpha"})).await;
    assert_eq!(data(&info)["installed"], true);
}

#[tokio::test]
async fn test_info_on_unknown_server_is_not_found() {
    let fakes = FakeBackends::new();
    let d = dispatcher(&fakes);
    let result = call(&d, "server", json!({"action": "info", "name": "ghost"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    assert!(result.data().is_none());
}

#[tokio::test]
async fn test_docker_logs_are_clamped() {
    let fakes = FakeBackends::new().with_containers(|c| c.with_services(&["api"]));
    let d = dispatcher(&fakes);

    let request = json!({"action": "docker_logs", "service": "api", "lines": 10000});
    let result = call(&d, "system", request).await;
    let logs = data(&result);
    assert_eq!(logs["lines"], 500);
    assert_eq!(logs["requested"], 10000);
    assert_eq!(logs["clamped"], true);
    assert!(fakes.containers.was_called("compose_logs", &["500", "api"]));
}

#[tokio::test]
async fn test_config_export_import_round_trip() {
    let source = FakeBackends::new().with_packages(|p| {
        p.with_config("log_level", json!("debug"))
            .with_config("github_token", json!("ghp_secret"))
            .with_config("registry", json!({"url": "https://example.test"}))
    });
    let export = call(&dispatcher(&source), "config", json!({"action": "export"})).await;
    let snapshot = data(&export).clone();
    assert_eq!(snapshot["redacted"], json!(["github_token"]));
    assert!(snapshot["values"].get("github_token").is_none());

    let target = FakeBackends::new();
    let import = call(
        &dispatcher(&target),
        "config",
        json!({"action": "import", "payload": snapshot.to_string()}),
    )
    .await;
    let report = data(&import);
    assert_eq!(report["applied"], json!(["log_level", "registry"]));
    assert_eq!(report["redacted_skipped"], json!(["github_token"]));

    let config = target.packages.config_snapshot();
    assert_eq!(config.get("log_level"), Some(&json!("debug")));
    assert_eq!(config.get("registry"), Some(&json!({"url": "https://example.test"})));
    assert!(!config.contains_key("github_token"));
}

#[tokio::test]
async fn test_rebuild_against_missing_container_cli_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let fakes = FakeBackends::new();
    let mut backends = fakes.backends();
    backends.containers = Arc::new(ComposeOrchestrator::new(
        Arc::new(LocalProcessExecutor::new()),
        "switchboard-missing-docker",
        dir.path(),
        "mcp-daemon",
    ));
    let d = Dispatcher::new(backends, GatewayConfig::with_root(dir.path()));

    let result = call(&d, "system", json!({"action": "rebuild"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::BackendUnavailable));
    assert!(result.text().starts_with("compose build failed:"), "{}", result.text());
    assert!(result.text().ends_with("(completed steps: none)"), "{}", result.text());
}

#[tokio::test]
async fn test_bootstrap_reports_partial_progress() {
    let fakes = FakeBackends::new();
    fakes
        .packages
        .fail_with("install", &["brave-search"], GateError::execution("registry returned 502"));
    let d = dispatcher(&fakes);

    let result = call(&d, "system", json!({"action": "bootstrap"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::BackendExecution));
    assert_eq!(
        result.text(),
        concat!(
            "install brave-search failed: registry returned 502 ",
            "(completed steps: doctor, install context7)"
        )
    );
    assert!(!fakes.packages.was_called("install", &["github"]));
    assert_eq!(fakes.containers.call_count("compose_up"), 0);
}

#[tokio::test]
async fn test_bootstrap_runs_every_step() {
    let fakes = FakeBackends::new()
        .with_packages(|p| p.with_installed(&["github"]))
        .with_containers(|c| c.with_services(&["mcpm-daemon"]));
    let d = dispatcher(&fakes);

    let result = call(&d, "system", json!({"action": "bootstrap"})).await;
    let report = data(&result);
    assert_eq!(report["completed"], true);
    let steps: Vec<&str> = report["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["step"].as_str().unwrap())
        .collect();
    assert_eq!(
        steps,
        vec!["doctor", "install context7", "install brave-search", "install github", "compose up"]
    );
    assert_eq!(report["steps"][3]["detail"], "already installed");
    assert_eq!(fakes.containers.service_state("mcpm-daemon").as_deref(), Some("running"));
}

#[tokio::test]
async fn test_project_test_runs_detected_suites() {
    let fakes = FakeBackends::new().with_workspace(|w| {
        w.with_project("/work/app", &["rust", "typescript", "javascript"])
    });
    fakes.process.respond("cargo test", 0, "test result: ok. 3 passed");
    let d = dispatcher(&fakes);

    let result = call(&d, "project", json!({"action": "test", "path": "app"})).await;
    let report = data(&result);
    assert_eq!(report["completed"], true);
    assert_eq!(fakes.process.commands(), vec!["cargo test", "npm test"]);
    assert_eq!(report["steps"][0]["detail"], "test result: ok. 3 passed");
}

#[tokio::test]
async fn test_project_test_failure_names_the_suite() {
    let fakes = FakeBackends::new().with_workspace(|w| w.with_project("/work/app", &["python"]));
    fakes.process.respond("pytest", 1, "1 failed");
    let d = dispatcher(&fakes);

    let result = call(&d, "project", json!({"action": "test", "path": "/work/app"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::BackendExecution));
    assert_eq!(
        result.text(),
        "python: pytest failed: pytest exited with code 1: 1 failed (completed steps: none)"
    );
}

#[tokio::test]
async fn test_project_test_without_suite_is_not_found() {
    let fakes = FakeBackends::new().with_workspace(|w| w.with_project("/work/docs", &[]));
    let d = dispatcher(&fakes);

    let result = call(&d, "project", json!({"action": "test", "path": "docs"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    assert!(fakes.process.commands().is_empty());

    let request = json!({"action": "test", "path": "docs", "languages": ["cobol"]});
    let result = call(&d, "project", request).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn test_devops_against_real_workspace() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    std::fs::write(dir.path().join(".gitignore"), "custom\n").unwrap();

    let fakes = FakeBackends::new();
    let mut backends = fakes.backends();
    backends.workspace = Arc::new(LocalWorkspace::new());
    let d = Dispatcher::new(backends, GatewayConfig::with_root(dir.path()));

    let result = call(&d, "project", json!({"action": "devops", "enable_ai_review": true})).await;
    let report = data(&result);
    assert_eq!(report["project_type"], "rust");
    assert_eq!(report["git"], "initialized");
    assert!(dir.path().join(".pre-commit-config.yaml").exists());
    assert!(dir.path().join(".github/workflows/pr_agent.yml").exists());
    assert_eq!(std::fs::read_to_string(dir.path().join(".gitignore")).unwrap(), "custom\n");
    assert!(fakes.vcs.was_called("init", &[&dir.path().display().to_string()]));
}

#[tokio::test]
async fn test_share_lifecycle() {
    let fakes = FakeBackends::new().with_packages(|p| p.with_installed(&["alpha"]));
    let d = dispatcher(&fakes);

    data(&call(&d, "share", json!({"action": "start", "name": "alpha", "port": 8080})).await);
    let again = call(&d, "share", json!({"action": "start", "name": "alpha"})).await;
    assert_eq!(again.error_kind(), Some(ErrorKind::Conflict));

    let listed = call(&d, "share", json!({"action": "list"})).await;
    assert_eq!(data(&listed).as_array().unwrap().len(), 1);

    data(&call(&d, "share", json!({"action": "stop", "name": "alpha"})).await);
    let stopped = call(&d, "share", json!({"action": "stop", "name": "alpha"})).await;
    assert_eq!(stopped.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_diff_outside_a_repository_is_not_found() {
    let fakes = FakeBackends::new().with_vcs(|v| v.with_diff("/work/app", "+added"));
    let d = dispatcher(&fakes);

    let result = call(&d, "project", json!({"action": "diff", "path": "scratch"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::NotFound));
    assert!(result.text().contains("/work/scratch"), "{}", result.text());

    let request = json!({"action": "diff", "path": "app", "staged": true});
    let result = call(&d, "project", request).await;
    assert_eq!(data(&result)["diff"], "+added");
    assert!(fakes.vcs.was_called("diff", &["/work/app", "--staged"]));
}

#[tokio::test]
async fn test_slow_backend_surfaces_as_timeout() {
    let fakes = FakeBackends::new().with_workspace(|w| w.with_project("/work/app", &["rust"]));
    fakes.process.set_delay(Duration::from_secs(5));
    let mut config = GatewayConfig::with_root("/work");
    config.long_timeout = Duration::from_millis(100);
    let d = Dispatcher::new(fakes.backends(), config);

    let result = call(&d, "project", json!({"action": "test", "path": "app"})).await;
    assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    let message = result.text();
    assert!(message.starts_with("rust: cargo test failed:"), "{}", message);
    assert!(message.contains("timed out"), "{}", message);
    assert!(result.data().is_none());
}
