//! Package manager driven through its command-line interface
//!
//! Every operation runs `<bin> <args...> --json` non-interactively and decodes
//! the JSON envelope from the captured output.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use switchboard_core::records::{
    ClientEdit, ClientRecord, DoctorReport, InstallOutcome, MigrateOutcome, ProfileEdit,
    ProfileRecord, ServerRecord, ServerSpec, ShareOptions, ShareRecord,
};
use switchboard_core::{
    CallContext, CommandSpec, GateError, PackageManager, ProcessExecutor, Result,
};

use crate::envelope::{decode, decode_list, find_envelope, install_outcome, mention, Envelope};

const NON_INTERACTIVE_ENV: [(&str, &str); 3] = [
    ("MCPM_NON_INTERACTIVE", "true"),
    ("MCPM_FORCE", "true"),
    ("NO_COLOR", "true"),
];

pub struct CliPackageManager {
    exec: Arc<dyn ProcessExecutor>,
    bin: String,
}

impl CliPackageManager {
    pub fn new(exec: Arc<dyn ProcessExecutor>, bin: impl Into<String>) -> Self {
        Self {
            exec,
            bin: bin.into(),
        }
    }

    /// Build the command for `args`, with `--json` and the non-interactive env
    pub fn command(&self, args: &[String]) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.bin).args(args.iter().cloned()).arg("--json");
        for (key, value) in NON_INTERACTIVE_ENV {
            spec = spec.env(key, value);
        }
        spec
    }

    async fn call(&self, ctx: &CallContext, args: Vec<String>) -> Result<Envelope> {
        let spec = self.command(&args);
        let label = spec.to_string();
        let output = self.exec.run(ctx, spec).await?;

        match find_envelope(&output.output) {
            Some(envelope) => {
                if !envelope.success {
                    debug!("{} reported {:?}", label, envelope.error_code());
                }
                Ok(envelope)
            }
            None if output.success() => Err(GateError::execution(format!(
                "{} returned no JSON response: {}",
                label,
                output.output.trim()
            ))),
            None => {
                warn!("{} failed with exit code {}", label, output.exit_code);
                Err(output
                    .into_success(&label)
                    .err()
                    .unwrap_or_else(|| GateError::execution(format!("{} failed", label))))
            }
        }
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn push_list(args: &mut Vec<String>, flag: &str, values: &[String]) {
    if !values.is_empty() {
        args.push(flag.to_string());
        args.push(values.join(","));
    }
}

fn server_flags(args: &mut Vec<String>, spec: &ServerSpec) {
    if let Some(transport) = spec.transport {
        args.extend(["--type".to_string(), transport.as_str().to_string()]);
    }
    if let Some(command) = &spec.command {
        args.extend(["--command".to_string(), command.clone()]);
    }
    if !spec.args.is_empty() {
        args.extend(["--args".to_string(), spec.args.join(" ")]);
    }
    if let Some(url) = &spec.url {
        args.extend(["--url".to_string(), url.clone()]);
    }
    if !spec.env.is_empty() {
        let pairs: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        args.extend(["--env".to_string(), pairs.join(",")]);
    }
    if let Some(description) = &spec.description {
        args.extend(["--description".to_string(), description.clone()]);
    }
}

fn config_value_arg(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PackageManager for CliPackageManager {
    async fn doctor(&self, ctx: &CallContext) -> Result<DoctorReport> {
        self.call(ctx, args(["doctor"])).await?.decode("doctor")
    }

    async fn install(&self, ctx: &CallContext, name: &str) -> Result<InstallOutcome> {
        install_outcome(name, self.call(ctx, args(["install", name])).await?)
    }

    async fn uninstall(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.call(ctx, args(["uninstall", name]))
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "server", name))
    }

    async fn list(&self, ctx: &CallContext) -> Result<Vec<ServerRecord>> {
        decode_list(self.call(ctx, args(["ls"])).await?.into_data()?, "servers")
    }

    async fn search(&self, ctx: &CallContext, query: Option<&str>) -> Result<Vec<ServerRecord>> {
        let mut argv = args(["search"]);
        if let Some(q) = query {
            argv.push(q.to_string());
        }
        decode_list(self.call(ctx, argv).await?.into_data()?, "servers")
    }

    async fn info(&self, ctx: &CallContext, name: &str) -> Result<ServerRecord> {
        let data = self
            .call(ctx, args(["info", name]))
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", name))?;
        if data.is_null() {
            return Err(GateError::not_found(format!("server '{}' not found", name)));
        }
        decode(data, "server")
    }

    async fn create_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        let mut argv = args(["new", spec.name.as_str()]);
        server_flags(&mut argv, spec);
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", &spec.name))
            .and_then(|data| decode(data, "server"))
    }

    async fn edit_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        let mut argv = args(["edit", spec.name.as_str()]);
        server_flags(&mut argv, spec);
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", &spec.name))
            .and_then(|data| decode(data, "server"))
    }

    async fn profile_list(&self, ctx: &CallContext) -> Result<Vec<ProfileRecord>> {
        decode_list(self.call(ctx, args(["profile", "ls"])).await?.into_data()?, "profiles")
    }

    async fn profile_create(
        &self,
        ctx: &CallContext,
        name: &str,
        servers: &[String],
    ) -> Result<ProfileRecord> {
        let mut argv = args(["profile", "create", name]);
        push_list(&mut argv, "--servers", servers);
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "profile", name))
            .and_then(|data| decode(data, "profile"))
    }

    async fn profile_edit(
        &self,
        ctx: &CallContext,
        name: &str,
        edit: &ProfileEdit,
    ) -> Result<ProfileRecord> {
        let mut argv = args(["profile", "edit", name]);
        if let Some(new_name) = &edit.new_name {
            argv.extend(["--name".to_string(), new_name.clone()]);
        }
        push_list(&mut argv, "--add-server", &edit.add_servers);
        push_list(&mut argv, "--remove-server", &edit.remove_servers);
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "profile", name))
            .and_then(|data| decode(data, "profile"))
    }

    async fn profile_delete(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.call(ctx, args(["profile", "rm", name]))
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "profile", name))
    }

    async fn client_list(&self, ctx: &CallContext) -> Result<Vec<ClientRecord>> {
        decode_list(self.call(ctx, args(["client", "ls"])).await?.into_data()?, "clients")
    }

    async fn client_edit(
        &self,
        ctx: &CallContext,
        name: &str,
        edit: &ClientEdit,
    ) -> Result<ClientRecord> {
        let mut argv = args(["client", "edit", name]);
        push_list(&mut argv, "--add-server", &edit.add_servers);
        push_list(&mut argv, "--remove-server", &edit.remove_servers);
        push_list(&mut argv, "--add-profile", &edit.add_profiles);
        push_list(&mut argv, "--remove-profile", &edit.remove_profiles);
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "client", name))
            .and_then(|data| decode(data, "client"))
    }

    async fn config_get(&self, ctx: &CallContext, key: &str) -> Result<Value> {
        self.call(ctx, args(["config", "get", key]))
            .await?
            .into_data()
            .map_err(|e| mention(e, "config key", key))
    }

    async fn config_set(&self, ctx: &CallContext, key: &str, value: &Value) -> Result<()> {
        let argv = vec![
            "config".to_string(),
            "set".to_string(),
            key.to_string(),
            config_value_arg(value),
        ];
        self.call(ctx, argv)
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "config key", key))
    }

    async fn config_list(&self, ctx: &CallContext) -> Result<BTreeMap<String, Value>> {
        let data = self.call(ctx, args(["config", "ls"])).await?.into_data()?;
        if data.is_null() {
            return Ok(BTreeMap::new());
        }
        decode(data, "config")
    }

    async fn migrate(&self, ctx: &CallContext) -> Result<MigrateOutcome> {
        self.call(ctx, args(["migrate"])).await?.decode("migrate")
    }

    async fn share_start(
        &self,
        ctx: &CallContext,
        name: &str,
        options: &ShareOptions,
    ) -> Result<ShareRecord> {
        let mut argv = args(["share", "start", name]);
        if let Some(port) = options.port {
            argv.extend(["--port".to_string(), port.to_string()]);
        }
        if options.no_auth {
            argv.push("--no-auth".to_string());
        }
        self.call(ctx, argv)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", name))
            .and_then(|data| decode(data, "share"))
    }

    async fn share_stop(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.call(ctx, args(["share", "stop", name]))
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "shared server", name))
    }

    async fn share_list(&self, ctx: &CallContext) -> Result<Vec<ShareRecord>> {
        decode_list(self.call(ctx, args(["share", "ls"])).await?.into_data()?, "shares")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use switchboard_core::ErrorKind;
    use switchboard_test::FakeProcessExecutor;

    fn manager(exec: &FakeProcessExecutor) -> CliPackageManager {
        CliPackageManager::new(Arc::new(exec.clone()), "mcpm")
    }

    fn ctx() -> CallContext {
        CallContext::new(Duration::from_secs(5))
    }

    #[test]
    fn test_command_is_non_interactive() {
        let exec = FakeProcessExecutor::new();
        let spec = manager(&exec).command(&args(["install", "alpha"]));
        assert_eq!(spec.to_string(), "mcpm install alpha --json");
        assert!(spec.env.contains(&("MCPM_NON_INTERACTIVE".to_string(), "true".to_string())));
        assert!(spec.env.contains(&("NO_COLOR".to_string(), "true".to_string())));
    }

    #[tokio::test]
    async fn test_info_not_found_names_server() {
        let exec = FakeProcessExecutor::new();
        exec.respond(
            "mcpm info ghost --json",
            0,
            &json!({
                "success": false,
                "error": {"code": "SERVER_NOT_FOUND", "message": "Server not found"}
            })
            .to_string(),
        );
        let err = manager(&exec).info(&ctx(), "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("ghost"));
    }

    #[tokio::test]
    async fn test_install_twice() {
        let exec = FakeProcessExecutor::new();
        exec.respond(
            "mcpm install alpha --json",
            0,
            &json!({"success": true, "data": {"name": "alpha", "method": "npx"}}).to_string(),
        );
        let pm = manager(&exec);
        let first = pm.install(&ctx(), "alpha").await.unwrap();
        assert!(!first.already_installed);
        assert_eq!(first.method.as_deref(), Some("npx"));

        exec.respond(
            "mcpm install alpha --json",
            1,
            &json!({"success": false, "error": {"code": "ALREADY_INSTALLED", "message": "exists"}})
                .to_string(),
        );
        let second = pm.install(&ctx(), "alpha").await.unwrap();
        assert!(second.already_installed);
    }

    #[tokio::test]
    async fn test_non_zero_exit_without_envelope() {
        let exec = FakeProcessExecutor::new();
        exec.respond("mcpm ls --json", 2, "Traceback: boom");
        let err = manager(&exec).list(&ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendExecution);
        assert!(err.message().contains("boom"));
    }

    #[tokio::test]
    async fn test_config_set_passes_strings_raw() {
        let exec = FakeProcessExecutor::new();
        exec.respond(
            "mcpm config set theme dark --json",
            0,
            &json!({"success": true, "data": null}).to_string(),
        );
        manager(&exec)
            .config_set(&ctx(), "theme", &json!("dark"))
            .await
            .unwrap();
        assert_eq!(exec.call_count("run"), 1);
    }
}
