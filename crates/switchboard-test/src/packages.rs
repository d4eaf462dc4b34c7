//! Fake package manager with in-memory state

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use switchboard_core::records::{
    ClientEdit, ClientRecord, DoctorReport, InstallOutcome, MigrateOutcome, ProfileEdit,
    ProfileRecord, ServerRecord, ServerSpec, ShareOptions, ShareRecord,
};
use switchboard_core::{CallContext, GateError, PackageManager, Result};

use crate::calls::{recorder_api, CallLog, Recorder};

#[derive(Debug, Default)]
struct State {
    catalog: BTreeMap<String, ServerRecord>,
    installed: BTreeMap<String, ServerRecord>,
    profiles: BTreeMap<String, ProfileRecord>,
    clients: BTreeMap<String, ClientRecord>,
    config: BTreeMap<String, Value>,
    shares: BTreeMap<String, ShareRecord>,
    mutations: u64,
}

/// In-memory package manager
///
/// Behaves like a small real backend: installs are idempotent, unknown names
/// are `NOT_FOUND`, duplicates are `CONFLICT`. Every successful write bumps
/// [`FakePackageManager::mutation_count`]; reads never do. Canned responses
/// take precedence over the in-memory behavior.
#[derive(Debug, Clone, Default)]
pub struct FakePackageManager {
    recorder: Recorder,
    state: Arc<Mutex<State>>,
}

recorder_api!(FakePackageManager);

fn not_found(kind: &str, name: &str) -> GateError {
    GateError::not_found(format!("{} '{}' not found", kind, name))
}

fn merge(list: &mut Vec<String>, add: &[String], remove: &[String]) {
    for item in add {
        if !list.contains(item) {
            list.push(item.clone());
        }
    }
    list.retain(|item| !remove.contains(item));
}

impl FakePackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            recorder: Recorder::new(log),
            state: Arc::default(),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| GateError::execution("fake package manager state poisoned"))
    }

    /// Servers that `install` and `search` know about
    ///
    /// With an empty catalog every name is installable.
    #[must_use]
    pub fn with_catalog(self, names: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            for name in names {
                let mut record = ServerRecord::new(*name);
                record.description = format!("{} server", name);
                state.catalog.insert(name.to_string(), record);
            }
        }
        self
    }

    #[must_use]
    pub fn with_installed(self, names: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            for name in names {
                let mut record = ServerRecord::new(*name);
                record.installed = true;
                state.installed.insert(name.to_string(), record);
            }
        }
        self
    }

    #[must_use]
    pub fn with_profile(self, name: &str, servers: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.profiles.insert(
                name.to_string(),
                ProfileRecord {
                    name: name.to_string(),
                    servers: servers.iter().map(|s| s.to_string()).collect(),
                    description: None,
                },
            );
        }
        self
    }

    #[must_use]
    pub fn with_client(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.clients.insert(
                name.to_string(),
                ClientRecord {
                    name: name.to_string(),
                    config_path: Some(format!("~/.config/{}/mcp.json", name)),
                    installed: true,
                    servers: Vec::new(),
                    profiles: Vec::new(),
                },
            );
        }
        self
    }

    #[must_use]
    pub fn with_config(self, key: &str, value: Value) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.config.insert(key.to_string(), value);
        }
        self
    }

    /// Number of successful writes so far
    pub fn mutation_count(&self) -> u64 {
        self.state.lock().map(|s| s.mutations).unwrap_or(0)
    }

    pub fn config_snapshot(&self) -> BTreeMap<String, Value> {
        self.state.lock().map(|s| s.config.clone()).unwrap_or_default()
    }

    pub fn installed_names(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.installed.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn profile(&self, name: &str) -> Option<ProfileRecord> {
        self.state.lock().ok().and_then(|s| s.profiles.get(name).cloned())
    }
}

fn apply_spec(record: &mut ServerRecord, spec: &ServerSpec) {
    if let Some(transport) = spec.transport {
        record.transport = Some(transport.as_str().to_string());
    }
    if spec.command.is_some() {
        record.command = spec.command.clone();
    }
    if !spec.args.is_empty() {
        record.args = spec.args.clone();
    }
    if spec.url.is_some() {
        record.url = spec.url.clone();
    }
    record.env.extend(spec.env.clone());
    if let Some(description) = &spec.description {
        record.description = description.clone();
    }
}

fn encode<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

#[async_trait]
impl PackageManager for FakePackageManager {
    async fn doctor(&self, _ctx: &CallContext) -> Result<DoctorReport> {
        if let Some(canned) = self.recorder.begin("doctor", vec![]) {
            return canned;
        }
        Ok(DoctorReport {
            status: "healthy".to_string(),
            version: Some("fake".to_string()),
            checks: BTreeMap::new(),
            issues: Vec::new(),
        })
    }

    async fn install(&self, _ctx: &CallContext, name: &str) -> Result<InstallOutcome> {
        if let Some(canned) = self.recorder.begin("install", vec![name.to_string()]) {
            return canned;
        }
        let mut state = self.state()?;
        if state.installed.contains_key(name) {
            return Ok(InstallOutcome::no_op(name));
        }
        let mut record = match state.catalog.get(name) {
            Some(record) => record.clone(),
            None if state.catalog.is_empty() => ServerRecord::new(name),
            None => return Err(not_found("server", name)),
        };
        record.installed = true;
        state.installed.insert(name.to_string(), record);
        state.mutations += 1;
        Ok(InstallOutcome::fresh(name))
    }

    async fn uninstall(&self, _ctx: &CallContext, name: &str) -> Result<()> {
        if let Some(canned) = self.recorder.begin("uninstall", vec![name.to_string()]) {
            return canned;
        }
        let mut state = self.state()?;
        if state.installed.remove(name).is_none() {
            return Err(not_found("server", name));
        }
        state.mutations += 1;
        Ok(())
    }

    async fn list(&self, _ctx: &CallContext) -> Result<Vec<ServerRecord>> {
        if let Some(canned) = self.recorder.begin("list", vec![]) {
            return canned;
        }
        Ok(self.state()?.installed.values().cloned().collect())
    }

    async fn search(&self, _ctx: &CallContext, query: Option<&str>) -> Result<Vec<ServerRecord>> {
        let args = query.map(|q| vec![q.to_string()]).unwrap_or_default();
        if let Some(canned) = self.recorder.begin("search", args) {
            return canned;
        }
        let state = self.state()?;
        let needle = query.unwrap_or("").to_ascii_lowercase();
        let mut found: BTreeMap<String, ServerRecord> = BTreeMap::new();
        for record in state.catalog.values().chain(state.installed.values()) {
            if record.name.to_ascii_lowercase().contains(&needle) {
                let mut record = record.clone();
                record.installed = state.installed.contains_key(&record.name);
                found.insert(record.name.clone(), record);
            }
        }
        Ok(found.into_values().collect())
    }

    async fn info(&self, _ctx: &CallContext, name: &str) -> Result<ServerRecord> {
        if let Some(canned) = self.recorder.begin("info", vec![name.to_string()]) {
            return canned;
        }
        let state = self.state()?;
        state
            .installed
            .get(name)
            .or_else(|| state.catalog.get(name))
            .cloned()
            .ok_or_else(|| not_found("server", name))
    }

    async fn create_server(&self, _ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        if let Some(canned) = self
            .recorder
            .begin("create_server", vec![spec.name.clone(), encode(spec)])
        {
            return canned;
        }
        let mut state = self.state()?;
        if state.installed.contains_key(&spec.name) {
            return Err(GateError::conflict(format!("server '{}' already exists", spec.name)));
        }
        let mut record = ServerRecord::new(spec.name.clone());
        record.installed = true;
        apply_spec(&mut record, spec);
        state.installed.insert(spec.name.clone(), record.clone());
        state.mutations += 1;
        Ok(record)
    }

    async fn edit_server(&self, _ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        if let Some(canned) = self
            .recorder
            .begin("edit_server", vec![spec.name.clone(), encode(spec)])
        {
            return canned;
        }
        let mut state = self.state()?;
        let record = state
            .installed
            .get_mut(&spec.name)
            .ok_or_else(|| not_found("server", &spec.name))?;
        apply_spec(record, spec);
        let record = record.clone();
        state.mutations += 1;
        Ok(record)
    }

    async fn profile_list(&self, _ctx: &CallContext) -> Result<Vec<ProfileRecord>> {
        if let Some(canned) = self.recorder.begin("profile_list", vec![]) {
            return canned;
        }
        Ok(self.state()?.profiles.values().cloned().collect())
    }

    async fn profile_create(
        &self,
        _ctx: &CallContext,
        name: &str,
        servers: &[String],
    ) -> Result<ProfileRecord> {
        let mut args = vec![name.to_string()];
        args.extend(servers.iter().cloned());
        if let Some(canned) = self.recorder.begin("profile_create", args) {
            return canned;
        }
        let mut state = self.state()?;
        if state.profiles.contains_key(name) {
            return Err(GateError::conflict(format!("profile '{}' already exists", name)));
        }
        let record = ProfileRecord {
            name: name.to_string(),
            servers: servers.to_vec(),
            description: None,
        };
        state.profiles.insert(name.to_string(), record.clone());
        state.mutations += 1;
        Ok(record)
    }

    async fn profile_edit(
        &self,
        _ctx: &CallContext,
        name: &str,
        edit: &ProfileEdit,
    ) -> Result<ProfileRecord> {
        if let Some(canned) = self
            .recorder
            .begin("profile_edit", vec![name.to_string(), encode(edit)])
        {
            return canned;
        }
        let mut state = self.state()?;
        let mut record = state
            .profiles
            .remove(name)
            .ok_or_else(|| not_found("profile", name))?;
        if let Some(new_name) = &edit.new_name {
            if state.profiles.contains_key(new_name) {
                state.profiles.insert(name.to_string(), record);
                return Err(GateError::conflict(format!("profile '{}' already exists", new_name)));
            }
            record.name = new_name.clone();
        }
        merge(&mut record.servers, &edit.add_servers, &edit.remove_servers);
        state.profiles.insert(record.name.clone(), record.clone());
        state.mutations += 1;
        Ok(record)
    }

    async fn profile_delete(&self, _ctx: &CallContext, name: &str) -> Result<()> {
        if let Some(canned) = self.recorder.begin("profile_delete", vec![name.to_string()]) {
            return canned;
        }
        let mut state = self.state()?;
        if state.profiles.remove(name).is_none() {
            return Err(not_found("profile", name));
        }
        state.mutations += 1;
        Ok(())
    }

    async fn client_list(&self, _ctx: &CallContext) -> Result<Vec<ClientRecord>> {
        if let Some(canned) = self.recorder.begin("client_list", vec![]) {
            return canned;
        }
        Ok(self.state()?.clients.values().cloned().collect())
    }

    async fn client_edit(
        &self,
        _ctx: &CallContext,
        name: &str,
        edit: &ClientEdit,
    ) -> Result<ClientRecord> {
        if let Some(canned) = self
            .recorder
            .begin("client_edit", vec![name.to_string(), encode(edit)])
        {
            return canned;
        }
        let mut state = self.state()?;
        let record = state
            .clients
            .get_mut(name)
            .ok_or_else(|| not_found("client", name))?;
        merge(&mut record.servers, &edit.add_servers, &edit.remove_servers);
        merge(&mut record.profiles, &edit.add_profiles, &edit.remove_profiles);
        let record = record.clone();
        state.mutations += 1;
        Ok(record)
    }

    async fn config_get(&self, _ctx: &CallContext, key: &str) -> Result<Value> {
        if let Some(canned) = self.recorder.begin("config_get", vec![key.to_string()]) {
            return canned;
        }
        self.state()?
            .config
            .get(key)
            .cloned()
            .ok_or_else(|| not_found("config key", key))
    }

    async fn config_set(&self, _ctx: &CallContext, key: &str, value: &Value) -> Result<()> {
        if let Some(canned) = self
            .recorder
            .begin("config_set", vec![key.to_string(), value.to_string()])
        {
            return canned;
        }
        let mut state = self.state()?;
        state.config.insert(key.to_string(), value.clone());
        state.mutations += 1;
        Ok(())
    }

    async fn config_list(&self, _ctx: &CallContext) -> Result<BTreeMap<String, Value>> {
        if let Some(canned) = self.recorder.begin("config_list", vec![]) {
            return canned;
        }
        Ok(self.state()?.config.clone())
    }

    async fn migrate(&self, _ctx: &CallContext) -> Result<MigrateOutcome> {
        if let Some(canned) = self.recorder.begin("migrate", vec![]) {
            return canned;
        }
        self.state()?.mutations += 1;
        Ok(MigrateOutcome {
            migrated: true,
            message: "Configuration migrated".to_string(),
        })
    }

    async fn share_start(
        &self,
        _ctx: &CallContext,
        name: &str,
        options: &ShareOptions,
    ) -> Result<ShareRecord> {
        if let Some(canned) = self
            .recorder
            .begin("share_start", vec![name.to_string(), encode(options)])
        {
            return canned;
        }
        let mut state = self.state()?;
        if state.shares.contains_key(name) {
            return Err(GateError::conflict(format!("server '{}' is already shared", name)));
        }
        let port = options.port.unwrap_or(8000);
        let record = ShareRecord {
            name: name.to_string(),
            url: Some(format!("https://{}.share.example/mcp", name)),
            port: Some(port),
            auth: !options.no_auth,
        };
        state.shares.insert(name.to_string(), record.clone());
        state.mutations += 1;
        Ok(record)
    }

    async fn share_stop(&self, _ctx: &CallContext, name: &str) -> Result<()> {
        if let Some(canned) = self.recorder.begin("share_stop", vec![name.to_string()]) {
            return canned;
        }
        let mut state = self.state()?;
        if state.shares.remove(name).is_none() {
            return Err(GateError::not_found(format!("server '{}' is not being shared", name)));
        }
        state.mutations += 1;
        Ok(())
    }

    async fn share_list(&self, _ctx: &CallContext) -> Result<Vec<ShareRecord>> {
        if let Some(canned) = self.recorder.begin("share_list", vec![]) {
            return canned;
        }
        Ok(self.state()?.shares.values().cloned().collect())
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
    async fn test_install_is_idempotent() {
        let pm = FakePackageManager::new();
        let first = pm.install(&ctx(), "alpha").await.unwrap();
        assert!(!first.already_installed);
        let second = pm.install(&ctx(), "alpha").await.unwrap();
        assert!(second.already_installed);
        assert_eq!(pm.call_count("install"), 2);
        assert_eq!(pm.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_catalog_limits_install() {
        let pm = FakePackageManager::new().with_catalog(&["alpha"]);
        let err = pm.install(&ctx(), "ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("ghost"));
    }

    #[tokio::test]
    async fn test_reads_do_not_mutate() {
        let pm = FakePackageManager::new()
            .with_installed(&["alpha"])
            .with_profile("web", &["alpha"]);
        pm.list(&ctx()).await.unwrap();
        pm.info(&ctx(), "alpha").await.unwrap();
        pm.profile_list(&ctx()).await.unwrap();
        pm.config_list(&ctx()).await.unwrap();
        assert_eq!(pm.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_profile_edit_missing() {
        let pm = FakePackageManager::new();
        let edit = ProfileEdit {
            add_servers: vec!["alpha".into()],
            ..Default::default()
        };
        let err = pm.profile_edit(&ctx(), "ghost", &edit).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("ghost"));
    }

    #[tokio::test]
    async fn test_canned_response_wins() {
        let pm = FakePackageManager::new();
        pm.stub_with("info", &["alpha"], ServerRecord::new("alpha"));
        assert_eq!(pm.info(&ctx(), "alpha").await.unwrap().name, "alpha");
        assert!(pm.info(&ctx(), "beta").await.is_err());
    }

    #[tokio::test]
    async fn test_share_conflict_and_missing() {
        let pm = FakePackageManager::new();
        pm.share_start(&ctx(), "alpha", &ShareOptions::default()).await.unwrap();
        let err = pm
            .share_start(&ctx(), "alpha", &ShareOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = pm.share_stop(&ctx(), "beta").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
