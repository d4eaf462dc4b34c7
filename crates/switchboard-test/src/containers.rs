//! Fake container orchestrator

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use switchboard_core::records::{ContainerRecord, LogsOutput, LogsRequest};
use switchboard_core::{CallContext, ContainerOrchestrator, GateError, Result};

use crate::calls::{recorder_api, CallLog, Recorder};

#[derive(Debug, Default)]
struct State {
    /// service -> compose state (`running`, `exited`, ...)
    services: BTreeMap<String, String>,
    unhealthy: Vec<String>,
    supervised: BTreeMap<String, String>,
    mutations: u64,
}

/// In-memory compose project
///
/// Services start `exited`. Naming a service the project does not define is
/// `NOT_FOUND`, like compose's own "no such service".
#[derive(Debug, Clone, Default)]
pub struct FakeContainers {
    recorder: Recorder,
    state: Arc<Mutex<State>>,
}

recorder_api!(FakeContainers);

impl FakeContainers {
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
    pub fn with_services(self, names: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            for name in names {
                state.services.insert(name.to_string(), "exited".to_string());
            }
        }
        self
    }

    #[must_use]
    pub fn with_running(self, names: &[&str]) -> Self {
        if let Ok(mut state) = self.state.lock() {
            for name in names {
                state.services.insert(name.to_string(), "running".to_string());
            }
        }
        self
    }

    #[must_use]
    pub fn with_unhealthy(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.unhealthy.push(name.to_string());
        }
        self
    }

    /// A program managed by the supervisor inside the daemon container
    #[must_use]
    pub fn with_program(self, name: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.supervised.insert(name.to_string(), "RUNNING".to_string());
        }
        self
    }

    pub fn mutation_count(&self) -> u64 {
        self.state.lock().map(|s| s.mutations).unwrap_or(0)
    }

    pub fn service_state(&self, name: &str) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.services.get(name).cloned())
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| GateError::execution("fake container state poisoned"))
    }

    /// Move the named services (or all of them) to `target`
    fn transition(&self, services: &[String], target: &str, verb: &str) -> Result<String> {
        let mut state = self.state()?;
        let names: Vec<String> = if services.is_empty() {
            state.services.keys().cloned().collect()
        } else {
            for service in services {
                if !state.services.contains_key(service) {
                    return Err(GateError::not_found(format!("no such service: {}", service)));
                }
            }
            services.to_vec()
        };
        for name in &names {
            state.services.insert(name.clone(), target.to_string());
        }
        state.mutations += 1;
        Ok(names
            .iter()
            .map(|n| format!("Container {} {}", n, verb))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl ContainerOrchestrator for FakeContainers {
    async fn compose_up(&self, _ctx: &CallContext, services: &[String]) -> Result<String> {
        if let Some(canned) = self.recorder.begin("compose_up", services.to_vec()) {
            return canned;
        }
        self.transition(services, "running", "Started")
    }

    async fn compose_down(&self, _ctx: &CallContext) -> Result<String> {
        if let Some(canned) = self.recorder.begin("compose_down", vec![]) {
            return canned;
        }
        self.transition(&[], "exited", "Removed")
    }

    async fn compose_restart(&self, _ctx: &CallContext, services: &[String]) -> Result<String> {
        if let Some(canned) = self.recorder.begin("compose_restart", services.to_vec()) {
            return canned;
        }
        self.transition(services, "running", "Restarted")
    }

    async fn compose_build(
        &self,
        _ctx: &CallContext,
        services: &[String],
        no_cache: bool,
    ) -> Result<String> {
        let mut args = services.to_vec();
        if no_cache {
            args.push("--no-cache".to_string());
        }
        if let Some(canned) = self.recorder.begin("compose_build", args) {
            return canned;
        }
        let mut state = self.state()?;
        let names: Vec<String> = if services.is_empty() {
            state.services.keys().cloned().collect()
        } else {
            services.to_vec()
        };
        state.mutations += 1;
        Ok(names
            .iter()
            .map(|n| format!("Image {} Built", n))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn compose_stop(&self, _ctx: &CallContext, services: &[String]) -> Result<String> {
        if let Some(canned) = self.recorder.begin("compose_stop", services.to_vec()) {
            return canned;
        }
        self.transition(services, "exited", "Stopped")
    }

    async fn compose_start(&self, _ctx: &CallContext, services: &[String]) -> Result<String> {
        if let Some(canned) = self.recorder.begin("compose_start", services.to_vec()) {
            return canned;
        }
        self.transition(services, "running", "Started")
    }

    async fn compose_logs(&self, _ctx: &CallContext, request: &LogsRequest) -> Result<LogsOutput> {
        let mut args = vec![request.lines.to_string()];
        args.extend(request.service.clone());
        if let Some(canned) = self.recorder.begin("compose_logs", args) {
            return canned;
        }
        let state = self.state()?;
        let names: Vec<String> = match &request.service {
            Some(service) if !state.services.contains_key(service) => {
                return Err(GateError::not_found(format!("no such service: {}", service)));
            }
            Some(service) => vec![service.clone()],
            None => state.services.keys().cloned().collect(),
        };
        let mut lines = Vec::new();
        for n in 0..request.lines {
            if names.is_empty() {
                break;
            }
            let service = &names[n as usize % names.len()];
            lines.push(format!("{} | log line {}", service, n + 1));
        }
        Ok(LogsOutput::new(request, lines.join("\n")))
    }

    async fn compose_status(&self, _ctx: &CallContext) -> Result<Vec<ContainerRecord>> {
        if let Some(canned) = self.recorder.begin("compose_status", vec![]) {
            return canned;
        }
        let state = self.state()?;
        Ok(state
            .services
            .iter()
            .map(|(service, compose_state)| {
                let running = compose_state == "running";
                let health = match (running, state.unhealthy.contains(service)) {
                    (true, true) => "unhealthy",
                    (true, false) => "healthy",
                    _ => "",
                };
                let status = if running { "Up 5 minutes" } else { "Exited (0)" };
                ContainerRecord::derive(
                    format!("switchboard-{}-1", service),
                    service.clone(),
                    compose_state.clone(),
                    status,
                    health,
                )
            })
            .collect())
    }

    async fn supervisor(
        &self,
        _ctx: &CallContext,
        action: &str,
        target: Option<&str>,
    ) -> Result<String> {
        let mut args = vec![action.to_string()];
        args.extend(target.map(str::to_string));
        if let Some(canned) = self.recorder.begin("supervisor", args) {
            return canned;
        }
        let mut state = self.state()?;
        if action == "status" {
            return Ok(state
                .supervised
                .iter()
                .map(|(name, status)| format!("{:<24} {}", name, status))
                .collect::<Vec<_>>()
                .join("\n"));
        }
        let names: Vec<String> = match target {
            Some("all") | None => state.supervised.keys().cloned().collect(),
            Some(name) if state.supervised.contains_key(name) => vec![name.to_string()],
            Some(name) => {
                return Err(GateError::not_found(format!("{}: ERROR (no such process)", name)));
            }
        };
        let (status, verb) = match action {
            "stop" => ("STOPPED", "stopped"),
            _ => ("RUNNING", "started"),
        };
        for name in &names {
            state.supervised.insert(name.clone(), status.to_string());
        }
        state.mutations += 1;
        Ok(names
            .iter()
            .map(|n| format!("{}: {}", n, verb))
            .collect::<Vec<_>>()
            .join("\n"))
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
    async fn test_up_then_status() {
        let containers = FakeContainers::new().with_services(&["api", "db"]).with_unhealthy("db");
        containers.compose_up(&ctx(), &[]).await.unwrap();
        let records = containers.compose_status(&ctx()).await.unwrap();
        assert_eq!(records.len(), 2);
        let api = records.iter().find(|r| r.service == "api").unwrap();
        assert!(api.running && api.healthy);
        let db = records.iter().find(|r| r.service == "db").unwrap();
        assert!(db.running && !db.healthy);
        assert_eq!(containers.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let containers = FakeContainers::new().with_services(&["api"]);
        let err = containers
            .compose_restart(&ctx(), &["ghost".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(containers.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_logs_respect_line_count() {
        let containers = FakeContainers::new().with_services(&["api"]);
        let request = LogsRequest::new(Some("api".to_string()), Some(3));
        let out = containers.compose_logs(&ctx(), &request).await.unwrap();
        assert_eq!(out.output.lines().count(), 3);
        assert!(containers.was_called("compose_logs", &["3", "api"]));
    }

    #[tokio::test]
    async fn test_supervisor_restart() {
        let containers = FakeContainers::new().with_program("daemon");
        let out = containers.supervisor(&ctx(), "restart", Some("daemon")).await.unwrap();
        assert!(out.contains("daemon"));
        let err = containers.supervisor(&ctx(), "restart", Some("ghost")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
