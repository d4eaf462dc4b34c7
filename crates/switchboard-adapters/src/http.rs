//! Package manager driven through its companion HTTP API
//!
//! Routes live under `/api/v1`. Responses carry the same envelope the CLI
//! prints, so decoding is shared with [`crate::cli`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};

use switchboard_core::records::{
    ClientEdit, ClientRecord, DoctorReport, InstallOutcome, MigrateOutcome, ProfileEdit,
    ProfileRecord, ServerRecord, ServerSpec, ShareOptions, ShareRecord,
};
use switchboard_core::{CallContext, GateError, PackageManager, Result};

use crate::envelope::{classify_status, decode, decode_list, install_outcome, mention, Envelope};

const API_PREFIX: [&str; 2] = ["api", "v1"];

#[derive(Debug, Clone)]
pub struct HttpPackageManager {
    base_url: String,
    http: reqwest::Client,
}

impl HttpPackageManager {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GateError::unavailable(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GateError::unavailable(format!("Invalid API URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| GateError::unavailable(format!("Invalid API URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    /// True if `GET /health` answers within `timeout`
    pub async fn health_check(&self, timeout: Duration) -> bool {
        let ctx = CallContext::new(timeout);
        match self.request(&ctx, Method::GET, &["health"], &[], None).await {
            Ok(_) => true,
            Err(e) => {
                debug!("API health check failed: {}", e);
                false
            }
        }
    }

    async fn request(
        &self,
        ctx: &CallContext,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Envelope> {
        let mut url = self.url(segments)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let label = format!("{} {}", method, url.path());
        debug!("API request: {}", label);

        let mut request = self.http.request(method, url).timeout(ctx.remaining());
        if let Some(body) = body {
            request = request.json(&body);
        }

        ctx.run(&label, async {
            let response = request.send().await.map_err(|e| {
                warn!("{} failed: {}", label, e);
                if e.is_timeout() {
                    GateError::timeout(format!("{} timed out", label))
                } else {
                    GateError::unavailable(format!(
                        "Failed to reach package manager API at {}: {}. {}",
                        self.base_url, e, "Check that the API is running."
                    ))
                }
            })?;

            let status = response.status().as_u16();
            let bytes = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    GateError::timeout(format!("{} timed out reading response", label))
                } else {
                    GateError::execution(format!("Failed to read {} response: {}", label, e))
                }
            })?;

            match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(envelope) => Ok(envelope),
                Err(_) if (200..300).contains(&status) => Err(GateError::execution(format!(
                    "{} returned a response without an envelope",
                    label
                ))),
                Err(_) => {
                    let text = String::from_utf8_lossy(&bytes);
                    Err(GateError::new(
                        classify_status(status),
                        format!("{} failed with HTTP {}: {}", label, status, text.trim()),
                    ))
                }
            }
        })
        .await
    }

    async fn get(&self, ctx: &CallContext, segments: &[&str]) -> Result<Envelope> {
        self.request(ctx, Method::GET, segments, &[], None).await
    }

    async fn post(&self, ctx: &CallContext, segments: &[&str], body: Value) -> Result<Envelope> {
        self.request(ctx, Method::POST, segments, &[], Some(body)).await
    }

    async fn put(&self, ctx: &CallContext, segments: &[&str], body: Value) -> Result<Envelope> {
        self.request(ctx, Method::PUT, segments, &[], Some(body)).await
    }

    async fn delete(&self, ctx: &CallContext, segments: &[&str]) -> Result<Envelope> {
        self.request(ctx, Method::DELETE, segments, &[], None).await
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| GateError::execution(format!("Failed to encode request: {}", e)))
}

#[async_trait]
impl PackageManager for HttpPackageManager {
    async fn doctor(&self, ctx: &CallContext) -> Result<DoctorReport> {
        self.get(ctx, &["health"]).await?.decode("doctor")
    }

    async fn install(&self, ctx: &CallContext, name: &str) -> Result<InstallOutcome> {
        install_outcome(name, self.post(ctx, &["servers", name, "install"], json!({})).await?)
    }

    async fn uninstall(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.delete(ctx, &["servers", name])
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "server", name))
    }

    async fn list(&self, ctx: &CallContext) -> Result<Vec<ServerRecord>> {
        decode_list(self.get(ctx, &["servers"]).await?.into_data()?, "servers")
    }

    async fn search(&self, ctx: &CallContext, query: Option<&str>) -> Result<Vec<ServerRecord>> {
        let query = [("q", query.unwrap_or(""))];
        let envelope = self.request(ctx, Method::GET, &["search"], &query, None).await?;
        decode_list(envelope.into_data()?, "servers")
    }

    async fn info(&self, ctx: &CallContext, name: &str) -> Result<ServerRecord> {
        let data = self
            .get(ctx, &["servers", name])
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", name))?;
        if data.is_null() {
            return Err(GateError::not_found(format!("server '{}' not found", name)));
        }
        decode(data, "server")
    }

    async fn create_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        self.post(ctx, &["servers"], encode(spec)?)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", &spec.name))
            .and_then(|data| decode(data, "server"))
    }

    async fn edit_server(&self, ctx: &CallContext, spec: &ServerSpec) -> Result<ServerRecord> {
        self.put(ctx, &["servers", spec.name.as_str()], encode(spec)?)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", &spec.name))
            .and_then(|data| decode(data, "server"))
    }

    async fn profile_list(&self, ctx: &CallContext) -> Result<Vec<ProfileRecord>> {
        decode_list(self.get(ctx, &["profiles"]).await?.into_data()?, "profiles")
    }

    async fn profile_create(
        &self,
        ctx: &CallContext,
        name: &str,
        servers: &[String],
    ) -> Result<ProfileRecord> {
        self.post(ctx, &["profiles"], json!({"name": name, "servers": servers}))
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
        self.put(ctx, &["profiles", name], encode(edit)?)
            .await?
            .into_data()
            .map_err(|e| mention(e, "profile", name))
            .and_then(|data| decode(data, "profile"))
    }

    async fn profile_delete(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.delete(ctx, &["profiles", name])
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "profile", name))
    }

    async fn client_list(&self, ctx: &CallContext) -> Result<Vec<ClientRecord>> {
        decode_list(self.get(ctx, &["clients"]).await?.into_data()?, "clients")
    }

    async fn client_edit(
        &self,
        ctx: &CallContext,
        name: &str,
        edit: &ClientEdit,
    ) -> Result<ClientRecord> {
        self.put(ctx, &["clients", name], encode(edit)?)
            .await?
            .into_data()
            .map_err(|e| mention(e, "client", name))
            .and_then(|data| decode(data, "client"))
    }

    async fn config_get(&self, ctx: &CallContext, key: &str) -> Result<Value> {
        self.get(ctx, &["config", key])
            .await?
            .into_data()
            .map_err(|e| mention(e, "config key", key))
    }

    async fn config_set(&self, ctx: &CallContext, key: &str, value: &Value) -> Result<()> {
        self.put(ctx, &["config", key], json!({"value": value}))
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "config key", key))
    }

    async fn config_list(&self, ctx: &CallContext) -> Result<BTreeMap<String, Value>> {
        let data = self.get(ctx, &["config"]).await?.into_data()?;
        if data.is_null() {
            return Ok(BTreeMap::new());
        }
        decode(data, "config")
    }

    async fn migrate(&self, ctx: &CallContext) -> Result<MigrateOutcome> {
        self.post(ctx, &["migrate"], json!({})).await?.decode("migrate")
    }

    async fn share_start(
        &self,
        ctx: &CallContext,
        name: &str,
        options: &ShareOptions,
    ) -> Result<ShareRecord> {
        let body = json!({"name": name, "port": options.port, "no_auth": options.no_auth});
        self.post(ctx, &["share"], body)
            .await?
            .into_data()
            .map_err(|e| mention(e, "server", name))
            .and_then(|data| decode(data, "share"))
    }

    async fn share_stop(&self, ctx: &CallContext, name: &str) -> Result<()> {
        self.delete(ctx, &["share", name])
            .await?
            .into_data()
            .map(|_| ())
            .map_err(|e| mention(e, "shared server", name))
    }

    async fn share_list(&self, ctx: &CallContext) -> Result<Vec<ShareRecord>> {
        decode_list(self.get(ctx, &["share"]).await?.into_data()?, "shares")
    }
}
