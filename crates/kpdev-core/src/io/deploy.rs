//! Remote deployment: upload a signed package and import it, per target.
//!
//! Every request carries `X-Cybozu-Authorization: base64(user:pass)`. A
//! failing target never stops the batch; [`DeployClient::deploy_all`]
//! always returns one outcome per target.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kpdev_schema::{Credentials, DeployTarget, ImportedPlugin, InstalledPlugin, UploadToken};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Reporter;
use crate::config::DeploySettings;

pub const AUTH_HEADER: &str = "X-Cybozu-Authorization";

/// Page size for the installed plugin listing (server maximum).
const PLUGINS_PAGE: usize = 100;

/// Longest response excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 300;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("No credentials configured for target '{0}'")]
    MissingCredentials(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Plugin listing failed: {0}")]
    Listing(String),

    #[error("Failed to read package {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// How [`DeployClient::deploy_all`] schedules targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployStrategy {
    /// One target at a time, in order.
    #[default]
    Sequential,
    /// All targets at once; results are still reported in target order.
    Concurrent,
}

/// Result for one target.
#[derive(Debug)]
pub struct DeployOutcome {
    pub target: String,
    pub result: Result<ImportedPlugin, DeployError>,
}

/// Results for a whole batch.
#[derive(Debug, Default)]
pub struct DeploySummary {
    pub outcomes: Vec<DeployOutcome>,
    pub elapsed: Duration,
}

impl DeploySummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// `true` when there was at least one target and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == 0
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_key: String,
}

#[derive(Deserialize)]
struct ImportResponse {
    #[serde(default)]
    success: bool,
    result: Option<ImportedPlugin>,
}

#[derive(Deserialize)]
struct PluginsResponse {
    #[serde(default)]
    plugins: Vec<InstalledPlugin>,
}

/// HTTP client for the platform's plugin endpoints.
#[derive(Debug, Clone)]
pub struct DeployClient {
    http: Client,
    settings: DeploySettings,
}

impl DeployClient {
    /// Build a client whose requests time out after `settings.timeout_secs`.
    pub fn new(settings: DeploySettings) -> Result<Self, DeployError> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self { http, settings })
    }

    /// Upload the package at `path` and return the server's file key.
    pub async fn upload_artifact(
        &self,
        target: &DeployTarget,
        path: &Path,
    ) -> Result<UploadToken, DeployError> {
        let (name, bytes) = read_package(path).await?;
        self.upload_bytes(target, &name, bytes).await
    }

    async fn upload_bytes(
        &self,
        target: &DeployTarget,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadToken, DeployError> {
        let creds = credentials(target)?;
        let url = format!("{}{}", target.base_url(), self.settings.upload_path);
        debug!(target_name = %target.name, %url, bytes = bytes.len(), "uploading package");

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/zip")?;
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(&url)
            .header(AUTH_HEADER, auth_value(creds))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeployError::Upload(e.to_string()))?;
        let resp = check_status(resp).await.map_err(DeployError::Upload)?;

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| DeployError::Upload(format!("unexpected response: {e}")))?;
        Ok(UploadToken::new(body.file_key))
    }

    /// Ask the target to install the uploaded package.
    pub async fn import_package(
        &self,
        target: &DeployTarget,
        token: &UploadToken,
    ) -> Result<ImportedPlugin, DeployError> {
        let creds = credentials(target)?;
        let url = format!("{}{}", target.base_url(), self.settings.import_path);
        debug!(target_name = %target.name, %url, "importing package");

        let resp = self
            .http
            .post(&url)
            .header(AUTH_HEADER, auth_value(creds))
            .json(&json!({ "item": token.as_str() }))
            .send()
            .await
            .map_err(|e| DeployError::Import(e.to_string()))?;
        let resp = check_status(resp).await.map_err(DeployError::Import)?;

        let body: ImportResponse = resp
            .json()
            .await
            .map_err(|e| DeployError::Import(format!("unexpected response: {e}")))?;
        match body.result {
            Some(plugin) if body.success => Ok(plugin),
            _ => Err(DeployError::Import(
                "server reported the import as unsuccessful".into(),
            )),
        }
    }

    /// Every plugin installed on the target.
    ///
    /// Paging stops at the first short page, or at a page that adds no new
    /// ids (a server ignoring `offset`).
    pub async fn installed_plugins(
        &self,
        target: &DeployTarget,
    ) -> Result<Vec<InstalledPlugin>, DeployError> {
        let creds = credentials(target)?;
        let url = format!("{}{}", target.base_url(), self.settings.plugins_path);
        let mut all = Vec::new();
        let mut seen = HashSet::new();

        loop {
            let resp = self
                .http
                .get(&url)
                .header(AUTH_HEADER, auth_value(creds))
                .query(&[("offset", all.len()), ("limit", PLUGINS_PAGE)])
                .send()
                .await
                .map_err(|e| DeployError::Listing(e.to_string()))?;
            let resp = check_status(resp).await.map_err(DeployError::Listing)?;
            let page: PluginsResponse = resp
                .json()
                .await
                .map_err(|e| DeployError::Listing(format!("unexpected response: {e}")))?;

            let count = page.plugins.len();
            let before = all.len();
            all.extend(page.plugins.into_iter().filter(|p| seen.insert(p.id.clone())));
            if count < PLUGINS_PAGE {
                break;
            }
            if all.len() == before {
                warn!(target_name = %target.name, offset = before, "plugin listing repeated a page");
                break;
            }
        }

        Ok(all)
    }

    /// The installed plugin with `id`, if any.
    pub async fn find_plugin(
        &self,
        target: &DeployTarget,
        id: &str,
    ) -> Result<Option<InstalledPlugin>, DeployError> {
        Ok(self
            .installed_plugins(target)
            .await?
            .into_iter()
            .find(|p| p.id == id))
    }

    /// Upload then import on one target.
    pub async fn deploy(
        &self,
        target: &DeployTarget,
        path: &Path,
    ) -> Result<ImportedPlugin, DeployError> {
        let (name, bytes) = read_package(path).await?;
        self.deploy_bytes(target, &name, bytes).await
    }

    async fn deploy_bytes(
        &self,
        target: &DeployTarget,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportedPlugin, DeployError> {
        credentials(target)?;
        let token = self.upload_bytes(target, file_name, bytes).await?;
        self.import_package(target, &token).await
    }

    async fn deploy_one<R: Reporter + ?Sized>(
        &self,
        target: &DeployTarget,
        file_name: &str,
        bytes: Vec<u8>,
        reporter: &R,
    ) -> DeployOutcome {
        reporter.deploying(&target.name);
        let result = self.deploy_bytes(target, file_name, bytes).await;
        match &result {
            Ok(plugin) => {
                info!(target_name = %target.name, id = %plugin.id, version = %plugin.version, "deployed");
                reporter.deployed(&target.name, plugin);
            }
            Err(e) => {
                warn!(target_name = %target.name, error = %e, "deploy failed");
                reporter.deploy_failed(&target.name, &e.to_string());
            }
        }
        DeployOutcome {
            target: target.name.clone(),
            result,
        }
    }

    /// Deploy `path` to every target.
    ///
    /// Failures are recorded per target and never abort the batch. Outcomes
    /// are returned in `targets` order whatever the strategy.
    pub async fn deploy_all<R: Reporter + ?Sized>(
        &self,
        targets: &[DeployTarget],
        path: &Path,
        strategy: DeployStrategy,
        reporter: &R,
    ) -> Result<DeploySummary, DeployError> {
        let start = Instant::now();
        let (name, bytes) = read_package(path).await?;

        let outcomes = match strategy {
            DeployStrategy::Sequential => {
                let mut out = Vec::with_capacity(targets.len());
                for target in targets {
                    out.push(self.deploy_one(target, &name, bytes.clone(), reporter).await);
                }
                out
            }
            DeployStrategy::Concurrent => {
                futures::future::join_all(
                    targets
                        .iter()
                        .map(|target| self.deploy_one(target, &name, bytes.clone(), reporter)),
                )
                .await
            }
        };

        let summary = DeploySummary {
            outcomes,
            elapsed: start.elapsed(),
        };
        reporter.summary(
            summary.succeeded(),
            summary.failed(),
            summary.elapsed.as_secs_f64(),
        );
        Ok(summary)
    }
}

fn credentials(target: &DeployTarget) -> Result<&Credentials, DeployError> {
    target
        .credentials
        .as_ref()
        .filter(|c| c.is_complete())
        .ok_or_else(|| DeployError::MissingCredentials(target.name.clone()))
}

/// Header value for [`AUTH_HEADER`].
pub fn auth_value(creds: &Credentials) -> String {
    STANDARD.encode(format!("{}:{}", creds.username, creds.password))
}

async fn read_package(path: &Path) -> Result<(String, Vec<u8>), DeployError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DeployError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin.zip".to_string());
    Ok((name, bytes))
}

/// Turn a non-success response into a readable message, preferring the
/// platform's `{"message": ...}` error body.
async fn check_status(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY).collect());

    if detail.is_empty() {
        Err(format!("HTTP {status}"))
    } else {
        Err(format!("HTTP {status}: {detail}"))
    }
}
