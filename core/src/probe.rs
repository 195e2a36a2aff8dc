//! Backend probe
//!
//! Plain HTTP checks against the backend the chat pane talks to: `GET /health`
//! and `GET /api/info`. Independent of any chat session.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{DevpaneError, Result};

const HEALTH_PATH: &str = "/health";
const INFO_PATH: &str = "/api/info";

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Body of `GET /api/info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    pub name: String,
    pub version: String,
}

/// Outcome of probing both endpoints
#[derive(Debug)]
pub struct ProbeReport {
    pub base_url: Url,
    pub health: Result<HealthStatus>,
    pub info: Result<BackendInfo>,
}

impl ProbeReport {
    pub fn is_healthy(&self) -> bool {
        matches!(&self.health, Ok(health) if health.is_ok())
    }
}

/// HTTP client for the backend's REST endpoints
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    /// Client for an `http://` or `https://` base address
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| DevpaneError::malformed(base_url, e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DevpaneError::malformed(
                base_url,
                format!("probe needs an http(s) address, got '{}'", parsed.scheme()),
            ));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(DevpaneError::malformed(base_url, "missing host"));
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.backend_url,
            Duration::from_secs(config.probe_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `path`, keeping any path prefix of the base
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!(%url, "probing backend");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        self.get_json(HEALTH_PATH).await
    }

    pub async fn info(&self) -> Result<BackendInfo> {
        self.get_json(INFO_PATH).await
    }

    /// Query both endpoints concurrently
    pub async fn probe(&self) -> ProbeReport {
        let (health, info) = tokio::join!(self.health(), self.info());
        ProbeReport {
            base_url: self.base_url.clone(),
            health,
            info,
        }
    }
}
