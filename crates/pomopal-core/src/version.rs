//! Update check against a remote `{"version": "..."}` descriptor.
//!
//! Runs on break entry as a detached task; it never blocks a transition
//! and its failures are only logged.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, CoreError};

/// Version of the running build.
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    #[serde(default)]
    version: Option<String>,
}

fn normalize(version: &str) -> &str {
    let version = version.trim();
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

#[derive(Debug, Clone)]
pub struct VersionChecker {
    client: reqwest::Client,
    url: Url,
    current: String,
}

impl VersionChecker {
    /// # Errors
    ///
    /// Returns an error if `url` is invalid or the client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            key: "update.descriptor_url".into(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            current: CURRENT_VERSION.to_string(),
        })
    }

    pub fn with_current(mut self, current: impl Into<String>) -> Self {
        self.current = current.into();
        self
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// True when the descriptor names a version other than the running one.
    /// A non-success status or a descriptor without a version is `false`.
    pub async fn check(&self) -> Result<bool, CoreError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "version descriptor unavailable");
            return Ok(false);
        }
        let descriptor: VersionDescriptor = response.json().await?;
        Ok(descriptor
            .version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .is_some_and(|remote| normalize(remote) != normalize(&self.current)))
    }
}
