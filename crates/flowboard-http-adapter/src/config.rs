//! Backend connection configuration
//!
//! Resolved from an optional JSON file, then the `FLOWBOARD_API_URL`
//! environment variable, then built-in defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, env};
use crate::error::{HttpAdapterError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl BackendConfig {
    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&content)?;
        config.validated()
    }

    /// Save configuration to a JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Full resolution: file (if given), environment, defaults
    pub async fn resolve(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path).await?,
            None => Self::default(),
        };
        Ok(config.with_base_url_override(std::env::var(env::API_URL).ok()))
    }

    /// Replace the base URL when an override is present and non-empty
    pub fn with_base_url_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Absolute URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn validated(self) -> Result<Self> {
        if self.base_url.trim().is_empty() {
            return Err(HttpAdapterError::Config("base_url is empty".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HttpAdapterError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = BackendConfig::load(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_save_and_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("backend.json");

        let config = BackendConfig {
            base_url: "http://10.0.0.5:9000".into(),
            ..BackendConfig::default()
        };
        config.save(&path).await.unwrap();
        assert_eq!(BackendConfig::load(&path).await.unwrap(), config);

        tokio::fs::write(&path, r#"{"request_timeout_secs": 5}"#)
            .await
            .unwrap();
        let partial = BackendConfig::load(&path).await.unwrap();
        assert_eq!(partial.request_timeout_secs, 5);
        assert_eq!(partial.base_url, defaults::BASE_URL);
    }

    #[tokio::test]
    async fn test_invalid_base_url_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backend.json");
        tokio::fs::write(&path, r#"{"base_url": "localhost"}"#)
            .await
            .unwrap();
        assert!(matches!(
            BackendConfig::load(&path).await,
            Err(HttpAdapterError::Config(_))
        ));
    }

    #[test]
    fn test_override_and_endpoint() {
        let config = BackendConfig::default()
            .with_base_url_override(Some("https://api.example.com/".into()));
        assert_eq!(
            config.endpoint("/api/v1/nodes/"),
            "https://api.example.com/api/v1/nodes/"
        );

        let unchanged = BackendConfig::default().with_base_url_override(Some("  ".into()));
        assert_eq!(unchanged.base_url, defaults::BASE_URL);
    }
}
