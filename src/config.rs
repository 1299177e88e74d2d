use crate::types::{SuitabilityError, SuitabilityResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Submission policy constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubmissionPolicy {
    /// Minimum number of stacked rasters required to build a request
    pub min_layers: usize,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self { min_layers: 1 }
    }
}

/// Client configuration for the analysis and catalogue services
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the analysis backend
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Retries for idempotent catalogue requests
    pub max_retries: u32,
    /// Directory where fetched result rasters are kept
    pub cache_dir: Option<PathBuf>,
    pub policy: SubmissionPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 300,                      // analysis runs can be slow
            user_agent: format!("suitability/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 3,
            cache_dir: dirs::cache_dir().map(|dir| dir.join("suitability")),
            policy: SubmissionPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> SuitabilityResult<Self> {
        let path = path.as_ref();
        log::info!("Loading client configuration: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&content).map_err(|e| {
            SuitabilityError::Config(format!("Invalid configuration {}: {}", path.display(), e))
        })?;

        config.with_env_overrides()
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> SuitabilityResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `SUITABILITY_BASE_URL` and `SUITABILITY_MIN_LAYERS`
    pub fn with_env_overrides(mut self) -> SuitabilityResult<Self> {
        if let Ok(base_url) = std::env::var("SUITABILITY_BASE_URL") {
            log::debug!("Base URL overridden from environment: {}", base_url);
            self.base_url = base_url;
        }

        if let Ok(min_layers) = std::env::var("SUITABILITY_MIN_LAYERS") {
            self.policy.min_layers = min_layers.trim().parse().map_err(|e| {
                SuitabilityError::Config(format!(
                    "SUITABILITY_MIN_LAYERS must be a positive integer, got '{}': {}",
                    min_layers, e
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> SuitabilityResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(SuitabilityError::Config("base_url cannot be empty".to_string()));
        }
        if self.policy.min_layers == 0 {
            return Err(SuitabilityError::Config(
                "policy.min_layers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Join an API path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn http_client(&self) -> SuitabilityResult<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout())
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("Failed to create HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_policy_allows_single_layer() {
        let config = ClientConfig::default();
        assert_eq!(config.policy.min_layers, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = ClientConfig {
            base_url: "https://example.org/targeting/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint("/api/processLandSuitability"),
            "https://example.org/targeting/api/processLandSuitability"
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, r#"{{"base_url": "http://gis.local", "policy": {{"min_layers": 2}}}}"#)
            .expect("Failed to write config");

        let config: ClientConfig =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.base_url, "http://gis.local");
        assert_eq!(config.policy.min_layers, 2);
        assert_eq!(config.timeout_secs, 300);
    }

    #[test]
    fn test_zero_min_layers_rejected() {
        let mut config = ClientConfig::default();
        config.policy.min_layers = 0;
        assert!(matches!(config.validate(), Err(SuitabilityError::Config(_))));
    }
}
