use crate::config::ClientConfig;
use crate::types::{SuitabilityError, SuitabilityResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

const DIRECTORY_CONTENTS: &str = "api/getDirectoryContents";
const FOLDER_CONFIGURATIONS: &str = "api/getFolderConfigurations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// One entry of a server-side directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, deserialize_with = "lenient_number")]
    pub min_val: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub max_val: Option<f64>,
}

impl DirectoryItem {
    pub fn is_raster(&self) -> bool {
        self.kind == ItemKind::File && self.name.to_ascii_lowercase().ends_with(".tif")
    }

    /// Source bounds for files that carry them
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.kind, self.min_val, self.max_val) {
            (ItemKind::File, Some(min), Some(max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Bounds arrive as numbers, numeric strings or null depending on the data folder
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

/// Initial map view for a data folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfiguration {
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for FolderConfiguration {
    fn default() -> Self {
        Self { center: [0.0, 0.0], zoom: 1.0 }
    }
}

/// Client for the raster catalogue endpoints
pub struct CatalogClient {
    client: reqwest::blocking::Client,
    config: ClientConfig,
}

impl CatalogClient {
    pub fn new(config: ClientConfig) -> SuitabilityResult<Self> {
        config.validate()?;
        Ok(Self {
            client: config.http_client()?,
            config,
        })
    }

    /// List a directory on the server
    pub fn directory_contents(&self, path: &str) -> SuitabilityResult<Vec<DirectoryItem>> {
        let body = self.get_with_retries(DIRECTORY_CONTENTS, &[("path", path)])?;
        let items = parse_listing(&body)?;
        log::info!("Listed {} item(s) under {}", items.len(), path);
        Ok(items)
    }

    /// Map view for a folder, falling back to the world view when the
    /// server has nothing usable
    pub fn folder_configuration(&self, folder: &str) -> SuitabilityResult<FolderConfiguration> {
        let body = self.get_with_retries(FOLDER_CONFIGURATIONS, &[("folder", folder)])?;
        Ok(parse_folder_configuration(&body))
    }

    fn get_with_retries(&self, path: &str, query: &[(&str, &str)]) -> SuitabilityResult<String> {
        let url = self.config.endpoint(path);
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            log::debug!("GET {} attempt {} of {}", url, attempt, attempts);

            match self.get_once(&url, query) {
                Ok(body) => return Ok(body),
                Err(e) => {
                    if attempt < attempts {
                        log::warn!("Catalogue request attempt {} failed: {}, retrying...", attempt, e);
                        std::thread::sleep(std::time::Duration::from_millis(500 * attempt as u64));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SuitabilityError::NetworkFailure(format!("Request to {} failed after all retries", url))
        }))
    }

    fn get_once(&self, url: &str, query: &[(&str, &str)]) -> SuitabilityResult<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(SuitabilityError::ServerError(
                server_message(&body).unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), url)),
            ));
        }
        Ok(body)
    }
}

fn parse_json<T: DeserializeOwned>(body: &str, what: &str) -> SuitabilityResult<T> {
    serde_json::from_str(body)
        .map_err(|e| SuitabilityError::ServerError(format!("Unexpected {} response: {}", what, e)))
}

/// Decode a listing body; an error object becomes a server error
pub fn parse_listing(body: &str) -> SuitabilityResult<Vec<DirectoryItem>> {
    if let Some(message) = server_message(body) {
        return Err(SuitabilityError::ServerError(message));
    }
    parse_json(body, "directory listing")
}

pub fn parse_folder_configuration(body: &str) -> FolderConfiguration {
    match serde_json::from_str::<FolderConfiguration>(body) {
        Ok(config) if config.center.iter().all(|v| v.is_finite()) && config.zoom.is_finite() => config,
        _ => {
            log::warn!("Unusable folder configuration, using default map view");
            FolderConfiguration::default()
        }
    }
}

/// Extract `message` from an error body of the form `{"error": ...}` or
/// `{"status": "error", "message": ...}`
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    if let Some(error) = object.get("error").and_then(|v| v.as_str()) {
        return Some(error.to_string());
    }
    match object.get("status").and_then(|v| v.as_str()) {
        Some("error") => Some(
            object
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("The analysis service reported an error")
                .to_string(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_bounds() {
        let body = r#"[
            {"name": "Ethiopia", "type": "directory"},
            {"name": "evapo.tif", "type": "file", "min_val": 1239.0, "max_val": 2901.0},
            {"name": "precip.tif", "type": "file", "min_val": "102", "max_val": "2002"},
            {"name": "readme.txt", "type": "file", "min_val": null, "max_val": null}
        ]"#;

        let items = parse_listing(body).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].kind, ItemKind::Directory);
        assert_eq!(items[0].bounds(), None);
        assert_eq!(items[1].bounds(), Some((1239.0, 2901.0)));
        assert_eq!(items[2].bounds(), Some((102.0, 2002.0)));
        assert!(items[2].is_raster());
        assert!(!items[3].is_raster());
        assert_eq!(items[3].bounds(), None);
    }

    #[test]
    fn test_listing_error_object() {
        let err = parse_listing(r#"{"error": "Path does not exist"}"#).unwrap_err();
        assert!(matches!(err, SuitabilityError::ServerError(msg) if msg == "Path does not exist"));
    }

    #[test]
    fn test_folder_configuration_fallback() {
        let config = parse_folder_configuration(r#"{"center": [9.1, 40.4], "zoom": 6}"#);
        assert_eq!(config.center, [9.1, 40.4]);
        assert_eq!(config.zoom, 6.0);

        assert_eq!(parse_folder_configuration("{}"), FolderConfiguration::default());
        assert_eq!(parse_folder_configuration("<html>"), FolderConfiguration::default());
    }

    #[test]
    fn test_server_message_shapes() {
        assert_eq!(
            server_message(r#"{"status": "error", "message": "Raster missing"}"#).as_deref(),
            Some("Raster missing")
        );
        assert!(server_message(r#"{"status": "error"}"#).is_some());
        assert_eq!(server_message(r#"{"status": "success", "result_url": "/x.tif"}"#), None);
        assert_eq!(server_message("[]"), None);
    }
}
