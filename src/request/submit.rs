use super::builder::SuitabilityRequest;
use super::catalog::server_message;
use crate::config::ClientConfig;
use crate::types::{SuitabilityError, SuitabilityResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

const PROCESS_LAND_SUITABILITY: &str = "api/processLandSuitability";
const GENERIC_SERVER_ERROR: &str = "The analysis service reported an error";

/// Response body of the analysis endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisResponse {
    Success { result_url: String },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

impl AnalysisResponse {
    /// Interpret a response body
    ///
    /// Unrecognized bodies are server errors; when the status code was
    /// not a success the code is reported instead.
    pub fn interpret(status: u16, body: &str) -> SuitabilityResult<String> {
        match serde_json::from_str::<AnalysisResponse>(body) {
            Ok(AnalysisResponse::Success { result_url }) => Ok(result_url),
            Ok(AnalysisResponse::Error { message }) => Err(SuitabilityError::ServerError(
                message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_SERVER_ERROR.to_string()),
            )),
            Err(e) => {
                log::debug!("Unparseable analysis response ({}): {}", status, e);
                let message = server_message(body).unwrap_or_else(|| {
                    if (200..300).contains(&status) {
                        GENERIC_SERVER_ERROR.to_string()
                    } else {
                        format!("{} (HTTP {})", GENERIC_SERVER_ERROR, status)
                    }
                });
                Err(SuitabilityError::ServerError(message))
            }
        }
    }
}

/// Anything that can run a land suitability analysis
pub trait AnalysisService: Send + Sync {
    /// Submit the request and return the result URL
    fn process_land_suitability(&self, request: &SuitabilityRequest) -> SuitabilityResult<String>;
}

/// HTTP client for the analysis backend
pub struct HttpAnalysisService {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpAnalysisService {
    pub fn new(config: &ClientConfig) -> SuitabilityResult<Self> {
        config.validate()?;
        Ok(Self {
            client: config.http_client()?,
            endpoint: config.endpoint(PROCESS_LAND_SUITABILITY),
        })
    }
}

impl AnalysisService for HttpAnalysisService {
    fn process_land_suitability(&self, request: &SuitabilityRequest) -> SuitabilityResult<String> {
        log::info!("POST {} ({} raster(s))", self.endpoint, request.selected_files().len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SuitabilityError::NetworkFailure(format!("Failed to read response body: {}", e)))?;

        AnalysisResponse::interpret(status, &body)
    }
}

/// A completed analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultReference {
    pub url: String,
    pub description: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Outcomes {
    last_result: Option<ResultReference>,
    last_error: Option<String>,
}

/// Resets the pending flag however the submission ends
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs one submission at a time and remembers the outcome
///
/// A failed submission records its message but keeps the previous
/// result available.
pub struct SubmissionController<S: AnalysisService> {
    service: S,
    pending: AtomicBool,
    outcomes: Mutex<Outcomes>,
}

impl<S: AnalysisService> SubmissionController<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            pending: AtomicBool::new(false),
            outcomes: Mutex::new(Outcomes::default()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn submit(&self, request: &SuitabilityRequest) -> SuitabilityResult<ResultReference> {
        if self.pending.swap(true, Ordering::SeqCst) {
            log::warn!("Submission rejected: another analysis is still running");
            return Err(SuitabilityError::SubmissionPending);
        }
        let _guard = PendingGuard(&self.pending);

        log::info!("Submitting analysis '{}'", request.description());
        let start = std::time::Instant::now();
        let outcome = self.service.process_land_suitability(request);

        let mut outcomes = self.outcomes();
        match outcome {
            Ok(url) => {
                log::info!("Analysis finished in {:.1}s: {}", start.elapsed().as_secs_f64(), url);
                let reference = ResultReference {
                    url,
                    description: request.description().to_string(),
                    completed_at: Utc::now(),
                };
                outcomes.last_result = Some(reference.clone());
                outcomes.last_error = None;
                Ok(reference)
            }
            Err(e) => {
                log::error!("Analysis failed: {}", e);
                outcomes.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn last_result(&self) -> Option<ResultReference> {
        self.outcomes().last_result.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.outcomes().last_error.clone()
    }

    fn outcomes(&self) -> MutexGuard<'_, Outcomes> {
        self.outcomes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_success() {
        let url = AnalysisResponse::interpret(200, r#"{"status": "success", "result_url": "/media/out.tif"}"#).unwrap();
        assert_eq!(url, "/media/out.tif");
    }

    #[test]
    fn test_interpret_error_message_verbatim() {
        let err = AnalysisResponse::interpret(500, r#"{"status": "error", "message": "Raster not found: x.tif"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Server error: Raster not found: x.tif");
    }

    #[test]
    fn test_interpret_generic_fallback() {
        for body in [r#"{"status": "error"}"#, r#"{"status": "error", "message": " "}"#] {
            let err = AnalysisResponse::interpret(200, body).unwrap_err();
            assert!(matches!(err, SuitabilityError::ServerError(ref m) if m == GENERIC_SERVER_ERROR));
        }

        let err = AnalysisResponse::interpret(502, "<html>Bad gateway</html>").unwrap_err();
        assert!(matches!(err, SuitabilityError::ServerError(ref m) if m.contains("502")));
    }
}
