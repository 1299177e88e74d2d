use super::document::AoiDocument;
use super::drawn::DrawnShape;
use super::format::AoiFormat;
use super::normalize::{normalize, retain_polygons};
use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::GeoJson;
use std::path::Path;

const FULL_EXTENT_STATUS: &str = "No AOI: using full raster extent";

/// Ingestion stages; any stage falls back to `Empty` on failure or clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoiState {
    Empty,
    Detecting,
    Parsing,
    Normalizing,
    Validating,
    Committed,
}

/// Turns drawn shapes and uploaded files into the current AOI
///
/// Every successful ingestion replaces the AOI wholesale. A failed one
/// leaves no AOI behind.
#[derive(Debug)]
pub struct AoiPipeline {
    state: AoiState,
    current: Option<AoiDocument>,
    status: String,
}

impl Default for AoiPipeline {
    fn default() -> Self {
        Self {
            state: AoiState::Empty,
            current: None,
            status: FULL_EXTENT_STATUS.to_string(),
        }
    }
}

impl AoiPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AoiState {
        self.state
    }

    pub fn current(&self) -> Option<&AoiDocument> {
        self.current.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Serialized AOI for submission; empty means full extent
    pub fn serialized(&self) -> String {
        self.current.as_ref().map(AoiDocument::to_json).unwrap_or_default()
    }

    /// Commit a rectangle or polygon drawn on the map
    pub fn ingest_drawn(&mut self, shape: &DrawnShape) -> SuitabilityResult<&AoiDocument> {
        let result = self.run_drawn(shape);
        self.finish(result)
    }

    /// Detect the format from `file_name` and commit the uploaded contents
    pub fn ingest_file(&mut self, file_name: &str, bytes: &[u8]) -> SuitabilityResult<&AoiDocument> {
        let result = self.run_file(file_name, bytes);
        self.finish(result)
    }

    /// Read a file from disk and ingest it
    pub fn ingest_path<P: AsRef<Path>>(&mut self, path: P) -> SuitabilityResult<&AoiDocument> {
        let path = path.as_ref();
        log::info!("Loading AOI file: {}", path.display());

        let file_name = path.to_string_lossy().into_owned();
        let result = std::fs::read(path)
            .map_err(SuitabilityError::from)
            .and_then(|bytes| self.run_file(&file_name, &bytes));
        self.finish(result)
    }

    /// Drop the current AOI; submissions then cover the full extent
    pub fn clear(&mut self) {
        if self.current.take().is_some() {
            log::info!("AOI cleared");
        }
        self.transition(AoiState::Empty);
        self.status = FULL_EXTENT_STATUS.to_string();
    }

    fn run_drawn(&mut self, shape: &DrawnShape) -> SuitabilityResult<AoiDocument> {
        self.transition(AoiState::Detecting);
        self.transition(AoiState::Parsing);
        let document = shape.to_document()?;
        self.validate(document)
    }

    fn run_file(&mut self, file_name: &str, bytes: &[u8]) -> SuitabilityResult<AoiDocument> {
        self.transition(AoiState::Detecting);
        let format = AoiFormat::from_file_name(file_name)?;
        log::debug!("Detected {} AOI from {} ({} bytes)", format, file_name, bytes.len());

        self.transition(AoiState::Parsing);
        let document = (format.parser())(bytes)?;
        self.validate(document)
    }

    fn validate(&mut self, document: GeoJson) -> SuitabilityResult<AoiDocument> {
        self.transition(AoiState::Normalizing);
        let collection = normalize(document);

        self.transition(AoiState::Validating);
        let collection = retain_polygons(collection)?;
        Ok(AoiDocument::new(collection))
    }

    fn finish(&mut self, result: SuitabilityResult<AoiDocument>) -> SuitabilityResult<&AoiDocument> {
        match result {
            Ok(document) => {
                self.transition(AoiState::Committed);
                self.status = document.status_text();
                log::info!("{}", self.status);
                Ok(&*self.current.insert(document))
            }
            Err(e) => {
                log::warn!("AOI ingestion failed: {}", e);
                self.current = None;
                self.transition(AoiState::Empty);
                self.status = format!("AOI error: {}", e);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: AoiState) {
        log::debug!("AOI pipeline: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
