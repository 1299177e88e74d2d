//! Suitability: client-side workflow for land suitability analysis
//!
//! Compose an ordered stack of rasters with optimal ranges and combine
//! groups, attach an optional area of interest (drawn, GeoJSON, KML or
//! zipped shapefile), then submit the validated request to the analysis
//! service and fetch the resulting raster.

pub mod types;
pub mod config;
pub mod stack;
pub mod aoi;
pub mod request;

// Re-export main types for easier access
pub use types::{
    BoundingBox, LatLng, ParameterField, SuitabilityError, SuitabilityResult,
};

pub use config::{ClientConfig, SubmissionPolicy};
pub use stack::{Direction, RasterEntry, RasterStackModel};
pub use aoi::{AoiDocument, AoiFormat, AoiPipeline, DrawnShape};
pub use request::{
    AnalysisService, RequestBuilder, ResultFetcher, SubmissionController, SuitabilityRequest,
};
