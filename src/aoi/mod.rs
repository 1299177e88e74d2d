//! Area of interest ingestion: format parsers, normalization and the commit pipeline

pub mod format;
pub mod drawn;
pub mod json;
pub mod kml;
pub mod shapefile;
pub mod normalize;
pub mod document;
pub mod pipeline;

pub use format::{AoiFormat, FileParser};
pub use drawn::DrawnShape;
pub use document::AoiDocument;
pub use pipeline::{AoiPipeline, AoiState};
