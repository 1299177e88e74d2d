//! Request assembly, submission and result retrieval

pub mod builder;
pub mod catalog;
pub mod results;
pub mod submit;

pub use builder::{CombineFlag, RasterParameters, RequestBuilder, SuitabilityRequest};
pub use catalog::{CatalogClient, DirectoryItem, FolderConfiguration, ItemKind};
pub use results::{CancelToken, FetchHandle, HttpResultSource, ResultCache, ResultFetcher, ResultSource};
pub use submit::{AnalysisResponse, AnalysisService, HttpAnalysisService, ResultReference, SubmissionController};
