use crate::aoi::AoiDocument;
use crate::config::SubmissionPolicy;
use crate::stack::RasterStackModel;
use crate::types::{SuitabilityError, SuitabilityResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire form of the combine flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineFlag {
    Yes,
    No,
}

impl From<bool> for CombineFlag {
    fn from(combine: bool) -> Self {
        if combine {
            CombineFlag::Yes
        } else {
            CombineFlag::No
        }
    }
}

/// Per-raster parameters, numbers sent as strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterParameters {
    pub opti_from: String,
    pub opti_to: String,
    pub min_val: String,
    pub max_val: String,
    pub combine: CombineFlag,
}

/// Validated land suitability request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuitabilityRequest {
    selected_files: Vec<String>,
    raster_parameters: BTreeMap<String, RasterParameters>,
    aoi: String,
    description: String,
}

impl SuitabilityRequest {
    /// File identifiers in stack order
    pub fn selected_files(&self) -> &[String] {
        &self.selected_files
    }

    pub fn raster_parameters(&self) -> &BTreeMap<String, RasterParameters> {
        &self.raster_parameters
    }

    pub fn parameters_for(&self, file_path: &str) -> Option<&RasterParameters> {
        self.raster_parameters.get(file_path)
    }

    /// Serialized FeatureCollection, or empty for the full raster extent
    pub fn aoi(&self) -> &str {
        &self.aoi
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn to_json(&self) -> SuitabilityResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SuitabilityError::Config(format!("Failed to serialize request: {}", e)))
    }
}

/// Assembles the submission payload from the stack, AOI and description
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    policy: SubmissionPolicy,
}

impl RequestBuilder {
    pub fn new(policy: SubmissionPolicy) -> Self {
        Self { policy }
    }

    pub fn build(
        &self,
        stack: &RasterStackModel,
        aoi: Option<&AoiDocument>,
        description: &str,
    ) -> SuitabilityResult<SuitabilityRequest> {
        let description = description.trim();
        if description.is_empty() {
            return Err(SuitabilityError::NoDescription);
        }

        if stack.len() < self.policy.min_layers {
            return Err(SuitabilityError::InsufficientLayers {
                required: self.policy.min_layers,
                selected: stack.len(),
            });
        }

        let mut selected_files = Vec::with_capacity(stack.len());
        let mut raster_parameters = BTreeMap::new();

        for (position, entry) in stack.entries().iter().enumerate() {
            let (opti_from, opti_to) = match (entry.opti_from(), entry.opti_to()) {
                (Some(from), Some(to)) => (from, to),
                _ => return Err(SuitabilityError::IncompleteParameters(entry.file_path().to_string())),
            };

            let (min_val, max_val) = (entry.min_val(), entry.max_val());
            if !(min_val <= opti_from && opti_from <= opti_to && opti_to <= max_val) {
                return Err(SuitabilityError::InvalidRange {
                    file_path: entry.file_path().to_string(),
                    min_val,
                    opti_from,
                    opti_to,
                    max_val,
                });
            }

            selected_files.push(entry.file_path().to_string());
            raster_parameters.insert(
                entry.file_path().to_string(),
                RasterParameters {
                    opti_from: opti_from.to_string(),
                    opti_to: opti_to.to_string(),
                    min_val: min_val.to_string(),
                    max_val: max_val.to_string(),
                    combine: CombineFlag::from(position > 0 && entry.combine()),
                },
            );
        }

        let aoi = aoi.map(AoiDocument::to_json).unwrap_or_default();
        log::info!(
            "Built suitability request: {} raster(s) in {} group(s), AOI {}",
            selected_files.len(),
            stack.grouping().group_count(),
            if aoi.is_empty() { "full extent" } else { "set" }
        );

        Ok(SuitabilityRequest {
            selected_files,
            raster_parameters,
            aoi,
            description: description.to_string(),
        })
    }
}
