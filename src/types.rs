use serde::{Deserialize, Serialize};

/// Geographic coordinate as produced by the map drawing layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// GeoJSON position, longitude first
    pub fn to_position(self) -> Vec<f64> {
        vec![self.lng, self.lat]
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Grow the box to include a `[lon, lat, ...]` position
    pub fn extend(&mut self, position: &[f64]) {
        if position.len() < 2 {
            return;
        }
        self.min_lon = self.min_lon.min(position[0]);
        self.max_lon = self.max_lon.max(position[0]);
        self.min_lat = self.min_lat.min(position[1]);
        self.max_lat = self.max_lat.max(position[1]);
    }

    /// Box covering exactly one position
    pub fn from_position(position: &[f64]) -> Option<Self> {
        if position.len() < 2 {
            return None;
        }
        Some(Self {
            min_lon: position[0],
            max_lon: position[0],
            min_lat: position[1],
            max_lat: position[1],
        })
    }
}

/// One of the four bounded suitability parameters of a raster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterField {
    MinVal,
    MaxVal,
    OptiFrom,
    OptiTo,
}

impl std::fmt::Display for ParameterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterField::MinVal => write!(f, "min_val"),
            ParameterField::MaxVal => write!(f, "max_val"),
            ParameterField::OptiFrom => write!(f, "opti_from"),
            ParameterField::OptiTo => write!(f, "opti_to"),
        }
    }
}

impl std::str::FromStr for ParameterField {
    type Err = SuitabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min_val" | "minval" | "min" => Ok(ParameterField::MinVal),
            "max_val" | "maxval" | "max" => Ok(ParameterField::MaxVal),
            "opti_from" | "optifrom" => Ok(ParameterField::OptiFrom),
            "opti_to" | "optito" => Ok(ParameterField::OptiTo),
            other => Err(SuitabilityError::Config(format!(
                "Unknown parameter field: {}",
                other
            ))),
        }
    }
}

/// Error types for stack composition, AOI ingestion and submission
#[derive(Debug, thiserror::Error)]
pub enum SuitabilityError {
    #[error("Raster already selected: {0}")]
    DuplicateEntry(String),

    #[error("Raster not in stack: {0}")]
    EntryNotFound(String),

    #[error("Invalid bounds for {file_path}: min_val={min_val}, max_val={max_val}")]
    InvalidBounds {
        file_path: String,
        min_val: f64,
        max_val: f64,
    },

    #[error("No min_val/max_val available for {0}")]
    MissingBounds(String),

    #[error("Please enter optimum values for {0}")]
    IncompleteParameters(String),

    #[error(
        "Invalid range for {file_path}: expected min_val <= opti_from <= opti_to <= max_val, \
         got min_val={min_val}, opti_from={opti_from}, opti_to={opti_to}, max_val={max_val}"
    )]
    InvalidRange {
        file_path: String,
        min_val: f64,
        opti_from: f64,
        opti_to: f64,
        max_val: f64,
    },

    #[error("Description is required")]
    NoDescription,

    #[error("At least {required} raster layer(s) must be selected, got {selected}")]
    InsufficientLayers { required: usize, selected: usize },

    #[error("Unsupported AOI format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} AOI: {message}")]
    ParseError { format: String, message: String },

    #[error("AOI contains no features")]
    EmptyAoi,

    #[error("AOI contains no Polygon or MultiPolygon features")]
    NoPolygon,

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("A submission is already pending")]
    SubmissionPending,

    #[error("Fetch cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SuitabilityError {
    pub(crate) fn parse(format: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        SuitabilityError::ParseError {
            format: format.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for suitability operations
pub type SuitabilityResult<T> = Result<T, SuitabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_extend() {
        let mut bbox = BoundingBox::from_position(&[36.0, 9.0]).unwrap();
        bbox.extend(&[38.5, 7.5]);
        bbox.extend(&[37.0]);

        assert_eq!(bbox.min_lon, 36.0);
        assert_eq!(bbox.max_lon, 38.5);
        assert_eq!(bbox.min_lat, 7.5);
        assert_eq!(bbox.max_lat, 9.0);
    }

    #[test]
    fn test_parameter_field_names() {
        assert_eq!("opti_from".parse::<ParameterField>().unwrap(), ParameterField::OptiFrom);
        assert_eq!("MAX_VAL".parse::<ParameterField>().unwrap(), ParameterField::MaxVal);
        assert!("weight".parse::<ParameterField>().is_err());
        assert_eq!(ParameterField::OptiTo.to_string(), "opti_to");
    }

    #[test]
    fn test_invalid_range_message_names_entry() {
        let err = SuitabilityError::InvalidRange {
            file_path: "/Africa/Kenya/rainfall.tif".to_string(),
            min_val: 0.0,
            opti_from: 5.0,
            opti_to: 3.0,
            max_val: 10.0,
        };
        let message = err.to_string();
        assert!(message.contains("/Africa/Kenya/rainfall.tif"));
        assert!(message.contains("opti_from=5"));
        assert!(message.contains("opti_to=3"));
    }
}
