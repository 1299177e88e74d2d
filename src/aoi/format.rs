use super::{json, kml, shapefile};
use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::GeoJson;
use std::path::Path;

/// Decoder from uploaded bytes to a generic geometry document
pub type FileParser = fn(&[u8]) -> SuitabilityResult<GeoJson>;

/// Uploadable AOI file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AoiFormat {
    GeoJson,
    Kml,
    ZippedShapefile,
}

impl std::fmt::Display for AoiFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AoiFormat::GeoJson => write!(f, "GeoJSON"),
            AoiFormat::Kml => write!(f, "KML"),
            AoiFormat::ZippedShapefile => write!(f, "Shapefile"),
        }
    }
}

/// Extension dispatch table, matched case-insensitively
const EXTENSIONS: &[(&str, AoiFormat)] = &[
    ("geojson", AoiFormat::GeoJson),
    ("json", AoiFormat::GeoJson),
    ("kml", AoiFormat::Kml),
    ("zip", AoiFormat::ZippedShapefile),
];

impl AoiFormat {
    /// Detect the format from an uploaded file name
    pub fn from_file_name(file_name: &str) -> SuitabilityResult<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .ok_or_else(|| SuitabilityError::UnsupportedFormat(file_name.to_string()))?;

        EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, format)| *format)
            .ok_or_else(|| SuitabilityError::UnsupportedFormat(file_name.to_string()))
    }

    pub fn parser(self) -> FileParser {
        match self {
            AoiFormat::GeoJson => json::parse_geojson,
            AoiFormat::Kml => kml::parse_kml,
            AoiFormat::ZippedShapefile => shapefile::parse_zipped_shapefile,
        }
    }

    /// Extensions accepted for this format
    pub fn extensions(self) -> Vec<&'static str> {
        EXTENSIONS
            .iter()
            .filter(|(_, format)| *format == self)
            .map(|(ext, _)| *ext)
            .collect()
    }
}
