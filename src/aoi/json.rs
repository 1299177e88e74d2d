use super::format::AoiFormat;
use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::GeoJson;

/// Decode upload bytes as UTF-8 text, dropping a leading byte-order mark
pub(crate) fn decode_text(bytes: &[u8], format: AoiFormat) -> SuitabilityResult<&str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| SuitabilityError::parse(format, format!("Invalid UTF-8 content: {}", e)))
}

/// Parse GeoJSON text: a bare Geometry, a Feature or a FeatureCollection
pub fn parse_geojson(bytes: &[u8]) -> SuitabilityResult<GeoJson> {
    let text = decode_text(bytes, AoiFormat::GeoJson)?;
    if text.trim().is_empty() {
        return Err(SuitabilityError::parse(AoiFormat::GeoJson, "File is empty"));
    }

    let document = text
        .parse::<GeoJson>()
        .map_err(|e| SuitabilityError::parse(AoiFormat::GeoJson, e))?;

    log::debug!(
        "Parsed GeoJSON {}",
        match &document {
            GeoJson::Geometry(_) => "geometry",
            GeoJson::Feature(_) => "feature",
            GeoJson::FeatureCollection(_) => "feature collection",
        }
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_geometry() {
        let doc = parse_geojson(br#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#).unwrap();
        assert!(matches!(doc, GeoJson::Geometry(_)));
    }

    #[test]
    fn test_parse_with_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"{"type":"FeatureCollection","features":[]}"#);
        assert!(matches!(parse_geojson(&bytes).unwrap(), GeoJson::FeatureCollection(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        for input in [&b"{not json"[..], &b""[..], &b"{\"type\":\"Circle\"}"[..], &[0xFF, 0xFE][..]] {
            assert!(matches!(
                parse_geojson(input),
                Err(SuitabilityError::ParseError { .. })
            ));
        }
    }
}
