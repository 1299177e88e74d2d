use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

/// Wrap a loose geometry or feature into a FeatureCollection
pub fn normalize(document: GeoJson) -> FeatureCollection {
    match document {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => collection_of(vec![feature]),
        GeoJson::Geometry(geometry) => collection_of(vec![feature_of(geometry)]),
    }
}

/// Keep only Polygon and MultiPolygon features
///
/// Fails on an empty collection, or when nothing polygonal remains.
pub fn retain_polygons(mut collection: FeatureCollection) -> SuitabilityResult<FeatureCollection> {
    if collection.features.is_empty() {
        return Err(SuitabilityError::EmptyAoi);
    }

    let total = collection.features.len();
    collection.features.retain(is_polygonal);

    if collection.features.is_empty() {
        return Err(SuitabilityError::NoPolygon);
    }
    if collection.features.len() < total {
        log::debug!(
            "Dropped {} non-polygon feature(s) from AOI",
            total - collection.features.len()
        );
    }
    Ok(collection)
}

pub fn is_polygonal(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(Value::Polygon(_)) | Some(Value::MultiPolygon(_))
    )
}

pub(crate) fn collection_of(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub(crate) fn feature_of(geometry: Geometry) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: None,
        foreign_members: None,
    }
}

/// Append the first position when a ring is not already closed
pub(crate) fn close_ring(mut ring: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
        if first != last {
            let first = first.clone();
            ring.push(first);
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::new(Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]))
    }

    fn line() -> Geometry {
        Geometry::new(Value::LineString(vec![vec![0.0, 0.0], vec![2.0, 2.0]]))
    }

    #[test]
    fn test_normalize_lifts_geometry_and_feature() {
        assert_eq!(normalize(GeoJson::Geometry(square())).features.len(), 1);
        assert_eq!(normalize(GeoJson::Feature(feature_of(square()))).features.len(), 1);

        let collection = collection_of(vec![feature_of(square()), feature_of(line())]);
        assert_eq!(normalize(GeoJson::FeatureCollection(collection)).features.len(), 2);
    }

    #[test]
    fn test_retain_polygons_filters_lines() {
        let collection = collection_of(vec![feature_of(square()), feature_of(line())]);
        let filtered = retain_polygons(collection).unwrap();
        assert_eq!(filtered.features.len(), 1);
        assert!(is_polygonal(&filtered.features[0]));
    }

    #[test]
    fn test_retain_polygons_errors() {
        assert!(matches!(
            retain_polygons(collection_of(Vec::new())),
            Err(SuitabilityError::EmptyAoi)
        ));

        let no_geometry = Feature {
            geometry: None,
            ..feature_of(square())
        };
        assert!(matches!(
            retain_polygons(collection_of(vec![feature_of(line()), no_geometry])),
            Err(SuitabilityError::NoPolygon)
        ));
    }

    #[test]
    fn test_close_ring() {
        let ring = close_ring(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![1.0, 1.0]]);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());

        let closed = close_ring(ring.clone());
        assert_eq!(closed, ring);
        assert!(close_ring(Vec::new()).is_empty());
    }
}
