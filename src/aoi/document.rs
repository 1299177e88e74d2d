use crate::types::BoundingBox;
use geojson::{FeatureCollection, GeoJson, Geometry, Value};

/// Committed area of interest: a polygon-only FeatureCollection
#[derive(Debug, Clone, PartialEq)]
pub struct AoiDocument {
    collection: FeatureCollection,
}

impl AoiDocument {
    /// Caller guarantees the collection has already been filtered to polygons
    pub(crate) fn new(collection: FeatureCollection) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &FeatureCollection {
        &self.collection
    }

    pub fn polygon_count(&self) -> usize {
        self.collection.features.len()
    }

    /// Human-readable status line for the committed AOI
    pub fn status_text(&self) -> String {
        format!("AOI loaded: {} polygon(s)", self.polygon_count())
    }

    /// Serialized FeatureCollection as submitted to the analysis service
    pub fn to_json(&self) -> String {
        GeoJson::FeatureCollection(self.collection.clone()).to_string()
    }

    /// Extent of every vertex in the AOI, for fitting the map view
    pub fn bounds(&self) -> Option<BoundingBox> {
        let mut bbox: Option<BoundingBox> = None;
        for geometry in self.collection.features.iter().filter_map(|f| f.geometry.as_ref()) {
            extend_bounds(&mut bbox, geometry);
        }
        bbox
    }
}

fn extend_bounds(bbox: &mut Option<BoundingBox>, geometry: &Geometry) {
    match &geometry.value {
        Value::Point(p) => visit(bbox, p),
        Value::MultiPoint(points) | Value::LineString(points) => {
            points.iter().for_each(|p| visit(bbox, p))
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            lines.iter().flatten().for_each(|p| visit(bbox, p))
        }
        Value::MultiPolygon(polygons) => {
            polygons.iter().flatten().flatten().for_each(|p| visit(bbox, p))
        }
        Value::GeometryCollection(geometries) => {
            for inner in geometries {
                extend_bounds(bbox, inner);
            }
        }
    }
}

fn visit(bbox: &mut Option<BoundingBox>, position: &[f64]) {
    match bbox {
        Some(b) => b.extend(position),
        None => *bbox = BoundingBox::from_position(position),
    }
}
