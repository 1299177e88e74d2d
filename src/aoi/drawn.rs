use super::normalize::close_ring;
use crate::types::{BoundingBox, LatLng, SuitabilityError, SuitabilityResult};
use geojson::{GeoJson, Geometry, Value};
use serde::{Deserialize, Serialize};

const DRAWN: &str = "drawn shape";

/// A shape drawn interactively on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DrawnShape {
    Rectangle { bounds: BoundingBox },
    Polygon { vertices: Vec<LatLng> },
}

impl DrawnShape {
    pub fn rectangle(south: f64, west: f64, north: f64, east: f64) -> Self {
        DrawnShape::Rectangle {
            bounds: BoundingBox {
                min_lon: west,
                max_lon: east,
                min_lat: south,
                max_lat: north,
            },
        }
    }

    pub fn polygon(vertices: Vec<LatLng>) -> Self {
        DrawnShape::Polygon { vertices }
    }

    /// Polygon geometry with a closed `[lng, lat]` ring
    pub fn to_geometry(&self) -> SuitabilityResult<Geometry> {
        let ring = match self {
            DrawnShape::Rectangle { bounds } => {
                let b = bounds;
                let finite = [b.min_lon, b.max_lon, b.min_lat, b.max_lat].iter().all(|v| v.is_finite());
                if !finite || b.min_lon >= b.max_lon || b.min_lat >= b.max_lat {
                    return Err(SuitabilityError::parse(
                        DRAWN,
                        format!(
                            "Degenerate rectangle: south={}, west={}, north={}, east={}",
                            b.min_lat, b.min_lon, b.max_lat, b.max_lon
                        ),
                    ));
                }
                vec![
                    vec![b.min_lon, b.min_lat],
                    vec![b.max_lon, b.min_lat],
                    vec![b.max_lon, b.max_lat],
                    vec![b.min_lon, b.max_lat],
                    vec![b.min_lon, b.min_lat],
                ]
            }
            DrawnShape::Polygon { vertices } => {
                if vertices.iter().any(|v| !v.lat.is_finite() || !v.lng.is_finite()) {
                    return Err(SuitabilityError::parse(DRAWN, "Polygon has non-finite vertices"));
                }
                let mut distinct: Vec<LatLng> = Vec::with_capacity(vertices.len());
                for vertex in vertices {
                    if !distinct.contains(vertex) {
                        distinct.push(*vertex);
                    }
                }
                if distinct.len() < 3 {
                    return Err(SuitabilityError::parse(
                        DRAWN,
                        format!("Polygon needs at least 3 distinct vertices, got {}", distinct.len()),
                    ));
                }
                close_ring(vertices.iter().map(|v| v.to_position()).collect())
            }
        };

        Ok(Geometry::new(Value::Polygon(vec![ring])))
    }

    pub fn to_document(&self) -> SuitabilityResult<GeoJson> {
        self.to_geometry().map(GeoJson::Geometry)
    }
}

impl std::str::FromStr for DrawnShape {
    type Err = SuitabilityError;

    /// Textual forms accepted by the analysis service:
    /// `"lat,lng;lat,lng;..."` for polygons, `"south,west,north,east"` for rectangles
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let number = |token: &str| -> SuitabilityResult<f64> {
            token
                .trim()
                .parse::<f64>()
                .map_err(|e| SuitabilityError::parse(DRAWN, format!("Invalid coordinate '{}': {}", token.trim(), e)))
        };

        if s.contains(';') {
            let mut vertices = Vec::new();
            for pair in s.split(';').filter(|p| !p.trim().is_empty()) {
                let parts: Vec<&str> = pair.split(',').collect();
                if parts.len() != 2 {
                    return Err(SuitabilityError::parse(DRAWN, format!("Invalid coordinate format: {}", pair)));
                }
                vertices.push(LatLng::new(number(parts[0])?, number(parts[1])?));
            }
            return Ok(DrawnShape::polygon(vertices));
        }

        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            return Ok(DrawnShape::rectangle(
                number(parts[0])?,
                number(parts[1])?,
                number(parts[2])?,
                number(parts[3])?,
            ));
        }

        Err(SuitabilityError::parse(DRAWN, format!("Invalid AOI format: {}", s)))
    }
}
