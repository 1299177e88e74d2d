use super::format::AoiFormat;
use super::json::decode_text;
use super::normalize::{close_ring, collection_of};
use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue, Value};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Which polygon boundary a `<coordinates>` block belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
enum Boundary {
    Outer,
    Inner,
}

#[derive(Debug, Default)]
struct PolygonBuilder {
    outer: Option<Vec<Vec<f64>>>,
    inner: Vec<Vec<Vec<f64>>>,
    boundary: Option<Boundary>,
}

#[derive(Debug, Default)]
struct PlacemarkBuilder {
    name: Option<String>,
    description: Option<String>,
    geometries: Vec<Value>,
}

impl PlacemarkBuilder {
    fn into_feature(self) -> Feature {
        let geometry = match self.geometries.len() {
            0 => None,
            1 => self.geometries.into_iter().next().map(Geometry::new),
            _ if self.geometries.iter().all(|g| matches!(g, Value::Polygon(_))) => {
                let polygons = self
                    .geometries
                    .into_iter()
                    .filter_map(|g| match g {
                        Value::Polygon(rings) => Some(rings),
                        _ => None,
                    })
                    .collect();
                Some(Geometry::new(Value::MultiPolygon(polygons)))
            }
            _ => Some(Geometry::new(Value::GeometryCollection(
                self.geometries.into_iter().map(Geometry::new).collect(),
            ))),
        };

        let mut properties = JsonObject::new();
        if let Some(name) = self.name {
            properties.insert("name".to_string(), JsonValue::String(name));
        }
        if let Some(description) = self.description {
            properties.insert("description".to_string(), JsonValue::String(description));
        }

        Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Parse KML placemarks into a FeatureCollection
///
/// Supports Point, LineString, Polygon (with inner boundaries) and
/// MultiGeometry. Altitudes are dropped.
pub fn parse_kml(bytes: &[u8]) -> SuitabilityResult<GeoJson> {
    let text = decode_text(bytes, AoiFormat::Kml)?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut features = Vec::new();
    let mut placemark: Option<PlacemarkBuilder> = None;
    let mut polygon: Option<PolygonBuilder> = None;
    let mut text_buf = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SuitabilityError::parse(AoiFormat::Kml, format!("Error at position {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "Placemark" => placemark = Some(PlacemarkBuilder::default()),
                    "Polygon" => polygon = Some(PolygonBuilder::default()),
                    "outerBoundaryIs" => set_boundary(&mut polygon, Boundary::Outer),
                    "innerBoundaryIs" => set_boundary(&mut polygon, Boundary::Inner),
                    _ => {}
                }
                text_buf.clear();
                path.push(name);
            }
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| SuitabilityError::parse(AoiFormat::Kml, e))?;
                text_buf.push_str(&unescaped);
            }
            Event::CData(e) => {
                text_buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                let parent = path.last().map(String::as_str);
                match name.as_str() {
                    "coordinates" => {
                        let positions = parse_coordinates(&text_buf)?;
                        attach_coordinates(&path, positions, &mut polygon, &mut placemark)?;
                    }
                    "name" | "description" if parent == Some("Placemark") => {
                        if let Some(builder) = placemark.as_mut() {
                            let value = Some(text_buf.trim().to_string());
                            if name == "name" {
                                builder.name = value;
                            } else {
                                builder.description = value;
                            }
                        }
                    }
                    "outerBoundaryIs" | "innerBoundaryIs" => {
                        if let Some(builder) = polygon.as_mut() {
                            builder.boundary = None;
                        }
                    }
                    "Polygon" => {
                        if let Some(builder) = polygon.take() {
                            let outer = builder.outer.ok_or_else(|| {
                                SuitabilityError::parse(AoiFormat::Kml, "Polygon without outerBoundaryIs")
                            })?;
                            let mut rings = vec![outer];
                            rings.extend(builder.inner);
                            if let Some(p) = placemark.as_mut() {
                                p.geometries.push(Value::Polygon(rings));
                            }
                        }
                    }
                    "Placemark" => {
                        if let Some(builder) = placemark.take() {
                            features.push(builder.into_feature());
                        }
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    log::debug!("Parsed {} KML placemark(s)", features.len());
    Ok(GeoJson::FeatureCollection(collection_of(features)))
}

fn set_boundary(polygon: &mut Option<PolygonBuilder>, boundary: Boundary) {
    if let Some(builder) = polygon.as_mut() {
        builder.boundary = Some(boundary);
    }
}

/// Route a parsed coordinate list to the geometry that encloses it
fn attach_coordinates(
    path: &[String],
    positions: Vec<Vec<f64>>,
    polygon: &mut Option<PolygonBuilder>,
    placemark: &mut Option<PlacemarkBuilder>,
) -> SuitabilityResult<()> {
    if let Some(builder) = polygon.as_mut() {
        let ring = close_ring(positions);
        if ring.len() < 4 {
            return Err(SuitabilityError::parse(
                AoiFormat::Kml,
                format!("Polygon ring has only {} position(s)", ring.len()),
            ));
        }
        match builder.boundary {
            Some(Boundary::Outer) => builder.outer = Some(ring),
            Some(Boundary::Inner) => builder.inner.push(ring),
            None => log::warn!("Ignoring KML coordinates outside a polygon boundary"),
        }
        return Ok(());
    }

    let Some(target) = placemark.as_mut() else {
        return Ok(());
    };
    let value = match path.last().map(String::as_str) {
        Some("Point") => positions.into_iter().next().map(Value::Point),
        Some("LineString") if positions.len() >= 2 => Some(Value::LineString(positions)),
        Some("LinearRing") => Some(Value::LineString(close_ring(positions))),
        Some(other) => {
            log::debug!("Skipping KML coordinates inside <{}>", other);
            None
        }
        None => None,
    };
    if let Some(value) = value {
        target.geometries.push(value);
    }
    Ok(())
}

/// Parse whitespace-separated `lon,lat[,alt]` tuples
fn parse_coordinates(text: &str) -> SuitabilityResult<Vec<Vec<f64>>> {
    text.split_whitespace()
        .map(|tuple| {
            let values: Vec<f64> = tuple
                .split(',')
                .take(2)
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|e| SuitabilityError::parse(AoiFormat::Kml, format!("Invalid coordinate '{}': {}", tuple, e)))?;
            if values.len() < 2 {
                return Err(SuitabilityError::parse(
                    AoiFormat::Kml,
                    format!("Coordinate '{}' needs longitude and latitude", tuple),
                ));
            }
            Ok(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(doc: GeoJson) -> Vec<Feature> {
        match doc {
            GeoJson::FeatureCollection(fc) => fc.features,
            other => panic!("expected feature collection, got {:?}", other),
        }
    }

    #[test]
    fn test_polygon_with_hole_and_name() {
        let kml = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Farm &amp; field</name>
      <Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
          36.0,9.0,0 37.0,9.0,0 37.0,10.0,0 36.0,10.0,0 36.0,9.0,0
        </coordinates></LinearRing></outerBoundaryIs>
        <innerBoundaryIs><LinearRing><coordinates>
          36.2,9.2 36.4,9.2 36.4,9.4
        </coordinates></LinearRing></innerBoundaryIs>
      </Polygon>
    </Placemark>
  </Document>
</kml>"#;

        let features = features(parse_kml(kml.as_bytes()).unwrap());
        assert_eq!(features.len(), 1);

        let props = features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Farm & field");

        match &features[0].geometry.as_ref().unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0][0], vec![36.0, 9.0]);
                // inner ring was closed
                assert_eq!(rings[1].len(), 4);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_multigeometry_of_polygons_becomes_multipolygon() {
        let kml = r#"<kml><Placemark><MultiGeometry>
            <Polygon><outerBoundaryIs><LinearRing><coordinates>0,0 1,0 1,1 0,0</coordinates></LinearRing></outerBoundaryIs></Polygon>
            <Polygon><outerBoundaryIs><LinearRing><coordinates>2,2 3,2 3,3 2,2</coordinates></LinearRing></outerBoundaryIs></Polygon>
        </MultiGeometry></Placemark></kml>"#;

        let features = features(parse_kml(kml.as_bytes()).unwrap());
        assert!(matches!(
            &features[0].geometry.as_ref().unwrap().value,
            Value::MultiPolygon(polygons) if polygons.len() == 2
        ));
    }

    #[test]
    fn test_points_and_lines() {
        let kml = r#"<kml>
            <Placemark><Point><coordinates>38.7,9.0</coordinates></Point></Placemark>
            <Placemark><LineString><coordinates>38.7,9.0 38.8,9.1</coordinates></LineString></Placemark>
        </kml>"#;

        let features = features(parse_kml(kml.as_bytes()).unwrap());
        assert_eq!(features.len(), 2);
        assert!(matches!(features[0].geometry.as_ref().unwrap().value, Value::Point(_)));
        assert!(matches!(features[1].geometry.as_ref().unwrap().value, Value::LineString(_)));
    }

    #[test]
    fn test_malformed_kml() {
        assert!(matches!(
            parse_kml(b"<kml><Placemark><Point><coordinates>abc,def</coordinates></Point></Placemark></kml>"),
            Err(SuitabilityError::ParseError { .. })
        ));
        assert!(matches!(
            parse_kml(b"<kml><Placemark></Document></kml>"),
            Err(SuitabilityError::ParseError { .. })
        ));
    }
}
