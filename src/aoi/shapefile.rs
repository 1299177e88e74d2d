use super::format::AoiFormat;
use super::normalize::collection_of;
use crate::types::{SuitabilityError, SuitabilityResult};
use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue, Value};
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;

const SHP_FILE_CODE: i32 = 9994;
const SHP_VERSION: i32 = 1000;
const SHP_HEADER_LEN: usize = 100;

/// ESRI Shapefile shape type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    MultiPatch,
}

impl ShapeType {
    /// Z and M variants share the XY layout of their base type
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ShapeType::Null),
            1 | 11 | 21 => Some(ShapeType::Point),
            3 | 13 | 23 => Some(ShapeType::PolyLine),
            5 | 15 | 25 => Some(ShapeType::Polygon),
            8 | 18 | 28 => Some(ShapeType::MultiPoint),
            31 => Some(ShapeType::MultiPatch),
            _ => None,
        }
    }
}

fn shp_error(message: impl std::fmt::Display) -> SuitabilityError {
    SuitabilityError::parse(AoiFormat::ZippedShapefile, message)
}

/// Parse every Shapefile layer in a ZIP archive into one FeatureCollection
pub fn parse_zipped_shapefile(bytes: &[u8]) -> SuitabilityResult<GeoJson> {
    if !is_zip_content(bytes) {
        return Err(shp_error("Not a ZIP archive"));
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| shp_error(format!("Failed to open ZIP archive: {}", e)))?;

    // lowercase member name -> contents
    let mut members: HashMap<String, Vec<u8>> = HashMap::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| shp_error(format!("Failed to read ZIP entry {}: {}", i, e)))?;
        let name = file.name().to_string();
        if file.is_dir() || name.starts_with("__MACOSX/") {
            continue;
        }
        let lower = name.to_lowercase();
        if lower.ends_with(".shp") || lower.ends_with(".dbf") || lower.ends_with(".prj") {
            let mut buffer = Vec::new();
            file.read_to_end(&mut buffer)
                .map_err(|e| shp_error(format!("Failed to read {}: {}", name, e)))?;
            members.insert(lower, buffer);
        }
    }

    let mut layers: Vec<&String> = members.keys().filter(|name| name.ends_with(".shp")).collect();
    if layers.is_empty() {
        return Err(shp_error("No .shp file found in ZIP archive"));
    }
    layers.sort();

    let mut features = Vec::new();
    for shp_name in layers {
        let stem = &shp_name[..shp_name.len() - 4];
        log::debug!("Reading Shapefile layer: {}", stem);

        if let Some(prj) = members.get(&format!("{}.prj", stem)) {
            check_projection(stem, &String::from_utf8_lossy(prj));
        }

        let shapes = read_shp(&members[shp_name])?;
        let mut records = match members.get(&format!("{}.dbf", stem)) {
            Some(dbf) => read_dbf(dbf)?,
            None => Vec::new(),
        }
        .into_iter();

        for shape in shapes {
            let properties = records.next();
            features.push(Feature {
                bbox: None,
                geometry: shape.map(Geometry::new),
                id: None,
                properties,
                foreign_members: None,
            });
        }
    }

    log::debug!("Parsed {} Shapefile record(s)", features.len());
    Ok(GeoJson::FeatureCollection(collection_of(features)))
}

/// Check if content is ZIP format by examining magic bytes
fn is_zip_content(content: &[u8]) -> bool {
    content.len() >= 4 && content[0..4] == [0x50, 0x4B, 0x03, 0x04]
}

/// Warn when the layer is not in geographic coordinates
fn check_projection(layer: &str, wkt: &str) {
    let projected = Regex::new(r#"^\s*PROJCS\[\s*"([^"]*)""#).ok().and_then(|re| {
        re.captures(wkt)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    });

    match projected {
        Some(crs) => log::warn!(
            "Shapefile layer {} uses projected CRS '{}'; coordinates are used as-is",
            layer,
            crs
        ),
        None => log::debug!("Shapefile layer {} is in geographic coordinates", layer),
    }
}

fn read_i32_be(bytes: &[u8], offset: usize) -> SuitabilityResult<i32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| shp_error(format!("Unexpected end of data at byte {}", offset)))
}

fn read_i32_le(bytes: &[u8], offset: usize) -> SuitabilityResult<i32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| shp_error(format!("Unexpected end of data at byte {}", offset)))
}

fn read_f64_le(bytes: &[u8], offset: usize) -> SuitabilityResult<f64> {
    bytes
        .get(offset..offset + 8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .ok_or_else(|| shp_error(format!("Unexpected end of data at byte {}", offset)))
}

fn read_count(bytes: &[u8], offset: usize, what: &str) -> SuitabilityResult<usize> {
    let value = read_i32_le(bytes, offset)?;
    usize::try_from(value).map_err(|_| shp_error(format!("Negative {} count: {}", what, value)))
}

/// Read the geometry of every record in a `.shp` file
///
/// Null shapes and MultiPatch records yield `None`.
pub fn read_shp(bytes: &[u8]) -> SuitabilityResult<Vec<Option<Value>>> {
    if bytes.len() < SHP_HEADER_LEN {
        return Err(shp_error(format!("Header too short: {} bytes", bytes.len())));
    }
    let file_code = read_i32_be(bytes, 0)?;
    if file_code != SHP_FILE_CODE {
        return Err(shp_error(format!("Invalid file code {}", file_code)));
    }
    let version = read_i32_le(bytes, 28)?;
    if version != SHP_VERSION {
        return Err(shp_error(format!("Unsupported version {}", version)));
    }
    let declared_len = read_i32_be(bytes, 24)?.max(0) as usize * 2;
    let end = declared_len.clamp(SHP_HEADER_LEN, bytes.len());

    let mut shapes = Vec::new();
    let mut offset = SHP_HEADER_LEN;
    while offset + 8 <= end {
        let record_number = read_i32_be(bytes, offset)?;
        let content_len = read_i32_be(bytes, offset + 4)?.max(0) as usize * 2;
        let start = offset + 8;
        let content = bytes.get(start..start + content_len).ok_or_else(|| {
            shp_error(format!("Record {} truncated at byte {}", record_number, start))
        })?;

        shapes.push(read_shape(content, record_number)?);
        offset = start + content_len;
    }

    Ok(shapes)
}

fn read_shape(content: &[u8], record_number: i32) -> SuitabilityResult<Option<Value>> {
    let code = read_i32_le(content, 0)?;
    let shape_type = ShapeType::from_code(code)
        .ok_or_else(|| shp_error(format!("Record {} has unknown shape type {}", record_number, code)))?;

    let value = match shape_type {
        ShapeType::Null => None,
        ShapeType::Point => Some(Value::Point(vec![read_f64_le(content, 4)?, read_f64_le(content, 12)?])),
        ShapeType::MultiPoint => {
            let count = read_count(content, 36, "point")?;
            ensure_layout(content, 40, 0, count, record_number)?;
            Some(Value::MultiPoint(read_points(content, 40, count)?))
        }
        ShapeType::PolyLine | ShapeType::Polygon => {
            let num_parts = read_count(content, 36, "part")?;
            let num_points = read_count(content, 40, "point")?;
            ensure_layout(content, 44, num_parts, num_points, record_number)?;
            let mut starts = Vec::with_capacity(num_parts);
            for i in 0..num_parts {
                starts.push(read_count(content, 44 + 4 * i, "part index")?);
            }
            let points = read_points(content, 44 + 4 * num_parts, num_points)?;
            let parts = split_parts(points, &starts, record_number)?;

            if shape_type == ShapeType::Polygon {
                assemble_polygon(parts)
            } else if parts.len() == 1 {
                parts.into_iter().next().map(Value::LineString)
            } else {
                Some(Value::MultiLineString(parts))
            }
        }
        ShapeType::MultiPatch => {
            log::warn!("Skipping MultiPatch record {}", record_number);
            None
        }
    };
    Ok(value)
}

/// Check that `parts` part indices and `points` XY pairs starting at
/// `offset` fit inside the record before anything is allocated for them
fn ensure_layout(content: &[u8], offset: usize, parts: usize, points: usize, record_number: i32) -> SuitabilityResult<()> {
    let needed = parts
        .checked_mul(4)
        .zip(points.checked_mul(16))
        .and_then(|(part_bytes, point_bytes)| part_bytes.checked_add(point_bytes))
        .and_then(|len| len.checked_add(offset));
    match needed {
        Some(needed) if needed <= content.len() => Ok(()),
        _ => Err(shp_error(format!(
            "Record {} declares {} part(s) and {} point(s) but holds only {} bytes",
            record_number,
            parts,
            points,
            content.len()
        ))),
    }
}

fn read_points(content: &[u8], offset: usize, count: usize) -> SuitabilityResult<Vec<Vec<f64>>> {
    (0..count)
        .map(|i| {
            let at = offset + 16 * i;
            Ok(vec![read_f64_le(content, at)?, read_f64_le(content, at + 8)?])
        })
        .collect()
}

fn split_parts(points: Vec<Vec<f64>>, starts: &[usize], record_number: i32) -> SuitabilityResult<Vec<Vec<Vec<f64>>>> {
    let mut parts = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let stop = starts.get(i + 1).copied().unwrap_or(points.len());
        if start > stop || stop > points.len() {
            return Err(shp_error(format!(
                "Record {} has invalid part range {}..{}",
                record_number, start, stop
            )));
        }
        parts.push(points[start..stop].to_vec());
    }
    Ok(parts)
}

/// Twice the signed ring area; negative for clockwise rings
fn signed_area(ring: &[Vec<f64>]) -> f64 {
    ring.windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum()
}

fn ring_contains(ring: &[Vec<f64>], point: &[f64]) -> bool {
    let (x, y) = (point[0], point[1]);
    let mut inside = false;
    for w in ring.windows(2) {
        let (xi, yi, xj, yj) = (w[0][0], w[0][1], w[1][0], w[1][1]);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
    }
    inside
}

/// Group shapefile rings into polygons
///
/// Shapefile outer rings are clockwise and holes counter-clockwise; the
/// output follows GeoJSON winding (outer counter-clockwise).
fn assemble_polygon(rings: Vec<Vec<Vec<f64>>>) -> Option<Value> {
    let (mut outers, holes): (Vec<_>, Vec<_>) = rings
        .into_iter()
        .filter(|ring| ring.len() >= 4)
        .partition(|ring| signed_area(ring) <= 0.0);

    let mut polygons: Vec<Vec<Vec<Vec<f64>>>> = Vec::new();
    if outers.is_empty() {
        // wound the wrong way round; treat every ring as an exterior
        outers = holes;
        polygons.extend(outers.into_iter().map(|ring| vec![ring]));
    } else {
        polygons.extend(outers.into_iter().map(|ring| vec![ring]));
        for hole in holes {
            let owner = polygons
                .iter()
                .position(|polygon| ring_contains(&polygon[0], &hole[0]))
                .unwrap_or(polygons.len() - 1);
            polygons[owner].push(hole);
        }
    }

    for polygon in polygons.iter_mut() {
        for ring in polygon.iter_mut() {
            ring.reverse();
        }
    }

    match polygons.len() {
        0 => None,
        1 => Some(Value::Polygon(polygons.remove(0))),
        _ => Some(Value::MultiPolygon(polygons)),
    }
}

#[derive(Debug)]
struct DbfField {
    name: String,
    kind: u8,
    length: usize,
    decimals: u8,
}

/// Read the attribute table of a `.dbf` file
pub fn read_dbf(bytes: &[u8]) -> SuitabilityResult<Vec<JsonObject>> {
    let dbf_error = |message: String| shp_error(format!("DBF: {}", message));
    if bytes.len() < 32 {
        return Err(dbf_error(format!("Header too short: {} bytes", bytes.len())));
    }

    let record_count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

    let mut fields = Vec::new();
    let mut offset = 32;
    while offset + 32 <= bytes.len().min(header_len) && bytes[offset] != 0x0D {
        let descriptor = &bytes[offset..offset + 32];
        let name_end = descriptor[..11].iter().position(|&b| b == 0).unwrap_or(11);
        fields.push(DbfField {
            name: String::from_utf8_lossy(&descriptor[..name_end]).trim().to_string(),
            kind: descriptor[11],
            length: descriptor[16] as usize,
            decimals: descriptor[17],
        });
        offset += 32;
    }

    if record_count > 0 && record_len == 0 {
        return Err(dbf_error(format!("{} record(s) declared with zero record length", record_count)));
    }
    let table_end = record_count
        .checked_mul(record_len)
        .and_then(|table_len| table_len.checked_add(header_len));
    match table_end {
        Some(end) if end <= bytes.len() => {}
        _ => {
            return Err(dbf_error(format!(
                "Header declares {} record(s) of {} bytes but file has {} bytes",
                record_count,
                record_len,
                bytes.len()
            )))
        }
    }

    let mut records = Vec::with_capacity(record_count);
    for index in 0..record_count {
        let start = header_len + index * record_len;
        let record = bytes
            .get(start..start + record_len)
            .ok_or_else(|| dbf_error(format!("Record {} truncated", index)))?;

        // first byte is the deletion flag
        let mut cursor = 1;
        let mut properties = JsonObject::new();
        for field in &fields {
            let raw = record
                .get(cursor..cursor + field.length)
                .ok_or_else(|| dbf_error(format!("Field {} overruns record {}", field.name, index)))?;
            properties.insert(field.name.clone(), dbf_value(field, raw));
            cursor += field.length;
        }
        records.push(properties);
    }

    Ok(records)
}

fn dbf_value(field: &DbfField, raw: &[u8]) -> JsonValue {
    let text = String::from_utf8_lossy(raw).trim().to_string();
    if text.is_empty() {
        return JsonValue::Null;
    }

    match field.kind {
        b'N' | b'F' => {
            if field.decimals == 0 {
                if let Ok(integer) = text.parse::<i64>() {
                    return JsonValue::from(integer);
                }
            }
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null)
        }
        b'L' => match text.as_bytes()[0] {
            b'T' | b't' | b'Y' | b'y' => JsonValue::Bool(true),
            b'F' | b'f' | b'N' | b'n' => JsonValue::Bool(false),
            _ => JsonValue::Null,
        },
        _ => JsonValue::String(text),
    }
}
