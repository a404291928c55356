use foundation::{FileUpload, GeoPoint};
use serde_json::Value;

use crate::error::GeofileError;
use crate::geometry::{GeofileGeometry, Polygon};
use crate::parser::{GeofileParser, utf8};

/// GeoJSON FeatureCollections, Features, bare geometries and
/// GeometryCollections. Only the outer ring of each polygon is kept.
#[derive(Debug, Default, Copy, Clone)]
pub struct GeoJsonParser;

#[derive(Default)]
struct Collected {
    points: Vec<GeoPoint>,
    lines: Vec<Vec<GeoPoint>>,
    polygons: Vec<Polygon>,
}

impl GeoJsonParser {
    pub fn parse_str(&self, payload: &str) -> Result<GeofileGeometry, GeofileError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| GeofileError::Parse(format!("JSON parse error: {e}")))?;
        self.parse_value(&value)
    }

    pub fn parse_value(&self, value: &Value) -> Result<GeofileGeometry, GeofileError> {
        let mut out = Collected::default();
        collect_object(value, &mut out).map_err(GeofileError::Parse)?;
        GeofileGeometry::new(out.points, out.lines, out.polygons)
    }
}

impl GeofileParser for GeoJsonParser {
    fn parse(&self, file: &FileUpload) -> Result<GeofileGeometry, GeofileError> {
        self.parse_str(utf8(file)?)
    }
}

fn type_of(value: &Value) -> Result<&str, String> {
    value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("object missing type".to_string())
}

fn collect_object(value: &Value, out: &mut Collected) -> Result<(), String> {
    if !value.is_object() {
        return Err("GeoJSON root must be an object".to_string());
    }
    match type_of(value)? {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(|v| v.as_array())
                .ok_or("FeatureCollection missing features".to_string())?;
            for (index, feature) in features.iter().enumerate() {
                collect_feature(feature, out)
                    .map_err(|reason| format!("invalid feature at index {index}: {reason}"))?;
            }
            Ok(())
        }
        "Feature" => collect_feature(value, out),
        _ => collect_geometry(value, out),
    }
}

fn collect_feature(value: &Value, out: &mut Collected) -> Result<(), String> {
    if type_of(value)? != "Feature" {
        return Err("expected a Feature".to_string());
    }
    match value.get("geometry") {
        // Features without geometry are legal and carry nothing to draw.
        None | Some(Value::Null) => Ok(()),
        Some(geometry) => collect_geometry(geometry, out),
    }
}

fn collect_geometry(value: &Value, out: &mut Collected) -> Result<(), String> {
    let ty = type_of(value)?;
    if ty == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(|v| v.as_array())
            .ok_or("GeometryCollection missing geometries".to_string())?;
        return members.iter().try_for_each(|g| collect_geometry(g, out));
    }

    let coords = value
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;
    match ty {
        "Point" => out.points.push(parse_point(coords)?),
        "MultiPoint" => out.points.extend(parse_points(coords)?),
        "LineString" => out.lines.push(parse_points(coords)?),
        "MultiLineString" => out.lines.extend(parse_rings(coords)?),
        "Polygon" => out.polygons.extend(outer_ring(coords)?),
        "MultiPolygon" => {
            for polygon in as_array(coords, "MultiPolygon")? {
                out.polygons.extend(outer_ring(polygon)?);
            }
        }
        other => return Err(format!("unsupported geometry type: {other}")),
    }
    Ok(())
}

fn as_array<'a>(coords: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    coords
        .as_array()
        .ok_or_else(|| format!("{what} coordinates must be an array"))
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = as_array(coords, "Point")?;
    if arr.len() < 2 {
        return Err("Point coordinates must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("Point lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("Point lat must be a number".to_string())?;
    let alt = arr.get(2).and_then(Value::as_f64).unwrap_or(0.0);
    Ok(GeoPoint::new(lon, lat, alt))
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    as_array(coords, "position list")?
        .iter()
        .map(parse_point)
        .collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    as_array(coords, "ring list")?
        .iter()
        .map(parse_points)
        .collect()
}

fn outer_ring(coords: &Value) -> Result<Option<Polygon>, String> {
    Ok(parse_rings(coords)?.into_iter().next().map(Polygon::new))
}
