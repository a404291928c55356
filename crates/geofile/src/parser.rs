use foundation::FileUpload;
use tracing::debug;

use crate::error::GeofileError;
use crate::geojson::GeoJsonParser;
use crate::geometry::GeofileGeometry;
use crate::kml::KmlParser;

/// Turns raw file content into geometry plus bounds.
pub trait GeofileParser: Send + Sync {
    fn parse(&self, file: &FileUpload) -> Result<GeofileGeometry, GeofileError>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GeofileFormat {
    Kml,
    GeoJson,
}

impl GeofileFormat {
    /// By extension first, then by the first significant character.
    pub fn detect(file: &FileUpload) -> Option<GeofileFormat> {
        match file.extension().as_deref() {
            Some("kml") => return Some(GeofileFormat::Kml),
            Some("geojson" | "json") => return Some(GeofileFormat::GeoJson),
            _ => {}
        }
        let head = file.text()?.trim_start_matches('\u{feff}').trim_start();
        match head.chars().next()? {
            '<' => Some(GeofileFormat::Kml),
            '{' => Some(GeofileFormat::GeoJson),
            _ => None,
        }
    }
}

/// Dispatches to the KML or GeoJSON parser.
#[derive(Debug, Default, Copy, Clone)]
pub struct AutoParser;

impl GeofileParser for AutoParser {
    fn parse(&self, file: &FileUpload) -> Result<GeofileGeometry, GeofileError> {
        let format = GeofileFormat::detect(file)
            .ok_or_else(|| GeofileError::UnsupportedFormat(file.name.clone()))?;
        debug!(file = %file.name, ?format, "parsing geofile");
        match format {
            GeofileFormat::Kml => KmlParser.parse(file),
            GeofileFormat::GeoJson => GeoJsonParser.parse(file),
        }
    }
}

pub(crate) fn utf8(file: &FileUpload) -> Result<&str, GeofileError> {
    file.text()
        .ok_or_else(|| GeofileError::Parse(format!("'{}' is not valid UTF-8", file.name)))
}
