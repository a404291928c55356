use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofileError {
    #[error("failed to parse geofile: {0}")]
    Parse(String),
    #[error("unsupported geofile format: {0}")]
    UnsupportedFormat(String),
    #[error("geofile contains no geometry")]
    NoGeometry,
    #[error("geofile contains no polygon to cover")]
    NoPolygon,
    #[error("no geofile loaded")]
    NotLoaded,
    #[error("invalid coverage request: {0}")]
    InvalidRequest(String),
    #[error("coverage planning failed: {0}")]
    Planner(String),
    /// The geofile changed while a result was being computed.
    #[error("geofile changed before the result arrived")]
    Superseded,
}
