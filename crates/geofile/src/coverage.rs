use foundation::{FileUpload, GeoBounds, GeoPoint};
use runtime::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::GeofileError;

/// Parameters of one coverage-path request.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRequest {
    pub file: FileUpload,
    pub start: GeoPoint,
    /// Sensor footprint width on the ground.
    pub sensor_width_m: f64,
    /// Fraction of footprint shared by adjacent passes, in `[0, 1)`.
    pub overlap: f64,
}

impl CoverageRequest {
    pub fn validate(&self) -> Result<(), GeofileError> {
        if !(self.sensor_width_m.is_finite() && self.sensor_width_m > 0.0) {
            return Err(GeofileError::InvalidRequest(format!(
                "sensor width must be positive, got {}",
                self.sensor_width_m
            )));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(GeofileError::InvalidRequest(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        if !self.start.is_finite() {
            return Err(GeofileError::InvalidRequest(
                "start position must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Distance between adjacent scan lines.
    pub fn line_spacing_m(&self) -> f64 {
        self.sensor_width_m * (1.0 - self.overlap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub total_waypoints: usize,
    pub path_length_km: f64,
    pub coverage_ratio: f64,
    #[serde(rename = "geofence_bounds", default)]
    pub bounds: Option<GeoBounds>,
}

/// Ordered sweep waypoints plus summary statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CoveragePath {
    pub waypoints: Vec<GeoPoint>,
    pub stats: CoverageStats,
}

impl CoveragePath {
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn set_altitude(&mut self, alt_m: f64) {
        for wp in &mut self.waypoints {
            wp.alt_m = alt_m;
        }
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_points(&self.waypoints)
    }
}

/// Computes a coverage path for the polygon in a geofile.
pub trait CoveragePlanner: Send + Sync {
    fn plan<'a>(
        &'a self,
        request: &'a CoverageRequest,
    ) -> BoxFuture<'a, Result<CoveragePath, GeofileError>>;
}
