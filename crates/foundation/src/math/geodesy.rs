use crate::geo::GeoPoint;

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Mean earth radius used for great-circle distances (meters).
pub const MEAN_EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Meters per degree of latitude, the flat approximation the ground station backend uses.
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Meters per degree of longitude at `lat_deg`.
pub fn meters_per_degree_lon(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LAT * lat_deg.to_radians().cos()
}

/// Great-circle distance between two points, ignoring altitude.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon * 0.5).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Total great-circle length of a polyline.
pub fn path_length_m(points: &[GeoPoint]) -> f64 {
    points.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Local planar frame centered on `origin`, in meters east/north.
///
/// Equirectangular; accurate enough for survey areas a few kilometers across.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalFrame {
    origin: GeoPoint,
    m_per_deg_lon: f64,
}

impl LocalFrame {
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            m_per_deg_lon: meters_per_degree_lon(origin.lat_deg),
        }
    }

    pub fn to_local(&self, p: GeoPoint) -> (f64, f64) {
        (
            (p.lon_deg - self.origin.lon_deg) * self.m_per_deg_lon,
            (p.lat_deg - self.origin.lat_deg) * METERS_PER_DEGREE_LAT,
        )
    }

    pub fn to_geo(&self, east_m: f64, north_m: f64, alt_m: f64) -> GeoPoint {
        GeoPoint::new(
            self.origin.lon_deg + east_m / self.m_per_deg_lon,
            self.origin.lat_deg + north_m / METERS_PER_DEGREE_LAT,
            alt_m,
        )
    }
}
