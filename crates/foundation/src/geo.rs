use serde::{Deserialize, Serialize};

use crate::math::{METERS_PER_DEGREE_LAT, meters_per_degree_lon};

/// WGS84 position in degrees, altitude in meters.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
    #[serde(default)]
    pub alt_m: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64, alt_m: f64) -> Self {
        Self {
            lon_deg,
            lat_deg,
            alt_m,
        }
    }

    pub fn with_alt(self, alt_m: f64) -> Self {
        Self { alt_m, ..self }
    }

    pub fn is_finite(&self) -> bool {
        self.lon_deg.is_finite() && self.lat_deg.is_finite() && self.alt_m.is_finite()
    }
}

/// Axis-aligned geographic bounding box in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box containing every point; `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Self::new(first.lon_deg, first.lat_deg, first.lon_deg, first.lat_deg);
        for p in iter {
            b.extend(*p);
        }
        Some(b)
    }

    pub fn extend(&mut self, p: GeoPoint) {
        self.west = self.west.min(p.lon_deg);
        self.south = self.south.min(p.lat_deg);
        self.east = self.east.max(p.lon_deg);
        self.north = self.north.max(p.lat_deg);
    }

    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lon_deg >= self.west
            && p.lon_deg <= self.east
            && p.lat_deg >= self.south
            && p.lat_deg <= self.north
    }

    /// Grows the box by `meters` on every side.
    pub fn padded(self, meters: f64) -> Self {
        let dlat = meters / METERS_PER_DEGREE_LAT;
        let widest_lat = self.south.abs().max(self.north.abs()).min(89.0);
        let dlon = meters / meters_per_degree_lon(widest_lat);
        Self::new(
            self.west - dlon,
            self.south - dlat,
            self.east + dlon,
            self.north + dlat,
        )
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.west + self.east) * 0.5,
            (self.south + self.north) * 0.5,
            0.0,
        )
    }

    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            GeoPoint::new(self.west, self.south, 0.0),
            GeoPoint::new(self.east, self.south, 0.0),
            GeoPoint::new(self.east, self.north, 0.0),
            GeoPoint::new(self.west, self.north, 0.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoBounds, GeoPoint};

    #[test]
    fn bounds_from_points() {
        let pts = [
            GeoPoint::new(10.0, 11.0, 0.0),
            GeoPoint::new(11.0, 10.0, 0.0),
            GeoPoint::new(10.5, 10.5, 5.0),
        ];
        let b = GeoBounds::from_points(&pts).expect("bounds");
        assert_eq!(b, GeoBounds::new(10.0, 10.0, 11.0, 11.0));
        assert!(GeoBounds::from_points(&[]).is_none());
    }

    #[test]
    fn padding_grows_every_side() {
        let b = GeoBounds::new(10.0, 10.0, 11.0, 11.0);
        let p = b.padded(100.0);
        assert!(p.west < b.west && p.south < b.south);
        assert!(p.east > b.east && p.north > b.north);
        assert!(p.contains(GeoPoint::new(9.9995, 10.0, 0.0)));
        assert!(!b.contains(GeoPoint::new(9.9995, 10.0, 0.0)));
    }

    #[test]
    fn altitude_defaults_when_absent() {
        let p: GeoPoint = serde_json::from_str(r#"{"lon_deg":1.0,"lat_deg":2.0}"#).unwrap();
        assert_eq!(p.alt_m, 0.0);
    }
}
