use foundation::math::LocalFrame;
use foundation::{GeoBounds, GeoPoint};

use crate::error::GeofileError;

/// Outer ring of a polygon; holes are not carried.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub ring: Vec<GeoPoint>,
}

impl Polygon {
    pub fn new(ring: Vec<GeoPoint>) -> Self {
        Self { ring }
    }

    /// Ring without the repeated closing vertex.
    pub fn vertices(&self) -> &[GeoPoint] {
        match (self.ring.first(), self.ring.last()) {
            (Some(a), Some(b)) if self.ring.len() > 1 && same_xy(a, b) => {
                &self.ring[..self.ring.len() - 1]
            }
            _ => &self.ring,
        }
    }

    /// Closed ring, first vertex repeated at the end.
    pub fn closed(&self) -> Vec<GeoPoint> {
        let mut ring = self.vertices().to_vec();
        if let Some(first) = ring.first().copied() {
            ring.push(first);
        }
        ring
    }

    /// Planar area in square metres using a local tangent frame.
    pub fn area_m2(&self) -> f64 {
        let vertices = self.vertices();
        let Some(bounds) = GeoBounds::from_points(vertices) else {
            return 0.0;
        };
        let frame = LocalFrame::new(bounds.center());
        let local: Vec<(f64, f64)> = vertices.iter().map(|p| frame.to_local(*p)).collect();
        shoelace(&local).abs()
    }

    pub fn is_valid(&self) -> bool {
        self.vertices().len() >= 3
    }
}

pub(crate) fn shoelace(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % ring.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum * 0.5
}

fn same_xy(a: &GeoPoint, b: &GeoPoint) -> bool {
    a.lon_deg == b.lon_deg && a.lat_deg == b.lat_deg
}

/// Parsed geofile content: read-only reference geometry plus its extent.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofileGeometry {
    pub points: Vec<GeoPoint>,
    pub lines: Vec<Vec<GeoPoint>>,
    pub polygons: Vec<Polygon>,
    pub bounds: GeoBounds,
}

impl GeofileGeometry {
    /// Fails with [`GeofileError::NoGeometry`] when every list is empty.
    pub fn new(
        points: Vec<GeoPoint>,
        lines: Vec<Vec<GeoPoint>>,
        polygons: Vec<Polygon>,
    ) -> Result<Self, GeofileError> {
        let all = points
            .iter()
            .chain(lines.iter().flatten())
            .chain(polygons.iter().flat_map(|p| p.ring.iter()));
        if let Some(bad) = all.clone().find(|p| !p.is_finite()) {
            return Err(GeofileError::Parse(format!(
                "non-finite coordinate ({}, {})",
                bad.lon_deg, bad.lat_deg
            )));
        }
        let bounds = GeoBounds::from_points(all).ok_or(GeofileError::NoGeometry)?;
        Ok(Self {
            points,
            lines,
            polygons,
            bounds,
        })
    }

    pub fn feature_count(&self) -> usize {
        self.points.len() + self.lines.len() + self.polygons.len()
    }

    /// First polygon with at least three vertices; the coverage area.
    pub fn primary_polygon(&self) -> Option<&Polygon> {
        self.polygons.iter().find(|p| p.is_valid())
    }

    /// Lines and closed polygon rings, ready to draw as polylines.
    pub fn outlines(&self) -> Vec<Vec<GeoPoint>> {
        self.lines
            .iter()
            .filter(|l| l.len() >= 2)
            .cloned()
            .chain(self.polygons.iter().map(Polygon::closed))
            .collect()
    }
}
