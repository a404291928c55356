use std::sync::Arc;

use foundation::math::{LocalFrame, path_length_m};
use foundation::{GeoBounds, GeoPoint};
use runtime::BoxFuture;
use tracing::debug;

use crate::coverage::{CoveragePath, CoveragePlanner, CoverageRequest, CoverageStats};
use crate::error::GeofileError;
use crate::geometry::{Polygon, shoelace};
use crate::parser::{AutoParser, GeofileParser};

pub const MAX_SCAN_LINES: usize = 20_000;

/// Scan segments are pulled back from the boundary by this share of the inset.
const SHORTEN_FACTOR: f64 = 0.75;
const DEDUP_EPS_M: f64 = 1e-3;

/// Offline lawnmower planner.
///
/// Scan lines run along the longer side of the polygon's extent, inset by half
/// the sensor width and never farther apart than `width * (1 - overlap)`.
/// Segments are stitched nearest-end first, starting from the polygon corner
/// closest to the start position, which is prepended to the path.
#[derive(Clone)]
pub struct LocalPlanner {
    parser: Arc<dyn GeofileParser>,
}

impl Default for LocalPlanner {
    fn default() -> Self {
        Self::new(Arc::new(AutoParser))
    }
}

impl LocalPlanner {
    pub fn new(parser: Arc<dyn GeofileParser>) -> Self {
        Self { parser }
    }

    pub fn plan_now(&self, request: &CoverageRequest) -> Result<CoveragePath, GeofileError> {
        request.validate()?;
        let geometry = self.parser.parse(&request.file)?;
        let polygon = geometry.primary_polygon().ok_or(GeofileError::NoPolygon)?;
        plan_sweep(polygon, request.start, request.sensor_width_m, request.overlap)
    }
}

impl CoveragePlanner for LocalPlanner {
    fn plan<'a>(
        &'a self,
        request: &'a CoverageRequest,
    ) -> BoxFuture<'a, Result<CoveragePath, GeofileError>> {
        Box::pin(async move { self.plan_now(request) })
    }
}

/// A scan segment at offset `v`, spanning `u0..=u1` (u0 <= u1).
#[derive(Debug, Copy, Clone)]
struct Segment {
    v: f64,
    u0: f64,
    u1: f64,
}

impl Segment {
    fn len(&self) -> f64 {
        self.u1 - self.u0
    }

    fn start(&self) -> (f64, f64) {
        (self.u0, self.v)
    }

    fn end(&self) -> (f64, f64) {
        (self.u1, self.v)
    }

    fn distance_to(&self, (u, v): (f64, f64)) -> f64 {
        let du = if u < self.u0 {
            self.u0 - u
        } else if u > self.u1 {
            u - self.u1
        } else {
            0.0
        };
        du.hypot(v - self.v)
    }

    fn shortened(self, by: f64) -> Self {
        if self.len() <= 2.0 * by {
            // Keep short corner passes whole.
            return self;
        }
        Segment {
            u0: self.u0 + by,
            u1: self.u1 - by,
            ..self
        }
    }
}

fn dist((a0, a1): (f64, f64), (b0, b1): (f64, f64)) -> f64 {
    (a0 - b0).hypot(a1 - b1)
}

/// Sweeps `polygon` and returns the path in geographic coordinates (altitude 0).
pub fn plan_sweep(
    polygon: &Polygon,
    start: GeoPoint,
    sensor_width_m: f64,
    overlap: f64,
) -> Result<CoveragePath, GeofileError> {
    let vertices = polygon.vertices();
    if vertices.len() < 3 {
        return Err(GeofileError::NoPolygon);
    }
    let bounds = GeoBounds::from_points(vertices).ok_or(GeofileError::NoPolygon)?;
    let frame = LocalFrame::new(bounds.center());
    let local: Vec<(f64, f64)> = vertices.iter().map(|p| frame.to_local(*p)).collect();

    let (min_e, max_e, min_n, max_n) = local.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(e, n)| (a.min(e), b.max(e), c.min(n), d.max(n)),
    );
    // Work in (u, v): u along the scan lines, v across them.
    let along_east = (max_e - min_e) >= (max_n - min_n);
    let to_uv = |(e, n): (f64, f64)| if along_east { (e, n) } else { (n, e) };
    let from_uv = |(u, v): (f64, f64)| if along_east { (u, v) } else { (v, u) };
    let ring: Vec<(f64, f64)> = local.iter().copied().map(to_uv).collect();
    let (v_min, v_max) = if along_east { (min_n, max_n) } else { (min_e, max_e) };

    let inset = sensor_width_m * 0.5;
    let spacing = sensor_width_m * (1.0 - overlap);
    let offsets = scan_offsets(v_min + inset, v_max - inset, spacing)?;

    let segments: Vec<Segment> = offsets
        .iter()
        .flat_map(|&v| clip_scan_line(&ring, v))
        .collect();
    if segments.is_empty() {
        return Err(GeofileError::Planner(
            "polygon too small for a sweep".to_string(),
        ));
    }

    let strip = spacing.min(sensor_width_m);
    let swept: f64 = segments
        .iter()
        .map(|s| (s.shortened(inset * SHORTEN_FACTOR).len() + sensor_width_m) * strip)
        .sum();
    let shortened: Vec<Segment> = segments
        .into_iter()
        .map(|s| s.shortened(inset * SHORTEN_FACTOR))
        .collect();

    let start_uv = to_uv(frame.to_local(start));
    let entry = ring
        .iter()
        .copied()
        .min_by(|a, b| dist(*a, start_uv).total_cmp(&dist(*b, start_uv)))
        .unwrap_or(start_uv);

    let mut path_uv = vec![start_uv];
    for p in stitch(shortened, entry) {
        if path_uv.last().is_none_or(|last| dist(*last, p) > DEDUP_EPS_M) {
            path_uv.push(p);
        }
    }

    let mut waypoints: Vec<GeoPoint> = path_uv
        .into_iter()
        .map(|uv| {
            let (e, n) = from_uv(uv);
            frame.to_geo(e, n, 0.0)
        })
        .collect();
    // The start keeps its exact coordinates.
    if let Some(first) = waypoints.first_mut() {
        *first = GeoPoint::new(start.lon_deg, start.lat_deg, 0.0);
    }

    let area = shoelace(&local).abs();
    let coverage_ratio = if area > 0.0 {
        (swept / area).min(1.0)
    } else {
        0.0
    };
    let stats = CoverageStats {
        total_waypoints: waypoints.len(),
        path_length_km: path_length_m(&waypoints) / 1000.0,
        coverage_ratio,
        bounds: Some(bounds),
    };
    debug!(
        lines = offsets.len(),
        waypoints = stats.total_waypoints,
        length_km = stats.path_length_km,
        coverage = stats.coverage_ratio,
        "coverage path planned"
    );
    Ok(CoveragePath { waypoints, stats })
}

/// Evenly spaced offsets from `first` to `last`, at most `spacing` apart.
/// A band narrower than the sensor gets one centre line.
fn scan_offsets(first: f64, last: f64, spacing: f64) -> Result<Vec<f64>, GeofileError> {
    if last - first <= f64::EPSILON {
        return Ok(vec![(first + last) * 0.5]);
    }
    let gaps = ((last - first) / spacing).ceil().max(1.0);
    if gaps >= MAX_SCAN_LINES as f64 {
        return Err(GeofileError::InvalidRequest(format!(
            "sweep needs more than {MAX_SCAN_LINES} scan lines; increase sensor width"
        )));
    }
    let gaps = gaps as usize;
    let step = (last - first) / gaps as f64;
    Ok((0..=gaps).map(|i| first + step * i as f64).collect())
}

/// Even-odd intersection of the line `v = const` with the ring.
fn clip_scan_line(ring: &[(f64, f64)], v: f64) -> Vec<Segment> {
    let mut crossings: Vec<f64> = Vec::new();
    for i in 0..ring.len() {
        let (u0, v0) = ring[i];
        let (u1, v1) = ring[(i + 1) % ring.len()];
        if (v0 <= v && v < v1) || (v1 <= v && v < v0) {
            crossings.push(u0 + (v - v0) * (u1 - u0) / (v1 - v0));
        }
    }
    crossings.sort_by(f64::total_cmp);
    crossings
        .chunks_exact(2)
        .map(|pair| Segment {
            v,
            u0: pair[0],
            u1: pair[1],
        })
        .filter(|s| s.len() > 0.0)
        .collect()
}

/// Greedy nearest-end ordering starting from `entry`.
fn stitch(mut segments: Vec<Segment>, entry: (f64, f64)) -> Vec<(f64, f64)> {
    let mut path = Vec::with_capacity(segments.len() * 2);
    let Some(first) = segments
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.distance_to(entry).total_cmp(&b.distance_to(entry)))
        .map(|(i, _)| i)
    else {
        return path;
    };
    let seg = segments.swap_remove(first);
    if dist(seg.start(), entry) > dist(seg.end(), entry) {
        path.extend([seg.end(), seg.start()]);
    } else {
        path.extend([seg.start(), seg.end()]);
    }

    while !segments.is_empty() {
        let last = path[path.len() - 1];
        let mut best = (f64::INFINITY, 0usize, false);
        for (i, s) in segments.iter().enumerate() {
            let to_start = dist(last, s.start());
            let to_end = dist(last, s.end());
            if to_start < best.0 {
                best = (to_start, i, false);
            }
            if to_end < best.0 {
                best = (to_end, i, true);
            }
        }
        let seg = segments.swap_remove(best.1);
        if best.2 {
            path.extend([seg.end(), seg.start()]);
        } else {
            path.extend([seg.start(), seg.end()]);
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::{LocalPlanner, plan_sweep, scan_offsets};
    use crate::coverage::{CoveragePlanner, CoverageRequest};
    use crate::error::GeofileError;
    use crate::geometry::Polygon;
    use foundation::{FileUpload, GeoBounds, GeoPoint};

    const SQUARE_KML: &str = r#"<kml xmlns="http://www.opengis.net/kml/2.2"><Placemark><Polygon>
        <outerBoundaryIs><LinearRing><coordinates>
        10,10 11,10 11,11 10,11 10,10
        </coordinates></LinearRing></outerBoundaryIs></Polygon></Placemark></kml>"#;

    fn small_square() -> Polygon {
        Polygon::new(vec![
            GeoPoint::new(10.0, 10.0, 0.0),
            GeoPoint::new(10.01, 10.0, 0.0),
            GeoPoint::new(10.01, 10.01, 0.0),
            GeoPoint::new(10.0, 10.01, 0.0),
        ])
    }

    #[test]
    fn offsets_never_exceed_spacing() {
        let offsets = scan_offsets(0.0, 100.0, 24.0).unwrap();
        assert_eq!(offsets.len(), 6);
        assert_eq!(offsets[0], 0.0);
        assert_eq!(offsets[5], 100.0);
        assert!(offsets.windows(2).all(|w| w[1] - w[0] <= 24.0));
        assert_eq!(scan_offsets(5.0, 5.0, 24.0).unwrap(), vec![5.0]);
    }

    #[test]
    fn sweep_starts_at_start_and_alternates() {
        let start = GeoPoint::new(9.999, 9.999, 0.0);
        let path = plan_sweep(&small_square(), start, 100.0, 0.2).unwrap();
        assert_eq!(path.waypoints[0].lon_deg, start.lon_deg);
        // Start plus two endpoints per scan line.
        assert_eq!(path.waypoints.len() % 2, 1);
        assert!(path.stats.coverage_ratio > 0.8 && path.stats.coverage_ratio <= 1.0);
        assert!(path.stats.path_length_km > 0.0);
        assert_eq!(path.stats.total_waypoints, path.waypoints.len());
        // First pass begins at the corner nearest the start (south-west).
        let p1 = path.waypoints[1];
        assert!(p1.lon_deg < 10.005 && p1.lat_deg < 10.005, "{p1:?}");
    }

    #[tokio::test]
    async fn rectangular_geofile_round_trip_stays_in_bounds() {
        let request = CoverageRequest {
            file: FileUpload::from_text("square.kml", SQUARE_KML),
            start: GeoPoint::new(10.5, 10.5, 0.0),
            sensor_width_m: 2_000.0,
            overlap: 0.2,
        };
        let path = LocalPlanner::default().plan(&request).await.unwrap();
        assert!(!path.waypoints.is_empty());

        let padded = GeoBounds::new(10.0, 10.0, 11.0, 11.0).padded(50.0);
        for wp in &path.waypoints {
            assert!(padded.contains(*wp), "{wp:?} outside {padded:?}");
        }
        assert_eq!(
            path.stats.bounds,
            Some(GeoBounds::new(10.0, 10.0, 11.0, 11.0))
        );
    }

    #[test]
    fn geofile_without_polygon_cannot_be_planned() {
        let request = CoverageRequest {
            file: FileUpload::from_text(
                "p.geojson",
                r#"{"type":"Point","coordinates":[10.0,10.0]}"#,
            ),
            start: GeoPoint::new(10.0, 10.0, 0.0),
            sensor_width_m: 30.0,
            overlap: 0.2,
        };
        assert_eq!(
            LocalPlanner::default().plan_now(&request),
            Err(GeofileError::NoPolygon)
        );
    }

    #[test]
    fn too_fine_a_sweep_is_rejected() {
        let huge = Polygon::new(vec![
            GeoPoint::new(0.0, 0.0, 0.0),
            GeoPoint::new(5.0, 0.0, 0.0),
            GeoPoint::new(5.0, 5.0, 0.0),
            GeoPoint::new(0.0, 5.0, 0.0),
        ]);
        assert!(matches!(
            plan_sweep(&huge, GeoPoint::new(0.0, 0.0, 0.0), 1.0, 0.5),
            Err(GeofileError::InvalidRequest(_))
        ));
    }
}
