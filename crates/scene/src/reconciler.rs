use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use foundation::{EntityHandle, VehicleId, WaypointId};
use geofile::{CoveragePath, GeofileGeometry};
use mission::Waypoint;
use telemetry::{FleetSnapshot, VehicleSummary};
use tracing::debug;

use crate::style::{LineStyle, MarkerStyle};
use crate::surface::{EntitySurface, MarkerSpec, PolylineSpec};

/// Surface calls issued by one reconciliation pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ReconcileStats {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.removed
    }
}

struct Rendered<S> {
    handle: EntityHandle,
    spec: S,
}

/// Keeps the rendering surface in lockstep with mission and fleet state.
///
/// Waypoint and vehicle markers are keyed by their stable ids. Path
/// segments have no identity of their own: segment `i` joins waypoints
/// `i` and `i + 1` and the list is grown or trimmed each pass. Every pass
/// converges on the state it is given, so calling it twice with the same
/// input issues no surface calls the second time.
///
/// Dropping the reconciler removes every entity it created.
pub struct MapReconciler {
    surface: Arc<dyn EntitySurface>,
    waypoints: HashMap<WaypointId, Rendered<MarkerSpec>>,
    by_handle: HashMap<EntityHandle, WaypointId>,
    segments: Vec<Rendered<PolylineSpec>>,
    vehicles: BTreeMap<VehicleId, Rendered<MarkerSpec>>,
    overlay: Vec<EntityHandle>,
    coverage: Option<Rendered<PolylineSpec>>,
}

impl MapReconciler {
    pub fn new(surface: Arc<dyn EntitySurface>) -> Self {
        Self {
            surface,
            waypoints: HashMap::new(),
            by_handle: HashMap::new(),
            segments: Vec::new(),
            vehicles: BTreeMap::new(),
            overlay: Vec::new(),
            coverage: None,
        }
    }

    /// Makes waypoint markers and path segments match `waypoints`, in order.
    pub fn reconcile_waypoints(&mut self, waypoints: &[Waypoint]) -> ReconcileStats {
        let mut stats = ReconcileStats::default();

        let present: HashSet<WaypointId> = waypoints.iter().map(|w| w.id).collect();
        let gone: Vec<WaypointId> = self
            .waypoints
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(r) = self.waypoints.remove(&id) {
                self.by_handle.remove(&r.handle);
                self.surface.remove(r.handle);
                stats.removed += 1;
            }
        }

        for (index, wp) in waypoints.iter().enumerate() {
            let spec = waypoint_spec(index, wp);
            match self.waypoints.get_mut(&wp.id) {
                Some(r) if r.spec == spec => {}
                Some(r) => {
                    if !self.surface.update_marker(r.handle, &spec) {
                        // Lost on the surface side; replace it.
                        self.by_handle.remove(&r.handle);
                        r.handle = self.surface.create_marker(&spec);
                        self.by_handle.insert(r.handle, wp.id);
                        stats.created += 1;
                    } else {
                        stats.updated += 1;
                    }
                    r.spec = spec;
                }
                None => {
                    let handle = self.surface.create_marker(&spec);
                    self.by_handle.insert(handle, wp.id);
                    self.waypoints.insert(wp.id, Rendered { handle, spec });
                    stats.created += 1;
                }
            }
        }

        let needed = waypoints.len().saturating_sub(1);
        for (index, pair) in waypoints.windows(2).enumerate() {
            let spec = PolylineSpec::new(
                vec![pair[0].position(), pair[1].position()],
                LineStyle::mission_path(),
            );
            sync_polyline(self.surface.as_ref(), &mut self.segments, index, spec, &mut stats);
        }
        for r in self.segments.drain(needed.min(self.segments.len())..) {
            self.surface.remove(r.handle);
            stats.removed += 1;
        }

        if !stats.is_noop() {
            debug!(
                waypoints = waypoints.len(),
                created = stats.created,
                updated = stats.updated,
                removed = stats.removed,
                "waypoints reconciled"
            );
        }
        stats
    }

    /// Makes vehicle markers match `fleet`. Vehicles without a position fix
    /// are not drawn.
    pub fn reconcile_vehicles(
        &mut self,
        fleet: &FleetSnapshot,
        selected: Option<VehicleId>,
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();

        let wanted: BTreeMap<VehicleId, MarkerSpec> = fleet
            .iter()
            .filter_map(|(id, summary)| {
                vehicle_spec(id, summary, selected == Some(id)).map(|spec| (id, spec))
            })
            .collect();

        let gone: Vec<VehicleId> = self
            .vehicles
            .keys()
            .filter(|id| !wanted.contains_key(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(r) = self.vehicles.remove(&id) {
                self.surface.remove(r.handle);
                stats.removed += 1;
            }
        }

        for (id, spec) in wanted {
            match self.vehicles.get_mut(&id) {
                Some(r) if r.spec == spec => {}
                Some(r) => {
                    if self.surface.update_marker(r.handle, &spec) {
                        stats.updated += 1;
                    } else {
                        r.handle = self.surface.create_marker(&spec);
                        stats.created += 1;
                    }
                    r.spec = spec;
                }
                None => {
                    let handle = self.surface.create_marker(&spec);
                    self.vehicles.insert(id, Rendered { handle, spec });
                    stats.created += 1;
                }
            }
        }

        if !stats.is_noop() {
            debug!(
                vehicles = self.vehicles.len(),
                created = stats.created,
                updated = stats.updated,
                removed = stats.removed,
                "vehicles reconciled"
            );
        }
        stats
    }

    /// Replaces the read-only geofile overlay: points as markers, lines and
    /// polygon rings as polylines.
    pub fn show_geofile(&mut self, geometry: &GeofileGeometry) -> ReconcileStats {
        let mut stats = ReconcileStats {
            removed: self.clear_geofile(),
            ..ReconcileStats::default()
        };
        for p in &geometry.points {
            let spec = MarkerSpec::new(*p, MarkerStyle::geofile_point());
            self.overlay.push(self.surface.create_marker(&spec));
            stats.created += 1;
        }
        for outline in geometry.outlines() {
            let spec = PolylineSpec::new(outline, LineStyle::geofile_outline());
            self.overlay.push(self.surface.create_polyline(&spec));
            stats.created += 1;
        }
        debug!(entities = self.overlay.len(), "geofile overlay drawn");
        stats
    }

    pub fn clear_geofile(&mut self) -> usize {
        let removed = self.overlay.len();
        for handle in self.overlay.drain(..) {
            self.surface.remove(handle);
        }
        removed
    }

    /// Draws `path` as one polyline, reusing the existing entity.
    pub fn show_coverage(&mut self, path: &CoveragePath) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        if path.waypoints.len() < 2 {
            stats.removed = self.clear_coverage();
            return stats;
        }
        let spec = PolylineSpec::new(path.waypoints.clone(), LineStyle::coverage_path());
        match &mut self.coverage {
            Some(r) if r.spec == spec => {}
            Some(r) => {
                if self.surface.update_polyline(r.handle, &spec) {
                    stats.updated += 1;
                } else {
                    r.handle = self.surface.create_polyline(&spec);
                    stats.created += 1;
                }
                r.spec = spec;
            }
            None => {
                let handle = self.surface.create_polyline(&spec);
                self.coverage = Some(Rendered { handle, spec });
                stats.created += 1;
            }
        }
        stats
    }

    pub fn clear_coverage(&mut self) -> usize {
        match self.coverage.take() {
            Some(r) => {
                self.surface.remove(r.handle);
                1
            }
            None => 0,
        }
    }

    pub fn clear_waypoints(&mut self) -> usize {
        self.reconcile_waypoints(&[]).removed
    }

    pub fn clear_vehicles(&mut self) -> usize {
        self.reconcile_vehicles(&FleetSnapshot::new(), None).removed
    }

    /// Removes every entity this reconciler created. Idempotent.
    pub fn teardown(&mut self) -> usize {
        let removed = self.clear_waypoints()
            + self.clear_vehicles()
            + self.clear_geofile()
            + self.clear_coverage();
        if removed > 0 {
            debug!(removed, "map reconciler torn down");
        }
        removed
    }

    /// Waypoint rendered as `handle`, if any.
    pub fn waypoint_for_entity(&self, handle: EntityHandle) -> Option<WaypointId> {
        self.by_handle.get(&handle).copied()
    }

    pub fn entity_for_waypoint(&self, id: WaypointId) -> Option<EntityHandle> {
        self.waypoints.get(&id).map(|r| r.handle)
    }

    pub fn vehicle_entity(&self, id: VehicleId) -> Option<EntityHandle> {
        self.vehicles.get(&id).map(|r| r.handle)
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn overlay_count(&self) -> usize {
        self.overlay.len()
    }

    pub fn has_coverage(&self) -> bool {
        self.coverage.is_some()
    }

    pub fn entity_count(&self) -> usize {
        self.waypoints.len()
            + self.segments.len()
            + self.vehicles.len()
            + self.overlay.len()
            + usize::from(self.coverage.is_some())
    }
}

impl Drop for MapReconciler {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for MapReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapReconciler")
            .field("waypoints", &self.waypoints.len())
            .field("segments", &self.segments.len())
            .field("vehicles", &self.vehicles.len())
            .field("overlay", &self.overlay.len())
            .field("coverage", &self.coverage.is_some())
            .finish()
    }
}

fn sync_polyline(
    surface: &dyn EntitySurface,
    slots: &mut Vec<Rendered<PolylineSpec>>,
    index: usize,
    spec: PolylineSpec,
    stats: &mut ReconcileStats,
) {
    match slots.get_mut(index) {
        Some(r) if r.spec == spec => {}
        Some(r) => {
            if surface.update_polyline(r.handle, &spec) {
                stats.updated += 1;
            } else {
                r.handle = surface.create_polyline(&spec);
                stats.created += 1;
            }
            r.spec = spec;
        }
        None => {
            let handle = surface.create_polyline(&spec);
            slots.push(Rendered { handle, spec });
            stats.created += 1;
        }
    }
}

fn waypoint_spec(index: usize, wp: &Waypoint) -> MarkerSpec {
    MarkerSpec::new(wp.position(), MarkerStyle::waypoint(wp.mode))
        .with_label(format!("{} {}", index + 1, wp.mode))
}

fn vehicle_spec(id: VehicleId, summary: &VehicleSummary, selected: bool) -> Option<MarkerSpec> {
    let point = summary.position()?.geo();
    if !point.is_finite() {
        return None;
    }
    let label = match &summary.flight_mode {
        Some(mode) => format!("UAV {id} ({mode})"),
        None => format!("UAV {id}"),
    };
    Some(MarkerSpec::new(point, MarkerStyle::vehicle(selected)).with_label(label))
}
