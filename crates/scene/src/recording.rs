use std::fmt;

use foundation::{EntityHandle, GeoPoint};
use parking_lot::Mutex;

use crate::surface::{
    CameraTarget, EntitySurface, FlightCallback, InputSurface, MarkerSpec, PointerEvent,
    PointerHandler, PointerHandlerId, PolylineSpec, ScreenPos,
};
use crate::world::{EntityKind, SceneEntity, World};

/// Default pick tolerance around a marker's projected centre.
pub const PICK_RADIUS_PX: f64 = 8.0;

/// One call made against a [`RecordingSurface`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    CreateMarker(EntityHandle),
    UpdateMarker(EntityHandle),
    CreatePolyline(EntityHandle),
    UpdatePolyline(EntityHandle),
    Remove(EntityHandle),
    FlyTo(CameraTarget),
    SetCameraRotation(bool),
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Flat top-down projection: `origin` sits at pixel (0, 0) and the view
/// spans `px_per_deg` pixels per degree on both axes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GroundView {
    pub origin: GeoPoint,
    pub px_per_deg: f64,
    /// Rows above this screen y show sky and do not project to the ground.
    pub horizon_y: Option<f64>,
}

impl Default for GroundView {
    fn default() -> Self {
        Self {
            origin: GeoPoint::new(0.0, 0.0, 0.0),
            px_per_deg: 10_000.0,
            horizon_y: None,
        }
    }
}

impl GroundView {
    pub fn to_screen(&self, p: GeoPoint) -> ScreenPos {
        ScreenPos::new(
            (p.lon_deg - self.origin.lon_deg) * self.px_per_deg,
            (self.origin.lat_deg - p.lat_deg) * self.px_per_deg,
        )
    }

    pub fn to_ground(&self, at: ScreenPos) -> Option<GeoPoint> {
        if self.horizon_y.is_some_and(|h| at.y < h) {
            return None;
        }
        Some(GeoPoint::new(
            self.origin.lon_deg + at.x / self.px_per_deg,
            self.origin.lat_deg - at.y / self.px_per_deg,
            0.0,
        ))
    }
}

struct Inner {
    world: World,
    calls: Vec<SurfaceCall>,
    rotation_enabled: bool,
    handlers: Vec<(PointerHandlerId, PointerHandler)>,
    next_handler: u64,
    flight: Option<FlightCallback>,
}

/// In-memory rendering surface that records every call.
///
/// Stands in for the 3D globe wherever rendering has to be observed.
pub struct RecordingSurface {
    view: GroundView,
    inner: Mutex<Inner>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::with_view(GroundView::default())
    }

    pub fn with_view(view: GroundView) -> Self {
        Self {
            view,
            inner: Mutex::new(Inner {
                world: World::new(),
                calls: Vec::new(),
                rotation_enabled: true,
                handlers: Vec::new(),
                next_handler: 0,
                flight: None,
            }),
        }
    }

    pub fn view(&self) -> GroundView {
        self.view
    }

    /// Where `p` lands on screen; handy for aiming synthetic pointer events.
    pub fn screen_of(&self, p: GeoPoint) -> ScreenPos {
        self.view.to_screen(p)
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn counts(&self) -> CallCounts {
        let inner = self.inner.lock();
        let mut counts = CallCounts::default();
        for call in &inner.calls {
            match call {
                SurfaceCall::CreateMarker(_) | SurfaceCall::CreatePolyline(_) => {
                    counts.created += 1
                }
                SurfaceCall::UpdateMarker(_) | SurfaceCall::UpdatePolyline(_) => {
                    counts.updated += 1
                }
                SurfaceCall::Remove(_) => counts.removed += 1,
                SurfaceCall::FlyTo(_) | SurfaceCall::SetCameraRotation(_) => {}
            }
        }
        counts
    }

    pub fn entity_count(&self) -> usize {
        self.inner.lock().world.len()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.inner.lock().world.count(kind)
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<SceneEntity> {
        self.inner.lock().world.get(handle).cloned()
    }

    pub fn markers(&self) -> Vec<(EntityHandle, MarkerSpec)> {
        self.inner
            .lock()
            .world
            .markers()
            .into_iter()
            .map(|(h, m)| (h, m.clone()))
            .collect()
    }

    pub fn polylines(&self) -> Vec<(EntityHandle, PolylineSpec)> {
        self.inner
            .lock()
            .world
            .polylines()
            .into_iter()
            .map(|(h, p)| (h, p.clone()))
            .collect()
    }

    pub fn camera_rotation_enabled(&self) -> bool {
        self.inner.lock().rotation_enabled
    }

    pub fn pointer_handler_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }

    pub fn flight_pending(&self) -> bool {
        self.inner.lock().flight.is_some()
    }

    /// Lands the pending camera flight. Returns whether one was pending.
    pub fn finish_flight(&self) -> bool {
        let callback = self.inner.lock().flight.take();
        match callback {
            Some(cb) => {
                cb(true);
                true
            }
            None => false,
        }
    }

    /// Delivers `event` to every registered pointer handler.
    ///
    /// Handlers run without the surface locked. One removed by an earlier
    /// handler during the same emit is skipped.
    pub fn emit(&self, event: PointerEvent) -> usize {
        let snapshot: Vec<(PointerHandlerId, PointerHandler)> =
            self.inner.lock().handlers.clone();
        let mut delivered = 0;
        for (id, handler) in snapshot {
            let registered = self.inner.lock().handlers.iter().any(|(h, _)| *h == id);
            if !registered {
                continue;
            }
            handler(&event);
            delivered += 1;
        }
        delivered
    }
}

impl EntitySurface for RecordingSurface {
    fn create_marker(&self, spec: &MarkerSpec) -> EntityHandle {
        let mut inner = self.inner.lock();
        let handle = inner.world.spawn(SceneEntity::Marker(spec.clone()));
        inner.calls.push(SurfaceCall::CreateMarker(handle));
        handle
    }

    fn update_marker(&self, handle: EntityHandle, spec: &MarkerSpec) -> bool {
        let mut inner = self.inner.lock();
        let Some(SceneEntity::Marker(marker)) = inner.world.get_mut(handle) else {
            return false;
        };
        *marker = spec.clone();
        inner.calls.push(SurfaceCall::UpdateMarker(handle));
        true
    }

    fn create_polyline(&self, spec: &PolylineSpec) -> EntityHandle {
        let mut inner = self.inner.lock();
        let handle = inner.world.spawn(SceneEntity::Polyline(spec.clone()));
        inner.calls.push(SurfaceCall::CreatePolyline(handle));
        handle
    }

    fn update_polyline(&self, handle: EntityHandle, spec: &PolylineSpec) -> bool {
        let mut inner = self.inner.lock();
        let Some(SceneEntity::Polyline(line)) = inner.world.get_mut(handle) else {
            return false;
        };
        *line = spec.clone();
        inner.calls.push(SurfaceCall::UpdatePolyline(handle));
        true
    }

    fn remove(&self, handle: EntityHandle) -> bool {
        let mut inner = self.inner.lock();
        if inner.world.despawn(handle).is_none() {
            return false;
        }
        inner.calls.push(SurfaceCall::Remove(handle));
        true
    }
}

impl InputSurface for RecordingSurface {
    fn pick(&self, at: ScreenPos) -> Option<EntityHandle> {
        let view = self.view;
        self.inner
            .lock()
            .world
            .pick_marker(at, PICK_RADIUS_PX, |p| Some(view.to_screen(p)))
    }

    fn project_to_ground(&self, at: ScreenPos) -> Option<GeoPoint> {
        self.view.to_ground(at)
    }

    fn fly_to(&self, target: CameraTarget, on_complete: FlightCallback) {
        let interrupted = {
            let mut inner = self.inner.lock();
            inner.calls.push(SurfaceCall::FlyTo(target));
            inner.flight.replace(on_complete)
        };
        if let Some(cb) = interrupted {
            cb(false);
        }
    }

    fn set_camera_rotation(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.rotation_enabled = enabled;
        inner.calls.push(SurfaceCall::SetCameraRotation(enabled));
    }

    fn add_pointer_handler(&self, handler: PointerHandler) -> PointerHandlerId {
        let mut inner = self.inner.lock();
        let id = PointerHandlerId(inner.next_handler);
        inner.next_handler += 1;
        inner.handlers.push((id, handler));
        id
    }

    fn remove_pointer_handler(&self, id: PointerHandlerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.handlers.len();
        inner.handlers.retain(|(h, _)| *h != id);
        inner.handlers.len() != before
    }
}

impl fmt::Debug for RecordingSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RecordingSurface")
            .field("entities", &inner.world.len())
            .field("calls", &inner.calls.len())
            .field("handlers", &inner.handlers.len())
            .finish()
    }
}
