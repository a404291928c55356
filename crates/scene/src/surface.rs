use std::sync::Arc;

use foundation::{EntityHandle, GeoBounds, GeoPoint};

use crate::style::{LineStyle, MarkerStyle};

/// Screen coordinate in CSS pixels, origin top-left.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPos {
    pub x: f64,
    pub y: f64,
}

impl ScreenPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: ScreenPos) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: GeoPoint,
    pub label: Option<String>,
    pub style: MarkerStyle,
}

impl MarkerSpec {
    pub fn new(position: GeoPoint, style: MarkerStyle) -> Self {
        Self {
            position,
            label: None,
            style,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineSpec {
    pub positions: Vec<GeoPoint>,
    pub style: LineStyle,
}

impl PolylineSpec {
    pub fn new(positions: Vec<GeoPoint>, style: LineStyle) -> Self {
        Self { positions, style }
    }
}

/// Entity creation, mutation and removal.
///
/// Only the map reconciler holds this capability; every other component
/// goes through it.
pub trait EntitySurface: Send + Sync {
    fn create_marker(&self, spec: &MarkerSpec) -> EntityHandle;

    /// Returns `false` when `handle` is unknown or not a marker.
    fn update_marker(&self, handle: EntityHandle, spec: &MarkerSpec) -> bool;

    fn create_polyline(&self, spec: &PolylineSpec) -> EntityHandle;

    fn update_polyline(&self, handle: EntityHandle, spec: &PolylineSpec) -> bool;

    /// Returns `false` when `handle` was already gone.
    fn remove(&self, handle: EntityHandle) -> bool;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Press,
    Move,
    Release,
    /// Emitted after a press/release pair, including one that ended a drag.
    Click,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub button: PointerButton,
    pub position: ScreenPos,
}

impl PointerEvent {
    pub fn primary(kind: PointerKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            button: PointerButton::Primary,
            position: ScreenPos::new(x, y),
        }
    }
}

pub type PointerHandler = Arc<dyn Fn(&PointerEvent) + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerHandlerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CameraTarget {
    Bounds(GeoBounds),
    Position { position: GeoPoint, range_m: f64 },
}

/// Invoked once when a camera flight ends; `true` if it completed, `false`
/// if it was interrupted by another flight.
pub type FlightCallback = Box<dyn FnOnce(bool) + Send>;

/// Camera and pointer capabilities used by the interaction layer and panels.
pub trait InputSurface: Send + Sync {
    /// Topmost pickable entity under `at`.
    fn pick(&self, at: ScreenPos) -> Option<EntityHandle>;

    /// Ground position under `at`, or `None` when pointing at the sky.
    fn project_to_ground(&self, at: ScreenPos) -> Option<GeoPoint>;

    fn fly_to(&self, target: CameraTarget, on_complete: FlightCallback);

    fn set_camera_rotation(&self, enabled: bool);

    fn add_pointer_handler(&self, handler: PointerHandler) -> PointerHandlerId;

    /// After this returns, `id`'s handler is never invoked again.
    fn remove_pointer_handler(&self, id: PointerHandlerId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::{MarkerSpec, ScreenPos};
    use crate::style::MarkerStyle;
    use foundation::GeoPoint;

    #[test]
    fn screen_distance_is_euclidean() {
        assert_eq!(ScreenPos::new(0.0, 0.0).distance(ScreenPos::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn marker_label_builder() {
        let spec = MarkerSpec::new(GeoPoint::new(1.0, 2.0, 3.0), MarkerStyle::vehicle(false))
            .with_label("UAV 1");
        assert_eq!(spec.label.as_deref(), Some("UAV 1"));
    }
}
