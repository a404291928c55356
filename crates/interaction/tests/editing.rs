use std::sync::Arc;

use foundation::GeoPoint;
use interaction::{InteractionController, InteractionMode};
use mission::WaypointStore;
use parking_lot::Mutex;
use scene::{
    EntityKind, GroundView, MapReconciler, PointerEvent, PointerKind, RecordingSurface, ScreenPos,
};

fn send(surface: &RecordingSurface, kind: PointerKind, at: ScreenPos) {
    surface.emit(PointerEvent::primary(kind, at.x, at.y));
}

fn tap(surface: &RecordingSurface, at: ScreenPos) {
    for kind in [PointerKind::Press, PointerKind::Release, PointerKind::Click] {
        send(surface, kind, at);
    }
}

#[test]
fn author_then_reshape_a_mission_by_pointer() {
    let surface = Arc::new(RecordingSurface::with_view(GroundView {
        origin: GeoPoint::new(10.0, 10.1, 0.0),
        ..GroundView::default()
    }));
    let store = Arc::new(Mutex::new(WaypointStore::new()));
    let reconciler = Arc::new(Mutex::new(MapReconciler::new(surface.clone())));
    let controller = Arc::new(InteractionController::new(
        store.clone(),
        reconciler.clone(),
        surface.clone(),
    ));
    let _binding = controller.bind();

    controller.set_mode(InteractionMode::Add);
    let corners = [
        GeoPoint::new(10.01, 10.01, 0.0),
        GeoPoint::new(10.05, 10.01, 0.0),
        GeoPoint::new(10.05, 10.05, 0.0),
    ];
    for p in corners {
        tap(&surface, surface.screen_of(p));
    }
    assert_eq!(store.lock().len(), 3);
    assert_eq!(surface.count(EntityKind::Marker), 3);
    assert_eq!(surface.count(EntityKind::Polyline), 2);

    // Back to select and drag the middle waypoint north.
    assert_eq!(controller.toggle_mode(), InteractionMode::Select);
    let middle = store.lock().waypoints()[1].id;
    let from = surface.screen_of(corners[1]);
    let to = surface.screen_of(GeoPoint::new(10.05, 10.03, 0.0));
    send(&surface, PointerKind::Press, from);
    send(&surface, PointerKind::Move, ScreenPos::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0));
    send(&surface, PointerKind::Move, to);
    send(&surface, PointerKind::Release, to);
    send(&surface, PointerKind::Click, to);

    let store = store.lock();
    assert_eq!(store.len(), 3);
    assert_eq!(store.waypoints()[1].id, middle, "order is preserved");
    let moved = store.waypoints()[1].position();
    assert!((moved.lat_deg - 10.03).abs() < 1e-9);

    // Both segments touching the dragged waypoint follow it.
    let lines = surface.polylines();
    assert_eq!(lines.len(), 2);
    let touching = lines
        .iter()
        .filter(|(_, line)| line.positions.iter().any(|p| (p.lat_deg - 10.03).abs() < 1e-9))
        .count();
    assert_eq!(touching, 2);
    assert!(surface.camera_rotation_enabled());
}
