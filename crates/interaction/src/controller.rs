use std::fmt;
use std::sync::{Arc, Weak};

use foundation::WaypointId;
use mission::{EditMode, WaypointPatch, WaypointStore};
use parking_lot::Mutex;
use scene::{InputSurface, MapReconciler, PointerButton, PointerEvent, PointerKind, ScreenPos};
use tracing::{debug, info};

use crate::pointer::{GestureTracker, PointerBinding};

/// Which action a primary click performs. Toggled explicitly by the operator.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum InteractionMode {
    Add,
    #[default]
    Select,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InteractionState {
    Add,
    Select,
    Dragging(WaypointId),
}

/// What a pointer event did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Ignored,
    Added(WaypointId),
    DragStarted(WaypointId),
    Moved(WaypointId),
    DragEnded(WaypointId),
}

#[derive(Default)]
struct State {
    mode: InteractionMode,
    drag: Option<WaypointId>,
    gesture: GestureTracker,
}

/// Turns pointer events on the map into waypoint edits.
///
/// Add mode turns a primary click into a waypoint at the clicked ground
/// point. Select mode starts a drag when a press lands on a waypoint
/// marker; camera rotation is off until the release. Every pointer event
/// is ignored while the store is in geofile mode.
///
/// Lock order is controller state, then store, then reconciler.
pub struct InteractionController {
    store: Arc<Mutex<WaypointStore>>,
    reconciler: Arc<Mutex<MapReconciler>>,
    surface: Arc<dyn InputSurface>,
    state: Mutex<State>,
}

impl InteractionController {
    pub fn new(
        store: Arc<Mutex<WaypointStore>>,
        reconciler: Arc<Mutex<MapReconciler>>,
        surface: Arc<dyn InputSurface>,
    ) -> Self {
        Self {
            store,
            reconciler,
            surface,
            state: Mutex::new(State::default()),
        }
    }

    /// Registers this controller for the surface's pointer events.
    ///
    /// The handler holds a weak reference; the binding is still what
    /// decides how long it stays registered.
    pub fn bind(self: &Arc<Self>) -> PointerBinding {
        let weak: Weak<Self> = Arc::downgrade(self);
        PointerBinding::attach(
            self.surface.clone(),
            Arc::new(move |event: &PointerEvent| {
                if let Some(controller) = weak.upgrade() {
                    controller.handle(event);
                }
            }),
        )
    }

    pub fn mode(&self) -> InteractionMode {
        self.state.lock().mode
    }

    pub fn state(&self) -> InteractionState {
        let state = self.state.lock();
        match (state.drag, state.mode) {
            (Some(id), _) => InteractionState::Dragging(id),
            (None, InteractionMode::Add) => InteractionState::Add,
            (None, InteractionMode::Select) => InteractionState::Select,
        }
    }

    /// Switches mode, ending any drag in progress.
    pub fn set_mode(&self, mode: InteractionMode) {
        let mut state = self.state.lock();
        self.end_drag(&mut state);
        if state.mode != mode {
            info!(?mode, "interaction mode changed");
        }
        state.mode = mode;
    }

    pub fn toggle_mode(&self) -> InteractionMode {
        let next = match self.mode() {
            InteractionMode::Add => InteractionMode::Select,
            InteractionMode::Select => InteractionMode::Add,
        };
        self.set_mode(next);
        next
    }

    /// Whether pointer input currently reaches the store.
    pub fn is_enabled(&self) -> bool {
        self.store.lock().mode() == EditMode::Manual
    }

    pub fn handle(&self, event: &PointerEvent) -> InteractionOutcome {
        let mut state = self.state.lock();
        if !self.is_enabled() {
            // A geofile import may land mid-drag.
            self.end_drag(&mut state);
            return InteractionOutcome::Ignored;
        }
        if event.button != PointerButton::Primary {
            return InteractionOutcome::Ignored;
        }

        match event.kind {
            PointerKind::Press => {
                state.gesture.press(event.position);
                if state.mode == InteractionMode::Select {
                    return self.begin_drag(&mut state, event.position);
                }
                InteractionOutcome::Ignored
            }
            PointerKind::Move => {
                state.gesture.moved(event.position);
                match state.drag {
                    Some(id) => self.drag_to(&mut state, id, event.position),
                    None => InteractionOutcome::Ignored,
                }
            }
            PointerKind::Release => {
                state.gesture.release();
                match self.end_drag(&mut state) {
                    Some(id) => InteractionOutcome::DragEnded(id),
                    None => InteractionOutcome::Ignored,
                }
            }
            PointerKind::Click => {
                let click = state.gesture.consume_click();
                if state.mode == InteractionMode::Add && click {
                    return self.add_at(event.position);
                }
                InteractionOutcome::Ignored
            }
        }
    }

    /// Aborts a drag without waiting for the release.
    pub fn cancel_drag(&self) -> Option<WaypointId> {
        let mut state = self.state.lock();
        self.end_drag(&mut state)
    }

    fn add_at(&self, at: ScreenPos) -> InteractionOutcome {
        let Some(ground) = self.surface.project_to_ground(at) else {
            debug!(x = at.x, y = at.y, "click off the globe");
            return InteractionOutcome::Ignored;
        };
        let mut store = self.store.lock();
        match store.add(ground.lon_deg, ground.lat_deg, None, None) {
            Ok(wp) => {
                self.reconciler.lock().reconcile_waypoints(store.waypoints());
                debug!(id = %wp.id, lon = wp.lon_deg, lat = wp.lat_deg, "waypoint added");
                InteractionOutcome::Added(wp.id)
            }
            Err(err) => {
                debug!("waypoint not added: {err}");
                InteractionOutcome::Ignored
            }
        }
    }

    /// Resolves the press to a waypoint through the reconciler's own entities.
    fn begin_drag(&self, state: &mut State, at: ScreenPos) -> InteractionOutcome {
        let Some(handle) = self.surface.pick(at) else {
            return InteractionOutcome::Ignored;
        };
        let Some(id) = self.reconciler.lock().waypoint_for_entity(handle) else {
            return InteractionOutcome::Ignored;
        };
        state.drag = Some(id);
        self.surface.set_camera_rotation(false);
        debug!(%id, "drag started");
        InteractionOutcome::DragStarted(id)
    }

    fn drag_to(&self, state: &mut State, id: WaypointId, at: ScreenPos) -> InteractionOutcome {
        let Some(ground) = self.surface.project_to_ground(at) else {
            return InteractionOutcome::Ignored;
        };
        let mut store = self.store.lock();
        match store.update(id, WaypointPatch::moved_to(ground.lon_deg, ground.lat_deg)) {
            Ok(true) => {
                self.reconciler.lock().reconcile_waypoints(store.waypoints());
                InteractionOutcome::Moved(id)
            }
            Ok(false) if store.get(id).is_some() => InteractionOutcome::Ignored,
            Ok(false) | Err(_) => {
                // Removed or locked out from under the drag.
                drop(store);
                self.end_drag(state);
                InteractionOutcome::Ignored
            }
        }
    }

    fn end_drag(&self, state: &mut State) -> Option<WaypointId> {
        let id = state.drag.take()?;
        self.surface.set_camera_rotation(true);
        debug!(%id, "drag ended");
        Some(id)
    }
}

impl fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionController")
            .field("state", &self.state())
            .finish()
    }
}
