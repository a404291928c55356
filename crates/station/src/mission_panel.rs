use std::sync::Arc;

use foundation::{VehicleId, WaypointId};
use interaction::{InteractionController, InteractionMode, PointerBinding};
use link::{LinkManager, LinkState};
use mission::{
    ActionMode, EditMode, MissionService, MissionSummary, SubmitError, Waypoint, WaypointPatch,
    WaypointStore,
};
use parking_lot::Mutex;
use runtime::{Notification, NotificationBus, Subscription, Topic};
use scene::{InputSurface, MapReconciler};
use tracing::{debug, info, warn};

use crate::error::PanelError;
use crate::status::StatusLine;

struct Shared {
    store: Arc<Mutex<WaypointStore>>,
    reconciler: Arc<Mutex<MapReconciler>>,
    link: Arc<LinkManager>,
    missions: Arc<dyn MissionService>,
    status: StatusLine,
    target: Mutex<Option<VehicleId>>,
}

impl Shared {
    fn redraw(&self, store: &WaypointStore) {
        self.reconciler.lock().reconcile_waypoints(store.waypoints());
    }

    fn edit<T>(
        &self,
        op: impl FnOnce(&mut WaypointStore) -> Result<T, mission::StoreError>,
    ) -> Result<T, PanelError> {
        let mut store = self.store.lock();
        match op(&mut store) {
            Ok(value) => {
                self.redraw(&store);
                Ok(value)
            }
            Err(err) => {
                self.status.error(err.to_string());
                Err(err.into())
            }
        }
    }

    fn clear(&self) -> usize {
        let mut store = self.store.lock();
        if store.mode() == EditMode::Geofile {
            debug!("mission clear ignored while a geofile owns the mission");
            return 0;
        }
        let removed = store.clear();
        self.redraw(&store);
        removed
    }

    async fn submit(&self) -> Result<MissionSummary, SubmitError> {
        let status = self.link.status();
        if status.state != LinkState::Connected {
            return Err(SubmitError::Blocked("connect a vehicle first".to_string()));
        }
        let mission = {
            let store = self.store.lock();
            if store.mode() == EditMode::Geofile {
                return Err(SubmitError::Blocked(
                    "a geofile mission is active; clear it before starting a manual one"
                        .to_string(),
                ));
            }
            store.mission(*self.target.lock())
        };
        let request = mission.to_manual_request(status.fleet)?;
        info!(
            waypoints = request.waypoints.len(),
            target = ?request.sys_id,
            "submitting manual mission"
        );
        self.missions.start_manual_mission(&request).await
    }

    async fn start(&self) -> Result<MissionSummary, SubmitError> {
        match self.submit().await {
            Ok(summary) => {
                self.status.info(if summary.auto_started {
                    "mission uploaded and started"
                } else {
                    "mission uploaded"
                });
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "manual mission not started");
                self.status.error(err.to_string());
                Err(err)
            }
        }
    }

    fn on_vehicle_selected(&self, note: &Notification) {
        let target = note
            .payload_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(VehicleId);
        if target.is_none() && !note.payload.is_null() {
            return;
        }
        *self.target.lock() = target;
    }
}

/// Manual mission editing: pointer authoring on the map, field edits, and
/// mission start/clear requests from the bus.
///
/// A failed start leaves the mission as it was and reports the backend's
/// reason on the status line.
pub struct MissionPanel {
    shared: Arc<Shared>,
    controller: Arc<InteractionController>,
    binding: Option<PointerBinding>,
    subscriptions: Vec<Subscription>,
}

impl MissionPanel {
    #[allow(clippy::too_many_arguments)]
    pub fn mount(
        bus: &NotificationBus,
        store: Arc<Mutex<WaypointStore>>,
        reconciler: Arc<Mutex<MapReconciler>>,
        surface: Arc<dyn InputSurface>,
        link: Arc<LinkManager>,
        missions: Arc<dyn MissionService>,
        status: StatusLine,
        target: Option<VehicleId>,
    ) -> Self {
        let shared = Arc::new(Shared {
            store: store.clone(),
            reconciler: reconciler.clone(),
            link,
            missions,
            status,
            target: Mutex::new(target),
        });
        let controller = Arc::new(InteractionController::new(store, reconciler, surface));
        let binding = controller.bind();

        let on_start = shared.clone();
        let on_clear = shared.clone();
        let on_select = shared.clone();
        let subscriptions = vec![
            bus.subscribe(Topic::MissionStartRequested, move |_| {
                let shared = on_start.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            if let Err(e) = shared.start().await {
                                debug!(error = %e, "requested mission start failed");
                            }
                        });
                    }
                    Err(_) => shared.status.error("mission start needs a running runtime"),
                }
            }),
            bus.subscribe(Topic::MissionClearRequested, move |_| {
                on_clear.clear();
            }),
            bus.subscribe(Topic::VehicleSelected, move |note| on_select.on_vehicle_selected(note)),
        ];

        // Redraw whatever the store already holds.
        {
            let store = shared.store.lock();
            shared.redraw(&store);
        }

        Self {
            shared,
            controller,
            binding: Some(binding),
            subscriptions,
        }
    }

    pub fn controller(&self) -> &Arc<InteractionController> {
        &self.controller
    }

    pub fn set_interaction_mode(&self, mode: InteractionMode) {
        self.controller.set_mode(mode);
    }

    pub fn add_waypoint(
        &self,
        lon_deg: f64,
        lat_deg: f64,
        alt_m: Option<f64>,
        mode: Option<ActionMode>,
    ) -> Result<Waypoint, PanelError> {
        self.shared.edit(|store| store.add(lon_deg, lat_deg, alt_m, mode))
    }

    pub fn update_waypoint(&self, id: WaypointId, patch: WaypointPatch) -> Result<bool, PanelError> {
        self.shared.edit(|store| store.update(id, patch))
    }

    pub fn remove_waypoint(&self, id: WaypointId) -> Result<bool, PanelError> {
        self.shared.edit(|store| store.remove(id))
    }

    pub fn clear(&self) -> usize {
        self.shared.clear()
    }

    pub fn waypoints(&self) -> Vec<Waypoint> {
        self.shared.store.lock().waypoints().to_vec()
    }

    pub fn target(&self) -> Option<VehicleId> {
        *self.shared.target.lock()
    }

    /// Uploads the current mission. Same path as a `mission-start-requested`
    /// notification, but awaitable.
    pub async fn start_mission(&self) -> Result<MissionSummary, SubmitError> {
        self.shared.start().await
    }

    pub fn unmount(&mut self) {
        let Some(mut binding) = self.binding.take() else {
            return;
        };
        binding.detach();
        self.controller.cancel_drag();
        self.subscriptions.clear();
        self.shared.reconciler.lock().clear_waypoints();
    }
}

impl Drop for MissionPanel {
    fn drop(&mut self) {
        self.unmount();
    }
}
