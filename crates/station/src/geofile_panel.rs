use std::sync::Arc;

use foundation::{FileUpload, GeoPoint, VehicleId};
use geofile::{CoveragePath, GeofileClient, GeofileError, GeofileGeometry};
use link::{LinkManager, LinkState, LinkStatus};
use mission::{
    ActionMode, EditMode, GeofileMissionRequest, MissionService, MissionSummary, StoreError,
    SubmitError, TerminalAction, WaypointStore,
};
use parking_lot::Mutex;
use runtime::{Notification, NotificationBus, Subscription, Topic};
use scene::{CameraTarget, InputSurface, MapReconciler};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::StationConfig;
use crate::error::PanelError;
use crate::status::StatusLine;

/// Margin around a loaded geofile when framing the camera.
pub const FRAME_PADDING_M: f64 = 200.0;

/// Parameters applied to coverage planning and geofile missions.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoverageSettings {
    pub sensor_width_m: f64,
    pub overlap: f64,
    pub altitude_m: f64,
    pub speed_m_s: f64,
    pub terminal_action: TerminalAction,
    pub auto_start: bool,
}

impl From<&StationConfig> for CoverageSettings {
    fn from(config: &StationConfig) -> Self {
        Self {
            sensor_width_m: config.sensor_width_m,
            overlap: config.overlap,
            altitude_m: config.coverage_altitude_m,
            speed_m_s: config.cruise_speed_m_s,
            terminal_action: config.terminal_action,
            auto_start: true,
        }
    }
}

struct Shared {
    bus: NotificationBus,
    client: Arc<GeofileClient>,
    store: Arc<Mutex<WaypointStore>>,
    reconciler: Arc<Mutex<MapReconciler>>,
    surface: Arc<dyn InputSurface>,
    link: Arc<LinkManager>,
    missions: Arc<dyn MissionService>,
    status: StatusLine,
    settings: Mutex<CoverageSettings>,
    target: Mutex<Option<VehicleId>>,
}

impl Shared {
    fn fail<T>(&self, err: impl Into<PanelError>) -> Result<T, PanelError> {
        let err = err.into();
        self.status.error(err.to_string());
        Err(err)
    }

    fn apply_altitude(&self, alt_m: f64) -> bool {
        if !alt_m.is_finite() {
            return false;
        }
        self.settings.lock().altitude_m = alt_m;
        match self.client.set_coverage_altitude(alt_m) {
            Some(path) => {
                self.reconciler.lock().show_coverage(&path);
                debug!(alt_m, "coverage altitude applied");
                true
            }
            None => false,
        }
    }

    fn on_vehicle_selected(&self, note: &Notification) {
        if let Some(id) = note.payload_u64().and_then(|v| u8::try_from(v).ok()) {
            *self.target.lock() = Some(VehicleId(id));
        } else if note.payload.is_null() {
            *self.target.lock() = None;
        }
    }
}

fn connection_string(status: &LinkStatus) -> Option<String> {
    status
        .connections
        .first()
        .cloned()
        .or_else(|| status.links.first().map(|l| l.config.connection_string()))
}

/// Geofile overlay and coverage-path workflow.
///
/// Loading a file puts the store in geofile mode, which locks out manual
/// editing; it is refused while manual waypoints exist. Clearing (or
/// converting the coverage path into manual waypoints) hands the mission
/// back to manual editing.
pub struct GeofilePanel {
    shared: Arc<Shared>,
    subscriptions: Vec<Subscription>,
}

impl GeofilePanel {
    #[allow(clippy::too_many_arguments)]
    pub fn mount(
        bus: &NotificationBus,
        client: Arc<GeofileClient>,
        store: Arc<Mutex<WaypointStore>>,
        reconciler: Arc<Mutex<MapReconciler>>,
        surface: Arc<dyn InputSurface>,
        link: Arc<LinkManager>,
        missions: Arc<dyn MissionService>,
        status: StatusLine,
        settings: CoverageSettings,
        target: Option<VehicleId>,
    ) -> Self {
        let shared = Arc::new(Shared {
            bus: bus.clone(),
            client,
            store,
            reconciler,
            surface,
            link,
            missions,
            status,
            settings: Mutex::new(settings),
            target: Mutex::new(target),
        });

        let on_altitude = shared.clone();
        let on_select = shared.clone();
        let subscriptions = vec![
            bus.subscribe(Topic::CoverageAltitudeChanged, move |note| {
                match note.payload_f64() {
                    Some(alt_m) => {
                        on_altitude.apply_altitude(alt_m);
                    }
                    None => debug!(payload = %note.payload, "ignoring malformed altitude"),
                }
            }),
            bus.subscribe(Topic::VehicleSelected, move |note| on_select.on_vehicle_selected(note)),
        ];

        // A geofile loaded before this mount is drawn again.
        if let Some(loaded) = shared.client.loaded() {
            let mut reconciler = shared.reconciler.lock();
            reconciler.show_geofile(&loaded.geometry);
            if let Some(path) = shared.client.coverage() {
                reconciler.show_coverage(&path);
            }
        }

        Self {
            shared,
            subscriptions,
        }
    }

    pub fn load(&self, file: FileUpload) -> Result<GeofileGeometry, PanelError> {
        let s = &self.shared;
        {
            let store = s.store.lock();
            if store.mode() == EditMode::Manual && !store.is_empty() {
                return s.fail(StoreError::WaypointsPresent(store.len()));
            }
        }
        let name = file.name.clone();
        let geometry = match s.client.load(file) {
            Ok(g) => g,
            Err(e) => return s.fail(e),
        };
        if let Err(e) = s.store.lock().enter_geofile_mode() {
            s.client.clear();
            return s.fail(e);
        }
        {
            let mut reconciler = s.reconciler.lock();
            reconciler.clear_coverage();
            reconciler.show_geofile(&geometry);
        }
        s.surface.fly_to(
            CameraTarget::Bounds(geometry.bounds.padded(FRAME_PADDING_M)),
            Box::new(|completed: bool| debug!(completed, "camera framed geofile")),
        );
        s.status.info(format!("loaded {name}"));
        s.bus.publish(
            Topic::GeofileLoaded,
            json!({
                "name": name,
                "features": geometry.feature_count(),
                "bounds": geometry.bounds,
            }),
        );
        Ok(geometry)
    }

    /// Plans a sweep over the loaded polygon and draws it at the configured
    /// altitude. Without a `start`, the centre of the geofile is used.
    pub async fn generate_coverage(&self, start: Option<GeoPoint>) -> Result<CoveragePath, PanelError> {
        let s = &self.shared;
        let Some(loaded) = s.client.loaded() else {
            return s.fail(GeofileError::NotLoaded);
        };
        let settings = *s.settings.lock();
        let start = start.unwrap_or_else(|| loaded.geometry.bounds.center());
        match s
            .client
            .generate_coverage_path(start, settings.sensor_width_m, settings.overlap)
            .await
        {
            Ok(_) => {}
            Err(GeofileError::Superseded) => {
                debug!("coverage result arrived after the geofile changed");
                return Err(GeofileError::Superseded.into());
            }
            Err(e) => return s.fail(e),
        }
        let path = s
            .client
            .set_coverage_altitude(settings.altitude_m)
            .ok_or(GeofileError::NotLoaded)?;
        s.reconciler.lock().show_coverage(&path);
        s.status.info(format!(
            "coverage path: {} waypoints, {:.2} km",
            path.stats.total_waypoints, path.stats.path_length_km
        ));
        Ok(path)
    }

    pub fn set_coverage_altitude(&self, alt_m: f64) -> bool {
        self.shared.apply_altitude(alt_m)
    }

    pub fn settings(&self) -> CoverageSettings {
        *self.shared.settings.lock()
    }

    /// Starts a geofile mission on the backend. `start: None` lets the
    /// vehicle use its current position.
    pub async fn start_mission(&self, start: Option<GeoPoint>) -> Result<MissionSummary, PanelError> {
        let s = &self.shared;
        let status = s.link.status();
        if status.state != LinkState::Connected {
            return s.fail(SubmitError::Blocked("connect a vehicle first".to_string()));
        }
        let Some(loaded) = s.client.loaded() else {
            return s.fail(GeofileError::NotLoaded);
        };
        if s.store.lock().mode() != EditMode::Geofile {
            return s.fail(SubmitError::Blocked(
                "manual waypoints own the mission".to_string(),
            ));
        }
        let sys_id = match (*s.target.lock(), status.fleet) {
            (_, false) => None,
            (Some(id), true) => Some(id),
            (None, true) => return s.fail(SubmitError::NoTargetVehicle),
        };
        let Some(connection_string) = connection_string(&status) else {
            return s.fail(SubmitError::Blocked("no active link".to_string()));
        };
        let settings = *s.settings.lock();
        let request = GeofileMissionRequest {
            file: loaded.file,
            start,
            altitude_m: settings.altitude_m,
            speed_m_s: settings.speed_m_s,
            sensor_width_m: settings.sensor_width_m,
            overlap: settings.overlap,
            connection_string,
            auto_start: settings.auto_start,
            end_action: settings.terminal_action,
            sys_id,
        };
        info!(file = %request.file.name, target = ?sys_id, "submitting geofile mission");
        match s.missions.start_geofile_mission(&request).await {
            Ok(summary) => {
                s.status.info("geofile mission uploaded");
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "geofile mission not started");
                s.fail(e)
            }
        }
    }

    /// Turns the current coverage path into editable manual waypoints and
    /// drops the geofile. Returns how many waypoints were added.
    pub fn convert_to_manual(&self) -> Result<usize, PanelError> {
        let s = &self.shared;
        let Some(path) = s.client.coverage() else {
            return s.fail(GeofileError::InvalidRequest(
                "generate a coverage path first".to_string(),
            ));
        };
        s.client.clear();
        let added = {
            let mut store = s.store.lock();
            store.exit_geofile_mode();
            let ids = match store.extend_from_path(&path.waypoints, ActionMode::Waypoint) {
                Ok(ids) => ids,
                Err(e) => {
                    drop(store);
                    return s.fail(e);
                }
            };
            let mut reconciler = s.reconciler.lock();
            reconciler.clear_geofile();
            reconciler.clear_coverage();
            reconciler.reconcile_waypoints(store.waypoints());
            ids.len()
        };
        s.status.info(format!("{added} waypoints ready for editing"));
        s.bus.publish(Topic::GeofileCleared, json!(null));
        Ok(added)
    }

    /// Removes the geofile, its overlay and any coverage path. Returns
    /// whether anything was loaded.
    pub fn clear(&self) -> bool {
        let s = &self.shared;
        let had = s.client.clear();
        s.store.lock().exit_geofile_mode();
        {
            let mut reconciler = s.reconciler.lock();
            reconciler.clear_geofile();
            reconciler.clear_coverage();
        }
        if had {
            s.bus.publish(Topic::GeofileCleared, json!(null));
        }
        had
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.client.is_loaded()
    }

    pub fn coverage(&self) -> Option<CoveragePath> {
        self.shared.client.coverage()
    }

    pub fn unmount(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        self.subscriptions.clear();
        let mut reconciler = self.shared.reconciler.lock();
        reconciler.clear_geofile();
        reconciler.clear_coverage();
    }
}

impl Drop for GeofilePanel {
    fn drop(&mut self) {
        self.unmount();
    }
}
