use std::sync::Arc;

use geofile::{AutoParser, CoveragePlanner, GeofileClient};
use link::{LinkAck, LinkBackend, LinkManager, LinkRequest};
use mission::{MissionService, WaypointStore};
use parking_lot::Mutex;
use runtime::{EventFeed, NotificationBus, SharedEventFeed, Topic};
use scene::{EntitySurface, InputSurface, MapReconciler};
use serde_json::json;
use telemetry::TelemetrySource;
use tracing::info;

use crate::config::StationConfig;
use crate::error::PanelError;
use crate::fleet_panel::FleetPanel;
use crate::geofile_panel::{CoverageSettings, GeofilePanel};
use crate::mission_panel::MissionPanel;
use crate::status::StatusLine;

/// The external services a station talks to.
#[derive(Clone)]
pub struct StationServices {
    pub link: Arc<dyn LinkBackend>,
    pub telemetry: Arc<dyn TelemetrySource>,
    pub missions: Arc<dyn MissionService>,
    pub planner: Arc<dyn CoveragePlanner>,
}

impl StationServices {
    /// One backend serving every role.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: LinkBackend + TelemetrySource + MissionService + CoveragePlanner + 'static,
    {
        Self {
            link: backend.clone(),
            telemetry: backend.clone(),
            missions: backend.clone(),
            planner: backend,
        }
    }
}

/// Every panel mounted against one bus, one store and one map.
pub struct Station {
    config: StationConfig,
    bus: NotificationBus,
    link: Arc<LinkManager>,
    store: Arc<Mutex<WaypointStore>>,
    reconciler: Arc<Mutex<MapReconciler>>,
    status: StatusLine,
    events: SharedEventFeed,
    fleet: FleetPanel,
    mission: MissionPanel,
    geofile: GeofilePanel,
}

impl Station {
    pub fn mount<S>(
        config: StationConfig,
        services: StationServices,
        surface: Arc<S>,
        bus: NotificationBus,
    ) -> Self
    where
        S: EntitySurface + InputSurface + 'static,
    {
        let entities: Arc<dyn EntitySurface> = surface.clone();
        let input: Arc<dyn InputSurface> = surface;
        let link = Arc::new(LinkManager::new(services.link, bus.clone()));
        let store = Arc::new(Mutex::new(WaypointStore::with_params(config.mission_params())));
        let reconciler = Arc::new(Mutex::new(MapReconciler::new(entities)));
        let status = StatusLine::new();
        let geofiles = Arc::new(GeofileClient::new(Arc::new(AutoParser), services.planner));

        let fleet = FleetPanel::mount(
            bus.clone(),
            link.clone(),
            services.telemetry,
            reconciler.clone(),
            config.poll_interval,
        );
        let target = fleet.selected();
        let mission = MissionPanel::mount(
            &bus,
            store.clone(),
            reconciler.clone(),
            input.clone(),
            link.clone(),
            services.missions.clone(),
            status.clone(),
            target,
        );
        let geofile = GeofilePanel::mount(
            &bus,
            geofiles,
            store.clone(),
            reconciler.clone(),
            input,
            link.clone(),
            services.missions,
            status.clone(),
            CoverageSettings::from(&config),
            target,
        );
        info!(backend = %config.backend_url, "station mounted");

        Self {
            events: EventFeed::shared(config.event_feed_cap),
            config,
            bus,
            link,
            store,
            reconciler,
            status,
            fleet,
            mission,
            geofile,
        }
    }

    pub async fn connect(&self, request: impl Into<LinkRequest>) -> Result<LinkAck, PanelError> {
        match self.link.connect(request).await {
            Ok(ack) => {
                self.status.info(ack.message.clone());
                Ok(ack)
            }
            Err(e) => {
                self.status.error(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), PanelError> {
        self.link.disconnect().await.map_err(|e| {
            self.status.error(e.to_string());
            PanelError::from(e)
        })
    }

    pub fn request_mission_start(&self) -> usize {
        self.bus.publish(Topic::MissionStartRequested, json!(null))
    }

    pub fn request_mission_clear(&self) -> usize {
        self.bus.publish(Topic::MissionClearRequested, json!(null))
    }

    pub fn change_coverage_altitude(&self, alt_m: f64) -> usize {
        self.bus.publish(Topic::CoverageAltitudeChanged, json!(alt_m))
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    pub fn link(&self) -> &Arc<LinkManager> {
        &self.link
    }

    pub fn store(&self) -> &Arc<Mutex<WaypointStore>> {
        &self.store
    }

    pub fn reconciler(&self) -> &Arc<Mutex<MapReconciler>> {
        &self.reconciler
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn events(&self) -> &SharedEventFeed {
        &self.events
    }

    pub fn fleet(&self) -> &FleetPanel {
        &self.fleet
    }

    pub fn mission(&self) -> &MissionPanel {
        &self.mission
    }

    pub fn geofile(&self) -> &GeofilePanel {
        &self.geofile
    }

    /// Unmounts every panel and removes anything left on the map. Idempotent.
    pub fn unmount(&mut self) -> usize {
        self.fleet.unmount();
        self.mission.unmount();
        self.geofile.unmount();
        self.reconciler.lock().teardown()
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.unmount();
    }
}
