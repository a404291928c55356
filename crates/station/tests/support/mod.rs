#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use foundation::{GeoPoint, Timestamp, VehicleId};
use geofile::{CoveragePath, CoveragePlanner, CoverageRequest, GeofileError, LocalPlanner};
use link::{LinkAck, LinkBackend, LinkError, LinkRequest};
use mission::{
    GeofileMissionRequest, ManualMissionRequest, MissionService, MissionSummary, SubmitError,
};
use parking_lot::Mutex;
use runtime::{BoxFuture, NotificationBus, Subscription, Topic};
use serde_json::Value;
use telemetry::{FleetSnapshot, TelemetryError, TelemetrySnapshot, TelemetrySource, VehicleSummary};

/// In-memory stand-in for every backend service.
#[derive(Default)]
pub struct FakeBackend {
    pub fleet: Mutex<FleetSnapshot>,
    pub mission_error: Mutex<Option<String>>,
    pub manual: Mutex<Vec<ManualMissionRequest>>,
    pub geofile: Mutex<Vec<GeofileMissionRequest>>,
    pub disconnect_delay: Mutex<Option<Duration>>,
    planner: LocalPlanner,
}

impl FakeBackend {
    pub fn with_fleet(n: u8) -> Arc<Self> {
        let backend = Self::default();
        *backend.fleet.lock() = (1..=n)
            .map(|i| {
                let at = GeoPoint::new(72.0 + f64::from(i) * 0.01, 19.0, 40.0);
                (VehicleId(i), summary_at(at))
            })
            .collect();
        Arc::new(backend)
    }

    pub fn fail_missions(&self, detail: &str) {
        *self.mission_error.lock() = Some(detail.to_string());
    }

    pub fn move_vehicle(&self, id: VehicleId, to: GeoPoint) {
        self.fleet.lock().insert(id, summary_at(to));
    }

    pub fn accept_missions(&self) {
        *self.mission_error.lock() = None;
    }

    fn outcome(&self, auto_start: bool) -> Result<MissionSummary, SubmitError> {
        match self.mission_error.lock().clone() {
            Some(detail) => Err(SubmitError::Rejected(detail)),
            None => Ok(MissionSummary {
                auto_started: auto_start,
                ..MissionSummary::default()
            }),
        }
    }
}

pub fn summary_at(p: GeoPoint) -> VehicleSummary {
    VehicleSummary {
        flight_mode: Some("GUIDED".to_string()),
        armed: Some(false),
        latitude_deg: Some(p.lat_deg),
        longitude_deg: Some(p.lon_deg),
        altitude_m: Some(p.alt_m),
        ..VehicleSummary::default()
    }
}

impl LinkBackend for FakeBackend {
    fn connect<'a>(&'a self, request: &'a LinkRequest) -> BoxFuture<'a, Result<LinkAck, LinkError>> {
        Box::pin(async move {
            Ok(LinkAck {
                message: "Connected".to_string(),
                connections: request.configs().iter().map(|c| c.connection_string()).collect(),
            })
        })
    }

    fn disconnect(&self) -> BoxFuture<'_, Result<(), LinkError>> {
        Box::pin(async move {
            let delay = *self.disconnect_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }
}

impl TelemetrySource for FakeBackend {
    fn fleet_status(&self) -> BoxFuture<'_, Result<FleetSnapshot, TelemetryError>> {
        Box::pin(async move { Ok(self.fleet.lock().clone()) })
    }

    fn telemetry(
        &self,
        target: Option<VehicleId>,
    ) -> BoxFuture<'_, Result<TelemetrySnapshot, TelemetryError>> {
        Box::pin(async move {
            let fleet = self.fleet.lock();
            let id = target
                .or_else(|| fleet.smallest_id())
                .ok_or_else(|| TelemetryError::Transport("no vehicle".to_string()))?;
            let summary = fleet.get(id).ok_or(TelemetryError::NotFound(id))?;
            Ok(summary.to_snapshot(Timestamp::now()))
        })
    }
}

impl MissionService for FakeBackend {
    fn start_manual_mission<'a>(
        &'a self,
        request: &'a ManualMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>> {
        Box::pin(async move {
            let outcome = self.outcome(request.auto_start);
            if outcome.is_ok() {
                self.manual.lock().push(request.clone());
            }
            outcome
        })
    }

    fn start_geofile_mission<'a>(
        &'a self,
        request: &'a GeofileMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>> {
        Box::pin(async move {
            let outcome = self.outcome(request.auto_start);
            if outcome.is_ok() {
                self.geofile.lock().push(request.clone());
            }
            outcome
        })
    }
}

impl CoveragePlanner for FakeBackend {
    fn plan<'a>(
        &'a self,
        request: &'a CoverageRequest,
    ) -> BoxFuture<'a, Result<CoveragePath, GeofileError>> {
        self.planner.plan(request)
    }
}

/// Lets spawned poll tasks run; the tokio clock is paused in these tests.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Records every payload published on `topic`.
pub struct Recorder {
    pub payloads: Arc<Mutex<Vec<Value>>>,
    _subscription: Subscription,
}

impl Recorder {
    pub fn on(bus: &NotificationBus, topic: Topic) -> Self {
        let payloads: Arc<Mutex<Vec<Value>>> = Arc::default();
        let sink = payloads.clone();
        let subscription = bus.subscribe(topic, move |note| sink.lock().push(note.payload.clone()));
        Self {
            payloads,
            _subscription: subscription,
        }
    }

    pub fn seen(&self) -> Vec<Value> {
        self.payloads.lock().clone()
    }
}
