use foundation::VehicleId;
use runtime::BoxFuture;
use thiserror::Error;

use crate::snapshot::{FleetSnapshot, TelemetrySnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// The request was superseded or stopped. Never surfaced to users.
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {detail}")]
    Backend { status: u16, detail: String },
    #[error("vehicle {0} not found")]
    NotFound(VehicleId),
    #[error("decode error: {0}")]
    Decode(String),
}

impl TelemetryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TelemetryError::Cancelled)
    }
}

/// What one poller asks for on every tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// Sectioned telemetry for one vehicle; `None` means the single configured link.
    Vehicle(Option<VehicleId>),
    /// Flat summaries for every connected vehicle.
    Fleet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutput {
    Telemetry {
        target: Option<VehicleId>,
        snapshot: TelemetrySnapshot,
    },
    Fleet(FleetSnapshot),
}

pub trait TelemetrySource: Send + Sync {
    fn fleet_status(&self) -> BoxFuture<'_, Result<FleetSnapshot, TelemetryError>>;

    fn telemetry(
        &self,
        target: Option<VehicleId>,
    ) -> BoxFuture<'_, Result<TelemetrySnapshot, TelemetryError>>;
}

pub(crate) async fn fetch(
    source: &dyn TelemetrySource,
    target: PollTarget,
) -> Result<PollOutput, TelemetryError> {
    match target {
        PollTarget::Fleet => source.fleet_status().await.map(PollOutput::Fleet),
        PollTarget::Vehicle(target) => source
            .telemetry(target)
            .await
            .map(|snapshot| PollOutput::Telemetry { target, snapshot }),
    }
}
