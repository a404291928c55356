use runtime::BoxFuture;
use thiserror::Error;

use crate::request::{GeofileMissionRequest, ManualMissionRequest, MissionSummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("mission has no waypoints")]
    EmptyMission,
    #[error("select a vehicle before starting a fleet mission")]
    NoTargetVehicle,
    #[error("{0}")]
    Blocked(String),
    /// Backend refused the mission; carries its detail text.
    #[error("{0}")]
    Rejected(String),
    #[error("mission upload failed: {0}")]
    Transport(String),
}

/// Mission upload endpoints.
pub trait MissionService: Send + Sync {
    fn start_manual_mission<'a>(
        &'a self,
        request: &'a ManualMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>>;

    fn start_geofile_mission<'a>(
        &'a self,
        request: &'a GeofileMissionRequest,
    ) -> BoxFuture<'a, Result<MissionSummary, SubmitError>>;
}
