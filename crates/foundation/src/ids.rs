use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable waypoint identity, generated once at creation and never reused.
///
/// Deliberately not derived from list position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaypointId(Uuid);

impl WaypointId {
    pub fn generate() -> Self {
        WaypointId(Uuid::new_v4())
    }
}

impl fmt::Display for WaypointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wp-{}", self.0.simple())
    }
}

/// Vehicle system id (MAVLink sysid); unique within one fleet snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u8);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VehicleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(VehicleId)
    }
}

/// Local correlation id for one entry of a multi-link configuration.
///
/// Unrelated to [`VehicleId`]; the two are only linked once telemetry arrives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u32);
