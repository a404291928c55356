use foundation::{FileUpload, GeoPoint, VehicleId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::service::SubmitError;
use crate::store::Mission;
use crate::waypoint::{ActionMode, TerminalAction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualWaypoint {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub mode: ActionMode,
}

/// Body of a manual mission upload.
///
/// `sys_id` is only present when the mission targets one vehicle of a fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualMissionRequest {
    pub waypoints: Vec<ManualWaypoint>,
    pub speed: f64,
    pub end_action: TerminalAction,
    pub auto_start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sys_id: Option<VehicleId>,
}

impl Mission {
    /// Builds the upload body. In fleet mode a target vehicle is required.
    pub fn to_manual_request(&self, fleet_mode: bool) -> Result<ManualMissionRequest, SubmitError> {
        if self.waypoints.is_empty() {
            return Err(SubmitError::EmptyMission);
        }
        let sys_id = if fleet_mode {
            Some(self.target_vehicle.ok_or(SubmitError::NoTargetVehicle)?)
        } else {
            None
        };
        Ok(ManualMissionRequest {
            waypoints: self
                .waypoints
                .iter()
                .map(|w| ManualWaypoint {
                    longitude: w.lon_deg,
                    latitude: w.lat_deg,
                    altitude: w.alt_m,
                    mode: w.mode,
                })
                .collect(),
            speed: self.params.cruise_speed_m_s,
            end_action: self.params.terminal_action,
            auto_start: self.params.auto_start,
            sys_id,
        })
    }
}

/// Multipart geofile mission upload.
///
/// A missing `start` means the backend uses the vehicle's current position.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofileMissionRequest {
    pub file: FileUpload,
    pub start: Option<GeoPoint>,
    pub altitude_m: f64,
    pub speed_m_s: f64,
    pub sensor_width_m: f64,
    pub overlap: f64,
    pub connection_string: String,
    pub auto_start: bool,
    pub end_action: TerminalAction,
    pub sys_id: Option<VehicleId>,
}

impl GeofileMissionRequest {
    pub fn use_vehicle_position(&self) -> bool {
        self.start.is_none()
    }

    /// Text form fields in upload order, excluding the file part.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![(
            "use_drone_position",
            self.use_vehicle_position().to_string(),
        )];
        if let Some(start) = self.start {
            fields.push(("start_lat", start.lat_deg.to_string()));
            fields.push(("start_lon", start.lon_deg.to_string()));
        }
        fields.extend([
            ("altitude", self.altitude_m.to_string()),
            ("speed", self.speed_m_s.to_string()),
            ("sensor_width", self.sensor_width_m.to_string()),
            ("overlap", self.overlap.to_string()),
            ("connection_string", self.connection_string.clone()),
            ("auto_start", self.auto_start.to_string()),
            ("end_action", self.end_action.to_string()),
        ]);
        if let Some(id) = self.sys_id {
            fields.push(("sys_id", id.to_string()));
        }
        fields
    }
}

/// Backend acknowledgement of an accepted mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionSummary {
    #[serde(default)]
    pub auto_started: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use crate::service::SubmitError;
    use crate::store::WaypointStore;
    use crate::waypoint::ActionMode;
    use foundation::VehicleId;
    use serde_json::json;

    fn two_point_store() -> WaypointStore {
        let mut store = WaypointStore::new();
        store.add(72.0, 19.0, Some(50.0), None).unwrap();
        store
            .add(72.1, 19.1, Some(40.0), Some(ActionMode::Land))
            .unwrap();
        store
    }

    #[test]
    fn single_link_request_omits_sys_id() {
        let req = two_point_store()
            .mission(Some(VehicleId(3)))
            .to_manual_request(false)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "waypoints": [
                    {"longitude": 72.0, "latitude": 19.0, "altitude": 50.0, "mode": "WAYPOINT"},
                    {"longitude": 72.1, "latitude": 19.1, "altitude": 40.0, "mode": "LAND"}
                ],
                "speed": 5.0,
                "end_action": "RTL",
                "auto_start": true
            })
        );
    }

    #[test]
    fn fleet_request_requires_and_carries_target() {
        let store = two_point_store();
        assert_eq!(
            store.mission(None).to_manual_request(true),
            Err(SubmitError::NoTargetVehicle)
        );
        let req = store.mission(Some(VehicleId(2))).to_manual_request(true).unwrap();
        assert_eq!(serde_json::to_value(&req).unwrap()["sys_id"], json!(2));
    }

    #[test]
    fn empty_mission_is_rejected() {
        let store = WaypointStore::new();
        assert_eq!(
            store.mission(None).to_manual_request(false),
            Err(SubmitError::EmptyMission)
        );
    }
}
