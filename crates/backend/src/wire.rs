//! JSON shapes exchanged with the backend.
//!
//! Sensor sections use `"--"` as a placeholder for values the vehicle has
//! not reported; those, like nulls, decode as absent.

use std::collections::BTreeMap;

use foundation::{GeoBounds, GeoPoint, Timestamp, VehicleId};
use geofile::{CoveragePath, CoverageStats};
use link::{LinkAck, LinkConfig, LinkRequest};
use mission::MissionSummary;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use telemetry::{
    Attitude, FleetSnapshot, FlightData, Position, Power, SystemHealth, TelemetrySnapshot,
    VehicleSummary,
};
use tracing::warn;

/// Connect body: a bare link object, or `{"connections": [...]}` in fleet mode.
pub fn connect_body(request: &LinkRequest) -> Value {
    match request {
        LinkRequest::Single(config) => json!(config),
        LinkRequest::Multi(entries) => {
            let configs: Vec<&LinkConfig> = entries.iter().map(|e| &e.config).collect();
            json!({ "connections": configs })
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectResponse {
    pub message: String,
    pub connections: Vec<String>,
    pub count: usize,
}

impl From<ConnectResponse> for LinkAck {
    fn from(r: ConnectResponse) -> Self {
        LinkAck {
            message: r.message,
            connections: r.connections,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FleetStatusResponse {
    pub fleet: BTreeMap<String, VehicleSummary>,
    pub count: usize,
    pub timestamp: Option<Value>,
}

impl FleetStatusResponse {
    /// Keys that are not vehicle ids are dropped with a warning.
    pub fn into_snapshot(self) -> FleetSnapshot {
        self.fleet
            .into_iter()
            .filter_map(|(key, summary)| match key.parse::<VehicleId>() {
                Ok(id) => Some((id, summary)),
                Err(_) => {
                    warn!(key = %key, "fleet entry with non-numeric id ignored");
                    None
                }
            })
            .collect()
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Value::deserialize(d)?.as_f64())
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(Value::deserialize(d)?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok()))
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Value::deserialize(d)?.as_bool())
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if s != "--" && !s.is_empty() => Some(s),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GpsSection {
    #[serde(deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub altitude: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub heading: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub satellites: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AttitudeSection {
    #[serde(deserialize_with = "lenient_f64")]
    pub roll: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub pitch: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub yaw: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub rollspeed: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub pitchspeed: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub yawspeed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VfrHudSection {
    #[serde(deserialize_with = "lenient_f64")]
    pub airspeed: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub groundspeed: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub heading: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub throttle: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub alt: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub climb: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatterySection {
    #[serde(deserialize_with = "lenient_f64")]
    pub voltage: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub current: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub remaining: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemSection {
    #[serde(deserialize_with = "lenient_f64")]
    pub load: Option<f64>,
    #[serde(deserialize_with = "lenient_u32")]
    pub onboard_control_sensors_present: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub onboard_control_sensors_enabled: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub onboard_control_sensors_health: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    #[serde(deserialize_with = "lenient_bool")]
    pub armed: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub mode: Option<String>,
}

/// Sectioned telemetry for one vehicle. Any section may be null or missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SensorsResponse {
    pub gps: Option<GpsSection>,
    pub attitude: Option<AttitudeSection>,
    pub vfr_hud: Option<VfrHudSection>,
    pub battery: Option<BatterySection>,
    pub system: Option<SystemSection>,
    pub status: Option<StatusSection>,
    #[serde(deserialize_with = "lenient_bool")]
    pub armed: Option<bool>,
    #[serde(deserialize_with = "lenient_string")]
    pub mode: Option<String>,
    pub timestamp: Option<Value>,
}

impl SensorsResponse {
    pub fn into_snapshot(self, received_at: Timestamp) -> TelemetrySnapshot {
        let vfr = self.vfr_hud.unwrap_or_default();
        let gps = self.gps.unwrap_or_default();
        let attitude = self.attitude.unwrap_or_default();
        let battery = self.battery.unwrap_or_default();
        let system = self.system.unwrap_or_default();
        let status = self.status.unwrap_or_default();

        let mut snapshot = TelemetrySnapshot::empty(received_at)
            .with_attitude(Attitude {
                roll: attitude.roll,
                pitch: attitude.pitch,
                yaw: attitude.yaw,
                roll_rate: attitude.rollspeed,
                pitch_rate: attitude.pitchspeed,
                yaw_rate: attitude.yawspeed,
            })
            .with_flight(FlightData {
                airspeed: vfr.airspeed,
                groundspeed: vfr.groundspeed.or(gps.speed),
                heading: vfr.heading.or(gps.heading),
                throttle: vfr.throttle,
                altitude: vfr.alt,
                climb: vfr.climb,
            })
            .with_power(Power {
                voltage: battery.voltage,
                current: battery.current,
                remaining_pct: battery.remaining,
            })
            .with_health(SystemHealth {
                load_pct: system.load,
                sensors_present: system.onboard_control_sensors_present,
                sensors_enabled: system.onboard_control_sensors_enabled,
                sensors_healthy: system.onboard_control_sensors_health,
            });
        snapshot.position = match (gps.latitude, gps.longitude) {
            (Some(lat_deg), Some(lon_deg)) => Some(Position {
                lat_deg,
                lon_deg,
                alt_m: gps.altitude,
            }),
            _ => None,
        };
        snapshot.armed = status.armed.or(self.armed);
        snapshot.mode = status.mode.or(self.mode);
        snapshot.source_timestamp = self.timestamp.and_then(|t| match t {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        snapshot
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MissionResponse {
    pub message: String,
    pub summary: MissionSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathWaypoint {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathStatistics {
    #[serde(default)]
    pub total_waypoints: usize,
    #[serde(default)]
    pub path_length_km: f64,
    #[serde(default)]
    pub coverage_ratio: f64,
    #[serde(default)]
    pub geofence_bounds: Option<GeoBounds>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathResponse {
    pub waypoints: Vec<PathWaypoint>,
    pub statistics: PathStatistics,
}

impl From<PathResponse> for CoveragePath {
    fn from(r: PathResponse) -> Self {
        CoveragePath {
            waypoints: r
                .waypoints
                .iter()
                .map(|w| GeoPoint::new(w.longitude, w.latitude, w.altitude))
                .collect(),
            stats: CoverageStats {
                total_waypoints: r.statistics.total_waypoints,
                path_length_km: r.statistics.path_length_km,
                coverage_ratio: r.statistics.coverage_ratio,
                bounds: r.statistics.geofence_bounds,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FleetStatusResponse, SensorsResponse, connect_body};
    use foundation::{Timestamp, VehicleId};
    use link::{LinkConfig, LinkRequest};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use telemetry::Section;

    #[test]
    fn connect_body_shapes() {
        let single: LinkRequest = LinkConfig::udp("127.0.0.1", 14550).into();
        assert_eq!(
            connect_body(&single),
            json!({"protocol": "UDP", "host": "127.0.0.1", "port": 14550})
        );
        let multi: LinkRequest = vec![
            LinkConfig::tcp("10.0.0.2", 5760),
            LinkConfig::serial("/dev/ttyUSB0", 57600),
        ]
        .into();
        assert_eq!(
            connect_body(&multi),
            json!({"connections": [
                {"protocol": "TCP", "host": "10.0.0.2", "port": 5760},
                {"protocol": "SERIAL", "port": "/dev/ttyUSB0", "baud": 57600}
            ]})
        );
    }

    #[test]
    fn placeholders_and_nulls_decode_as_absent() {
        let body = json!({
            "gps": {"latitude": 19.1, "longitude": 72.8, "altitude": "--", "heading": "--"},
            "attitude": {"roll": "--", "pitch": "--", "yaw": "--"},
            "vfr_hud": null,
            "battery": {"voltage": 12.4, "current": "--", "remaining": 0},
            "system": {"load": "--"},
            "status": {"armed": false, "mode": "--"},
            "timestamp": "2025-01-01T00:00:00"
        });
        let resp: SensorsResponse = serde_json::from_value(body).unwrap();
        let snap = resp.into_snapshot(Timestamp(5));

        let pos = snap.position.unwrap();
        assert_eq!((pos.lat_deg, pos.lon_deg, pos.alt_m), (19.1, 72.8, None));
        assert_eq!(snap.power.unwrap().remaining_pct, Some(0.0));
        assert_eq!(snap.armed, Some(false));
        assert_eq!(
            snap.missing_sections(),
            vec![
                Section::Attitude,
                Section::FlightData,
                Section::SystemHealth,
                Section::Mode
            ]
        );
        assert_eq!(snap.source_timestamp.as_deref(), Some("2025-01-01T00:00:00"));
    }

    #[test]
    fn fleet_keys_become_vehicle_ids() {
        let body = json!({
            "fleet": {
                "2": {"flight_mode": "AUTO", "latitude_deg": 1.0, "longitude_deg": 2.0},
                "1": {"armed": true, "extra_field": "ignored"},
                "gcs": {}
            },
            "count": 3,
            "timestamp": "now"
        });
        let resp: FleetStatusResponse = serde_json::from_value(body).unwrap();
        let fleet = resp.into_snapshot();
        assert_eq!(fleet.ids().collect::<Vec<_>>(), vec![VehicleId(1), VehicleId(2)]);
        assert_eq!(fleet.get(VehicleId(1)).unwrap().armed, Some(true));
    }
}
