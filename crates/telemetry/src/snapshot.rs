use std::collections::BTreeMap;
use std::fmt;

use foundation::{GeoPoint, Timestamp, VehicleId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: Option<f64>,
}

impl Position {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lon_deg, self.lat_deg, self.alt_m.unwrap_or(0.0))
    }
}

/// Attitude in radians; rates in rad/s.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub roll_rate: Option<f64>,
    pub pitch_rate: Option<f64>,
    pub yaw_rate: Option<f64>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    pub airspeed: Option<f64>,
    pub groundspeed: Option<f64>,
    pub heading: Option<f64>,
    pub throttle: Option<f64>,
    pub altitude: Option<f64>,
    pub climb: Option<f64>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Power {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub remaining_pct: Option<f64>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub load_pct: Option<f64>,
    pub sensors_present: Option<u32>,
    pub sensors_enabled: Option<u32>,
    pub sensors_healthy: Option<u32>,
}

trait SectionFields {
    fn any_present(&self) -> bool;
}

macro_rules! section_fields {
    ($ty:ty { $($field:ident),+ }) => {
        impl SectionFields for $ty {
            fn any_present(&self) -> bool {
                false $(|| self.$field.is_some())+
            }
        }
    };
}

section_fields!(Attitude { roll, pitch, yaw, roll_rate, pitch_rate, yaw_rate });
section_fields!(FlightData { airspeed, groundspeed, heading, throttle, altitude, climb });
section_fields!(Power { voltage, current, remaining_pct });
section_fields!(SystemHealth { load_pct, sensors_present, sensors_enabled, sensors_healthy });

/// Keeps a section only if at least one of its fields is known.
fn present<T: SectionFields>(section: T) -> Option<T> {
    section.any_present().then_some(section)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Position,
    Attitude,
    FlightData,
    Power,
    SystemHealth,
    Armed,
    Mode,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Section::Position => "position",
            Section::Attitude => "attitude",
            Section::FlightData => "flight-data",
            Section::Power => "power",
            Section::SystemHealth => "system-health",
            Section::Armed => "armed",
            Section::Mode => "mode",
        })
    }
}

/// Telemetry for one vehicle at one poll tick.
///
/// Every section is optional and absence is never collapsed to zero.
/// A snapshot replaces the previous one for its target wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub position: Option<Position>,
    pub attitude: Option<Attitude>,
    pub flight: Option<FlightData>,
    pub power: Option<Power>,
    pub health: Option<SystemHealth>,
    pub armed: Option<bool>,
    pub mode: Option<String>,
    /// When the client received it.
    pub received_at: Timestamp,
    /// Producer timestamp, verbatim.
    pub source_timestamp: Option<String>,
}

impl TelemetrySnapshot {
    pub fn empty(received_at: Timestamp) -> Self {
        Self {
            position: None,
            attitude: None,
            flight: None,
            power: None,
            health: None,
            armed: None,
            mode: None,
            received_at,
            source_timestamp: None,
        }
    }

    pub fn with_attitude(mut self, attitude: Attitude) -> Self {
        self.attitude = present(attitude);
        self
    }

    pub fn with_flight(mut self, flight: FlightData) -> Self {
        self.flight = present(flight);
        self
    }

    pub fn with_power(mut self, power: Power) -> Self {
        self.power = present(power);
        self
    }

    pub fn with_health(mut self, health: SystemHealth) -> Self {
        self.health = present(health);
        self
    }

    pub fn missing_sections(&self) -> Vec<Section> {
        let checks = [
            (Section::Position, self.position.is_some()),
            (Section::Attitude, self.attitude.is_some()),
            (Section::FlightData, self.flight.is_some()),
            (Section::Power, self.power.is_some()),
            (Section::SystemHealth, self.health.is_some()),
            (Section::Armed, self.armed.is_some()),
            (Section::Mode, self.mode.is_some()),
        ];
        checks
            .into_iter()
            .filter_map(|(section, ok)| (!ok).then_some(section))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }
}

/// Flat per-vehicle status, as the fleet endpoint reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSummary {
    pub connected: Option<bool>,
    pub last_heartbeat_s: Option<f64>,
    pub flight_mode: Option<String>,
    pub armed: Option<bool>,
    pub battery_remaining: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
    pub latitude_deg: Option<f64>,
    pub longitude_deg: Option<f64>,
    pub altitude_m: Option<f64>,
    pub groundspeed_m_s: Option<f64>,
    pub gps_satellites: Option<u32>,
    pub gps_heading: Option<f64>,
    pub gps_fix_type: Option<u32>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub vfr_heading: Option<f64>,
    pub vfr_airspeed: Option<f64>,
    pub vfr_throttle: Option<f64>,
    pub vfr_climb: Option<f64>,
}

impl VehicleSummary {
    pub fn position(&self) -> Option<Position> {
        Some(Position {
            lat_deg: self.latitude_deg?,
            lon_deg: self.longitude_deg?,
            alt_m: self.altitude_m,
        })
    }

    pub fn heading_deg(&self) -> Option<f64> {
        self.vfr_heading.or(self.gps_heading)
    }

    /// Snapshot view; only sections with known fields are populated.
    pub fn to_snapshot(&self, received_at: Timestamp) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::empty(received_at)
            .with_attitude(Attitude {
                roll: self.roll,
                pitch: self.pitch,
                yaw: self.yaw,
                ..Attitude::default()
            })
            .with_flight(FlightData {
                airspeed: self.vfr_airspeed,
                groundspeed: self.groundspeed_m_s,
                heading: self.heading_deg(),
                throttle: self.vfr_throttle,
                altitude: self.altitude_m,
                climb: self.vfr_climb,
            })
            .with_power(Power {
                voltage: self.battery_voltage,
                current: self.battery_current,
                remaining_pct: self.battery_remaining,
            });
        snapshot.position = self.position();
        snapshot.armed = self.armed;
        snapshot.mode = self.flight_mode.clone();
        snapshot
    }
}

/// Flat summary of one vehicle's telemetry, for drawing a single-link
/// vehicle the same way as a fleet member.
impl From<&TelemetrySnapshot> for VehicleSummary {
    fn from(snapshot: &TelemetrySnapshot) -> Self {
        let position = snapshot.position.as_ref();
        let attitude = snapshot.attitude.as_ref();
        let flight = snapshot.flight.as_ref();
        let power = snapshot.power.as_ref();
        Self {
            flight_mode: snapshot.mode.clone(),
            armed: snapshot.armed,
            latitude_deg: position.map(|p| p.lat_deg),
            longitude_deg: position.map(|p| p.lon_deg),
            altitude_m: position.and_then(|p| p.alt_m),
            battery_remaining: power.and_then(|p| p.remaining_pct),
            battery_voltage: power.and_then(|p| p.voltage),
            battery_current: power.and_then(|p| p.current),
            groundspeed_m_s: flight.and_then(|f| f.groundspeed),
            vfr_heading: flight.and_then(|f| f.heading),
            vfr_airspeed: flight.and_then(|f| f.airspeed),
            vfr_throttle: flight.and_then(|f| f.throttle),
            vfr_climb: flight.and_then(|f| f.climb),
            roll: attitude.and_then(|a| a.roll),
            pitch: attitude.and_then(|a| a.pitch),
            yaw: attitude.and_then(|a| a.yaw),
            ..Self::default()
        }
    }
}

/// Whole-fleet poll result, keyed by vehicle id. Iterates in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetSnapshot {
    vehicles: BTreeMap<VehicleId, VehicleSummary>,
}

impl FleetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: VehicleId, summary: VehicleSummary) -> Option<VehicleSummary> {
        self.vehicles.insert(id, summary)
    }

    pub fn get(&self, id: VehicleId) -> Option<&VehicleSummary> {
        self.vehicles.get(&id)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.vehicles.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.keys().copied()
    }

    pub fn smallest_id(&self) -> Option<VehicleId> {
        self.vehicles.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VehicleId, &VehicleSummary)> {
        self.vehicles.iter().map(|(id, s)| (*id, s))
    }
}

impl FromIterator<(VehicleId, VehicleSummary)> for FleetSnapshot {
    fn from_iter<I: IntoIterator<Item = (VehicleId, VehicleSummary)>>(iter: I) -> Self {
        Self {
            vehicles: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FleetSnapshot, Section, TelemetrySnapshot, VehicleSummary};
    use foundation::{Timestamp, VehicleId};
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_without_gps_has_no_position_section() {
        let summary = VehicleSummary {
            flight_mode: Some("GUIDED".to_string()),
            armed: Some(false),
            battery_remaining: Some(0.0),
            ..VehicleSummary::default()
        };
        let snap = summary.to_snapshot(Timestamp(1));
        assert!(snap.position.is_none());
        assert!(snap.attitude.is_none());
        // A known zero stays a zero.
        assert_eq!(snap.power.and_then(|p| p.remaining_pct), Some(0.0));
        assert_eq!(
            snap.missing_sections(),
            vec![
                Section::Position,
                Section::Attitude,
                Section::FlightData,
                Section::SystemHealth
            ]
        );
    }

    #[test]
    fn partial_position_is_absent() {
        let summary = VehicleSummary {
            latitude_deg: Some(10.0),
            ..VehicleSummary::default()
        };
        assert!(summary.position().is_none());
    }

    #[test]
    fn empty_snapshot_reports_everything_missing() {
        let snap = TelemetrySnapshot::empty(Timestamp(0));
        assert_eq!(snap.missing_sections().len(), 7);
        assert!(!snap.is_complete());
    }

    #[test]
    fn fleet_iterates_in_id_order() {
        let fleet: FleetSnapshot = [3u8, 1, 2]
            .into_iter()
            .map(|id| (VehicleId(id), VehicleSummary::default()))
            .collect();
        assert_eq!(fleet.smallest_id(), Some(VehicleId(1)));
        let ids: Vec<_> = fleet.ids().collect();
        assert_eq!(ids, vec![VehicleId(1), VehicleId(2), VehicleId(3)]);
    }

    #[test]
    fn summary_from_snapshot_keeps_position_and_mode() {
        let original = VehicleSummary {
            flight_mode: Some("AUTO".to_string()),
            latitude_deg: Some(19.0),
            longitude_deg: Some(72.01),
            altitude_m: Some(40.0),
            battery_remaining: Some(0.0),
            ..VehicleSummary::default()
        };
        let summary = VehicleSummary::from(&original.to_snapshot(Timestamp(5)));
        assert_eq!(summary.position(), original.position());
        assert_eq!(summary.flight_mode.as_deref(), Some("AUTO"));
        assert_eq!(summary.battery_remaining, Some(0.0));
        assert_eq!(summary.connected, None);
    }
}
