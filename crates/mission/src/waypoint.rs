use std::fmt;
use std::str::FromStr;

use foundation::{GeoPoint, WaypointId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WAYPOINT_ALT_M: f64 = 30.0;

/// What the vehicle does on reaching a waypoint.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionMode {
    Hold,
    #[default]
    Waypoint,
    Loiter,
    Takeoff,
    Land,
}

impl ActionMode {
    pub const ALL: [ActionMode; 5] = [
        ActionMode::Hold,
        ActionMode::Waypoint,
        ActionMode::Loiter,
        ActionMode::Takeoff,
        ActionMode::Land,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Hold => "HOLD",
            ActionMode::Waypoint => "WAYPOINT",
            ActionMode::Loiter => "LOITER",
            ActionMode::Takeoff => "TAKEOFF",
            ActionMode::Land => "LAND",
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        ActionMode::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| format!("unknown action mode '{s}'"))
    }
}

/// What the vehicle does after the last waypoint.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerminalAction {
    #[default]
    Rtl,
    Land,
    None,
}

impl TerminalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalAction::Rtl => "RTL",
            TerminalAction::Land => "LAND",
            TerminalAction::None => "NONE",
        }
    }
}

impl fmt::Display for TerminalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RTL" => Ok(TerminalAction::Rtl),
            "LAND" => Ok(TerminalAction::Land),
            "NONE" => Ok(TerminalAction::None),
            _ => Err(format!("unknown terminal action '{s}'")),
        }
    }
}

/// One mission stop. Its position in the owning list is the flight order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: WaypointId,
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub alt_m: f64,
    pub mode: ActionMode,
}

impl Waypoint {
    pub fn new(lon_deg: f64, lat_deg: f64, alt_m: f64, mode: ActionMode) -> Self {
        Self {
            id: WaypointId::generate(),
            lon_deg,
            lat_deg,
            alt_m,
            mode,
        }
    }

    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lon_deg, self.lat_deg, self.alt_m)
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct WaypointPatch {
    pub lon_deg: Option<f64>,
    pub lat_deg: Option<f64>,
    pub alt_m: Option<f64>,
    pub mode: Option<ActionMode>,
}

impl WaypointPatch {
    pub fn moved_to(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon_deg: Some(lon_deg),
            lat_deg: Some(lat_deg),
            ..Self::default()
        }
    }

    pub fn altitude(alt_m: f64) -> Self {
        Self {
            alt_m: Some(alt_m),
            ..Self::default()
        }
    }

    pub fn mode(mode: ActionMode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.lon_deg, self.lat_deg, self.alt_m]
            .into_iter()
            .flatten()
            .all(f64::is_finite)
    }

    /// Returns whether anything changed.
    pub fn apply(&self, wp: &mut Waypoint) -> bool {
        let before = wp.clone();
        if let Some(v) = self.lon_deg {
            wp.lon_deg = v;
        }
        if let Some(v) = self.lat_deg {
            wp.lat_deg = v;
        }
        if let Some(v) = self.alt_m {
            wp.alt_m = v;
        }
        if let Some(m) = self.mode {
            wp.mode = m;
        }
        *wp != before
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionMode, TerminalAction, Waypoint, WaypointPatch};

    #[test]
    fn modes_serialize_upper_case() {
        let json = serde_json::to_string(&ActionMode::Takeoff).unwrap();
        assert_eq!(json, "\"TAKEOFF\"");
        assert_eq!("loiter".parse::<ActionMode>(), Ok(ActionMode::Loiter));
        assert!("circle".parse::<ActionMode>().is_err());
        assert_eq!(serde_json::to_string(&TerminalAction::Rtl).unwrap(), "\"RTL\"");
        assert_eq!("none".parse::<TerminalAction>(), Ok(TerminalAction::None));
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut wp = Waypoint::new(10.0, 20.0, 30.0, ActionMode::Waypoint);
        let id = wp.id;
        assert!(WaypointPatch::altitude(55.0).apply(&mut wp));
        assert_eq!((wp.lon_deg, wp.lat_deg, wp.alt_m), (10.0, 20.0, 55.0));
        assert!(!WaypointPatch::altitude(55.0).apply(&mut wp));
        assert_eq!(wp.id, id);
    }
}
