use foundation::{GeoPoint, VehicleId, WaypointId};
use thiserror::Error;
use tracing::debug;

use crate::waypoint::{ActionMode, DEFAULT_WAYPOINT_ALT_M, TerminalAction, Waypoint, WaypointPatch};

pub const DEFAULT_CRUISE_SPEED_M_S: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("manual editing is disabled while a geofile mission is active")]
    ModeConflict,
    #[error("{0} manual waypoint(s) exist; clear them before importing a geofile")]
    WaypointsPresent(usize),
    #[error("coordinates must be finite")]
    NonFinite,
}

/// Which editing surface owns the mission.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Manual,
    Geofile,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MissionParams {
    pub cruise_speed_m_s: f64,
    pub terminal_action: TerminalAction,
    pub auto_start: bool,
}

impl Default for MissionParams {
    fn default() -> Self {
        Self {
            cruise_speed_m_s: DEFAULT_CRUISE_SPEED_M_S,
            terminal_action: TerminalAction::default(),
            auto_start: true,
        }
    }
}

/// Point-in-time copy of the mission, ready to turn into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    pub waypoints: Vec<Waypoint>,
    pub params: MissionParams,
    pub target_vehicle: Option<VehicleId>,
}

/// Authoritative in-memory mission.
///
/// Waypoints are addressed by id, never by position. Unknown ids are a
/// silent no-op: a waypoint removed by one panel may still be referenced by
/// another. Manual mutations are refused while a geofile owns the mission.
#[derive(Debug, Default)]
pub struct WaypointStore {
    waypoints: Vec<Waypoint>,
    mode: EditMode,
    params: MissionParams,
    revision: u64,
}

impl WaypointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: MissionParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Appends a waypoint with a fresh id.
    pub fn add(
        &mut self,
        lon_deg: f64,
        lat_deg: f64,
        alt_m: Option<f64>,
        mode: Option<ActionMode>,
    ) -> Result<Waypoint, StoreError> {
        self.ensure_manual()?;
        let wp = Waypoint::new(
            lon_deg,
            lat_deg,
            alt_m.unwrap_or(DEFAULT_WAYPOINT_ALT_M),
            mode.unwrap_or_default(),
        );
        if !wp.position().is_finite() {
            return Err(StoreError::NonFinite);
        }
        debug!(id = %wp.id, lon = lon_deg, lat = lat_deg, "waypoint added");
        self.waypoints.push(wp.clone());
        self.bump();
        Ok(wp)
    }

    /// Appends one waypoint per point, keeping each point's altitude.
    pub fn extend_from_path(
        &mut self,
        points: &[GeoPoint],
        mode: ActionMode,
    ) -> Result<Vec<WaypointId>, StoreError> {
        self.ensure_manual()?;
        if points.iter().any(|p| !p.is_finite()) {
            return Err(StoreError::NonFinite);
        }
        let added: Vec<Waypoint> = points
            .iter()
            .map(|p| Waypoint::new(p.lon_deg, p.lat_deg, p.alt_m, mode))
            .collect();
        let ids = added.iter().map(|w| w.id).collect();
        if !added.is_empty() {
            self.waypoints.extend(added);
            self.bump();
        }
        Ok(ids)
    }

    /// Merges `patch` into the waypoint with `id`. Returns whether it changed.
    pub fn update(&mut self, id: WaypointId, patch: WaypointPatch) -> Result<bool, StoreError> {
        self.ensure_manual()?;
        if !patch.is_finite() {
            return Err(StoreError::NonFinite);
        }
        let Some(wp) = self.waypoints.iter_mut().find(|w| w.id == id) else {
            return Ok(false);
        };
        let changed = patch.apply(wp);
        if changed {
            self.bump();
        }
        Ok(changed)
    }

    pub fn remove(&mut self, id: WaypointId) -> Result<bool, StoreError> {
        self.ensure_manual()?;
        let Some(index) = self.index_of(id) else {
            return Ok(false);
        };
        self.waypoints.remove(index);
        self.bump();
        debug!(%id, "waypoint removed");
        Ok(true)
    }

    /// Removes every waypoint in any mode. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.waypoints.len();
        if removed > 0 {
            self.waypoints.clear();
            self.bump();
        }
        removed
    }

    pub fn enter_geofile_mode(&mut self) -> Result<(), StoreError> {
        if self.mode == EditMode::Geofile {
            return Ok(());
        }
        if !self.waypoints.is_empty() {
            return Err(StoreError::WaypointsPresent(self.waypoints.len()));
        }
        self.mode = EditMode::Geofile;
        self.bump();
        Ok(())
    }

    pub fn exit_geofile_mode(&mut self) {
        if self.mode == EditMode::Geofile {
            self.mode = EditMode::Manual;
            self.bump();
        }
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn get(&self, id: WaypointId) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    pub fn index_of(&self, id: WaypointId) -> Option<usize> {
        self.waypoints.iter().position(|w| w.id == id)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn params(&self) -> MissionParams {
        self.params
    }

    pub fn set_cruise_speed(&mut self, speed_m_s: f64) {
        if speed_m_s.is_finite() && speed_m_s > 0.0 {
            self.params.cruise_speed_m_s = speed_m_s;
            self.bump();
        }
    }

    pub fn set_terminal_action(&mut self, action: TerminalAction) {
        self.params.terminal_action = action;
        self.bump();
    }

    pub fn set_auto_start(&mut self, auto_start: bool) {
        self.params.auto_start = auto_start;
        self.bump();
    }

    /// Bumped on every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn mission(&self, target_vehicle: Option<VehicleId>) -> Mission {
        Mission {
            waypoints: self.waypoints.clone(),
            params: self.params,
            target_vehicle,
        }
    }

    fn ensure_manual(&self) -> Result<(), StoreError> {
        match self.mode {
            EditMode::Manual => Ok(()),
            EditMode::Geofile => Err(StoreError::ModeConflict),
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{EditMode, StoreError, WaypointStore};
    use crate::waypoint::{ActionMode, WaypointPatch};
    use foundation::{GeoPoint, WaypointId};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn store_with(n: usize) -> (WaypointStore, Vec<WaypointId>) {
        let mut store = WaypointStore::new();
        let ids = (0..n)
            .map(|i| store.add(i as f64, i as f64, None, None).unwrap().id)
            .collect();
        (store, ids)
    }

    #[test]
    fn add_appends_with_defaults_and_unique_ids() {
        let (store, ids) = store_with(4);
        assert_eq!(store.len(), 4);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 4);
        let first = &store.waypoints()[0];
        assert_eq!(first.alt_m, 30.0);
        assert_eq!(first.mode, ActionMode::Waypoint);
        assert_eq!(store.waypoints()[3].lon_deg, 3.0);
    }

    #[test]
    fn update_resolves_by_id_after_reordering_removals() {
        let (mut store, ids) = store_with(3);
        store.remove(ids[0]).unwrap();
        // ids[2] now sits at index 1; the patch must still land on it.
        assert!(store.update(ids[2], WaypointPatch::moved_to(50.0, 60.0)).unwrap());
        let wp = store.get(ids[2]).unwrap();
        assert_eq!((wp.lon_deg, wp.lat_deg), (50.0, 60.0));
        assert_eq!(store.get(ids[1]).unwrap().lon_deg, 1.0);
    }

    #[test]
    fn unknown_id_is_a_noop() {
        let (mut store, ids) = store_with(2);
        store.remove(ids[1]).unwrap();
        let rev = store.revision();
        assert_eq!(store.remove(ids[1]), Ok(false));
        assert_eq!(store.update(ids[1], WaypointPatch::altitude(10.0)), Ok(false));
        assert_eq!(store.revision(), rev);
    }

    #[test]
    fn order_is_preserved_through_edits() {
        let (mut store, ids) = store_with(5);
        store.remove(ids[2]).unwrap();
        store
            .update(ids[4], WaypointPatch::mode(ActionMode::Land))
            .unwrap();
        let order: Vec<_> = store.waypoints().iter().map(|w| w.id).collect();
        assert_eq!(order, vec![ids[0], ids[1], ids[3], ids[4]]);
    }

    #[test]
    fn geofile_mode_blocks_manual_edits() {
        let mut store = WaypointStore::new();
        store.enter_geofile_mode().unwrap();
        assert_eq!(store.mode(), EditMode::Geofile);
        assert_eq!(store.add(1.0, 1.0, None, None), Err(StoreError::ModeConflict));
        store.exit_geofile_mode();
        assert!(store.add(1.0, 1.0, None, None).is_ok());
        assert_eq!(store.enter_geofile_mode(), Err(StoreError::WaypointsPresent(1)));
        assert_eq!(store.clear(), 1);
        assert!(store.enter_geofile_mode().is_ok());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let (mut store, ids) = store_with(1);
        assert_eq!(store.add(f64::NAN, 0.0, None, None), Err(StoreError::NonFinite));
        assert_eq!(
            store.update(ids[0], WaypointPatch::moved_to(f64::INFINITY, 0.0)),
            Err(StoreError::NonFinite)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn extend_from_path_keeps_altitudes() {
        let mut store = WaypointStore::new();
        let ids = store
            .extend_from_path(
                &[GeoPoint::new(1.0, 2.0, 40.0), GeoPoint::new(1.5, 2.5, 45.0)],
                ActionMode::Waypoint,
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.get(ids[1]).unwrap().alt_m, 45.0);
    }
}
