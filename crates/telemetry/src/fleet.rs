use foundation::VehicleId;
use tracing::debug;

use crate::snapshot::{FleetSnapshot, VehicleSummary};

/// How the selection moved as a result of an aggregator call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Selected(VehicleId),
    Cleared { previous: VehicleId },
}

impl SelectionChange {
    pub fn selected(&self) -> Option<VehicleId> {
        match self {
            SelectionChange::Selected(id) => Some(*id),
            SelectionChange::Cleared { .. } => None,
        }
    }
}

/// Latest fleet view plus the operator's vehicle selection.
///
/// Each applied snapshot replaces the previous one wholesale. The selection
/// always names a vehicle in the current snapshot or nothing. On the first
/// non-empty snapshot after creation or [`reset`](Self::reset) the smallest id
/// is selected; after that, a selection that disappears stays cleared until the
/// caller selects again.
#[derive(Debug, Default)]
pub struct FleetAggregator {
    snapshot: FleetSnapshot,
    selected: Option<VehicleId>,
    auto_select: bool,
}

impl FleetAggregator {
    pub fn new() -> Self {
        Self {
            auto_select: true,
            ..Self::default()
        }
    }

    /// Replaces the fleet view. Callers publish the returned change after
    /// releasing their own locks.
    pub fn apply(&mut self, snapshot: FleetSnapshot) -> Option<SelectionChange> {
        self.snapshot = snapshot;

        if let Some(previous) = self.selected
            && !self.snapshot.contains(previous)
        {
            debug!(vehicle = %previous, "selected vehicle left the fleet");
            self.selected = None;
            return Some(SelectionChange::Cleared { previous });
        }

        if self.selected.is_none()
            && self.auto_select
            && let Some(first) = self.snapshot.smallest_id()
        {
            self.selected = Some(first);
            self.auto_select = false;
            return Some(SelectionChange::Selected(first));
        }
        None
    }

    /// Selects `id` if it is in the current snapshot.
    pub fn select(&mut self, id: VehicleId) -> Option<SelectionChange> {
        if !self.snapshot.contains(id) || self.selected == Some(id) {
            return None;
        }
        self.selected = Some(id);
        self.auto_select = false;
        Some(SelectionChange::Selected(id))
    }

    pub fn clear_selection(&mut self) -> Option<SelectionChange> {
        let previous = self.selected.take()?;
        Some(SelectionChange::Cleared { previous })
    }

    /// Back to the just-created state; used on link teardown.
    pub fn reset(&mut self) -> Option<SelectionChange> {
        self.snapshot = FleetSnapshot::new();
        self.auto_select = true;
        self.clear_selection()
    }

    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }

    pub fn selected(&self) -> Option<VehicleId> {
        self.selected
    }

    pub fn selected_summary(&self) -> Option<(VehicleId, &VehicleSummary)> {
        let id = self.selected?;
        self.snapshot.get(id).map(|s| (id, s))
    }
}

#[cfg(test)]
mod tests {
    use super::{FleetAggregator, SelectionChange};
    use crate::snapshot::{FleetSnapshot, VehicleSummary};
    use foundation::VehicleId;
    use pretty_assertions::assert_eq;

    fn fleet(ids: &[u8]) -> FleetSnapshot {
        ids.iter()
            .map(|id| (VehicleId(*id), VehicleSummary::default()))
            .collect()
    }

    fn assert_selection_valid(agg: &FleetAggregator) {
        if let Some(id) = agg.selected() {
            assert!(agg.snapshot().contains(id), "selection {id} not in snapshot");
        }
    }

    #[test]
    fn first_snapshot_selects_smallest_id() {
        let mut agg = FleetAggregator::new();
        assert_eq!(agg.apply(FleetSnapshot::new()), None);
        assert_eq!(
            agg.apply(fleet(&[3, 1, 2])),
            Some(SelectionChange::Selected(VehicleId(1)))
        );
        assert_eq!(agg.apply(fleet(&[1, 2, 3])), None);
        assert_eq!(agg.selected(), Some(VehicleId(1)));
    }

    #[test]
    fn vanished_selection_is_cleared_and_not_restored() {
        let mut agg = FleetAggregator::new();
        agg.apply(fleet(&[1, 2]));
        agg.select(VehicleId(2));

        assert_eq!(
            agg.apply(fleet(&[1])),
            Some(SelectionChange::Cleared {
                previous: VehicleId(2)
            })
        );
        assert_eq!(agg.selected(), None);

        // Reappearing does not bring the selection back.
        assert_eq!(agg.apply(fleet(&[1, 2])), None);
        assert_eq!(agg.selected(), None);
    }

    #[test]
    fn select_rejects_unknown_vehicle() {
        let mut agg = FleetAggregator::new();
        agg.apply(fleet(&[4]));
        assert_eq!(agg.select(VehicleId(9)), None);
        assert_eq!(agg.selected(), Some(VehicleId(4)));
        assert_eq!(agg.select(VehicleId(4)), None);
    }

    #[test]
    fn reset_clears_everything_and_rearms_default() {
        let mut agg = FleetAggregator::new();
        agg.apply(fleet(&[5, 6, 7]));
        assert_eq!(
            agg.reset(),
            Some(SelectionChange::Cleared {
                previous: VehicleId(5)
            })
        );
        assert!(agg.snapshot().is_empty());
        assert_eq!(agg.selected(), None);

        assert_eq!(
            agg.apply(fleet(&[7, 6])),
            Some(SelectionChange::Selected(VehicleId(6)))
        );
    }

    #[test]
    fn selection_always_names_a_current_vehicle() {
        let sequences: [&[u8]; 6] = [&[2, 4], &[4], &[], &[1, 4], &[9], &[1, 2, 3]];
        let mut agg = FleetAggregator::new();
        for (step, ids) in sequences.iter().enumerate() {
            agg.apply(fleet(ids));
            assert_selection_valid(&agg);
            if step == 3 {
                agg.select(VehicleId(1));
                assert_selection_valid(&agg);
            }
        }
    }
}
