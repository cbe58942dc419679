//! Optimistic moves applied to a local board ahead of server confirmation.

use chrono::{DateTime, Utc};

use crate::domain::lead::LeadId;
use crate::domain::stage::Stage;
use crate::pipeline::aggregator::PipelineAggregator;
use crate::pipeline::lane::Lane;
use crate::pipeline::projection::{PipelineData, PipelineItem};

/// Record of an optimistic move, sufficient to undo it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedMove {
    pub lead_id: LeadId,
    pub lane: Lane,
    pub from: Stage,
    pub to: Stage,
    pub moved_at: DateTime<Utc>,
    pub previous: PipelineItem,
}

impl PipelineData {
    /// Moves the item for `lead_id` into the `target` cell of its lane.
    ///
    /// Returns `None` when the lead is not on the board or already in `target`.
    pub fn apply_move(
        &mut self,
        aggregator: &PipelineAggregator,
        lead_id: &LeadId,
        target: Stage,
        at: DateTime<Utc>,
    ) -> Option<AppliedMove> {
        let (lane, from) = self.locate(lead_id)?;
        if from == target {
            return None;
        }

        let previous = self.take_item(lane, from, lead_id)?;
        let mut moved = previous.clone();
        moved.stage = target;
        moved.stage_entered_at = at;
        aggregator.refresh_item(&mut moved, at);
        self.insert_item(lane, moved);

        Some(AppliedMove {
            lead_id: lead_id.clone(),
            lane,
            from,
            to: target,
            moved_at: at,
            previous,
        })
    }

    /// Undoes `applied` if the board still shows the optimistic placement.
    ///
    /// A board replaced by an authoritative refresh in the meantime is left alone.
    pub fn revert_move(&mut self, applied: &AppliedMove) -> bool {
        let still_optimistic = self
            .lane(applied.lane)
            .and_then(|swimlane| swimlane.cell(applied.to))
            .and_then(|cell| cell.items.iter().find(|item| item.lead_id == applied.lead_id))
            .is_some_and(|item| item.stage_entered_at == applied.moved_at);
        if !still_optimistic {
            return false;
        }

        if self.take_item(applied.lane, applied.to, &applied.lead_id).is_none() {
            return false;
        }
        self.insert_item(applied.lane, applied.previous.clone());
        true
    }

    fn locate(&self, lead_id: &LeadId) -> Option<(Lane, Stage)> {
        self.find_item(lead_id).map(|item| (item.lane, item.stage))
    }

    fn take_item(&mut self, lane: Lane, stage: Stage, lead_id: &LeadId) -> Option<PipelineItem> {
        let swimlane = self.lane_mut(lane)?;
        let cell = swimlane.cell_mut(stage)?;
        let index = cell.items.iter().position(|item| &item.lead_id == lead_id)?;
        let item = cell.items.remove(index);
        swimlane.recompute_stats();
        self.recompute_totals();
        Some(item)
    }

    fn insert_item(&mut self, lane: Lane, item: PipelineItem) {
        if let Some(swimlane) = self.lane_mut(lane) {
            if let Some(cell) = swimlane.cell_mut(item.stage) {
                cell.items.push(item);
                cell.sort_items();
            }
            swimlane.recompute_stats();
        }
        self.recompute_totals();
    }
}
