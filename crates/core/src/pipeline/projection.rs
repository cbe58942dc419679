//! Read projections rendered by the board: items, cells, swimlanes and the full grid.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::lead::{LeadId, LeadTags, QuarantinedLead};
use crate::domain::quote::QuoteId;
use crate::domain::stage::Stage;
use crate::pipeline::lane::Lane;
use crate::pipeline::sla::SlaStatus;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationLinks {
    pub call: Option<String>,
    pub message: Option<String>,
    pub quote: Option<String>,
}

/// A lead as displayed on the board, and the unit a move command targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineItem {
    pub lead_id: LeadId,
    pub name: String,
    pub phone: String,
    pub job_description: String,
    pub tags: LeadTags,
    pub quote_id: Option<QuoteId>,
    pub quote_total: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub stage_label: String,
    pub stage_entered_at: DateTime<Utc>,
    pub lane: Lane,
    pub sla: SlaStatus,
    pub time_in_stage: String,
    pub next_action: String,
    pub links: NavigationLinks,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageData {
    pub stage: Stage,
    pub count: usize,
    pub items: Vec<PipelineItem>,
}

impl StageData {
    pub fn empty(stage: Stage) -> Self {
        Self { stage, count: 0, items: Vec::new() }
    }

    /// Most recently moved first; lead id breaks ties so output is stable.
    pub fn sort_items(&mut self) {
        self.items.sort_by(|left, right| {
            right
                .stage_entered_at
                .cmp(&left.stage_entered_at)
                .then_with(|| left.lead_id.cmp(&right.lead_id))
        });
        self.count = self.items.len();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub lost: usize,
    pub conversion_rate: f64,
    pub open_value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swimlane {
    pub lane: Lane,
    pub label: String,
    pub stages: Vec<StageData>,
    pub stats: LaneStats,
}

impl Swimlane {
    pub fn empty(lane: Lane) -> Self {
        Self {
            lane,
            label: lane.label().to_string(),
            stages: Stage::ordered().iter().copied().map(StageData::empty).collect(),
            stats: LaneStats::default(),
        }
    }

    pub fn cell(&self, stage: Stage) -> Option<&StageData> {
        self.stages.iter().find(|cell| cell.stage == stage)
    }

    pub fn cell_mut(&mut self, stage: Stage) -> Option<&mut StageData> {
        self.stages.iter_mut().find(|cell| cell.stage == stage)
    }

    pub fn items(&self) -> impl Iterator<Item = &PipelineItem> {
        self.stages.iter().flat_map(|cell| cell.items.iter())
    }

    pub fn recompute_stats(&mut self) {
        let mut stats = LaneStats::default();
        for cell in &mut self.stages {
            cell.count = cell.items.len();
            stats.total += cell.count;
            if cell.stage.is_active() {
                stats.active += cell.count;
                stats.open_value +=
                    cell.items.iter().filter_map(|item| item.quote_total).sum::<Decimal>();
            }
            match cell.stage {
                Stage::Completed => stats.completed += cell.count,
                Stage::Lost => stats.lost += cell.count,
                _ => {}
            }
        }
        stats.conversion_rate = conversion_rate(stats.completed, stats.total);
        self.stats = stats;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTotals {
    pub active: usize,
    pub completed: usize,
    pub lost: usize,
    pub total: usize,
    pub warning: usize,
    pub overdue: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageColumn {
    pub stage: Stage,
    pub label: String,
    pub terminal: bool,
}

impl From<Stage> for StageColumn {
    fn from(stage: Stage) -> Self {
        Self { stage, label: stage.label().to_string(), terminal: stage.is_terminal() }
    }
}

/// The full lane × stage grid plus rollups, rebuilt from the authoritative lead set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineData {
    pub lanes: Vec<Swimlane>,
    pub totals: PipelineTotals,
    pub stages: Vec<StageColumn>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub quarantined: Vec<QuarantinedLead>,
}

impl PipelineData {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            lanes: Lane::ALL.into_iter().map(Swimlane::empty).collect(),
            totals: PipelineTotals::default(),
            stages: Stage::ordered().iter().copied().map(StageColumn::from).collect(),
            generated_at,
            quarantined: Vec::new(),
        }
    }

    pub fn lane(&self, lane: Lane) -> Option<&Swimlane> {
        self.lanes.iter().find(|swimlane| swimlane.lane == lane)
    }

    pub fn lane_mut(&mut self, lane: Lane) -> Option<&mut Swimlane> {
        self.lanes.iter_mut().find(|swimlane| swimlane.lane == lane)
    }

    pub fn items(&self) -> impl Iterator<Item = &PipelineItem> {
        self.lanes.iter().flat_map(Swimlane::items)
    }

    pub fn find_item(&self, lead_id: &LeadId) -> Option<&PipelineItem> {
        self.items().find(|item| &item.lead_id == lead_id)
    }

    pub fn stage_of(&self, lead_id: &LeadId) -> Option<Stage> {
        self.find_item(lead_id).map(|item| item.stage)
    }

    /// Count of the `(lane, stage)` cell, zero when the cell does not exist.
    pub fn cell_count(&self, lane: Lane, stage: Stage) -> usize {
        self.lane(lane).and_then(|swimlane| swimlane.cell(stage)).map_or(0, |cell| cell.count)
    }

    pub fn recompute_totals(&mut self) {
        let mut totals = PipelineTotals::default();
        for swimlane in &self.lanes {
            totals.active += swimlane.stats.active;
            totals.completed += swimlane.stats.completed;
            totals.lost += swimlane.stats.lost;
            totals.total += swimlane.stats.total;
            for item in swimlane.items().filter(|item| item.stage.is_active()) {
                match item.sla {
                    SlaStatus::Warning => totals.warning += 1,
                    SlaStatus::Overdue => totals.overdue += 1,
                    SlaStatus::Ok => {}
                }
            }
        }
        self.totals = totals;
    }
}

/// `completed / total`, defined as zero for an empty lane.
pub fn conversion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64).clamp(0.0, 1.0)
}
