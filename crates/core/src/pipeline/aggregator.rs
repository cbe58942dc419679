use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::lead::{Lead, LeadBatch};
use crate::pipeline::lane::classify_lane;
use crate::pipeline::presentation::{format_time_in_stage, next_action, LinkSettings};
use crate::pipeline::projection::{PipelineData, PipelineItem};
use crate::pipeline::sla::{SlaPolicy, SlaStatus};

/// Builds the lane × stage grid from the authoritative lead set.
///
/// Aggregation is pure: identical `(leads, now)` input yields identical output,
/// and nothing in here can fail. Records that could not be validated are carried
/// through as quarantined entries instead of aborting the board.
#[derive(Clone, Debug, Default)]
pub struct PipelineAggregator {
    sla: SlaPolicy,
    links: LinkSettings,
}

impl PipelineAggregator {
    pub fn new(sla: SlaPolicy, links: LinkSettings) -> Self {
        Self { sla, links }
    }

    pub fn sla_policy(&self) -> &SlaPolicy {
        &self.sla
    }

    pub fn project(&self, lead: &Lead, now: DateTime<Utc>) -> PipelineItem {
        let quote_id = lead.quote.as_ref().map(|quote| quote.id.clone());
        let mut item = PipelineItem {
            lead_id: lead.id.clone(),
            name: lead.name.clone(),
            phone: lead.phone.clone(),
            job_description: lead.job_description.clone(),
            tags: lead.tags.clone(),
            quote_total: lead.quote.as_ref().and_then(|quote| quote.total),
            links: self.links.links_for(&lead.phone, quote_id.as_ref()),
            quote_id,
            created_at: lead.created_at,
            stage: lead.stage,
            stage_label: lead.stage.label().to_string(),
            stage_entered_at: lead.stage_entered_at,
            lane: classify_lane(lead.quote.as_ref()),
            sla: SlaStatus::Ok,
            time_in_stage: String::new(),
            next_action: String::new(),
        };
        self.refresh_item(&mut item, now);
        item
    }

    /// Recomputes the time-derived fields of an item against `now`.
    pub fn refresh_item(&self, item: &mut PipelineItem, now: DateTime<Utc>) {
        let elapsed = now - item.stage_entered_at;
        item.stage_label = item.stage.label().to_string();
        item.sla = self.sla.classify(item.stage, elapsed);
        item.time_in_stage = format_time_in_stage(elapsed);
        item.next_action = next_action(item.stage, item.sla);
    }

    pub fn aggregate(&self, leads: &[Lead], now: DateTime<Utc>) -> PipelineData {
        let mut data = PipelineData::empty(now);

        for lead in leads {
            let item = self.project(lead, now);
            // Lanes and cells are laid out in canonical order by `PipelineData::empty`.
            data.lanes[item.lane.position()].stages[item.stage.position()].items.push(item);
        }

        for swimlane in &mut data.lanes {
            for cell in &mut swimlane.stages {
                cell.sort_items();
            }
            swimlane.recompute_stats();
        }
        data.recompute_totals();

        debug!(
            event_name = "pipeline.aggregate.completed",
            lead_count = leads.len(),
            active = data.totals.active,
            overdue = data.totals.overdue,
            "pipeline aggregated"
        );
        data
    }

    pub fn aggregate_batch(&self, batch: &LeadBatch, now: DateTime<Utc>) -> PipelineData {
        let mut data = self.aggregate(&batch.leads, now);
        for record in &batch.quarantined {
            warn!(
                event_name = "pipeline.aggregate.quarantined",
                lead_id = record.lead_id.as_deref().unwrap_or("unknown"),
                reason = %record.reason,
                "lead record kept off the board"
            );
        }
        data.quarantined = batch.quarantined.clone();
        data
    }
}
