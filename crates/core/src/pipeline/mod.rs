pub mod aggregator;
pub mod commands;
pub mod lane;
pub mod overlay;
pub mod presentation;
pub mod projection;
pub mod sla;

pub use aggregator::PipelineAggregator;
pub use commands::{
    evaluate_move, ApiErrorBody, MoveDecision, MoveRequest, MutationState, StageChangeAck,
    StageChangeRequest,
};
pub use lane::{classify_lane, Lane};
pub use overlay::AppliedMove;
pub use presentation::{format_time_in_stage, next_action, LinkSettings};
pub use projection::{
    conversion_rate, LaneStats, NavigationLinks, PipelineData, PipelineItem, PipelineTotals,
    StageColumn, StageData, Swimlane,
};
pub use sla::{SlaPolicy, SlaStatus, SlaThreshold};
