pub mod config;
pub mod domain;
pub mod errors;
pub mod pipeline;

pub use domain::lead::{Lead, LeadBatch, LeadDecodeError, LeadId, LeadTags, QuarantinedLead};
pub use domain::quote::{QuoteExperience, QuoteId, QuoteSummary};
pub use domain::stage::Stage;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pipeline::{
    Lane, MoveRequest, MutationState, PipelineAggregator, PipelineData, PipelineItem, SlaPolicy,
    SlaStatus, StageChangeAck,
};
