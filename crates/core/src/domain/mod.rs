pub mod lead;
pub mod quote;
pub mod stage;

pub use lead::{Lead, LeadBatch, LeadDecodeError, LeadId, LeadTags, QuarantinedLead, RawLeadRecord};
pub use quote::{QuoteExperience, QuoteId, QuoteSummary};
pub use stage::Stage;
