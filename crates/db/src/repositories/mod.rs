use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use leadboard_core::domain::lead::{Lead, LeadBatch, LeadId};
use leadboard_core::domain::stage::Stage;

pub mod lead;
pub mod memory;

pub use lead::SqlLeadRepository;
pub use memory::InMemoryLeadRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("lead `{0}` already exists")]
    Duplicate(String),
}

/// Outcome of [`LeadRepository::update_stage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageWrite {
    Applied,
    Missing,
    /// The stored stage no longer matched the expected one; nothing was written.
    Conflict,
}

/// Authoritative store of leads and their pipeline stage.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Every lead the board should show.
    ///
    /// Terminal leads that entered their stage before `terminal_cutoff` are left
    /// out. Rows that fail validation come back in [`LeadBatch::quarantined`].
    async fn list_board_leads(
        &self,
        terminal_cutoff: DateTime<Utc>,
    ) -> Result<LeadBatch, RepositoryError>;

    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;

    /// With `expected` set, the write only lands while the stored stage still equals it.
    /// Without it, last write wins.
    async fn update_stage(
        &self,
        id: &LeadId,
        stage: Stage,
        at: DateTime<Utc>,
        expected: Option<Stage>,
    ) -> Result<StageWrite, RepositoryError>;

    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError>;
}

/// Stored timestamps may carry any UTC offset and are compared as text, so the
/// storage-level cut is a day wider than the exact one applied by [`retain_board_leads`].
const RETENTION_SLACK_DAYS: i64 = 1;

/// RFC 3339 bound below which terminal rows are not read at all.
pub(crate) fn storage_cutoff(terminal_cutoff: DateTime<Utc>) -> String {
    terminal_cutoff
        .checked_sub_signed(Duration::days(RETENTION_SLACK_DAYS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .to_rfc3339()
}

/// Row-level twin of the SQL filter in `SqlLeadRepository::list_board_leads`.
pub(crate) fn expired_terminal_row(
    stage: Option<&str>,
    stage_entered_at: Option<&str>,
    storage_cutoff: &str,
) -> bool {
    let terminal = stage.is_some_and(|stage| {
        Stage::TERMINAL.iter().any(|terminal| terminal.as_str() == stage)
    });
    match stage_entered_at {
        Some(entered) if terminal && !entered.trim().is_empty() => entered < storage_cutoff,
        _ => false,
    }
}

pub(crate) fn retain_board_leads(
    mut batch: LeadBatch,
    terminal_cutoff: DateTime<Utc>,
) -> LeadBatch {
    batch
        .leads
        .retain(|lead| !lead.stage.is_terminal() || lead.stage_entered_at >= terminal_cutoff);
    batch
}
