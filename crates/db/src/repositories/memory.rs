use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadboard_core::domain::lead::{Lead, LeadBatch, LeadId, RawLeadRecord};
use leadboard_core::domain::stage::Stage;

use super::{
    expired_terminal_row, retain_board_leads, storage_cutoff, LeadRepository, RepositoryError,
    StageWrite,
};

/// Keeps raw records so that malformed input can be exercised the same way as in SQLite.
#[derive(Default)]
pub struct InMemoryLeadRepository {
    records: RwLock<BTreeMap<String, RawLeadRecord>>,
}

impl InMemoryLeadRepository {
    pub fn with_leads(leads: impl IntoIterator<Item = Lead>) -> Self {
        let records =
            leads.into_iter().map(|lead| (lead.id.0.clone(), RawLeadRecord::from(&lead))).collect();
        Self { records: RwLock::new(records) }
    }

    /// Stores a record without validation.
    pub async fn insert_raw(&self, key: impl Into<String>, record: RawLeadRecord) {
        self.records.write().await.insert(key.into(), record);
    }
}

#[async_trait::async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn list_board_leads(
        &self,
        terminal_cutoff: DateTime<Utc>,
    ) -> Result<LeadBatch, RepositoryError> {
        let bound = storage_cutoff(terminal_cutoff);
        let records = self.records.read().await;
        let visible = records.values().filter(|record| {
            !expired_terminal_row(
                record.stage.as_deref(),
                record.stage_entered_at.as_deref(),
                &bound,
            )
        });
        let batch = LeadBatch::from_raw(visible.cloned());
        Ok(retain_board_leads(batch, terminal_cutoff))
    }

    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let records = self.records.read().await;
        records
            .get(&id.0)
            .cloned()
            .map(|record| {
                Lead::try_from(record)
                    .map_err(|error| RepositoryError::Decode(format!("lead `{id}`: {error}")))
            })
            .transpose()
    }

    async fn update_stage(
        &self,
        id: &LeadId,
        stage: Stage,
        at: DateTime<Utc>,
        expected: Option<Stage>,
    ) -> Result<StageWrite, RepositoryError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id.0) else {
            return Ok(StageWrite::Missing);
        };
        if let Some(expected) = expected {
            if record.stage.as_deref() != Some(expected.as_str()) {
                return Ok(StageWrite::Conflict);
            }
        }
        record.stage = Some(stage.as_str().to_string());
        record.stage_entered_at = Some(at.to_rfc3339());
        Ok(StageWrite::Applied)
    }

    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&lead.id.0) {
            return Err(RepositoryError::Duplicate(lead.id.0));
        }
        records.insert(lead.id.0.clone(), RawLeadRecord::from(&lead));
        Ok(())
    }
}
