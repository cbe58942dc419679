use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use leadboard_core::domain::lead::{Lead, LeadBatch, LeadId, RawLeadRecord};
use leadboard_core::domain::quote::QuoteSummary;
use leadboard_core::domain::stage::Stage;

use super::{retain_board_leads, storage_cutoff, LeadRepository, RepositoryError, StageWrite};
use crate::DbPool;

const LEAD_COLUMNS: &str = "SELECT
        lead.id,
        lead.name,
        lead.phone,
        lead.job_description,
        lead.source,
        lead.segment,
        lead.quote_id,
        quote.experience_type,
        quote.total,
        lead.created_at,
        lead.stage,
        lead.stage_entered_at
     FROM lead
     LEFT JOIN quote ON quote.id = lead.quote_id";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn upsert_quote(
        &self,
        quote: &QuoteSummary,
        created_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO quote (id, experience_type, total, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                experience_type = excluded.experience_type,
                total = excluded.total",
        )
        .bind(&quote.id.0)
        .bind(quote.experience.as_str())
        .bind(quote.total.map(|total| total.to_string()))
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn list_board_leads(
        &self,
        terminal_cutoff: DateTime<Utc>,
    ) -> Result<LeadBatch, RepositoryError> {
        let terminal_names = Stage::TERMINAL
            .iter()
            .map(|stage| format!("'{}'", stage.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        // Unknown stage strings pass the filter so that they are quarantined, not hidden.
        let sql = format!(
            "{LEAD_COLUMNS}
             WHERE lead.stage NOT IN ({terminal_names})
                OR lead.stage_entered_at IS NULL
                OR trim(lead.stage_entered_at) = ''
                OR lead.stage_entered_at >= ?
             ORDER BY lead.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(storage_cutoff(terminal_cutoff))
            .fetch_all(&self.pool)
            .await?;

        let records = rows.iter().map(record_from_row).collect::<Result<Vec<_>, _>>()?;
        let batch = retain_board_leads(LeadBatch::from_raw(records), terminal_cutoff);
        debug!(
            event_name = "db.lead.list_board",
            lead_count = batch.leads.len(),
            quarantined = batch.quarantined.len(),
            "loaded board leads"
        );
        Ok(batch)
    }

    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("{LEAD_COLUMNS} WHERE lead.id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let record = record_from_row(&row)?;
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
        let expected = expected.map(Stage::as_str);
        let result = sqlx::query(
            "UPDATE lead SET stage = ?, stage_entered_at = ?, updated_at = ?
             WHERE id = ? AND (? IS NULL OR stage = ?)",
        )
        .bind(stage.as_str())
        .bind(at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .bind(expected)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(StageWrite::Applied);
        }
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM lead WHERE id = ?)")
            .bind(&id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists { StageWrite::Conflict } else { StageWrite::Missing })
    }

    async fn insert(&self, lead: Lead) -> Result<(), RepositoryError> {
        if let Some(quote) = &lead.quote {
            self.upsert_quote(quote, lead.created_at).await?;
        }

        let result = sqlx::query(
            "INSERT INTO lead (
                id,
                name,
                phone,
                job_description,
                source,
                segment,
                quote_id,
                stage,
                stage_entered_at,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&lead.id.0)
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.job_description)
        .bind(lead.tags.source.as_deref())
        .bind(lead.tags.segment.as_deref())
        .bind(lead.quote.as_ref().map(|quote| quote.id.0.as_str()))
        .bind(lead.stage.as_str())
        .bind(lead.stage_entered_at.to_rfc3339())
        .bind(lead.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate(lead.id.0));
        }
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<RawLeadRecord, RepositoryError> {
    Ok(RawLeadRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        job_description: row.try_get("job_description")?,
        source: row.try_get("source")?,
        segment: row.try_get("segment")?,
        quote_id: row.try_get("quote_id")?,
        quote_experience: row.try_get("experience_type")?,
        quote_total: row.try_get("total")?,
        created_at: row.try_get("created_at")?,
        stage: row.try_get("stage")?,
        stage_entered_at: row.try_get("stage_entered_at")?,
    })
}
