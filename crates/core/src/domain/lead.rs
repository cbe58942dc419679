use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::quote::{QuoteExperience, QuoteId, QuoteSummary};
use crate::domain::stage::Stage;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub String);

impl LeadId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTags {
    pub source: Option<String>,
    pub segment: Option<String>,
}

/// A validated sales lead. `stage` is always drawn from the closed [`Stage`] set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub phone: String,
    pub job_description: String,
    pub tags: LeadTags,
    pub quote: Option<QuoteSummary>,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub stage_entered_at: DateTime<Utc>,
}

impl Lead {
    /// Intake constructor: every lead starts in `new_lead`.
    pub fn new(
        id: LeadId,
        name: impl Into<String>,
        phone: impl Into<String>,
        job_description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            phone: phone.into(),
            job_description: job_description.into(),
            tags: LeadTags::default(),
            quote: None,
            created_at,
            stage: Stage::NewLead,
            stage_entered_at: created_at,
        }
    }

    /// Moves the lead and resets its stage clock. A move to the current stage keeps the clock.
    pub fn enter_stage(&mut self, stage: Stage, at: DateTime<Utc>) -> bool {
        if self.stage == stage {
            return false;
        }
        self.stage = stage;
        self.stage_entered_at = at;
        true
    }
}

/// Loosely typed lead record as it arrives from storage or an upstream feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLeadRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub job_description: Option<String>,
    pub source: Option<String>,
    pub segment: Option<String>,
    pub quote_id: Option<String>,
    pub quote_experience: Option<String>,
    pub quote_total: Option<String>,
    pub created_at: Option<String>,
    pub stage: Option<String>,
    pub stage_entered_at: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LeadDecodeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("invalid timestamp in `{field}`: `{value}`")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// A record that failed boundary validation and is kept off the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedLead {
    pub lead_id: Option<String>,
    pub reason: String,
}

impl QuarantinedLead {
    pub fn new(lead_id: Option<String>, error: &LeadDecodeError) -> Self {
        Self { lead_id, reason: error.to_string() }
    }
}

/// Validated leads plus whatever failed validation on the way in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeadBatch {
    pub leads: Vec<Lead>,
    pub quarantined: Vec<QuarantinedLead>,
}

impl LeadBatch {
    pub fn from_raw(records: impl IntoIterator<Item = RawLeadRecord>) -> Self {
        let mut batch = Self::default();
        for record in records {
            let lead_id = non_empty(record.id.as_deref()).map(str::to_string);
            match Lead::try_from(record) {
                Ok(lead) => batch.leads.push(lead),
                Err(error) => batch.quarantined.push(QuarantinedLead::new(lead_id, &error)),
            }
        }
        batch
    }
}

impl TryFrom<RawLeadRecord> for Lead {
    type Error = LeadDecodeError;

    fn try_from(record: RawLeadRecord) -> Result<Self, Self::Error> {
        let id = non_empty(record.id.as_deref()).ok_or(LeadDecodeError::MissingField("id"))?;
        let raw_stage =
            non_empty(record.stage.as_deref()).ok_or(LeadDecodeError::MissingField("stage"))?;
        let stage = Stage::parse(raw_stage)
            .ok_or_else(|| LeadDecodeError::UnknownStage(raw_stage.to_string()))?;
        let raw_created = non_empty(record.created_at.as_deref())
            .ok_or(LeadDecodeError::MissingField("created_at"))?;
        let created_at = parse_timestamp("created_at", raw_created)?;
        let stage_entered_at = match non_empty(record.stage_entered_at.as_deref()) {
            Some(raw) => parse_timestamp("stage_entered_at", raw)?,
            None => created_at,
        };

        let quote = non_empty(record.quote_id.as_deref()).map(|quote_id| QuoteSummary {
            id: QuoteId(quote_id.to_string()),
            experience: QuoteExperience::parse(record.quote_experience.as_deref().unwrap_or("")),
            total: non_empty(record.quote_total.as_deref())
                .and_then(|raw| Decimal::from_str(raw).ok()),
        });

        Ok(Self {
            id: LeadId(id.to_string()),
            name: record.name.unwrap_or_default(),
            phone: record.phone.unwrap_or_default(),
            job_description: record.job_description.unwrap_or_default(),
            tags: LeadTags {
                source: record.source.filter(|value| !value.trim().is_empty()),
                segment: record.segment.filter(|value| !value.trim().is_empty()),
            },
            quote,
            created_at,
            stage,
            stage_entered_at,
        })
    }
}

impl From<&Lead> for RawLeadRecord {
    fn from(lead: &Lead) -> Self {
        Self {
            id: Some(lead.id.0.clone()),
            name: Some(lead.name.clone()),
            phone: Some(lead.phone.clone()),
            job_description: Some(lead.job_description.clone()),
            source: lead.tags.source.clone(),
            segment: lead.tags.segment.clone(),
            quote_id: lead.quote.as_ref().map(|quote| quote.id.0.clone()),
            quote_experience: lead
                .quote
                .as_ref()
                .map(|quote| quote.experience.as_str().to_string()),
            quote_total: lead
                .quote
                .as_ref()
                .and_then(|quote| quote.total)
                .map(|total| total.to_string()),
            created_at: Some(lead.created_at.to_rfc3339()),
            stage: Some(lead.stage.as_str().to_string()),
            stage_entered_at: Some(lead.stage_entered_at.to_rfc3339()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, LeadDecodeError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| LeadDecodeError::InvalidTimestamp { field, value: value.to_string() })
}
