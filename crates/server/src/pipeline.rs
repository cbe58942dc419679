use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use leadboard_core::config::AuthConfig;
use leadboard_core::domain::lead::{Lead, LeadId, LeadTags};
use leadboard_core::errors::{ApplicationError, DomainError};
use leadboard_core::pipeline::{
    evaluate_move, MoveDecision, PipelineAggregator, PipelineData, PipelineItem, StageChangeAck,
    StageChangeRequest,
};
use leadboard_core::Stage;
use leadboard_db::{LeadRepository, RepositoryError, SqlLeadRepository, StageWrite};

use crate::bootstrap::Application;
use crate::error::ApiError;

#[derive(Clone)]
pub struct PipelineState {
    repository: Arc<dyn LeadRepository>,
    aggregator: Arc<PipelineAggregator>,
    auth: AuthConfig,
    terminal_retention: Duration,
}

impl PipelineState {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        aggregator: PipelineAggregator,
        auth: AuthConfig,
        terminal_retention: Duration,
    ) -> Self {
        Self { repository, aggregator: Arc::new(aggregator), auth, terminal_retention }
    }

    pub fn from_application(application: &Application) -> Self {
        let config = &application.config;
        Self::new(
            Arc::new(SqlLeadRepository::new(application.db_pool.clone())),
            config.aggregator(),
            config.auth.clone(),
            Duration::days(i64::from(config.pipeline.terminal_retention_days)),
        )
    }
}

/// Body of `POST /leads`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewLeadRequest {
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub job_description: String,
    pub source: Option<String>,
    pub segment: Option<String>,
}

pub fn router(state: PipelineState) -> Router {
    Router::new()
        .route("/pipeline", get(get_pipeline))
        .route("/leads", post(create_lead))
        .route("/leads/{lead_id}", get(get_lead))
        .route("/leads/{lead_id}/stage", patch(change_stage))
        .with_state(state)
}

pub async fn get_pipeline(
    State(state): State<PipelineState>,
) -> Result<Json<PipelineData>, ApiError> {
    let correlation_id = new_correlation_id();
    let now = Utc::now();
    let cutoff =
        now.checked_sub_signed(state.terminal_retention).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let batch = state
        .repository
        .list_board_leads(cutoff)
        .await
        .map_err(|error| ApiError::persistence(error, &correlation_id))?;

    let data = state.aggregator.aggregate_batch(&batch, now);
    debug!(
        event_name = "server.pipeline.served",
        correlation_id = %correlation_id,
        total_leads = data.totals.total,
        quarantined = data.quarantined.len(),
        "pipeline aggregate served"
    );
    Ok(Json(data))
}

pub async fn change_stage(
    State(state): State<PipelineState>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<StageChangeRequest>, JsonRejection>,
) -> Result<Json<StageChangeAck>, ApiError> {
    let correlation_id = new_correlation_id();
    let Json(request) = body.map_err(|rejection| {
        ApiError::bad_request("invalid_request", rejection.body_text(), &correlation_id)
    })?;
    let lead_id = LeadId::new(lead_id);
    let force = request.force.unwrap_or(false);

    let target = Stage::parse(&request.stage).ok_or_else(|| {
        ApiError::from_application(
            DomainError::UnknownStage(request.stage.clone()).into(),
            &correlation_id,
        )
    })?;

    if force && !state.auth.permits_force(bearer_token(&headers)) {
        warn!(
            event_name = "server.pipeline.force_denied",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            "forced move rejected without operator token"
        );
        return Err(ApiError::from_application(
            ApplicationError::ForceNotPermitted,
            &correlation_id,
        ));
    }

    let lead = load_lead(state.repository.as_ref(), &lead_id, &correlation_id).await?;

    let decision = evaluate_move(lead.stage, target, force).map_err(|error| {
        info!(
            event_name = "server.pipeline.move_rejected",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            error = %error,
            "stage change rejected"
        );
        ApiError::from_application(error.into(), &correlation_id)
    })?;

    if decision == MoveDecision::Apply {
        let expected = (!force).then_some(lead.stage);
        let write = state
            .repository
            .update_stage(&lead_id, target, Utc::now(), expected)
            .await
            .map_err(|error| ApiError::persistence(error, &correlation_id))?;
        match write {
            StageWrite::Applied => {}
            StageWrite::Missing => return Err(lead_not_found(&lead_id, &correlation_id)),
            StageWrite::Conflict => {
                let current = load_lead(state.repository.as_ref(), &lead_id, &correlation_id)
                    .await
                    .map(|lead| lead.stage)
                    .unwrap_or(lead.stage);
                info!(
                    event_name = "server.pipeline.move_conflict",
                    correlation_id = %correlation_id,
                    lead_id = %lead_id,
                    read = %lead.stage,
                    current = %current,
                    "stage changed before the write landed"
                );
                return Err(ApiError::from_application(
                    DomainError::InvalidTransition { from: current, to: target }.into(),
                    &correlation_id,
                ));
            }
        }
        info!(
            event_name = "server.pipeline.stage_changed",
            correlation_id = %correlation_id,
            lead_id = %lead_id,
            from = %lead.stage,
            to = %target,
            force,
            "lead stage changed"
        );
    }

    Ok(Json(StageChangeAck { lead_id, new_stage: target }))
}

pub async fn create_lead(
    State(state): State<PipelineState>,
    body: Result<Json<NewLeadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PipelineItem>), ApiError> {
    let correlation_id = new_correlation_id();
    let Json(request) = body.map_err(|rejection| {
        ApiError::bad_request("invalid_request", rejection.body_text(), &correlation_id)
    })?;
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request(
            "invalid_request",
            "lead name is required",
            &correlation_id,
        ));
    }

    let now = Utc::now();
    let id = request
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("L-{}", Uuid::new_v4().simple()));
    let mut lead =
        Lead::new(LeadId::new(id), request.name, request.phone, request.job_description, now);
    lead.tags = LeadTags { source: request.source, segment: request.segment };

    match state.repository.insert(lead.clone()).await {
        Ok(()) => {}
        Err(RepositoryError::Duplicate(id)) => {
            return Err(ApiError::bad_request(
                "duplicate_lead",
                format!("lead `{id}` already exists"),
                &correlation_id,
            ));
        }
        Err(error) => return Err(ApiError::persistence(error, &correlation_id)),
    }

    info!(
        event_name = "server.pipeline.lead_created",
        correlation_id = %correlation_id,
        lead_id = %lead.id,
        "lead created"
    );
    Ok((StatusCode::CREATED, Json(state.aggregator.project(&lead, now))))
}

pub async fn get_lead(
    State(state): State<PipelineState>,
    Path(lead_id): Path<String>,
) -> Result<Json<PipelineItem>, ApiError> {
    let correlation_id = new_correlation_id();
    let lead_id = LeadId::new(lead_id);
    let lead = load_lead(state.repository.as_ref(), &lead_id, &correlation_id).await?;
    Ok(Json(state.aggregator.project(&lead, Utc::now())))
}

async fn load_lead(
    repository: &dyn LeadRepository,
    lead_id: &LeadId,
    correlation_id: &str,
) -> Result<Lead, ApiError> {
    match repository.find_by_id(lead_id).await {
        Ok(Some(lead)) => Ok(lead),
        Ok(None) => Err(lead_not_found(lead_id, correlation_id)),
        Err(RepositoryError::Decode(message)) => Err(ApiError::from_application(
            DomainError::InvariantViolation(message).into(),
            correlation_id,
        )),
        Err(error) => Err(ApiError::persistence(error, correlation_id)),
    }
}

fn lead_not_found(lead_id: &LeadId, correlation_id: &str) -> ApiError {
    ApiError::from_application(ApplicationError::LeadNotFound(lead_id.to_string()), correlation_id)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
