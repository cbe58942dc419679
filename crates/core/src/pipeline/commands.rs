use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;
use crate::domain::stage::Stage;
use crate::errors::{DomainError, InterfaceError};

/// Neutral "move lead L to stage S" message emitted by whatever UI drives the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub lead_id: LeadId,
    pub target_stage: Stage,
    #[serde(default)]
    pub force: bool,
}

impl MoveRequest {
    pub fn new(lead_id: LeadId, target_stage: Stage) -> Self {
        Self { lead_id, target_stage, force: false }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Body of `PATCH /leads/{leadId}/stage`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChangeRequest {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

impl From<&MoveRequest> for StageChangeRequest {
    fn from(request: &MoveRequest) -> Self {
        Self {
            stage: request.target_stage.as_str().to_string(),
            force: request.force.then_some(true),
        }
    }
}

/// Successful response of a stage change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangeAck {
    pub lead_id: LeadId,
    pub new_stage: Stage,
}

/// Error body returned by every failing endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl From<&InterfaceError> for ApiErrorBody {
    fn from(error: &InterfaceError) -> Self {
        let correlation_id = match error {
            InterfaceError::BadRequest { correlation_id, .. }
            | InterfaceError::NotFound { correlation_id, .. }
            | InterfaceError::Forbidden { correlation_id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id, .. }
            | InterfaceError::Internal { correlation_id, .. } => correlation_id.clone(),
        };
        Self {
            reason: error.reason().to_string(),
            message: error.message().to_string(),
            correlation_id: Some(correlation_id),
        }
    }
}

/// Lifecycle of a single optimistic move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationState {
    Requested,
    Committed,
    RolledBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDecision {
    /// Lead already sits in the target stage; nothing is written.
    Unchanged,
    Apply,
}

/// Server-side rule for a stage change.
///
/// Terminal stages are sinks unless the move is forced; every other move is allowed.
pub fn evaluate_move(
    current: Stage,
    target: Stage,
    force: bool,
) -> Result<MoveDecision, DomainError> {
    if current == target {
        return Ok(MoveDecision::Unchanged);
    }
    if current.is_terminal() && !force {
        return Err(DomainError::InvalidTransition { from: current, to: target });
    }
    Ok(MoveDecision::Apply)
}

#[cfg(test)]
mod tests {
    use super::{
        evaluate_move, ApiErrorBody, MoveDecision, MoveRequest, StageChangeAck,
        StageChangeRequest,
    };
    use crate::domain::lead::LeadId;
    use crate::domain::stage::Stage;
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn same_stage_is_unchanged_even_when_forced() {
        assert_eq!(
            evaluate_move(Stage::Booked, Stage::Booked, false),
            Ok(MoveDecision::Unchanged)
        );
        assert_eq!(evaluate_move(Stage::Lost, Stage::Lost, true), Ok(MoveDecision::Unchanged));
    }

    #[test]
    fn active_stages_may_move_anywhere() {
        for target in Stage::ordered() {
            if *target == Stage::Contacted {
                continue;
            }
            assert_eq!(evaluate_move(Stage::Contacted, *target, false), Ok(MoveDecision::Apply));
        }
    }

    #[test]
    fn terminal_stages_are_sinks_unless_forced() {
        assert_eq!(
            evaluate_move(Stage::Lost, Stage::Contacted, false),
            Err(DomainError::InvalidTransition { from: Stage::Lost, to: Stage::Contacted })
        );
        assert_eq!(evaluate_move(Stage::Lost, Stage::Contacted, true), Ok(MoveDecision::Apply));
    }

    #[test]
    fn wire_shapes_match_the_http_contract() {
        let request = MoveRequest::new(LeadId::new("L7"), Stage::Booked);
        let body = serde_json::to_value(StageChangeRequest::from(&request)).expect("encode");
        assert_eq!(body, serde_json::json!({ "stage": "booked" }));

        let forced = StageChangeRequest::from(&request.forced());
        assert_eq!(forced.force, Some(true));

        let ack: StageChangeAck =
            serde_json::from_str(r#"{"leadId":"L7","newStage":"booked"}"#).expect("decode");
        assert_eq!(ack, StageChangeAck { lead_id: LeadId::new("L7"), new_stage: Stage::Booked });
    }

    #[test]
    fn error_body_carries_reason_code() {
        let error = ApplicationError::LeadNotFound("L404".to_string()).into_interface("req-1");
        let body = ApiErrorBody::from(&error);

        assert_eq!(body.reason, "lead_not_found");
        assert_eq!(body.correlation_id.as_deref(), Some("req-1"));
        let encoded = serde_json::to_value(&body).expect("encode");
        assert_eq!(encoded["correlationId"], "req-1");
    }
}
