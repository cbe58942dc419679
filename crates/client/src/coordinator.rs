use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use leadboard_core::domain::lead::LeadId;
use leadboard_core::domain::stage::Stage;
use leadboard_core::pipeline::{
    AppliedMove, MoveRequest, MutationState, PipelineAggregator, PipelineData, StageChangeAck,
};

use crate::error::{GatewayError, MutationError};
use crate::gateway::PipelineGateway;

const EVENT_CAPACITY: usize = 256;

/// Notifications for whatever renders the board.
#[derive(Clone, Debug, PartialEq)]
pub enum BoardEvent {
    Refreshed { generated_at: DateTime<Utc> },
    RefreshFailed { reason: String },
    Mutation {
        lead_id: LeadId,
        target_stage: Stage,
        state: MutationState,
        reason: Option<String>,
    },
}

/// Owns the client's copy of the board and drives every move through
/// Requested → Committed or Requested → RolledBack.
///
/// Moves for the same lead are serialized; moves for different leads run
/// concurrently. The local board is provisional: every successful refresh
/// replaces it wholesale.
pub struct MutationCoordinator<G> {
    gateway: G,
    aggregator: PipelineAggregator,
    board: RwLock<PipelineData>,
    lead_locks: StdMutex<HashMap<LeadId, Arc<Mutex<()>>>>,
    move_timeout: Duration,
    events: broadcast::Sender<BoardEvent>,
}

impl<G: PipelineGateway> MutationCoordinator<G> {
    pub fn new(gateway: G, aggregator: PipelineAggregator, move_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            aggregator,
            board: RwLock::new(PipelineData::empty(Utc::now())),
            lead_locks: StdMutex::new(HashMap::new()),
            move_timeout,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub async fn board(&self) -> PipelineData {
        self.board.read().await.clone()
    }

    /// Pulls the authoritative grid and replaces the local board with it.
    pub async fn refresh(&self) -> Result<(), GatewayError> {
        match self.gateway.fetch_pipeline().await {
            Ok(data) => {
                let generated_at = data.generated_at;
                *self.board.write().await = data;
                debug!(event_name = "client.board.refreshed", %generated_at, "board refreshed");
                self.emit(BoardEvent::Refreshed { generated_at });
                Ok(())
            }
            Err(error) => {
                warn!(event_name = "client.board.refresh_failed", error = %error, "refresh failed");
                self.emit(BoardEvent::RefreshFailed { reason: error.to_string() });
                Err(error)
            }
        }
    }

    /// Parses `target_stage` before anything is touched; unknown stages never reach the server.
    pub async fn request_move_raw(
        &self,
        lead_id: LeadId,
        target_stage: &str,
        force: bool,
    ) -> Result<StageChangeAck, MutationError> {
        let stage = Stage::parse(target_stage)
            .ok_or_else(|| MutationError::UnknownStage(target_stage.to_string()))?;
        let mut request = MoveRequest::new(lead_id, stage);
        request.force = force;
        self.request_move(request).await
    }

    pub async fn request_move(
        &self,
        request: MoveRequest,
    ) -> Result<StageChangeAck, MutationError> {
        let lead_lock = self.lead_lock(&request.lead_id);
        let result = {
            let _in_flight = lead_lock.lock().await;
            self.run_move(&request).await
        };
        drop(lead_lock);
        self.release_lead_lock(&request.lead_id);
        result
    }

    async fn run_move(&self, request: &MoveRequest) -> Result<StageChangeAck, MutationError> {
        if !request.force {
            let current = self.board.read().await.stage_of(&request.lead_id);
            if current == Some(request.target_stage) {
                debug!(
                    event_name = "client.move.unchanged",
                    lead_id = %request.lead_id,
                    stage = %request.target_stage,
                    "lead already in target stage"
                );
                return Ok(StageChangeAck {
                    lead_id: request.lead_id.clone(),
                    new_stage: request.target_stage,
                });
            }
        }

        let applied = self.board.write().await.apply_move(
            &self.aggregator,
            &request.lead_id,
            request.target_stage,
            Utc::now(),
        );
        self.emit_mutation(request, MutationState::Requested, None);

        let outcome =
            tokio::time::timeout(self.move_timeout, self.gateway.request_stage_change(request))
                .await;
        match outcome {
            Ok(Ok(ack)) => {
                info!(
                    event_name = "client.move.committed",
                    lead_id = %ack.lead_id,
                    new_stage = %ack.new_stage,
                    "move committed"
                );
                self.emit_mutation(request, MutationState::Committed, None);
                Ok(ack)
            }
            Ok(Err(error)) => Err(self.roll_back(request, applied, error.into()).await),
            Err(_) => {
                let error = MutationError::Timeout(self.move_timeout);
                Err(self.roll_back(request, applied, error).await)
            }
        }
    }

    async fn roll_back(
        &self,
        request: &MoveRequest,
        applied: Option<AppliedMove>,
        error: MutationError,
    ) -> MutationError {
        if let Some(applied) = &applied {
            self.board.write().await.revert_move(applied);
        }
        warn!(
            event_name = "client.move.rolled_back",
            lead_id = %request.lead_id,
            target_stage = %request.target_stage,
            reason = error.reason(),
            error = %error,
            "move rolled back"
        );
        self.emit_mutation(request, MutationState::RolledBack, Some(error.to_string()));

        // The refresh outcome is reported through events; the move error is what the caller needs.
        let _ = self.refresh().await;
        error
    }

    fn lead_lock(&self, lead_id: &LeadId) -> Arc<Mutex<()>> {
        let mut locks = self.lead_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(lead_id.clone()).or_default().clone()
    }

    fn release_lead_lock(&self, lead_id: &LeadId) {
        let mut locks = self.lead_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = locks.get(lead_id).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if unused {
            locks.remove(lead_id);
        }
    }

    fn emit_mutation(&self, request: &MoveRequest, state: MutationState, reason: Option<String>) {
        self.emit(BoardEvent::Mutation {
            lead_id: request.lead_id.clone(),
            target_stage: request.target_stage,
            state,
            reason,
        });
    }

    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
