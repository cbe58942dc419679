use serde_json::json;
use tracing::debug;

use crate::commands::board::gateway_error_class;
use crate::commands::{prepare, CommandResult};
use leadboard_client::{HttpPipelineGateway, MutationCoordinator, MutationError};
use leadboard_core::pipeline::MoveRequest;
use leadboard_core::{LeadId, Stage};

pub fn run(lead_id: &str, stage: &str, force: bool) -> CommandResult {
    let Some(target) = Stage::parse(stage) else {
        let error = MutationError::UnknownStage(stage.to_string());
        return CommandResult::failure("move", error.reason(), error.to_string(), exit_code(&error));
    };

    let (config, runtime) = match prepare("move") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let gateway = match HttpPipelineGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(error) => {
            let class = gateway_error_class(&error);
            return CommandResult::failure("move", class, error.to_string(), 2);
        }
    };
    let coordinator =
        MutationCoordinator::new(gateway, config.aggregator(), config.pipeline.move_timeout());

    let mut request = MoveRequest::new(LeadId::new(lead_id), target);
    request.force = force;

    let outcome = runtime.block_on(async {
        // A current board lets the coordinator skip moves that change nothing.
        if let Err(error) = coordinator.refresh().await {
            debug!(
                event_name = "cli.move.refresh_failed",
                error = %error,
                "moving without a current board"
            );
        }
        coordinator.request_move(request).await
    });

    match outcome {
        Ok(ack) => CommandResult::success_with(
            "move",
            format!("{} is now in {}", ack.lead_id, ack.new_stage.label()),
            Some(json!({ "leadId": ack.lead_id, "newStage": ack.new_stage })),
        ),
        Err(error) => {
            CommandResult::failure("move", error.reason(), error.to_string(), exit_code(&error))
        }
    }
}

fn exit_code(error: &MutationError) -> u8 {
    match error {
        MutationError::UnknownStage(_) => 2,
        MutationError::Rejected { .. } => 4,
        MutationError::Timeout(_) | MutationError::Transport(_) | MutationError::Decode(_) => 5,
    }
}
