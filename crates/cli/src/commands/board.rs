use serde_json::{json, Value};

use crate::commands::{prepare, CommandResult};
use leadboard_client::{GatewayError, HttpPipelineGateway, PipelineGateway};
use leadboard_core::pipeline::PipelineData;

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("board") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let gateway = match HttpPipelineGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(error) => {
            let class = gateway_error_class(&error);
            return CommandResult::failure("board", class, error.to_string(), 2);
        }
    };

    match runtime.block_on(gateway.fetch_pipeline()) {
        Ok(data) => CommandResult::success_with("board", headline(&data), Some(summarize(&data))),
        Err(error) => {
            CommandResult::failure("board", gateway_error_class(&error), error.to_string(), 4)
        }
    }
}

pub(crate) fn gateway_error_class(error: &GatewayError) -> &str {
    match error {
        GatewayError::InvalidBaseUrl(_) => "invalid_base_url",
        GatewayError::Rejected { reason, .. } => reason,
        GatewayError::Transport(_) => "transport",
        GatewayError::Decode(_) => "decode",
    }
}

pub(crate) fn headline(data: &PipelineData) -> String {
    format!(
        "{} leads ({} active, {} warning, {} overdue)",
        data.totals.total, data.totals.active, data.totals.warning, data.totals.overdue
    )
}

/// Per-lane counts with empty cells left out.
pub(crate) fn summarize(data: &PipelineData) -> Value {
    let lanes = data
        .lanes
        .iter()
        .map(|swimlane| {
            let stages = swimlane
                .stages
                .iter()
                .filter(|cell| cell.count > 0)
                .map(|cell| (cell.stage.as_str().to_string(), Value::from(cell.count)))
                .collect::<serde_json::Map<_, _>>();
            json!({
                "lane": swimlane.lane.as_str(),
                "total": swimlane.stats.total,
                "active": swimlane.stats.active,
                "conversionRate": swimlane.stats.conversion_rate,
                "openValue": swimlane.stats.open_value.to_string(),
                "stages": stages,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "generatedAt": data.generated_at.to_rfc3339(),
        "totals": data.totals,
        "lanes": lanes,
        "quarantined": data.quarantined.len(),
    })
}
