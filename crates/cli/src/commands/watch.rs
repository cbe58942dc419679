use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{debug, warn};

use crate::commands::board::{gateway_error_class, headline};
use crate::commands::{prepare, CommandResult};
use leadboard_client::{BoardEvent, HttpPipelineGateway, MutationCoordinator, Poller};
use leadboard_core::config::{AppConfig, LogFormat};

type WatchFailure = (&'static str, String, u8);

#[derive(Debug, Default)]
struct WatchSummary {
    refreshes: usize,
    failures: usize,
}

pub fn run(ticks: Option<usize>) -> CommandResult {
    let (config, runtime) = match prepare("watch") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    init_logging(&config);

    let gateway = match HttpPipelineGateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(error) => {
            let class = gateway_error_class(&error);
            return CommandResult::failure("watch", class, error.to_string(), 2);
        }
    };

    match runtime.block_on(watch_board(&config, gateway, ticks)) {
        Ok(summary) => CommandResult::success_with(
            "watch",
            format!("stopped after {} refreshes", summary.refreshes),
            Some(json!({ "refreshes": summary.refreshes, "failures": summary.failures })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("watch", error_class, message, exit_code)
        }
    }
}

async fn watch_board(
    config: &AppConfig,
    gateway: HttpPipelineGateway,
    ticks: Option<usize>,
) -> Result<WatchSummary, WatchFailure> {
    let coordinator = Arc::new(MutationCoordinator::new(
        gateway,
        config.aggregator(),
        config.pipeline.move_timeout(),
    ));
    let mut events = coordinator.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller =
        Poller::new(coordinator.clone(), config.pipeline.poll_interval()).spawn(shutdown_rx);

    let mut summary = WatchSummary::default();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(BoardEvent::Refreshed { generated_at }) => {
                    summary.refreshes += 1;
                    let board = coordinator.board().await;
                    println!(
                        "{}",
                        json!({
                            "event": "refreshed",
                            "generatedAt": generated_at.to_rfc3339(),
                            "summary": headline(&board),
                        })
                    );
                    if ticks.is_some_and(|limit| summary.refreshes >= limit) {
                        break;
                    }
                }
                Ok(BoardEvent::RefreshFailed { reason }) => {
                    summary.failures += 1;
                    warn!(event_name = "cli.watch.refresh_failed", reason = %reason, "poll failed");
                    println!("{}", json!({ "event": "refresh_failed", "reason": reason }));
                }
                Ok(BoardEvent::Mutation { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(event_name = "cli.watch.lagged", skipped, "board events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|error| ("signal", error.to_string(), 3u8))?;
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    poller.await.map_err(|error| ("runtime", error.to_string(), 3u8))?;
    Ok(summary)
}

/// Logs go to stderr so stdout stays one JSON document per line.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when commands run in-process.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
