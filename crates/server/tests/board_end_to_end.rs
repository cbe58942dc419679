use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;

use leadboard_client::{BoardEvent, HttpPipelineGateway, MutationCoordinator, MutationError};
use leadboard_core::config::AppConfig;
use leadboard_core::pipeline::{Lane, MutationState};
use leadboard_core::{LeadId, Stage};
use leadboard_db::DemoSeedDataset;
use leadboard_server::{app_router, bootstrap::bootstrap_with_config};

type E2eResult<T = ()> = Result<T, String>;

macro_rules! require_eq {
    ($left:expr, $right:expr, $($arg:tt)*) => {
        if $left != $right {
            return Err(format!(
                "{}: `{:?}` != `{:?}`",
                format!($($arg)*),
                $left,
                $right
            ));
        }
    };
}

/// Boots a seeded service on an ephemeral port and returns its base url.
async fn spawn_service(admin_token: Option<&str>) -> E2eResult<String> {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".to_string();
    config.database.max_connections = 1;
    config.auth.admin_token = admin_token.map(|token| token.to_string().into());

    let app = bootstrap_with_config(config).await.map_err(|error| format!("bootstrap: {error}"))?;
    DemoSeedDataset::load(&app.db_pool, Utc::now())
        .await
        .map_err(|error| format!("seed: {error}"))?;

    let listener =
        TcpListener::bind("127.0.0.1:0").await.map_err(|error| format!("bind: {error}"))?;
    let address = listener.local_addr().map_err(|error| format!("local addr: {error}"))?;
    let router = app_router(&app);
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
        drop(app);
    });

    Ok(format!("http://{address}"))
}

fn coordinator(
    base_url: &str,
    admin_token: Option<&str>,
) -> E2eResult<MutationCoordinator<HttpPipelineGateway>> {
    let mut gateway = HttpPipelineGateway::new(base_url, Duration::from_secs(5))
        .map_err(|error| format!("gateway: {error}"))?;
    if let Some(token) = admin_token {
        gateway = gateway.with_admin_token(token.to_string().into());
    }
    Ok(MutationCoordinator::new(
        gateway,
        AppConfig::default().aggregator(),
        Duration::from_secs(5),
    ))
}

#[tokio::test]
async fn committed_move_lands_in_booked_after_refresh() -> E2eResult {
    let base_url = spawn_service(None).await?;
    let coordinator = coordinator(&base_url, None)?;
    coordinator.refresh().await.map_err(|error| format!("initial refresh: {error}"))?;

    let before = coordinator.board().await;
    let l7 = LeadId::new("L7");
    require_eq!(before.stage_of(&l7), Some(Stage::Contacted), "L7 starts in contacted");
    let contacted_before = before.cell_count(Lane::Assessment, Stage::Contacted);
    let booked_before = before.cell_count(Lane::Assessment, Stage::Booked);

    let ack = coordinator
        .request_move_raw(l7.clone(), "booked", false)
        .await
        .map_err(|error| format!("move: {error}"))?;
    require_eq!(ack.new_stage, Stage::Booked, "server acknowledges booked");
    require_eq!(
        coordinator.board().await.stage_of(&l7),
        Some(Stage::Booked),
        "optimistic placement stays after commit"
    );

    coordinator.refresh().await.map_err(|error| format!("refresh: {error}"))?;
    let after = coordinator.board().await;
    require_eq!(after.stage_of(&l7), Some(Stage::Booked), "server truth agrees");
    require_eq!(
        after.cell_count(Lane::Assessment, Stage::Contacted),
        contacted_before - 1,
        "contacted count drops by one"
    );
    require_eq!(
        after.cell_count(Lane::Assessment, Stage::Booked),
        booked_before + 1,
        "booked count grows by one"
    );
    Ok(())
}

#[tokio::test]
async fn rejected_move_rolls_back_and_surfaces_reason() -> E2eResult {
    let base_url = spawn_service(None).await?;
    let coordinator = coordinator(&base_url, None)?;
    coordinator.refresh().await.map_err(|error| format!("initial refresh: {error}"))?;
    let mut events = coordinator.subscribe();

    let l12 = LeadId::new("L12");
    let error = match coordinator.request_move_raw(l12.clone(), "contacted", false).await {
        Ok(ack) => return Err(format!("terminal lead moved unexpectedly: {ack:?}")),
        Err(error) => error,
    };
    let reason = match &error {
        MutationError::Rejected { status, reason, .. } => {
            require_eq!(*status, 400, "validation rejection status");
            reason.clone()
        }
        other => return Err(format!("unexpected error: {other:?}")),
    };
    require_eq!(reason.as_str(), "invalid_transition", "reason code is surfaced");
    require_eq!(
        coordinator.board().await.stage_of(&l12),
        Some(Stage::Lost),
        "board snaps back to server truth"
    );

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let BoardEvent::Mutation { state, reason, .. } = event {
            states.push((state, reason.is_some()));
        }
    }
    require_eq!(
        states,
        vec![(MutationState::Requested, false), (MutationState::RolledBack, true)],
        "mutation lifecycle events"
    );
    Ok(())
}

#[tokio::test]
async fn forced_moves_need_the_operator_token() -> E2eResult {
    let base_url = spawn_service(Some("ops-token")).await?;
    let l13 = LeadId::new("L13");

    let anonymous = coordinator(&base_url, None)?;
    anonymous.refresh().await.map_err(|error| format!("refresh: {error}"))?;
    match anonymous.request_move_raw(l13.clone(), "contacted", true).await {
        Err(MutationError::Rejected { status: 403, reason, .. }) => {
            require_eq!(reason.as_str(), "force_not_permitted", "forbidden reason");
        }
        other => return Err(format!("expected forbidden, got {other:?}")),
    }
    require_eq!(anonymous.board().await.stage_of(&l13), Some(Stage::Lost), "still lost");

    let operator = coordinator(&base_url, Some("ops-token"))?;
    operator
        .request_move_raw(l13.clone(), "contacted", true)
        .await
        .map_err(|error| format!("forced move: {error}"))?;
    operator.refresh().await.map_err(|error| format!("refresh: {error}"))?;
    require_eq!(operator.board().await.stage_of(&l13), Some(Stage::Contacted), "reopened");
    Ok(())
}

#[tokio::test]
async fn repeated_move_is_idempotent_on_the_server() -> E2eResult {
    let base_url = spawn_service(None).await?;
    // No refresh: the coordinator cannot short-circuit, so both calls reach the server.
    let coordinator = coordinator(&base_url, None)?;
    let l9 = LeadId::new("L9");

    coordinator
        .request_move_raw(l9.clone(), "in_progress", false)
        .await
        .map_err(|error| format!("first move: {error}"))?;
    coordinator.refresh().await.map_err(|error| format!("refresh: {error}"))?;
    let entered_at = coordinator
        .board()
        .await
        .find_item(&l9)
        .map(|item| item.stage_entered_at)
        .ok_or("L9 on board")?;

    let fresh = self::coordinator(&base_url, None)?;
    fresh
        .request_move_raw(l9.clone(), "in_progress", false)
        .await
        .map_err(|error| format!("second move: {error}"))?;
    fresh.refresh().await.map_err(|error| format!("refresh: {error}"))?;
    let entered_again =
        fresh.board().await.find_item(&l9).map(|item| item.stage_entered_at).ok_or("L9")?;
    require_eq!(entered_again, entered_at, "stage clock untouched by repeated move");
    Ok(())
}
