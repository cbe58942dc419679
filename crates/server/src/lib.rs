pub mod bootstrap;
pub mod error;
pub mod health;
pub mod pipeline;

use axum::Router;

use bootstrap::Application;
use pipeline::PipelineState;

/// Full HTTP surface: board, lead intake and health.
pub fn app_router(application: &Application) -> Router {
    pipeline::router(PipelineState::from_application(application))
        .merge(health::router(application.db_pool.clone()))
}
