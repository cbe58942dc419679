//! Client side of the lead pipeline board: fetches the authoritative grid,
//! overlays optimistic moves, and reconciles them with the server.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod poller;

pub use coordinator::{BoardEvent, MutationCoordinator};
pub use error::{GatewayError, MutationError};
pub use gateway::{HttpPipelineGateway, PipelineGateway};
pub use poller::Poller;
