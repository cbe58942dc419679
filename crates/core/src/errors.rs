use thiserror::Error;

use crate::domain::stage::Stage;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("lead not found: {0}")]
    LeadNotFound(String),
    #[error("force moves require operator authority")]
    ForceNotPermitted,
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request ({reason}): {message}")]
    BadRequest { reason: &'static str, message: String, correlation_id: String },
    #[error("not found ({reason}): {message}")]
    NotFound { reason: &'static str, message: String, correlation_id: String },
    #[error("forbidden ({reason}): {message}")]
    Forbidden { reason: &'static str, message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Machine readable reason code carried on the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadRequest { reason, .. }
            | Self::NotFound { reason, .. }
            | Self::Forbidden { reason, .. } => *reason,
            Self::ServiceUnavailable { .. } => "unavailable",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Forbidden { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error @ DomainError::UnknownStage(_)) => Self::BadRequest {
                reason: "invalid_stage",
                message: error.to_string(),
                correlation_id,
            },
            ApplicationError::Domain(error @ DomainError::InvalidTransition { .. }) => {
                Self::BadRequest {
                    reason: "invalid_transition",
                    message: error.to_string(),
                    correlation_id,
                }
            }
            ApplicationError::Domain(error @ DomainError::InvariantViolation(_)) => {
                Self::BadRequest {
                    reason: "invalid_request",
                    message: error.to_string(),
                    correlation_id,
                }
            }
            error @ ApplicationError::LeadNotFound(_) => Self::NotFound {
                reason: "lead_not_found",
                message: error.to_string(),
                correlation_id,
            },
            error @ ApplicationError::ForceNotPermitted => Self::Forbidden {
                reason: "force_not_permitted",
                message: error.to_string(),
                correlation_id,
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
