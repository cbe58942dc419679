use std::time::Duration;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("invalid server base url `{0}`")]
    InvalidBaseUrl(String),
    #[error("server rejected request with {status} ({reason}): {message}")]
    Rejected { status: u16, reason: String, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode server response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Why a move did not commit. Every variant means the optimistic placement was discarded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("move rejected ({reason}): {message}")]
    Rejected { status: u16, reason: String, message: String },
    #[error("move timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected server response: {0}")]
    Decode(String),
}

impl MutationError {
    /// Short machine readable cause, suitable for an operator notification.
    pub fn reason(&self) -> &str {
        match self {
            Self::UnknownStage(_) => "invalid_stage",
            Self::Rejected { reason, .. } => reason,
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
        }
    }
}

impl From<GatewayError> for MutationError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Rejected { status, reason, message } => {
                Self::Rejected { status, reason, message }
            }
            GatewayError::InvalidBaseUrl(url) => Self::Transport(format!("invalid base url {url}")),
            GatewayError::Transport(message) => Self::Transport(message),
            GatewayError::Decode(message) => Self::Decode(message),
        }
    }
}
