use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use leadboard_core::errors::{ApplicationError, InterfaceError};
use leadboard_core::pipeline::ApiErrorBody;
use leadboard_db::RepositoryError;

/// Handler error carrying the wire reason code and a correlation id.
#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn bad_request(
        reason: &'static str,
        message: impl Into<String>,
        correlation_id: &str,
    ) -> Self {
        Self(InterfaceError::BadRequest {
            reason,
            message: message.into(),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn persistence(error: RepositoryError, correlation_id: &str) -> Self {
        Self::from_application(ApplicationError::Persistence(error.to_string()), correlation_id)
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiErrorBody::from(&self.0);
        if status.is_server_error() {
            warn!(
                event_name = "server.request.failed",
                correlation_id = body.correlation_id.as_deref().unwrap_or("unknown"),
                reason = %body.reason,
                error = %body.message,
                "request failed"
            );
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use leadboard_core::errors::{ApplicationError, DomainError};
    use leadboard_core::Stage;

    use super::ApiError;

    #[test]
    fn application_errors_map_to_http_statuses() {
        let cases = [
            (
                ApplicationError::Domain(DomainError::UnknownStage("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApplicationError::Domain(DomainError::InvalidTransition {
                    from: Stage::Lost,
                    to: Stage::Booked,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (ApplicationError::LeadNotFound("L1".into()), StatusCode::NOT_FOUND),
            (ApplicationError::ForceNotPermitted, StatusCode::FORBIDDEN),
            (ApplicationError::Persistence("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ApplicationError::Configuration("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from_application(error, "req").status(), expected);
        }
    }
}
