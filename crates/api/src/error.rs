use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use wayfinder_core::CoreError;

/// Handler error: core failures keep their code, anything else is a 500.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Response {
        error_response(StatusCode::BAD_REQUEST, "bad_request", message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0.downcast_ref::<CoreError>() {
            Some(core) => error_response(status_for(core), core.code(), core.to_string()),
            None => {
                error!(error = %format!("{:#}", self.0), "unhandled request failure");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        }
    }
}

pub fn status_for(error: &CoreError) -> StatusCode {
    match error {
        CoreError::EmptyQuery
        | CoreError::InvalidCoordinate(_)
        | CoreError::InvalidSchedule(_)
        | CoreError::InsufficientStops(_) => StatusCode::BAD_REQUEST,
        CoreError::NoFeasibleStops(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::AllSourcesUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (status, Json(json!({ "error": code, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_client_and_availability_statuses() {
        assert_eq!(status_for(&CoreError::EmptyQuery), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&CoreError::NoFeasibleStops("budget".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&CoreError::AllSourcesUnavailable(vec!["spatial: down".to_string()])),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn foreign_errors_are_internal() {
        let response = ApiError::from(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
