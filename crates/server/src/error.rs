use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::{
    integration_client::IntegrationError, rotating_selector::SelectorError, stats::StatsError,
};
use thiserror::Error;
use tracing::{error, warn};
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Stats(StatsError::Database(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            ApiError::Selector(SelectorError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, msg.clone())
            }
            ApiError::Selector(SelectorError::Database(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            ApiError::Selector(SelectorError::Internal(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ApiError::Integration(e @ IntegrationError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Integration(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}
