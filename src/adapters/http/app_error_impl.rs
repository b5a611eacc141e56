use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_retryable() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = ?self, "Request rejected");
        }

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidCredentials => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None)
            }
            AppError::RateLimited => {
                error_resp(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::EntitlementNotFound => {
                error_resp(StatusCode::NOT_FOUND, ErrorCode::EntitlementNotFound, None)
            }
            AppError::InsufficientCredits => error_resp(
                StatusCode::PAYMENT_REQUIRED,
                ErrorCode::InsufficientCredits,
                Some("Monthly analysis limit reached. Upgrade your plan for more.".into()),
            ),
            AppError::LedgerUnavailable(_) => error_resp(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::LedgerUnavailable,
                None,
            ),
            AppError::WebhookUnauthenticated(_) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::WebhookUnauthenticated,
                None,
            ),
            AppError::AnalysisFailed(_) => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::AnalysisFailed, None)
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}
