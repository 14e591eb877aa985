use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use sweet_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    ConfigurationError(String),
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{message}")]
    UnprocessableEntity { message: String, details: Vec<String> },
    #[error("{0}")]
    PaymentDeclined(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    ConfirmationFailed(String),
    #[error("{0}")]
    UpstreamError(String),
    #[error("{0}")]
    InternalServerError(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::UnprocessableEntity { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            AppError::PaymentDeclined(_) => (StatusCode::PAYMENT_REQUIRED, "PAYMENT_DECLINED"),
            AppError::NotFoundError(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::ConflictError(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::ConfirmationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_CONFIRMATION_FAILED")
            }
            AppError::UpstreamError(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::ConfigurationError(msg) | AppError::ConfirmationFailed(msg) | AppError::UpstreamError(msg) => {
                tracing::error!("{}: {}", code, msg);
                msg.clone()
            }
            other => other.to_string(),
        };

        let mut error = json!({
            "code": code,
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let AppError::UnprocessableEntity { details, .. } = &self {
            error["details"] = json!(details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::DuplicateIntent(intent) => {
                AppError::ConflictError(format!("payment intent {} is already linked to another order", intent))
            }
            e @ (CoreError::ProviderError { .. } | CoreError::UpstreamUnavailable(_)) => {
                AppError::UpstreamError(e.to_string())
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
