use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::Validation(v) => AppError::Validation(v.to_string()),
            DomainError::InvalidInput(msg) => AppError::Validation(msg),
            e @ DomainError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::PaymentFailed(reason) => AppError::PaymentFailed(reason),
            DomainError::Remote(msg) => AppError::Upstream(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Upstream(msg) => {
                log::error!("Upstream call failed: {}", msg);
                self.to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}
