use actix_web::{HttpResponse, ResponseError};
use poise::serenity_prelude as serenity;
use thiserror::Error;

use crate::models::{ApiError, ApiResponse};
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Discord API error: {0}")]
    Discord(#[from] Box<serenity::Error>),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl From<serenity::Error> for AppError {
    fn from(err: serenity::Error) -> Self {
        AppError::Discord(Box::new(err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::DatabaseError(e),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (actix_web::http::StatusCode, &'static str) {
        use actix_web::http::StatusCode;
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::SerdeJsonError(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.status_and_code().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code) = self.status_and_code();
        let message = match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                log::warn!("{self}");
                msg.clone()
            }
            AppError::SerdeJsonError(err) => {
                log::warn!("Invalid JSON payload: {err}");
                err.to_string()
            }
            AppError::StoreUnavailable(msg) => {
                log::error!("Store unavailable: {msg}");
                "Store unavailable".to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(status_code).json(ApiResponse::<()>::failure(ApiError {
            code: error_code.to_string(),
            message,
        }))
    }
}
