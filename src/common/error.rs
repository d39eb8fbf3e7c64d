// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid scheduler secret")]
    InvalidCronSecret,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Query methods called before init() resolved the actor scope.
    #[error("Query scope was not initialized")]
    ScopeNotInitialized,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(#[from] anyhow::Error),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidInput(_)
            | AppError::InvalidMetric(_)
            | AppError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidToken | AppError::InvalidCronSecret | AppError::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ScopeNotInitialized
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match self {
            // Every failing field goes back to the caller.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more query parameters are invalid.",
                    "details": details,
                }));
                return (status, body).into_response();
            }
            AppError::InvalidInput(msg) => msg,
            AppError::InvalidMetric(metric) => format!("Invalid metric '{}'.", metric),
            AppError::InvalidDateRange(msg) => msg,
            AppError::InvalidToken | AppError::JwtError(_) => {
                "Missing or invalid authentication token.".to_string()
            }
            AppError::InvalidCronSecret => "Missing or invalid scheduler secret.".to_string(),
            AppError::Forbidden(msg) => msg,

            // Everything else is a 500; the detail only goes to the log.
            ref e => {
                tracing::error!(error = ?e, "internal server error");
                "An unexpected error occurred.".to_string()
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
