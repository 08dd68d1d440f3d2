use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across handlers.
pub mod msg {
    pub const MISSING_REQUIRED_FIELDS: &str = "Missing required fields";
    pub const COURSE_ID_REQUIRED: &str = "course_id is required for course_purchase";
    pub const PAYMENT_NOT_SUCCESSFUL: &str = "Payment not successful";
    pub const MISSING_SECRET_KEY: &str = "Server misconfigured: missing Flutterwave secret key";
    pub const MISSING_WEBHOOK_SECRET: &str =
        "Server misconfigured: missing Flutterwave webhook secret";
    pub const INVALID_IDENTIFIER: &str = "Identifiers must not be empty or contain ':'";
    pub const AMOUNT_REQUIRED: &str = "amount is required for course_purchase";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Provider reported the transaction as anything but successful.
    /// Carries the raw verification payload back to the caller.
    #[error("Payment not verified")]
    PaymentNotVerified(serde_json::Value),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verify: Option<serde_json::Value>,
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::PathRejection> for AppError {
    fn from(rejection: axum::extract::rejection::PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::PaymentNotVerified(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Io(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, details, verify) = match self {
            AppError::NotFound(msg) => ("Not found".to_string(), Some(msg), None),
            AppError::BadRequest(msg) => (msg, None, None),
            AppError::PaymentNotVerified(payload) => (
                msg::PAYMENT_NOT_SUCCESSFUL.to_string(),
                None,
                Some(payload),
            ),
            AppError::Unauthorized => ("Unauthorized".to_string(), None, None),
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (msg.to_string(), None, None)
            }
            AppError::PaymentProvider(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                ("Payment verification unavailable".to_string(), Some(msg), None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ("Internal server error".to_string(), None, None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                ("Internal server error".to_string(), None, None)
            }
            AppError::Io(e) => {
                tracing::error!("IO error: {}", e);
                ("Internal server error".to_string(), None, None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("Internal server error".to_string(), None, None)
            }
        };

        let body = ErrorResponse {
            error,
            details,
            verify,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
