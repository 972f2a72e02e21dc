//! Error Handling Utilities
//!
//! Error taxonomy for the identity service and its mapping onto HTTP responses.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::database::StoreError;

/// Main application error type surfaced at the API boundary
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body failed validation; carries every violated field
    #[error("Validation error: {0}")]
    InvalidInput(#[from] ValidationErrors),

    /// Ad-hoc validation failure outside the request structs
    #[error("Validation error: {0}")]
    Validation(String),

    /// No matching identity or profile
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Identifier/password pair did not verify
    #[error("Invalid credential")]
    InvalidCredential,

    /// Supplied OTP is absent or does not match the outstanding one
    #[error("Invalid OTP code")]
    InvalidCode,

    /// Supplied OTP matched but its window has passed
    #[error("OTP has expired")]
    Expired,

    /// Natural-key race or uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, malformed or expired bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated principal lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing errors
    #[error("Password hashing error: {0}")]
    HashingError(#[from] bcrypt::BcryptError),

    /// Generic internal server errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Standard error response structure for API endpoints
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(error: &str, message: &str, details: serde_json::Value) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            details: Some(details),
        }
    }
}

impl AppError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) | AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidCredential => "INVALID_CREDENTIAL",
            AppError::InvalidCode => "INVALID_CODE",
            AppError::Expired => "EXPIRED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Database(_)
            | AppError::HashingError(_)
            | AppError::Internal(_) => "SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_)
            | AppError::Validation(_)
            | AppError::InvalidCode
            | AppError::Expired => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredential | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Database(_)
            | AppError::HashingError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire name of a request field; request bodies are camelCase
fn wire_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;

    for ch in field.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            name.extend(ch.to_uppercase());
            upper = false;
        } else {
            name.push(ch);
        }
    }

    name
}

/// Flattens validator output into `field -> [messages]`, keyed by wire name
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();

    for (field, field_errors) in errors.field_errors() {
        let field = wire_name(field);
        let messages = field_errors
            .iter()
            .map(|error| {
                error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for field '{}'", field))
            })
            .collect();
        fields.insert(field, messages);
    }

    fields
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::InvalidInput(errors) => {
                let fields = field_messages(errors);
                let names: Vec<&str> = fields.keys().map(String::as_str).collect();
                let message = format!("Invalid fields: {}", names.join(", "));
                ErrorResponse::with_details(code, &message, serde_json::json!(fields))
            }
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg) => ErrorResponse::new(code, msg),
            AppError::InvalidCredential => ErrorResponse::new(code, "Invalid credentials"),
            AppError::InvalidCode => ErrorResponse::new(code, "Invalid OTP"),
            AppError::Expired => ErrorResponse::new(code, "OTP has expired"),
            AppError::Database(_)
            | AppError::HashingError(_)
            | AppError::Internal(_) => {
                log::error!("Request failed with server error: {}", self);
                ErrorResponse::new(code, "An internal server error occurred")
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::MissingIdentity(id) => {
                AppError::NotFound(format!("Identity {} not found", id))
            }
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Result type alias for operations that can return AppError
pub type AppResult<T> = Result<T, AppError>;
