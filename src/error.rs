use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use serde_json::json;

use crate::mail::MailError;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field-keyed validation messages, rendered as `{"field": ["message", ...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// Fails with the collected messages, if any.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() { Ok(()) } else { Err(AppError::Validation(self)) }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, errors) in errs.field_errors() {
            for err in errors {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| default_message(&err.code));
                out.add(field, message);
            }
        }
        out
    }
}

fn default_message(code: &str) -> String {
    match code {
        "email" => "Enter a valid email address.".to_string(),
        "length" => "Ensure this field has a valid length.".to_string(),
        "range" => "Ensure this value is within the allowed range.".to_string(),
        other => format!("Invalid value ({other})."),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("Authentication credentials were not provided or are invalid.")]
    AuthenticationRequired,
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("Not found.")]
    NotFound,
    #[error("database error: {0}")]
    Database(DbErr),
    #[error("mail delivery failed: {0}")]
    Mail(#[from] MailError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Mail(_) | Self::Token(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Unique-constraint violations surface as validation errors, never as raw storage errors.
impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                tracing::debug!(%detail, "unique constraint violation");
                Self::Validation(FieldErrors::single(
                    NON_FIELD_ERRORS,
                    "An object with these values already exists.",
                ))
            }
            _ => Self::Database(err),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        Self::Validation(errs.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::Validation(errors) => json!(errors),
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "request failed");
                    json!({ "detail": "Internal server error." })
                } else {
                    json!({ "detail": other.to_string() })
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
