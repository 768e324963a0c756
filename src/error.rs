//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Configuration misuse. Raised while building a controller, never at request time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("config load: {0}")]
    Load(String),
}

/// One rejected field, in the shape clients already consume.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub validation: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, validation: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
            validation: validation.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{message}")]
    Validation { message: String, errors: Vec<FieldError> },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store: {0}")]
    Store(String),
    #[error("{stage} hook failed: {message}")]
    Hook { stage: &'static str, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn hook(stage: &'static str, message: impl Into<String>) -> Self {
        AppError::Hook {
            stage,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(_) | AppError::Store(_) | AppError::Hook { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation { message, errors } => ErrorBody {
                status: "error",
                errors: Some(errors),
                message,
            },
            AppError::NotFound(_) | AppError::Db(sqlx::Error::RowNotFound) => ErrorBody {
                status: "error",
                errors: None,
                message: "Record not found".into(),
            },
            other => ErrorBody {
                status: "error",
                errors: None,
                message: other.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
