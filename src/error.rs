//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Construction-time failures: registry lookups, adapter shape, wiring.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown protocol adapter: {0}")]
    UnknownAdapter(String),
    #[error("no protocol adapter given (set adapter or protocol)")]
    MissingAdapter,
    #[error("adapter '{adapter}' is missing required methods: {}", missing.join(", "))]
    InvalidAdapterShape {
        adapter: String,
        missing: Vec<&'static str>,
    },
    #[error("unknown api adapter: {0}")]
    UnknownApi(String),
    #[error("no db adapter registered for model '{0}'")]
    MissingDbAdapter(String),
    #[error("model name is required")]
    MissingModelName,
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid Request")]
    InvalidRequest,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("Invalid Task")]
    InvalidTask,
    #[error("render: {0}")]
    Render(String),
    #[error("collaborator: {0}")]
    Collaborator(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::InvalidRequest | AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::BadRequest(_) | AppError::InvalidTask => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "render_error"),
            AppError::Collaborator(_) | AppError::Json(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "collaborator_error")
            }
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
