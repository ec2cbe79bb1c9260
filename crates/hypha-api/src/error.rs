//! HTTP error mapping for the REST and SSE routes

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hypha_chain::ChainError;
use hypha_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const RATE_LIMIT_MESSAGE: &str = "External API rate limit exceeded. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Chain error: {0}")]
    Chain(ChainError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::RateLimited(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Chain(_) | Self::Store(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        if err.is_rate_limited() {
            Self::RateLimited(err.to_string())
        } else {
            Self::Chain(err)
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, key } => {
                Self::NotFound(format!("{} not found: {}", entity, key))
            }
            StoreError::Unauthorized(message) => Self::Unauthorized(message),
            StoreError::Validation { field, message } => Self::validation(field, message),
            other => Self::Store(other),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 5xx detail stays in the logs
        let body = match &self {
            Self::NotFound(message) => json!({ "error": message }),
            Self::Unauthorized(reason) => {
                warn!("Rejected request: {}", reason);
                json!({ "error": "Unauthorized" })
            }
            Self::Validation { field, message } => json!({ "error": message, "field": field }),
            Self::RateLimited(detail) => {
                warn!("Upstream rate limit: {}", detail);
                json!({ "error": RATE_LIMIT_MESSAGE })
            }
            Self::Chain(_) | Self::Store(_) | Self::Internal(_) => {
                error!("{}", self);
                json!({ "error": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
