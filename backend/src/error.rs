//! Error handling for the Shelfwise analytics engine
//!
//! Fetch-level failures (`RateLimited`, `Timeout`, `Http`, `Transport`) are
//! retried by the fetch client and absorbed by the collector and enricher
//! wherever the run can continue. Only what cannot be absorbed reaches the
//! HTTP surface, as a structured error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Fetch errors
    #[error("Rate limited by the commerce API, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Commerce API call timed out")]
    Timeout,

    #[error("Commerce API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Commerce API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed commerce API payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Order collection failed: {0}")]
    CollectionFailed(String),

    // Request and setup errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the fetch client should try the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::RateLimited { .. } | AppError::Timeout => true,
            AppError::Http { status, .. } => *status >= 500,
            AppError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Timeout => "UPSTREAM_TIMEOUT",
            AppError::Http { .. } => "UPSTREAM_HTTP_ERROR",
            AppError::Transport(_) => "UPSTREAM_TRANSPORT_ERROR",
            AppError::Json(_) => "UPSTREAM_PAYLOAD_ERROR",
            AppError::GraphQl(_) => "UPSTREAM_GRAPHQL_ERROR",
            AppError::CollectionFailed(_) => "COLLECTION_FAILED",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Http { .. }
            | AppError::Transport(_)
            | AppError::Json(_)
            | AppError::GraphQl(_)
            | AppError::CollectionFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Upstream bodies can be large and may echo request details
            AppError::Http { status, .. } => format!("Commerce API returned HTTP {}", status),
            AppError::Internal(_) => "An internal server error occurred".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let detail = ErrorDetail {
            code: self.code().to_string(),
            message,
        };

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;
