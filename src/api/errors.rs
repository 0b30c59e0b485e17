use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::{metrics::DerivationError, reports::SummaryError, store::PersistenceError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("invalid or missing device key for community '{0}'")]
    Unauthorized(String),

    #[error(transparent)]
    Derivation(DerivationError),

    #[error(transparent)]
    Summary(SummaryError),

    #[error("service is shutting down")]
    Unavailable,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<DerivationError> for AppError {
    fn from(e: DerivationError) -> Self {
        match e {
            DerivationError::Validation(v) => Self::Validation(v),
            DerivationError::Cancelled => Self::Unavailable,
            other => Self::Derivation(other),
        }
    }
}

impl From<SummaryError> for AppError {
    fn from(e: SummaryError) -> Self {
        match e {
            SummaryError::Validation(v) => Self::Validation(v),
            other => Self::Summary(other),
        }
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::Derivation(_) => (StatusCode::BAD_GATEWAY, "derivation_failed"),
            Self::Summary(_) => (StatusCode::BAD_GATEWAY, "summary_failed"),
            Self::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Self::Database(_) | Self::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Storage details stay in the log.
        let message = match self {
            Self::Database(_) | Self::Persistence(_) => {
                error!(error = %self, "Request failed");
                "internal server error".to_owned()
            }
            _ => {
                warn!(error = %self, status = status.as_u16(), "Request rejected");
                self.to_string()
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
