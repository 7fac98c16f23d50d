use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Meal plan not found")]
    PlanNotFound,

    #[error("Cannot compare a meal plan with itself")]
    SelfComparison,

    #[error("Meal plan {0} is already active")]
    AlreadyActive(Uuid),

    #[error("Meal plan {0} is active and cannot be archived")]
    ArchiveActive(Uuid),

    #[error("Active plan changed: expected {expected:?}, found {actual:?}")]
    ActivationConflict {
        expected: Option<Uuid>,
        actual: Option<Uuid>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PlanNotFound => StatusCode::NOT_FOUND,
            ApiError::SelfComparison => StatusCode::BAD_REQUEST,
            ApiError::AlreadyActive(_)
            | ApiError::ArchiveActive(_)
            | ApiError::ActivationConflict { .. } => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // storage details stay in the logs
        let message = match &self {
            ApiError::Database(_) | ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}
