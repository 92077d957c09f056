use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::attempt::AttemptStatus;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything here is recoverable by the caller; nothing in the engine is
/// process-fatal. Expiry and termination carry distinct codes so the UI can
/// show a terminal message instead of a generic error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Student {student_id} already has an open attempt for quiz {quiz_id}")]
    AlreadyOpenAttempt { quiz_id: Uuid, student_id: Uuid },

    #[error("Attempt {attempt_id} is already closed with status {status}")]
    InvalidTransition {
        attempt_id: Uuid,
        status: AttemptStatus,
    },

    #[error("Attempt {attempt_id} has run out of time")]
    AttemptExpired { attempt_id: Uuid },

    #[error("Attempt {attempt_id} is closed with status {status}")]
    AttemptClosed {
        attempt_id: Uuid,
        status: AttemptStatus,
    },

    #[error(
        "Stale write for question {question_id}: stored client sequence {stored} supersedes {incoming}"
    )]
    StaleWrite {
        question_id: u32,
        stored: u64,
        incoming: u64,
    },

    #[error("Attempt {attempt_id} is under concurrent modification, retry")]
    ConcurrentUpdateConflict { attempt_id: Uuid },

    #[error("Quiz definition {quiz_id} is unavailable")]
    QuizDefinitionUnavailable { quiz_id: Uuid },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Machine-readable code surfaced in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "configuration_error",
            Error::AlreadyOpenAttempt { .. } => "already_open_attempt",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::AttemptExpired { .. } => "attempt_expired",
            Error::AttemptClosed { .. } => "attempt_closed",
            Error::StaleWrite { .. } => "stale_write",
            Error::ConcurrentUpdateConflict { .. } => "conflict",
            Error::QuizDefinitionUnavailable { .. } => "quiz_not_found",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_failed",
            Error::Json(_) => "bad_json",
            Error::Io(_) => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::AlreadyOpenAttempt { .. }
            | Error::InvalidTransition { .. }
            | Error::StaleWrite { .. } => StatusCode::CONFLICT,
            Error::AttemptExpired { .. } | Error::AttemptClosed { .. } => StatusCode::GONE,
            Error::ConcurrentUpdateConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::QuizDefinitionUnavailable { .. } | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
