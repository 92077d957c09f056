use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{
    AttemptStatusResponse, HeartbeatResponse, ReportViolationRequest, ReportViolationResponse,
    SaveAnswerRequest, SaveAnswerResponse, StartAttemptRequest, StartAttemptResponse,
    SubmitAttemptResponse,
};
use crate::error::{Error, Result};
use crate::middleware::identity::StudentIdentity;
use crate::models::attempt::Attempt;
use crate::AppState;

/// Attempts are addressed by id but owned by a student; someone else's
/// attempt is indistinguishable from a missing one.
fn assert_owner(attempt: &Attempt, identity: &StudentIdentity) -> Result<()> {
    if attempt.student_id != identity.student_id {
        return Err(Error::NotFound(format!(
            "attempt {} not found",
            attempt.id
        )));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Json(req): Json<StartAttemptRequest>,
) -> Result<Response> {
    req.validate()?;
    let (attempt, quiz) = state
        .attempt_service
        .start_attempt(req.quiz_id, identity.student_id)
        .await?;
    let response = StartAttemptResponse {
        attempt_id: attempt.id,
        quiz_id: attempt.quiz_id,
        status: attempt.status,
        started_at: attempt.started_at,
        duration_seconds: attempt.duration_seconds,
        deadline: attempt.deadline(),
        total_questions: quiz.total_questions(),
    };
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<Response> {
    req.validate()?;
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    assert_owner(&attempt, &identity)?;

    let receipt = state
        .autosave_service
        .save_answer(
            attempt_id,
            req.question_id,
            req.value,
            req.client_sequence,
            req.idempotency_key,
        )
        .await?;
    Ok(Json(SaveAnswerResponse {
        saved: true,
        question_id: receipt.question_id,
        server_sequence: receipt.server_sequence,
        saved_at: receipt.saved_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn report_violation(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<ReportViolationRequest>,
) -> Result<Response> {
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    assert_owner(&attempt, &identity)?;

    let outcome = state
        .violation_service
        .record_violation(attempt_id, req.kind)
        .await?;
    Ok(Json(ReportViolationResponse {
        violation_count: outcome.violation_count,
        terminated: outcome.terminated,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    assert_owner(&attempt, &identity)?;

    let (closed, outcome) = state.attempt_service.submit_attempt(attempt_id).await?;
    Ok(Json(SubmitAttemptResponse {
        attempt_id: closed.id,
        status: closed.status,
        final_score: outcome.final_score,
        completion_percent: outcome.completion_percent,
        finished_at: closed.finished_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    assert_owner(&attempt, &identity)?;

    let attempt = state.attempt_service.heartbeat(attempt_id).await?;
    Ok(Json(HeartbeatResponse {
        status: attempt.status,
        time_remaining_seconds: attempt.remaining_seconds(chrono::Utc::now()),
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Extension(identity): Extension<StudentIdentity>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Response> {
    let attempt = state.attempt_service.get_attempt(attempt_id).await?;
    assert_owner(&attempt, &identity)?;

    let overview = state.attempt_service.attempt_overview(attempt_id).await?;
    Ok(Json(AttemptStatusResponse {
        attempt_id: overview.attempt.id,
        status: overview.attempt.status,
        started_at: overview.attempt.started_at,
        time_remaining_seconds: overview.time_remaining_seconds,
        questions_answered: overview.questions_answered,
        total_questions: overview.total_questions,
        violation_count: overview.attempt.violation_count,
        final_score: overview.attempt.final_score,
        completion_percent: overview.attempt.completion_percent,
    })
    .into_response())
}
