use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::AnswerValue;
use crate::models::attempt::AttemptStatus;
use crate::models::violation::ViolationKind;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StartAttemptRequest {
    pub quiz_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub quiz_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub deadline: DateTime<Utc>,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    pub question_id: u32,
    pub value: AnswerValue,
    /// Client-side send counter; a tie-break hint only, never trusted as
    /// time.
    pub client_sequence: u64,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAnswerResponse {
    pub saved: bool,
    pub question_id: u32,
    pub server_sequence: u64,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReportViolationRequest {
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportViolationResponse {
    pub violation_count: u32,
    pub terminated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub final_score: f64,
    pub completion_percent: f64,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStatusResponse {
    pub attempt_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub time_remaining_seconds: i64,
    pub questions_answered: usize,
    pub total_questions: usize,
    pub violation_count: u32,
    pub final_score: Option<f64>,
    pub completion_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub status: AttemptStatus,
    pub time_remaining_seconds: i64,
}
