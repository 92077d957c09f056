use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::quiz::QuizDefinition;
use crate::utils::time;

/// Lifecycle of an attempt. `InProgress` is the only non-terminal state;
/// every terminal state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Expired,
    Terminated,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
            AttemptStatus::Expired => "EXPIRED",
            AttemptStatus::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// One student's timed run through a quiz.
///
/// `started_at` and `duration_seconds` are fixed at creation; elapsed time is
/// always recomputed from them against the server clock. `sequence_counter`
/// advances on every accepted mutation and is the version used for all
/// conditional writes against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub status: AttemptStatus,
    pub violation_count: u32,
    pub final_score: Option<f64>,
    pub completion_percent: Option<f64>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub sequence_counter: u64,
}

impl Attempt {
    pub fn new(quiz: &QuizDefinition, student_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            course_id: quiz.course_id,
            student_id,
            started_at,
            duration_seconds: quiz.duration_seconds,
            status: AttemptStatus::InProgress,
            violation_count: 0,
            final_score: None,
            completion_percent: None,
            finished_at: None,
            last_heartbeat_at: None,
            sequence_counter: 0,
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        time::deadline(self.started_at, self.duration_seconds)
    }

    /// True when the attempt is still open but its time budget has run out.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == AttemptStatus::InProgress && now >= self.deadline()
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        time::remaining_seconds(self.started_at, self.duration_seconds, now)
    }
}
