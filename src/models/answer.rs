use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// The value a student submitted for one question. The variant must line up
/// with the question's answer key to count as correct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice { selected: u32 },
    Choices { selected: BTreeSet<u32> },
    Numeric { value: f64 },
    Text { value: String },
}

/// Authoritative per-question answer record, unique per
/// `(attempt_id, question_id)`.
///
/// `client_sequence` is a client-supplied hint used only to detect
/// network-reordered older writes; `server_sequence` is assigned from the
/// attempt's counter at acceptance and establishes the real order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub attempt_id: Uuid,
    pub question_id: u32,
    pub value: AnswerValue,
    pub client_sequence: u64,
    pub server_sequence: u64,
    pub saved_at: DateTime<Utc>,
}

/// Stored result of an accepted autosave. Replayed verbatim when the same
/// idempotency key is seen again, so a retried request never reprocesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub question_id: u32,
    pub server_sequence: u64,
    pub saved_at: DateTime<Utc>,
}
