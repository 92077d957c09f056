pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::answer::{Answer, SaveReceipt};
use crate::models::attempt::Attempt;
use crate::models::violation::ViolationEvent;

/// Durable keyed store for attempts and everything they own.
///
/// The attempt row supports atomic conditional updates keyed on its
/// `sequence_counter` (the version field); the answer upsert and idempotency
/// receipt ride in the same conditional write. This is the only concurrency
/// primitive the engine needs, so any backend with a conditional update can
/// implement it.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Insert a freshly created attempt. Fails with `AlreadyOpenAttempt`
    /// when an IN_PROGRESS attempt exists for the same (quiz, student).
    async fn insert_attempt(&self, attempt: Attempt) -> Result<()>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Attempt>;

    /// Conditionally replace the attempt row. Succeeds only when the stored
    /// row still carries `expected_sequence`; returns `false` on a version
    /// conflict so the caller can reload and retry.
    async fn update_attempt(&self, updated: Attempt, expected_sequence: u64) -> Result<bool>;

    /// Same conditional write, additionally upserting the answer (and its
    /// receipt when an idempotency key was supplied) in the same atomic step.
    async fn update_attempt_with_answer(
        &self,
        updated: Attempt,
        expected_sequence: u64,
        answer: Answer,
        receipt: Option<(String, SaveReceipt)>,
    ) -> Result<bool>;

    async fn get_answer(&self, attempt_id: Uuid, question_id: u32) -> Result<Option<Answer>>;

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>>;

    async fn get_receipt(
        &self,
        attempt_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<SaveReceipt>>;

    /// Append to the attempt's violation audit trail. Not a counted
    /// mutation on its own; the counter advances via `update_attempt`.
    async fn append_violation(&self, attempt_id: Uuid, event: ViolationEvent) -> Result<()>;

    async fn list_violations(&self, attempt_id: Uuid) -> Result<Vec<ViolationEvent>>;

    /// IN_PROGRESS attempts whose deadline passed before `now`.
    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Attempt>>;

    /// Liveness marker; intentionally not a counted mutation.
    async fn record_heartbeat(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}
