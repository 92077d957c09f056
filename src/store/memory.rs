use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, SaveReceipt};
use crate::models::attempt::Attempt;
use crate::models::violation::ViolationEvent;
use crate::store::AttemptStore;

/// Everything owned by one attempt, versioned by the attempt's
/// `sequence_counter`.
#[derive(Debug)]
struct AttemptRecord {
    attempt: Attempt,
    answers: BTreeMap<u32, Answer>,
    receipts: HashMap<String, SaveReceipt>,
    violations: Vec<ViolationEvent>,
}

#[derive(Debug, Default)]
struct Arena {
    records: HashMap<Uuid, AttemptRecord>,
    /// (quiz_id, student_id) -> open attempt, upholding the one-open-attempt
    /// rule. Entries leave the index when the attempt goes terminal.
    open: HashMap<(Uuid, Uuid), Uuid>,
}

/// In-memory arena implementation of [`AttemptStore`].
///
/// The lock is a storage-internal latch held only for the compare and write,
/// never across an `.await`; cross-request ordering comes from the
/// conditional update on `sequence_counter`, exactly as it would against a
/// database row with a version column.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arena: RwLock<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> Error {
        Error::Internal("attempt store lock poisoned".to_string())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn insert_attempt(&self, attempt: Attempt) -> Result<()> {
        let mut arena = self.arena.write().map_err(|_| Self::lock_poisoned())?;
        let open_key = (attempt.quiz_id, attempt.student_id);
        if arena.open.contains_key(&open_key) {
            return Err(Error::AlreadyOpenAttempt {
                quiz_id: attempt.quiz_id,
                student_id: attempt.student_id,
            });
        }
        let id = attempt.id;
        arena.open.insert(open_key, id);
        arena.records.insert(
            id,
            AttemptRecord {
                attempt,
                answers: BTreeMap::new(),
                receipts: HashMap::new(),
                violations: Vec::new(),
            },
        );
        Ok(())
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<Attempt> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        arena
            .records
            .get(&attempt_id)
            .map(|r| r.attempt.clone())
            .ok_or_else(|| Error::NotFound(format!("attempt {} not found", attempt_id)))
    }

    async fn update_attempt(&self, updated: Attempt, expected_sequence: u64) -> Result<bool> {
        let mut arena = self.arena.write().map_err(|_| Self::lock_poisoned())?;
        let record = arena
            .records
            .get_mut(&updated.id)
            .ok_or_else(|| Error::NotFound(format!("attempt {} not found", updated.id)))?;
        if record.attempt.sequence_counter != expected_sequence {
            return Ok(false);
        }
        let went_terminal = updated.status.is_terminal() && !record.attempt.status.is_terminal();
        let open_key = (updated.quiz_id, updated.student_id);
        record.attempt = updated;
        if went_terminal {
            arena.open.remove(&open_key);
        }
        Ok(true)
    }

    async fn update_attempt_with_answer(
        &self,
        updated: Attempt,
        expected_sequence: u64,
        answer: Answer,
        receipt: Option<(String, SaveReceipt)>,
    ) -> Result<bool> {
        let mut arena = self.arena.write().map_err(|_| Self::lock_poisoned())?;
        let record = arena
            .records
            .get_mut(&updated.id)
            .ok_or_else(|| Error::NotFound(format!("attempt {} not found", updated.id)))?;
        if record.attempt.sequence_counter != expected_sequence {
            return Ok(false);
        }
        record.attempt = updated;
        record.answers.insert(answer.question_id, answer);
        if let Some((key, receipt)) = receipt {
            record.receipts.insert(key, receipt);
        }
        Ok(true)
    }

    async fn get_answer(&self, attempt_id: Uuid, question_id: u32) -> Result<Option<Answer>> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        Ok(arena
            .records
            .get(&attempt_id)
            .and_then(|r| r.answers.get(&question_id))
            .cloned())
    }

    async fn list_answers(&self, attempt_id: Uuid) -> Result<Vec<Answer>> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        Ok(arena
            .records
            .get(&attempt_id)
            .map(|r| r.answers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_receipt(
        &self,
        attempt_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<SaveReceipt>> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        Ok(arena
            .records
            .get(&attempt_id)
            .and_then(|r| r.receipts.get(idempotency_key))
            .cloned())
    }

    async fn append_violation(&self, attempt_id: Uuid, event: ViolationEvent) -> Result<()> {
        let mut arena = self.arena.write().map_err(|_| Self::lock_poisoned())?;
        let record = arena
            .records
            .get_mut(&attempt_id)
            .ok_or_else(|| Error::NotFound(format!("attempt {} not found", attempt_id)))?;
        record.violations.push(event);
        Ok(())
    }

    async fn list_violations(&self, attempt_id: Uuid) -> Result<Vec<ViolationEvent>> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        Ok(arena
            .records
            .get(&attempt_id)
            .map(|r| r.violations.clone())
            .unwrap_or_default())
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Attempt>> {
        let arena = self.arena.read().map_err(|_| Self::lock_poisoned())?;
        Ok(arena
            .records
            .values()
            .filter(|r| r.attempt.is_overdue(now))
            .map(|r| r.attempt.clone())
            .collect())
    }

    async fn record_heartbeat(&self, attempt_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut arena = self.arena.write().map_err(|_| Self::lock_poisoned())?;
        let record = arena
            .records
            .get_mut(&attempt_id)
            .ok_or_else(|| Error::NotFound(format!("attempt {} not found", attempt_id)))?;
        record.attempt.last_heartbeat_at = Some(at);
        Ok(())
    }
}
