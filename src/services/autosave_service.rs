use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerValue, SaveReceipt};
use crate::services::attempt_service::AttemptService;
use crate::services::quiz_service::QuizCatalog;
use crate::store::AttemptStore;

/// Incremental per-question answer persistence while an attempt is open.
///
/// Each accepted save takes the next `server_sequence` from the attempt's
/// counter and commits the answer upsert and counter increment as one
/// conditional write; the grading of values is deferred entirely to the
/// terminal transition.
#[derive(Clone)]
pub struct AutosaveService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn QuizCatalog>,
    attempts: AttemptService,
    cas_retry_limit: u32,
}

impl AutosaveService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        attempts: AttemptService,
        cas_retry_limit: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            attempts,
            cas_retry_limit,
        }
    }

    pub async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: u32,
        value: AnswerValue,
        client_sequence: u64,
        idempotency_key: Option<String>,
    ) -> Result<SaveReceipt> {
        for _ in 0..=self.cas_retry_limit {
            // Expiry gate first: a save arriving past the budget expires the
            // attempt and is itself rejected, never applied.
            let attempt = self.attempts.ensure_open(attempt_id).await?;

            let quiz = self.catalog.get_quiz_definition(attempt.quiz_id).await?;
            if quiz.question(question_id).is_none() {
                return Err(Error::NotFound(format!(
                    "question {} is not part of quiz {}",
                    question_id, attempt.quiz_id
                )));
            }

            // A retried request that was already accepted gets its original
            // receipt back instead of being reprocessed.
            if let Some(key) = &idempotency_key {
                if let Some(previous) = self.store.get_receipt(attempt_id, key).await? {
                    tracing::debug!(
                        attempt_id = %attempt_id,
                        question_id,
                        "duplicate autosave replayed from receipt"
                    );
                    return Ok(previous);
                }
            }

            if let Some(existing) = self.store.get_answer(attempt_id, question_id).await? {
                // Network-reordered older write: the caller must learn its
                // value was superseded rather than have it vanish quietly.
                if existing.client_sequence >= client_sequence {
                    tracing::info!(
                        attempt_id = %attempt_id,
                        question_id,
                        stored = existing.client_sequence,
                        incoming = client_sequence,
                        "stale autosave rejected"
                    );
                    return Err(Error::StaleWrite {
                        question_id,
                        stored: existing.client_sequence,
                        incoming: client_sequence,
                    });
                }
            }

            let server_sequence = attempt.sequence_counter + 1;
            let saved_at = Utc::now();
            let answer = Answer {
                attempt_id,
                question_id,
                value: value.clone(),
                client_sequence,
                server_sequence,
                saved_at,
            };
            let receipt = SaveReceipt {
                question_id,
                server_sequence,
                saved_at,
            };
            let mut updated = attempt.clone();
            updated.sequence_counter = server_sequence;

            let stored_receipt = idempotency_key
                .clone()
                .map(|key| (key, receipt.clone()));
            if self
                .store
                .update_attempt_with_answer(
                    updated,
                    attempt.sequence_counter,
                    answer,
                    stored_receipt,
                )
                .await?
            {
                return Ok(receipt);
            }
            // Version conflict: some other mutation of this attempt landed
            // first. Re-run the whole gate, the attempt may have closed.
        }
        Err(Error::ConcurrentUpdateConflict { attempt_id })
    }
}
