use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::quiz::QuizDefinition;
use crate::services::completion_service::{CompletionNotice, CompletionSink};
use crate::services::grading_service::{GradingService, ScoreOutcome};
use crate::services::quiz_service::QuizCatalog;
use crate::store::AttemptStore;

/// Snapshot used by the status endpoint: the attempt together with the
/// derived numbers the client renders its advisory countdown from.
#[derive(Debug, Clone)]
pub struct AttemptOverview {
    pub attempt: Attempt,
    pub time_remaining_seconds: i64,
    pub questions_answered: usize,
    pub total_questions: usize,
}

/// Attempt state machine and timer authority.
///
/// All terminal states are reached through [`AttemptService::transition_to`],
/// and elapsed time is always recomputed from `started_at` against the
/// server clock. There is no per-attempt ticking timer anywhere.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn QuizCatalog>,
    completion: Arc<dyn CompletionSink>,
    grading: GradingService,
    cas_retry_limit: u32,
}

impl AttemptService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        completion: Arc<dyn CompletionSink>,
        grading: GradingService,
        cas_retry_limit: u32,
    ) -> Self {
        Self {
            store,
            catalog,
            completion,
            grading,
            cas_retry_limit,
        }
    }

    /// Opens a new attempt. Fails with `AlreadyOpenAttempt` when the student
    /// still has an IN_PROGRESS attempt for this quiz.
    pub async fn start_attempt(
        &self,
        quiz_id: Uuid,
        student_id: Uuid,
    ) -> Result<(Attempt, Arc<QuizDefinition>)> {
        let quiz = self.catalog.get_quiz_definition(quiz_id).await?;
        let attempt = Attempt::new(&quiz, student_id, Utc::now());
        self.store.insert_attempt(attempt.clone()).await?;
        tracing::info!(
            attempt_id = %attempt.id,
            quiz_id = %quiz_id,
            student_id = %student_id,
            duration_seconds = attempt.duration_seconds,
            "attempt started"
        );
        Ok((attempt, quiz))
    }

    pub async fn get_attempt(&self, attempt_id: Uuid) -> Result<Attempt> {
        self.store.get_attempt(attempt_id).await
    }

    /// Lazy expiry gate for reads: reloads the attempt and, when its budget
    /// has run out, closes it first. An expired attempt is never observed as
    /// IN_PROGRESS again.
    pub async fn refresh(&self, attempt_id: Uuid) -> Result<Attempt> {
        let attempt = self.store.get_attempt(attempt_id).await?;
        if !attempt.is_overdue(Utc::now()) {
            return Ok(attempt);
        }
        match self.transition_to(attempt_id, AttemptStatus::Expired).await {
            Ok((expired, _)) => Ok(expired),
            // A concurrent caller closed it first; the result is the same.
            Err(Error::InvalidTransition { .. }) => self.store.get_attempt(attempt_id).await,
            Err(e) => Err(e),
        }
    }

    /// Expiry gate for mutating callers. Rejects the triggering request with
    /// `AttemptExpired` when the budget ran out (expiring the attempt as a
    /// side effect, before the caller's mutation is even considered) and
    /// with `AttemptClosed` for any other terminal attempt.
    pub async fn ensure_open(&self, attempt_id: Uuid) -> Result<Attempt> {
        let attempt = self.store.get_attempt(attempt_id).await?;
        if attempt.is_overdue(Utc::now()) {
            match self.transition_to(attempt_id, AttemptStatus::Expired).await {
                Ok(_) | Err(Error::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
            return Err(Error::AttemptExpired { attempt_id });
        }
        if attempt.status.is_terminal() {
            return Err(Error::AttemptClosed {
                attempt_id,
                status: attempt.status,
            });
        }
        Ok(attempt)
    }

    /// The single choke point into SUBMITTED, EXPIRED or TERMINATED.
    ///
    /// Score and completion percent are computed from the answers persisted
    /// so far and written together with the status in one conditional
    /// update, so exactly one caller ever lands a terminal transition; the
    /// losers get `InvalidTransition`. The completion collaborator is
    /// notified only after that write has committed.
    pub async fn transition_to(
        &self,
        attempt_id: Uuid,
        target: AttemptStatus,
    ) -> Result<(Attempt, ScoreOutcome)> {
        if !target.is_terminal() {
            return Err(Error::Internal(format!(
                "transition target {} is not terminal",
                target
            )));
        }

        let mut quiz: Option<Arc<QuizDefinition>> = None;
        for _ in 0..=self.cas_retry_limit {
            let attempt = self.store.get_attempt(attempt_id).await?;
            if attempt.status.is_terminal() {
                return Err(Error::InvalidTransition {
                    attempt_id,
                    status: attempt.status,
                });
            }

            let quiz_def = match quiz.clone() {
                Some(q) => q,
                None => {
                    let q = self.catalog.get_quiz_definition(attempt.quiz_id).await?;
                    quiz = Some(Arc::clone(&q));
                    q
                }
            };
            let answers = self.store.list_answers(attempt_id).await?;
            let outcome = self.grading.score(&quiz_def, &answers);

            let mut updated = attempt.clone();
            updated.status = target;
            updated.final_score = Some(outcome.final_score);
            updated.completion_percent = Some(outcome.completion_percent);
            updated.finished_at = Some(Utc::now());
            updated.sequence_counter = attempt.sequence_counter + 1;

            if self
                .store
                .update_attempt(updated.clone(), attempt.sequence_counter)
                .await?
            {
                tracing::info!(
                    attempt_id = %attempt_id,
                    status = %target,
                    final_score = outcome.final_score,
                    completion_percent = outcome.completion_percent,
                    "attempt closed"
                );
                self.spawn_completion_notice(&updated, &outcome);
                return Ok((updated, outcome));
            }
            // Version conflict: another mutation landed between our read and
            // write. Reload and try again.
        }
        Err(Error::ConcurrentUpdateConflict { attempt_id })
    }

    /// Explicit student submit. The expiry gate runs first, so a submit
    /// arriving after the budget is rejected and the attempt expires
    /// instead.
    pub async fn submit_attempt(&self, attempt_id: Uuid) -> Result<(Attempt, ScoreOutcome)> {
        self.ensure_open(attempt_id).await?;
        self.transition_to(attempt_id, AttemptStatus::Submitted)
            .await
    }

    /// Eager expiry for idle attempts nobody touches. Returns how many were
    /// closed this pass.
    pub async fn sweep_overdue(&self) -> Result<usize> {
        let overdue = self.store.list_overdue(Utc::now()).await?;
        let mut closed = 0usize;
        for attempt in overdue {
            match self.transition_to(attempt.id, AttemptStatus::Expired).await {
                Ok(_) => closed += 1,
                // Lost the race to a concurrent submit/expiry; already closed.
                Err(Error::InvalidTransition { .. }) => {}
                Err(e) => {
                    tracing::error!(attempt_id = %attempt.id, error = ?e, "sweep failed to expire attempt");
                }
            }
        }
        if closed > 0 {
            tracing::info!(closed, "expiry sweep closed idle attempts");
        }
        Ok(closed)
    }

    /// Liveness ping. Runs the expiry gate like every other touch, then
    /// records the heartbeat without advancing the mutation counter.
    pub async fn heartbeat(&self, attempt_id: Uuid) -> Result<Attempt> {
        let attempt = self.ensure_open(attempt_id).await?;
        self.store.record_heartbeat(attempt_id, Utc::now()).await?;
        Ok(attempt)
    }

    /// Status snapshot for the UI, after the lazy expiry gate.
    pub async fn attempt_overview(&self, attempt_id: Uuid) -> Result<AttemptOverview> {
        let attempt = self.refresh(attempt_id).await?;
        let quiz = self.catalog.get_quiz_definition(attempt.quiz_id).await?;
        let answers = self.store.list_answers(attempt_id).await?;
        let time_remaining_seconds = if attempt.status.is_terminal() {
            0
        } else {
            attempt.remaining_seconds(Utc::now())
        };
        Ok(AttemptOverview {
            time_remaining_seconds,
            questions_answered: answers.len(),
            total_questions: quiz.total_questions(),
            attempt,
        })
    }

    fn spawn_completion_notice(&self, attempt: &Attempt, outcome: &ScoreOutcome) {
        let sink = Arc::clone(&self.completion);
        let notice = CompletionNotice {
            attempt_id: attempt.id,
            student_id: attempt.student_id,
            course_id: attempt.course_id,
            final_score: outcome.final_score,
            completion_percent: outcome.completion_percent,
        };
        tokio::spawn(async move {
            if let Err(e) = sink.notify_completion(notice.clone()).await {
                // The attempt is already durably closed; the collaborator
                // owns any retry policy.
                tracing::error!(
                    attempt_id = %notice.attempt_id,
                    error = ?e,
                    "completion notification failed"
                );
            }
        });
    }
}
