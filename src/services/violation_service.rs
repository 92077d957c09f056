use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::attempt::AttemptStatus;
use crate::models::violation::{ViolationEvent, ViolationKind};
use crate::services::attempt_service::AttemptService;
use crate::store::AttemptStore;

/// Result of recording one anti-leave signal.
#[derive(Debug, Clone)]
pub struct ViolationOutcome {
    pub violation_count: u32,
    pub terminated: bool,
}

/// Anti-leave monitor. Counts focus/visibility-loss signals per attempt and
/// terminates the attempt when the configured threshold is reached. A single
/// violation never closes anything; brief legitimate tab switches survive.
#[derive(Clone)]
pub struct ViolationService {
    store: Arc<dyn AttemptStore>,
    attempts: AttemptService,
    threshold: u32,
    cas_retry_limit: u32,
}

impl ViolationService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        attempts: AttemptService,
        threshold: u32,
        cas_retry_limit: u32,
    ) -> Self {
        Self {
            store,
            attempts,
            threshold: threshold.max(1),
            cas_retry_limit,
        }
    }

    /// Records one violation. The event always lands in the attempt's audit
    /// trail; only an IN_PROGRESS attempt has its count advanced, and the
    /// attempt reaching the threshold is terminated through the state
    /// machine's single choke point.
    pub async fn record_violation(
        &self,
        attempt_id: Uuid,
        kind: ViolationKind,
    ) -> Result<ViolationOutcome> {
        for _ in 0..=self.cas_retry_limit {
            let attempt = self.store.get_attempt(attempt_id).await?;

            if attempt.status.is_terminal() {
                // Closed attempts keep collecting audit events but nothing
                // else happens.
                self.store
                    .append_violation(
                        attempt_id,
                        ViolationEvent::new(kind, attempt.violation_count, Utc::now()),
                    )
                    .await?;
                return Ok(ViolationOutcome {
                    violation_count: attempt.violation_count,
                    terminated: attempt.status == AttemptStatus::Terminated,
                });
            }

            if attempt.is_overdue(Utc::now()) {
                // The budget ran out before this signal; the expiry gate
                // owns the close, and this request is rejected like any
                // other late touch.
                self.store
                    .append_violation(
                        attempt_id,
                        ViolationEvent::new(kind, attempt.violation_count, Utc::now()),
                    )
                    .await?;
                match self
                    .attempts
                    .transition_to(attempt_id, AttemptStatus::Expired)
                    .await
                {
                    Ok(_) | Err(Error::InvalidTransition { .. }) => {}
                    Err(e) => return Err(e),
                }
                return Err(Error::AttemptExpired { attempt_id });
            }

            let new_count = attempt.violation_count + 1;
            let mut updated = attempt.clone();
            updated.violation_count = new_count;
            updated.sequence_counter = attempt.sequence_counter + 1;

            if !self
                .store
                .update_attempt(updated, attempt.sequence_counter)
                .await?
            {
                // Lost the counter race; reload and re-evaluate from scratch.
                continue;
            }

            self.store
                .append_violation(attempt_id, ViolationEvent::new(kind, new_count, Utc::now()))
                .await?;

            if new_count < self.threshold {
                tracing::info!(
                    attempt_id = %attempt_id,
                    ?kind,
                    violation_count = new_count,
                    "anti-leave violation recorded"
                );
                return Ok(ViolationOutcome {
                    violation_count: new_count,
                    terminated: false,
                });
            }

            match self
                .attempts
                .transition_to(attempt_id, AttemptStatus::Terminated)
                .await
            {
                Ok(_) => {}
                // Someone else closed the attempt between our counter write
                // and the transition; it is terminated either way.
                Err(Error::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
            tracing::warn!(
                attempt_id = %attempt_id,
                ?kind,
                violation_count = new_count,
                "anti-leave threshold reached, attempt terminated"
            );
            return Ok(ViolationOutcome {
                violation_count: new_count,
                terminated: true,
            });
        }
        Err(Error::ConcurrentUpdateConflict { attempt_id })
    }
}
