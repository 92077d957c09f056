mod common;

use serde_json::json;
use std::time::Duration;

use common::{sample_quiz, test_app, test_app_with};
use lms_backend::config::EngineSettings;
use lms_backend::error::Error;
use lms_backend::models::answer::AnswerValue;
use lms_backend::models::attempt::AttemptStatus;
use lms_backend::models::violation::ViolationKind;
use lms_backend::store::AttemptStore;

/// Two autosaves for different questions racing on the same attempt: neither
/// update may be lost, and both land with distinct server sequences.
#[tokio::test]
async fn concurrent_saves_on_distinct_questions_both_land() {
    let app = test_app(sample_quiz(600));
    let attempt_id = app.start().await;

    let autosave_a = app.state.autosave_service.clone();
    let autosave_b = app.state.autosave_service.clone();
    let a = tokio::spawn(async move {
        autosave_a
            .save_answer(attempt_id, 1, AnswerValue::Choice { selected: 1 }, 1, None)
            .await
    });
    let b = tokio::spawn(async move {
        autosave_b
            .save_answer(attempt_id, 2, AnswerValue::Choice { selected: 0 }, 1, None)
            .await
    });

    let receipt_a = a.await.unwrap().unwrap();
    let receipt_b = b.await.unwrap().unwrap();
    assert_ne!(receipt_a.server_sequence, receipt_b.server_sequence);

    let attempt = app
        .state
        .attempt_service
        .get_attempt(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.sequence_counter, 2);

    let answers = app.state.store.list_answers(attempt_id).await.unwrap();
    assert_eq!(answers.len(), 2);
}

/// Accepted mutations of one attempt are totally ordered by server sequence.
#[tokio::test]
async fn server_sequences_are_strictly_increasing() {
    let app = test_app(sample_quiz(600));
    let attempt_id = app.start().await;

    let mut last = 0u64;
    for client_sequence in 1..=5u64 {
        let receipt = app
            .state
            .autosave_service
            .save_answer(
                attempt_id,
                1,
                AnswerValue::Choice {
                    selected: (client_sequence % 3) as u32,
                },
                client_sequence,
                None,
            )
            .await
            .unwrap();
        assert!(receipt.server_sequence > last);
        last = receipt.server_sequence;
    }
    assert_eq!(last, 5);
}

/// A burst of violation reports beyond the threshold terminates the attempt
/// exactly once: one terminal transition, one completion notice.
#[tokio::test]
async fn concurrent_violation_burst_terminates_once() {
    let app = test_app_with(
        sample_quiz(600),
        EngineSettings {
            cas_retry_limit: 10,
            ..EngineSettings::default()
        },
    );
    let attempt_id = app.start().await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let violations = app.state.violation_service.clone();
        handles.push(tokio::spawn(async move {
            violations
                .record_violation(attempt_id, ViolationKind::VisibilityHidden)
                .await
        }));
    }
    let mut terminations = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        if outcome.terminated {
            terminations += 1;
        }
    }
    assert!(terminations >= 1);

    let attempt = app
        .state
        .attempt_service
        .get_attempt(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Terminated);
    assert!(attempt.final_score.is_some());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.sink.received().len(), 1);
}

/// Expiry racing an explicit submit: whoever lands first wins, the attempt
/// ends in exactly one terminal state and the other caller sees it closed.
#[tokio::test]
async fn submit_racing_the_sweep_closes_exactly_once() {
    let app = test_app(sample_quiz(0));
    let attempt_id = app.start().await;

    let attempts_a = app.state.attempt_service.clone();
    let attempts_b = app.state.attempt_service.clone();
    let submit = tokio::spawn(async move { attempts_a.submit_attempt(attempt_id).await });
    let sweep = tokio::spawn(async move { attempts_b.sweep_overdue().await });

    // The submit must lose: its expiry gate fires first.
    let submit_result = submit.await.unwrap();
    assert!(matches!(
        submit_result,
        Err(Error::AttemptExpired { .. }) | Err(Error::AttemptClosed { .. })
    ));
    sweep.await.unwrap().unwrap();

    let attempt = app
        .state
        .attempt_service
        .get_attempt(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Expired);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.sink.received().len(), 1);
}

/// Violations reported after closure stay in the audit trail but never
/// advance the count or reopen anything.
#[tokio::test]
async fn violations_after_closure_are_audit_only() {
    let app = test_app(sample_quiz(600));
    let attempt_id = app.start().await;

    app.state
        .attempt_service
        .submit_attempt(attempt_id)
        .await
        .unwrap();

    let outcome = app
        .state
        .violation_service
        .record_violation(attempt_id, ViolationKind::Blur)
        .await
        .unwrap();
    assert_eq!(outcome.violation_count, 0);
    assert!(!outcome.terminated);

    let events = app.state.store.list_violations(attempt_id).await.unwrap();
    assert_eq!(events.len(), 1);

    let attempt = app
        .state
        .attempt_service
        .get_attempt(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Submitted);
    assert_eq!(attempt.violation_count, 0);
}

/// The terminal numbers never change once written, even if a stale caller
/// tries to close the attempt again.
#[tokio::test]
async fn terminal_numbers_are_written_exactly_once() {
    let app = test_app(sample_quiz(600));
    let attempt_id = app.start().await;

    app.state
        .autosave_service
        .save_answer(attempt_id, 1, AnswerValue::Choice { selected: 1 }, 1, None)
        .await
        .unwrap();
    let (closed, _) = app
        .state
        .attempt_service
        .submit_attempt(attempt_id)
        .await
        .unwrap();
    let first_score = closed.final_score;

    let err = app
        .state
        .attempt_service
        .transition_to(attempt_id, AttemptStatus::Terminated)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let attempt = app
        .state
        .attempt_service
        .get_attempt(attempt_id)
        .await
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Submitted);
    assert_eq!(attempt.final_score, first_score);
}

/// `json!` round-trip sanity for the wire encoding of answer values used by
/// the client.
#[test]
fn answer_value_wire_shape() {
    let value: AnswerValue =
        serde_json::from_value(json!({"kind": "numeric", "value": 3.14})).unwrap();
    assert_eq!(value, AnswerValue::Numeric { value: 3.14 });
}
