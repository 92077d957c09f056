use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

use lms_backend::config::EngineSettings;
use lms_backend::error::Result;
use lms_backend::models::quiz::{AnswerKey, QuizDefinition, QuizQuestion};
use lms_backend::services::completion_service::{CompletionNotice, CompletionSink};
use lms_backend::services::quiz_service::InMemoryQuizCatalog;
use lms_backend::store::MemoryStore;
use lms_backend::AppState;

/// Completion collaborator double that remembers every notice it received.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub notices: Mutex<Vec<CompletionNotice>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<CompletionNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn notify_completion(&self, notice: CompletionNotice) -> Result<()> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Four questions, one point each, so three correct out of four scores 75.
pub fn sample_quiz(duration_seconds: i64) -> QuizDefinition {
    QuizDefinition {
        id: Uuid::new_v4(),
        course_id: Uuid::new_v4(),
        title: "Unit checkpoint".to_string(),
        duration_seconds,
        questions: vec![
            QuizQuestion {
                id: 1,
                prompt: "2 + 2?".to_string(),
                points: 1,
                key: AnswerKey::SingleChoice {
                    options: vec!["3".into(), "4".into(), "5".into()],
                    correct: 1,
                },
            },
            QuizQuestion {
                id: 2,
                prompt: "Select the even numbers".to_string(),
                points: 1,
                key: AnswerKey::MultipleChoice {
                    options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
                    correct: BTreeSet::from([1, 3]),
                },
            },
            QuizQuestion {
                id: 3,
                prompt: "Pi to two decimals".to_string(),
                points: 1,
                key: AnswerKey::Numeric {
                    expected: 3.14,
                    tolerance: Some(0.005),
                },
            },
            QuizQuestion {
                id: 4,
                prompt: "Capital of France".to_string(),
                points: 1,
                key: AnswerKey::FreeText {
                    accepted: vec!["Paris".into()],
                },
            },
        ],
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub sink: Arc<RecordingSink>,
    pub quiz: QuizDefinition,
    pub student_id: Uuid,
}

pub fn test_app_with(quiz: QuizDefinition, settings: EngineSettings) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let catalog = Arc::new(InMemoryQuizCatalog::new());
    catalog.register(quiz.clone());
    let sink = Arc::new(RecordingSink::default());
    let completion: Arc<dyn CompletionSink> = sink.clone();
    let state = AppState::new(store, catalog, completion, settings);
    let router = lms_backend::routes::router(state.clone(), 10_000);
    TestApp {
        state,
        router,
        sink,
        quiz,
        student_id: Uuid::new_v4(),
    }
}

pub fn test_app(quiz: QuizDefinition) -> TestApp {
    test_app_with(quiz, EngineSettings::default())
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        student_id: Uuid,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-student-id", student_id.to_string())
            .header("x-role", "student");
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn start(&self) -> Uuid {
        let (status, body) = self
            .request(
                "POST",
                "/api/attempts/start",
                self.student_id,
                Some(serde_json::json!({ "quiz_id": self.quiz.id })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "start failed: {body}");
        Uuid::parse_str(body["attempt_id"].as_str().unwrap()).unwrap()
    }

    pub async fn save_answer(
        &self,
        attempt_id: Uuid,
        question_id: u32,
        value: JsonValue,
        client_sequence: u64,
    ) -> (StatusCode, JsonValue) {
        self.request(
            "PATCH",
            &format!("/api/attempts/{attempt_id}/answer"),
            self.student_id,
            Some(serde_json::json!({
                "question_id": question_id,
                "value": value,
                "client_sequence": client_sequence,
            })),
        )
        .await
    }
}
