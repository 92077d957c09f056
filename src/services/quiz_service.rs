use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz::QuizDefinition;

/// Read-only quiz definition provider. Course and quiz authoring live
/// elsewhere; a definition is assumed immutable for the lifetime of any
/// attempt against it.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    async fn get_quiz_definition(&self, quiz_id: Uuid) -> Result<Arc<QuizDefinition>>;
}

/// In-memory registry, loaded from a JSON catalog file at startup.
#[derive(Debug, Default)]
pub struct InMemoryQuizCatalog {
    quizzes: RwLock<HashMap<Uuid, Arc<QuizDefinition>>>,
}

impl InMemoryQuizCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, quiz: QuizDefinition) {
        let mut quizzes = self.quizzes.write().expect("quiz catalog lock poisoned");
        quizzes.insert(quiz.id, Arc::new(quiz));
    }

    /// Loads a catalog file containing a JSON array of quiz definitions.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let quizzes: Vec<QuizDefinition> = serde_json::from_str(&raw)?;
        let count = quizzes.len();
        for quiz in quizzes {
            self.register(quiz);
        }
        Ok(count)
    }
}

#[async_trait]
impl QuizCatalog for InMemoryQuizCatalog {
    async fn get_quiz_definition(&self, quiz_id: Uuid) -> Result<Arc<QuizDefinition>> {
        let quizzes = self.quizzes.read().expect("quiz catalog lock poisoned");
        quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or(Error::QuizDefinitionUnavailable { quiz_id })
    }
}
