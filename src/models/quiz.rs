use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Immutable quiz definition as served by the catalog collaborator. The
/// engine reads it at attempt creation and grading time; it never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub duration_seconds: i64,
    pub questions: Vec<QuizQuestion>,
}

impl QuizDefinition {
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn max_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn question(&self, question_id: u32) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: u32,
    pub prompt: String,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(flatten)]
    pub key: AnswerKey,
}

fn default_points() -> u32 {
    1
}

/// Per-question answer key. Choice types grade by exact match (set equality
/// for multiple choice), numeric by tolerance, free text by normalized
/// comparison against the accepted spellings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerKey {
    SingleChoice {
        options: Vec<String>,
        correct: u32,
    },
    MultipleChoice {
        options: Vec<String>,
        correct: BTreeSet<u32>,
    },
    Numeric {
        expected: f64,
        /// Overrides the configured default tolerance when present.
        tolerance: Option<f64>,
    },
    FreeText {
        accepted: Vec<String>,
    },
}
