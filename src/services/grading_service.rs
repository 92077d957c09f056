use crate::models::answer::{Answer, AnswerValue};
use crate::models::quiz::{AnswerKey, QuizDefinition};

/// Final numbers for a closed attempt. `final_score` and
/// `completion_percent` are both 0..=100.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub earned_points: u32,
    pub max_points: u32,
    pub final_score: f64,
    pub completion_percent: f64,
    pub answered: usize,
    pub total: usize,
}

/// Pure scoring over the quiz's answer key. Runs only at terminal
/// transition, never during autosave.
#[derive(Debug, Clone)]
pub struct GradingService {
    default_tolerance: f64,
}

impl GradingService {
    pub fn new(default_tolerance: f64) -> Self {
        Self { default_tolerance }
    }

    pub fn score(&self, quiz: &QuizDefinition, answers: &[Answer]) -> ScoreOutcome {
        let total = quiz.total_questions();
        let max_points = quiz.max_points();
        let mut earned_points: u32 = 0;
        let mut answered: usize = 0;

        for question in &quiz.questions {
            let Some(answer) = answers.iter().find(|a| a.question_id == question.id) else {
                // Unanswered counts as incorrect.
                continue;
            };
            answered += 1;
            if self.matches(&question.key, &answer.value) {
                earned_points += question.points;
            }
        }

        let final_score = if max_points > 0 {
            f64::from(earned_points) / f64::from(max_points) * 100.0
        } else {
            0.0
        };
        let completion_percent = if total > 0 {
            answered as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        ScoreOutcome {
            earned_points,
            max_points,
            final_score,
            completion_percent,
            answered,
            total,
        }
    }

    fn matches(&self, key: &AnswerKey, value: &AnswerValue) -> bool {
        match (key, value) {
            (AnswerKey::SingleChoice { correct, .. }, AnswerValue::Choice { selected }) => {
                selected == correct
            }
            (AnswerKey::MultipleChoice { correct, .. }, AnswerValue::Choices { selected }) => {
                selected == correct
            }
            (
                AnswerKey::Numeric {
                    expected,
                    tolerance,
                },
                AnswerValue::Numeric { value },
            ) => {
                let tolerance = tolerance.unwrap_or(self.default_tolerance);
                (value - expected).abs() <= tolerance
            }
            (AnswerKey::FreeText { accepted }, AnswerValue::Text { value }) => {
                let given = value.trim().to_lowercase();
                accepted.iter().any(|a| a.trim().to_lowercase() == given)
            }
            // A value of the wrong shape for the question is just wrong.
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn quiz() -> QuizDefinition {
        QuizDefinition {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "grading test".to_string(),
            duration_seconds: 600,
            questions: vec![
                crate::models::quiz::QuizQuestion {
                    id: 1,
                    prompt: "2 + 2?".to_string(),
                    points: 1,
                    key: AnswerKey::SingleChoice {
                        options: vec!["3".into(), "4".into(), "5".into()],
                        correct: 1,
                    },
                },
                crate::models::quiz::QuizQuestion {
                    id: 2,
                    prompt: "Even numbers".to_string(),
                    points: 2,
                    key: AnswerKey::MultipleChoice {
                        options: vec!["1".into(), "2".into(), "3".into(), "4".into()],
                        correct: BTreeSet::from([1, 3]),
                    },
                },
                crate::models::quiz::QuizQuestion {
                    id: 3,
                    prompt: "Pi, two decimals".to_string(),
                    points: 1,
                    key: AnswerKey::Numeric {
                        expected: 3.14,
                        tolerance: Some(0.005),
                    },
                },
                crate::models::quiz::QuizQuestion {
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

    fn answer(attempt_id: Uuid, question_id: u32, value: AnswerValue) -> Answer {
        Answer {
            attempt_id,
            question_id,
            value,
            client_sequence: 1,
            server_sequence: 1,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn three_of_four_correct_scores_75() {
        let quiz = quiz();
        let attempt_id = Uuid::new_v4();
        let answers = vec![
            answer(attempt_id, 1, AnswerValue::Choice { selected: 1 }),
            answer(
                attempt_id,
                2,
                AnswerValue::Choices {
                    selected: BTreeSet::from([1, 3]),
                },
            ),
            answer(attempt_id, 3, AnswerValue::Numeric { value: 3.1416 }),
            // question 4 left blank
        ];

        let outcome = GradingService::new(1e-6).score(&quiz, &answers);
        assert_eq!(outcome.earned_points, 4);
        assert_eq!(outcome.max_points, 5);
        assert_eq!(outcome.answered, 3);
        assert_eq!(outcome.completion_percent, 75.0);
        assert_eq!(outcome.final_score, 80.0);
    }

    #[test]
    fn nothing_answered_scores_zero() {
        let outcome = GradingService::new(1e-6).score(&quiz(), &[]);
        assert_eq!(outcome.earned_points, 0);
        assert_eq!(outcome.final_score, 0.0);
        assert_eq!(outcome.completion_percent, 0.0);
    }

    #[test]
    fn numeric_tolerance_falls_back_to_default() {
        let quiz = QuizDefinition {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "numeric".to_string(),
            duration_seconds: 60,
            questions: vec![crate::models::quiz::QuizQuestion {
                id: 1,
                prompt: "One third".to_string(),
                points: 1,
                key: AnswerKey::Numeric {
                    expected: 1.0 / 3.0,
                    tolerance: None,
                },
            }],
        };
        let attempt_id = Uuid::new_v4();
        let close = vec![answer(attempt_id, 1, AnswerValue::Numeric { value: 0.3334 })];

        let strict = GradingService::new(1e-6).score(&quiz, &close);
        assert_eq!(strict.earned_points, 0);

        let loose = GradingService::new(0.001).score(&quiz, &close);
        assert_eq!(loose.earned_points, 1);
    }

    #[test]
    fn free_text_match_is_normalized() {
        let quiz = quiz();
        let attempt_id = Uuid::new_v4();
        let answers = vec![answer(
            attempt_id,
            4,
            AnswerValue::Text {
                value: "  paris ".to_string(),
            },
        )];
        let outcome = GradingService::new(1e-6).score(&quiz, &answers);
        assert_eq!(outcome.earned_points, 1);
    }

    #[test]
    fn wrong_value_shape_is_incorrect() {
        let quiz = quiz();
        let attempt_id = Uuid::new_v4();
        let answers = vec![answer(
            attempt_id,
            1,
            AnswerValue::Text {
                value: "4".to_string(),
            },
        )];
        let outcome = GradingService::new(1e-6).score(&quiz, &answers);
        assert_eq!(outcome.earned_points, 0);
        assert_eq!(outcome.answered, 1);
    }
}
