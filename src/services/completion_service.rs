use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::signature::sign_payload;

/// Payload handed to the course-completion collaborator when an attempt
/// reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub attempt_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub final_score: f64,
    pub completion_percent: f64,
}

/// Course-completion trigger. Fire-and-forget from the engine's side: the
/// call happens only after the attempt's terminal state is durably
/// committed, and a failure is the collaborator's to retry.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn notify_completion(&self, notice: CompletionNotice) -> Result<()>;
}

/// Posts the notice as signed JSON to the platform's completion endpoint,
/// which decides about certificates on its own.
#[derive(Clone)]
pub struct WebhookCompletionSink {
    client: Client,
    target_url: Option<String>,
    secret: String,
}

impl WebhookCompletionSink {
    pub fn new(target_url: Option<String>, secret: String) -> Self {
        Self {
            client: Client::new(),
            target_url,
            secret,
        }
    }
}

#[async_trait]
impl CompletionSink for WebhookCompletionSink {
    async fn notify_completion(&self, notice: CompletionNotice) -> Result<()> {
        let Some(url) = &self.target_url else {
            tracing::debug!(attempt_id = %notice.attempt_id, "completion webhook disabled");
            return Ok(());
        };

        let body = serde_json::to_vec(&notice)?;
        let signature = sign_payload(&self.secret, &body);
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .header("X-Signature", signature)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("completion webhook send failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Internal(format!(
                "completion webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
