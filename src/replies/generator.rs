//! Reply generator: drafts a reply and reserves an agent to own it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::emails::Email;
use crate::error::LlmError;
use crate::llm::CompletionClient;
use crate::pipeline::balancer::AgentLoadBalancer;
use crate::pipeline::prompts::reply_prompt;
use crate::replies::feedback::{FeedbackItem, clarity_feedback, tone_feedback};

pub const DEFAULT_TONE: &str = "professional";
pub const DEFAULT_STYLE: &str = "detailed";

/// Fixed confidence reported for generated drafts.
const DRAFT_CONFIDENCE: f64 = 0.85;

/// What kind of reply to draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyRequest {
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
    #[serde(default)]
    pub include_tone_feedback: bool,
    #[serde(default)]
    pub include_clarity_feedback: bool,
}

/// A generated reply awaiting human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub email_id: String,
    pub generated_reply: String,
    pub tone: String,
    pub style: String,
    pub tone_feedback: Vec<FeedbackItem>,
    pub clarity_feedback: Vec<FeedbackItem>,
    pub confidence_score: f64,
    pub model_used: String,
    pub processing_time_ms: u64,
    /// Agent reserved through the load balancer.
    pub assigned_to: Option<String>,
}

pub struct ReplyGenerator {
    llm: Arc<dyn CompletionClient>,
    balancer: Arc<AgentLoadBalancer>,
    completion_timeout: Duration,
}

impl ReplyGenerator {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        balancer: Arc<AgentLoadBalancer>,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            balancer,
            completion_timeout,
        }
    }

    pub fn balancer(&self) -> &Arc<AgentLoadBalancer> {
        &self.balancer
    }

    /// Draft a reply for `email`.
    ///
    /// An agent is reserved before the completion call and handed back if the
    /// call fails.
    pub async fn generate(
        &self,
        email: &Email,
        request: &ReplyRequest,
    ) -> Result<ReplyDraft, LlmError> {
        let started = Instant::now();
        let assigned_to = self.balancer.pick_agent();

        let tone = request.tone.as_deref().unwrap_or(DEFAULT_TONE);
        let style = request.style.as_deref().unwrap_or(DEFAULT_STYLE);
        let prompt = reply_prompt(email, tone, style, request.additional_context.as_deref());

        let reply = match self.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(id = %email.id, error = %e, "Reply generation failed");
                if let Some(agent) = &assigned_to {
                    self.balancer.release(agent);
                }
                return Err(e);
            }
        };

        let draft = ReplyDraft {
            email_id: email.id.clone(),
            tone_feedback: if request.include_tone_feedback {
                tone_feedback(&reply)
            } else {
                Vec::new()
            },
            clarity_feedback: if request.include_clarity_feedback {
                clarity_feedback(&reply)
            } else {
                Vec::new()
            },
            generated_reply: reply,
            tone: tone.to_string(),
            style: style.to_string(),
            confidence_score: DRAFT_CONFIDENCE,
            model_used: self.llm.model_name().to_string(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            assigned_to,
        };

        info!(
            id = %email.id,
            agent = draft.assigned_to.as_deref().unwrap_or("none"),
            elapsed_ms = draft.processing_time_ms,
            "Reply drafted"
        );
        Ok(draft)
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let reply = tokio::time::timeout(self.completion_timeout, self.llm.complete(prompt))
            .await
            .map_err(|_| LlmError::Timeout(self.completion_timeout))??;

        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.provider_name().to_string(),
                reason: "empty reply".to_string(),
            });
        }
        Ok(reply)
    }
}
