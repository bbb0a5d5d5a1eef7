//! Email service: intake plus the explicit commands and queries around it.
//!
//! Intake dedups by message id, stores the email as `RECEIVED` and runs the
//! triage pipeline inline. Pipeline failures are never surfaced to the
//! caller; the email simply stays `RECEIVED` for the retry sweeper.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::emails::{Email, EmailIntent, EmailStatus, NewEmail, NoteKind, Priority};
use crate::error::ServiceError;
use crate::pipeline::processor::SYSTEM_USER;
use crate::pipeline::TriagePipeline;
use crate::replies::{ReplyDraft, ReplyGenerator, ReplyRequest};
use crate::store::{EmailFilter, Store};

/// Characters of a sent reply quoted in its note.
const REPLY_NOTE_PREVIEW_CHARS: usize = 100;

/// Aggregate counts over all stored emails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailStatistics {
    pub total: u64,
    /// `RECEIVED + ASSIGNED + IN_PROGRESS`.
    pub pending: u64,
    /// `RESPONDED + CLOSED`.
    pub resolved: u64,
    pub by_status: Vec<(EmailStatus, u64)>,
    pub by_intent: Vec<(EmailIntent, u64)>,
    /// Mean seconds from receipt to response over responded emails.
    pub average_response_secs: Option<f64>,
}

pub struct EmailService {
    store: Arc<dyn Store>,
    pipeline: Arc<TriagePipeline>,
    replies: ReplyGenerator,
}

impl EmailService {
    pub fn new(store: Arc<dyn Store>, pipeline: Arc<TriagePipeline>, replies: ReplyGenerator) -> Self {
        Self {
            store,
            pipeline,
            replies,
        }
    }

    // ── Intake ──────────────────────────────────────────────────────

    /// Accept a new email and triage it.
    ///
    /// A message id seen before returns the stored record unchanged.
    pub async fn process_incoming(&self, envelope: NewEmail) -> Result<Email, ServiceError> {
        if let Some(message_id) = envelope.message_id.as_deref().filter(|m| !m.trim().is_empty())
            && let Some(existing) = self.store.find_email_by_message_id(message_id).await?
        {
            warn!(
                id = %existing.id,
                message_id = %message_id,
                "Duplicate message id, returning stored email"
            );
            return Ok(existing);
        }

        let email = Email::new(envelope);
        self.store.save_email(&email).await?;
        info!(id = %email.id, message_id = %email.message_id, "Email received");

        match self.pipeline.run(email.clone()).await {
            Ok(triaged) => Ok(triaged),
            Err(_) => Ok(self.store.get_email(&email.id).await?.unwrap_or(email)),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_email(&self, id: &str) -> Result<Email, ServiceError> {
        self.load(id).await
    }

    pub async fn list_emails(&self, filter: &EmailFilter) -> Result<Vec<Email>, ServiceError> {
        Ok(self.store.list_emails(filter).await?)
    }

    /// Unresolved emails at `HIGH` or `URGENT`, most pressing first.
    pub async fn high_priority_pending(&self) -> Result<Vec<Email>, ServiceError> {
        let mut emails: Vec<Email> = self
            .store
            .list_emails(&EmailFilter::default())
            .await?
            .into_iter()
            .filter(|e| e.priority >= Priority::High && !e.status.is_resolved())
            .collect();
        emails.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.received_at.cmp(&b.received_at))
        });
        Ok(emails)
    }

    pub async fn statistics(&self) -> Result<EmailStatistics, ServiceError> {
        let mut by_status = Vec::with_capacity(EmailStatus::ALL.len());
        for status in EmailStatus::ALL {
            by_status.push((status, self.store.count_emails_by_status(status).await?));
        }
        let sum = |pred: fn(&EmailStatus) -> bool| -> u64 {
            by_status
                .iter()
                .filter(|(s, _)| pred(s))
                .map(|(_, n)| n)
                .sum()
        };
        let total = sum(|_| true);
        let pending = sum(EmailStatus::is_pending);
        let resolved = sum(EmailStatus::is_resolved);

        let emails = self.store.list_emails(&EmailFilter::default()).await?;
        let by_intent = EmailIntent::ALL
            .into_iter()
            .map(|intent| {
                let n = emails.iter().filter(|e| e.intent == Some(intent)).count() as u64;
                (intent, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect();

        let response_times: Vec<i64> = emails.iter().filter_map(Email::response_secs).collect();
        let average_response_secs = (!response_times.is_empty()).then(|| {
            response_times.iter().sum::<i64>() as f64 / response_times.len() as f64
        });

        Ok(EmailStatistics {
            total,
            pending,
            resolved,
            by_status,
            by_intent,
            average_response_secs,
        })
    }

    // ── Commands ────────────────────────────────────────────────────

    pub async fn assign_to_team(&self, email_id: &str, team_id: &str) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;
        let team = self
            .store
            .get_team(team_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Team", team_id))?;

        email.assign_team(&team.id);
        email.add_note(
            SYSTEM_USER,
            format!("Email assigned to team: {}", team.name),
            NoteKind::AssignmentNote,
        );
        self.store.save_email(&email).await?;
        info!(id = %email.id, team = %team.name, "Email assigned to team");
        Ok(email)
    }

    pub async fn assign_to_user(&self, email_id: &str, user_id: &str) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;

        email.assign_user(&user.id);
        email.add_note(
            SYSTEM_USER,
            format!("Email assigned to user: {}", user.display_name),
            NoteKind::AssignmentNote,
        );
        self.store.save_email(&email).await?;
        info!(id = %email.id, user = %user.email, "Email assigned to user");
        Ok(email)
    }

    pub async fn update_status(
        &self,
        email_id: &str,
        status: EmailStatus,
    ) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;

        if status == EmailStatus::Escalated && email.status.is_terminal() {
            return Err(ServiceError::InvalidTransition {
                id: email.id,
                from: email.status.to_string(),
                to: status.to_string(),
            });
        }

        let previous = email.status;
        email.status = status;
        if status == EmailStatus::Responded {
            email.responded_at = Some(Utc::now());
        }
        self.store.save_email(&email).await?;
        info!(id = %email.id, from = %previous, to = %status, "Email status updated");
        Ok(email)
    }

    pub async fn update_priority(
        &self,
        email_id: &str,
        priority: Priority,
    ) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;
        email.priority = priority;
        self.store.save_email(&email).await?;
        Ok(email)
    }

    pub async fn add_note(
        &self,
        email_id: &str,
        user_id: &str,
        content: &str,
        kind: NoteKind,
    ) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;
        email.add_note(user_id, content, kind);
        self.store.save_email(&email).await?;
        Ok(email)
    }

    /// Record the reply a human sent and fold its latency into the team average.
    pub async fn send_reply(
        &self,
        email_id: &str,
        reply: &str,
        user_id: &str,
    ) -> Result<Email, ServiceError> {
        let mut email = self.load(email_id).await?;

        email.final_reply = Some(reply.to_string());
        email.status = EmailStatus::Responded;
        email.responded_at = Some(Utc::now());
        let preview: String = reply.chars().take(REPLY_NOTE_PREVIEW_CHARS).collect();
        email.add_note(user_id, format!("Reply sent: {}", preview), NoteKind::SystemNote);
        self.store.save_email(&email).await?;

        if let (Some(team_id), Some(secs)) = (email.assigned_team.as_deref(), email.response_secs()) {
            match self.store.get_team(team_id).await {
                Ok(Some(mut team)) => {
                    team.record_response(secs as f64);
                    if let Err(e) = self.store.save_team(&team).await {
                        warn!(team_id, error = %e, "Failed to update team response time");
                    }
                }
                Ok(None) => warn!(team_id, "Assigned team no longer exists"),
                Err(e) => warn!(team_id, error = %e, "Failed to load assigned team"),
            }
        }

        info!(id = %email.id, user_id, "Reply sent");
        Ok(email)
    }

    /// Draft a reply with the completion service and attach it to the email.
    pub async fn generate_reply(
        &self,
        email_id: &str,
        request: &ReplyRequest,
    ) -> Result<ReplyDraft, ServiceError> {
        let mut email = self.load(email_id).await?;
        let draft = self.replies.generate(&email, request).await?;

        email.ai_generated_reply = Some(draft.generated_reply.clone());
        email.add_note(
            SYSTEM_USER,
            format!(
                "AI reply drafted for {}",
                draft.assigned_to.as_deref().unwrap_or("unassigned")
            ),
            NoteKind::SystemNote,
        );
        self.store.save_email(&email).await?;
        Ok(draft)
    }

    // ── Administration ──────────────────────────────────────────────

    pub fn assignment_rules(&self) -> Vec<(EmailIntent, String)> {
        self.pipeline.rules().snapshot()
    }

    pub fn set_assignment_rule(&self, intent: EmailIntent, team: &str) -> Result<(), ServiceError> {
        Ok(self.pipeline.rules().set(intent, team)?)
    }

    pub fn agent_loads(&self) -> Vec<(String, u64)> {
        self.replies.balancer().loads()
    }

    async fn load(&self, id: &str) -> Result<Email, ServiceError> {
        self.store
            .get_email(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Email", id))
    }
}
