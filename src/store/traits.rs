//! `Store` trait: single async interface for all persistence.

use async_trait::async_trait;

use crate::emails::{Email, EmailIntent, EmailStatus};
use crate::error::DatabaseError;
use crate::teams::{Team, User};

/// Field filter for email listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailFilter {
    pub status: Option<EmailStatus>,
    pub assigned_team: Option<String>,
    pub assigned_user: Option<String>,
    pub intent: Option<EmailIntent>,
}

impl EmailFilter {
    pub fn status(status: EmailStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn team(team_id: impl Into<String>) -> Self {
        Self {
            assigned_team: Some(team_id.into()),
            ..Default::default()
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            assigned_user: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn intent(intent: EmailIntent) -> Self {
        Self {
            intent: Some(intent),
            ..Default::default()
        }
    }

    pub fn matches(&self, email: &Email) -> bool {
        self.status.is_none_or(|s| email.status == s)
            && self
                .assigned_team
                .as_ref()
                .is_none_or(|t| email.assigned_team.as_ref() == Some(t))
            && self
                .assigned_user
                .as_ref()
                .is_none_or(|u| email.assigned_user.as_ref() == Some(u))
            && self.intent.is_none_or(|i| email.intent == Some(i))
    }
}

/// Backend-agnostic document store for emails, teams, and users.
///
/// Every `save_*` is an idempotent upsert keyed by the record id. Listings
/// return records in insertion order.
#[async_trait]
pub trait Store: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Emails ──────────────────────────────────────────────────────

    async fn save_email(&self, email: &Email) -> Result<(), DatabaseError>;

    async fn get_email(&self, id: &str) -> Result<Option<Email>, DatabaseError>;

    /// Look up an email by its channel-native message id.
    async fn find_email_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<Email>, DatabaseError>;

    async fn list_emails(&self, filter: &EmailFilter) -> Result<Vec<Email>, DatabaseError>;

    async fn count_emails_by_status(&self, status: EmailStatus) -> Result<u64, DatabaseError>;

    // ── Teams ───────────────────────────────────────────────────────

    async fn save_team(&self, team: &Team) -> Result<(), DatabaseError>;

    async fn get_team(&self, id: &str) -> Result<Option<Team>, DatabaseError>;

    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, DatabaseError>;

    /// Atomically add one to a team's `total_emails_handled`.
    ///
    /// Returns `false` when no team has that id.
    async fn increment_team_load(&self, id: &str) -> Result<bool, DatabaseError>;

    /// Teams whose handled intents contain `intent`, any status.
    async fn teams_handling(&self, intent: EmailIntent) -> Result<Vec<Team>, DatabaseError>;

    async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;
}
