//! Team and user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emails::EmailIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

/// A group of agents that handles a set of intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub handled_intents: Vec<EmailIntent>,
    pub status: TeamStatus,
    /// Workload counter used for least-loaded routing.
    pub total_emails_handled: u64,
    /// Replies sent for emails routed to this team.
    #[serde(default)]
    pub total_responses: u64,
    #[serde(default)]
    pub average_response_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handled_intents: Vec<EmailIntent>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            manager_id: None,
            member_ids: Vec::new(),
            handled_intents,
            status: TeamStatus::Active,
            total_emails_handled: 0,
            total_responses: 0,
            average_response_secs: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TeamStatus::Active
    }

    pub fn handles(&self, intent: EmailIntent) -> bool {
        self.handled_intents.contains(&intent)
    }

    /// Fold one completed response into the running mean.
    pub fn record_response(&mut self, response_secs: f64) {
        let n = self.total_responses as f64;
        self.average_response_secs = Some(match self.average_response_secs {
            Some(avg) if self.total_responses > 0 => (avg * n + response_secs) / (n + 1.0),
            _ => response_secs,
        });
        self.total_responses += 1;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Manager,
    Agent,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
    Busy,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(default)]
    pub team_ids: Vec<String>,
    #[serde(default)]
    pub expertise: Vec<EmailIntent>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            display_name: display_name.into(),
            role,
            status: UserStatus::Active,
            team_ids: Vec::new(),
            expertise: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_team_is_active_and_idle() {
        let team = Team::new("billing-team", "Billing", vec![EmailIntent::BillingIssue]);
        assert!(team.is_active());
        assert_eq!(team.total_emails_handled, 0);
        assert!(team.handles(EmailIntent::BillingIssue));
        assert!(!team.handles(EmailIntent::BugReport));
    }

    #[test]
    fn running_mean_of_response_times() {
        let mut team = Team::new("support-team", "Support", vec![]);
        team.record_response(60.0);
        assert_eq!(team.average_response_secs, Some(60.0));
        team.record_response(120.0);
        assert_eq!(team.average_response_secs, Some(90.0));
        team.record_response(30.0);
        assert_eq!(team.average_response_secs, Some(70.0));
        assert_eq!(team.total_responses, 3);
    }
}
