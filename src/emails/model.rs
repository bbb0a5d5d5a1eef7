//! Email data model: lifecycle states, intents, priorities, notes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::types::{CustomerTier, Sentiment, SentimentAnalysisResult, Urgency};

// ── Enumerations ────────────────────────────────────────────────────

/// Lifecycle state of an email.
///
/// Main line: `Received → Processing → IntentDetected → Assigned →
/// InProgress → Responded → Closed`. `Escalated` is a side branch reachable
/// from any non-terminal state through an explicit command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Received,
    Processing,
    IntentDetected,
    Assigned,
    InProgress,
    Responded,
    Closed,
    Escalated,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 8] = [
        Self::Received,
        Self::Processing,
        Self::IntentDetected,
        Self::Assigned,
        Self::InProgress,
        Self::Responded,
        Self::Closed,
        Self::Escalated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Processing => "PROCESSING",
            Self::IntentDetected => "INTENT_DETECTED",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Responded => "RESPONDED",
            Self::Closed => "CLOSED",
            Self::Escalated => "ESCALATED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Awaiting work from a human (counted as pending in statistics).
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Received | Self::Assigned | Self::InProgress)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Responded | Self::Closed)
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == upper)
            .ok_or_else(|| format!("Unknown email status: {}", s))
    }
}

/// Customer purpose of an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailIntent {
    RefundRequest,
    BugReport,
    FeatureRequest,
    GeneralInquiry,
    BillingIssue,
    TechnicalSupport,
    Complaint,
    AccountAccess,
    #[default]
    Unknown,
}

impl EmailIntent {
    pub const ALL: [EmailIntent; 9] = [
        Self::RefundRequest,
        Self::BugReport,
        Self::FeatureRequest,
        Self::GeneralInquiry,
        Self::BillingIssue,
        Self::TechnicalSupport,
        Self::Complaint,
        Self::AccountAccess,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundRequest => "REFUND_REQUEST",
            Self::BugReport => "BUG_REPORT",
            Self::FeatureRequest => "FEATURE_REQUEST",
            Self::GeneralInquiry => "GENERAL_INQUIRY",
            Self::BillingIssue => "BILLING_ISSUE",
            Self::TechnicalSupport => "TECHNICAL_SUPPORT",
            Self::Complaint => "COMPLAINT",
            Self::AccountAccess => "ACCOUNT_ACCESS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Short description used when prompting the classifier.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RefundRequest => "Customer wants a refund",
            Self::BugReport => "Customer reports a bug or defect",
            Self::FeatureRequest => "Customer asks for a new feature or capability",
            Self::GeneralInquiry => "General questions about the product or service",
            Self::BillingIssue => "Billing, invoice or payment problems",
            Self::TechnicalSupport => "Technical problems or how-to questions",
            Self::Complaint => "Customer complaint or dissatisfaction",
            Self::AccountAccess => "Login, password or account access problems",
            Self::Unknown => "None of the above",
        }
    }
}

impl std::fmt::Display for EmailIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmailIntent {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .ok_or_else(|| format!("Unknown intent: {}", s))
    }
}

/// Handling priority, ordered from least to most pressing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

// ── Notes & metadata ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteKind {
    InternalNote,
    CustomerComment,
    SystemNote,
    AssignmentNote,
}

/// One entry in an email's append-only note log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNote {
    pub id: String,
    pub email_id: String,
    pub user_id: String,
    pub content: String,
    pub kind: NoteKind,
    pub created_at: DateTime<Utc>,
}

/// Classification details attached after sentiment analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMetadata {
    pub language: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub urgency: Urgency,
    pub customer_tier: CustomerTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model_used: Option<String>,
}

impl EmailMetadata {
    pub fn from_sentiment(result: &SentimentAnalysisResult, model: Option<&str>) -> Self {
        Self {
            language: result.language.clone(),
            sentiment: result.sentiment,
            sentiment_score: result.score,
            urgency: result.urgency,
            customer_tier: result.customer_tier,
            ai_model_used: model.map(String::from),
        }
    }
}

// ── Inbound envelope ────────────────────────────────────────────────

/// Envelope fields carried by a "new email received" event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEmail {
    /// Channel-native message identifier; generated when absent.
    #[serde(default)]
    pub message_id: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
}

// ── Email ───────────────────────────────────────────────────────────

/// A tracked support email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub message_id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub attachments: Vec<String>,

    pub status: EmailStatus,
    #[serde(default)]
    pub intent: Option<EmailIntent>,
    #[serde(default)]
    pub intent_confidence: Option<f64>,
    pub priority: Priority,

    #[serde(default)]
    pub assigned_team: Option<String>,
    #[serde(default)]
    pub assigned_user: Option<String>,

    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ai_generated_reply: Option<String>,
    #[serde(default)]
    pub final_reply: Option<String>,

    #[serde(default)]
    pub notes: Vec<EmailNote>,
    #[serde(default)]
    pub metadata: Option<EmailMetadata>,
}

impl Email {
    /// Create a freshly received email from an inbound envelope.
    pub fn new(envelope: NewEmail) -> Self {
        let message_id = envelope
            .message_id
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            message_id,
            from: envelope.from,
            to: envelope.to,
            cc: envelope.cc,
            bcc: envelope.bcc,
            subject: envelope.subject,
            body: envelope.body,
            html_body: envelope.html_body,
            attachments: envelope.attachments,
            status: EmailStatus::Received,
            intent: None,
            intent_confidence: None,
            priority: Priority::Medium,
            assigned_team: None,
            assigned_user: None,
            received_at: Utc::now(),
            processed_at: None,
            assigned_at: None,
            responded_at: None,
            ai_generated_reply: None,
            final_reply: None,
            notes: Vec::new(),
            metadata: None,
        }
    }

    /// Record the classifier's verdict and move to `IntentDetected`.
    pub fn record_intent(&mut self, intent: EmailIntent, confidence: f64) {
        self.intent = Some(intent);
        self.intent_confidence = Some(confidence);
        self.status = EmailStatus::IntentDetected;
    }

    /// Route to a team. Stamps `assigned_at` and moves to `Assigned`.
    pub fn assign_team(&mut self, team_id: impl Into<String>) {
        self.assigned_team = Some(team_id.into());
        self.assigned_at = Some(Utc::now());
        self.status = EmailStatus::Assigned;
    }

    /// Route to an individual user. Stamps `assigned_at` and moves to `Assigned`.
    pub fn assign_user(&mut self, user_id: impl Into<String>) {
        self.assigned_user = Some(user_id.into());
        self.assigned_at = Some(Utc::now());
        self.status = EmailStatus::Assigned;
    }

    /// Append a note. Notes are never edited or removed.
    pub fn add_note(&mut self, user_id: &str, content: impl Into<String>, kind: NoteKind) {
        self.notes.push(EmailNote {
            id: Uuid::new_v4().to_string(),
            email_id: self.id.clone(),
            user_id: user_id.to_string(),
            content: content.into(),
            kind,
            created_at: Utc::now(),
        });
    }

    /// Seconds between receipt and response, once responded.
    pub fn response_secs(&self) -> Option<i64> {
        self.responded_at
            .map(|r| r.signed_duration_since(self.received_at).num_seconds().max(0))
    }
}
