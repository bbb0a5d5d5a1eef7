//! Shared types for the triage pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::emails::EmailIntent;

// ── Classification enums ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl std::str::FromStr for Sentiment {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            "neutral" => Ok(Self::Neutral),
            _ => Err(format!("Unknown sentiment: {}", s)),
        }
    }
}

/// How quickly the sender needs a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
}

impl std::str::FromStr for Urgency {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown urgency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl std::str::FromStr for CustomerTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Unknown customer tier: {}", s)),
        }
    }
}

// ── Analysis results ────────────────────────────────────────────────

pub const DEFAULT_REASONING: &str = "AI analysis completed";

/// Parsed verdict of the intent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysisResult {
    pub intent: EmailIntent,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_scores: Option<HashMap<EmailIntent, f64>>,
}

impl Default for IntentAnalysisResult {
    fn default() -> Self {
        Self {
            intent: EmailIntent::Unknown,
            confidence: 0.0,
            reasoning: DEFAULT_REASONING.to_string(),
            intent_scores: None,
        }
    }
}

/// Parsed verdict of the sentiment classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysisResult {
    pub sentiment: Sentiment,
    /// Sentiment score in `[-1, 1]`.
    pub score: f64,
    pub urgency: Urgency,
    pub language: String,
    pub customer_tier: CustomerTier,
}

impl Default for SentimentAnalysisResult {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            score: 0.0,
            urgency: Urgency::Low,
            language: "en".to_string(),
            customer_tier: CustomerTier::Standard,
        }
    }
}
