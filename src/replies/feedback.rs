//! Heuristic reply feedback.

use serde::{Deserialize, Serialize};

/// Replies longer than this many characters get a conciseness hint.
pub const CLARITY_MAX_CHARS: usize = 500;

const EMPATHY_MARKERS: [&str; 2] = ["sorry", "apologize"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub category: String,
    pub suggestion: String,
    pub reason: String,
    pub severity: Severity,
}

pub fn tone_feedback(reply: &str) -> Vec<FeedbackItem> {
    let lower = reply.to_lowercase();
    if EMPATHY_MARKERS.iter().any(|m| lower.contains(m)) {
        vec![FeedbackItem {
            category: "empathy".to_string(),
            suggestion: "Good use of empathy".to_string(),
            reason: "Contains appropriate apologies".to_string(),
            severity: Severity::Low,
        }]
    } else {
        Vec::new()
    }
}

pub fn clarity_feedback(reply: &str) -> Vec<FeedbackItem> {
    if reply.chars().count() > CLARITY_MAX_CHARS {
        vec![FeedbackItem {
            category: "length".to_string(),
            suggestion: "Consider making the response more concise".to_string(),
            reason: "Response is quite long".to_string(),
            severity: Severity::Medium,
        }]
    } else {
        Vec::new()
    }
}
