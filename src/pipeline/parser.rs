//! Completion response parser.
//!
//! Classifier output is free text that usually contains a JSON object. The
//! parser never fails: unreadable or out-of-range fields take documented
//! defaults and the degradation is logged at `warn`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::emails::EmailIntent;
use crate::pipeline::types::{
    CustomerTier, DEFAULT_REASONING, IntentAnalysisResult, Sentiment, SentimentAnalysisResult,
    Urgency,
};

/// Parse intent classifier output.
pub fn parse_intent(raw: &str) -> IntentAnalysisResult {
    let fields = Fields::from_text(raw, "intent");
    let mut result = IntentAnalysisResult::default();

    match fields.string(&["intent"]) {
        Some(value) => match value.parse::<EmailIntent>() {
            Ok(intent) => result.intent = intent,
            Err(_) => warn!(value = %value, "Unrecognised intent, using UNKNOWN"),
        },
        None => warn!("Intent missing from classifier output, using UNKNOWN"),
    }

    if let Some(confidence) = fields.number(&["confidence"], "confidence") {
        result.confidence = clamp_logged(confidence, 0.0, 1.0, "confidence");
    }

    if let Some(reasoning) = fields.string(&["reasoning"]).filter(|r| !r.trim().is_empty()) {
        result.reasoning = reasoning;
    } else {
        result.reasoning = DEFAULT_REASONING.to_string();
    }

    result.intent_scores = fields.intent_scores();
    result
}

/// Parse sentiment classifier output.
pub fn parse_sentiment(raw: &str) -> SentimentAnalysisResult {
    let fields = Fields::from_text(raw, "sentiment");
    let mut result = SentimentAnalysisResult::default();

    if let Some(value) = fields.string(&["sentiment"]) {
        match value.parse::<Sentiment>() {
            Ok(sentiment) => result.sentiment = sentiment,
            Err(_) => warn!(value = %value, "Unrecognised sentiment, using neutral"),
        }
    }

    if let Some(score) = fields.number(&["score"], "score") {
        result.score = clamp_logged(score, -1.0, 1.0, "score");
    }

    if let Some(value) = fields.string(&["urgency"]) {
        match value.parse::<Urgency>() {
            Ok(urgency) => result.urgency = urgency,
            Err(_) => warn!(value = %value, "Unrecognised urgency, using low"),
        }
    }

    if let Some(language) = fields.string(&["language"]).filter(|l| !l.trim().is_empty()) {
        result.language = language.trim().to_lowercase();
    }

    if let Some(value) = fields.string(&["customerTier", "customer_tier"]) {
        match value.parse::<CustomerTier>() {
            Ok(tier) => result.customer_tier = tier,
            Err(_) => warn!(value = %value, "Unrecognised customer tier, using standard"),
        }
    }

    result
}

fn clamp_logged(value: f64, min: f64, max: f64, field: &str) -> f64 {
    if value < min || value > max {
        warn!(field, value, "Value out of range, clamping");
    }
    value.clamp(min, max)
}

// ── Field access ────────────────────────────────────────────────────

/// Field source: a parsed JSON object, or the raw text for a key/value scan.
enum Fields<'a> {
    Json(Map<String, Value>),
    Raw(&'a str),
}

impl<'a> Fields<'a> {
    fn from_text(raw: &'a str, kind: &str) -> Self {
        let candidate = extract_json_object(raw);
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => Self::Json(map),
            _ => {
                warn!(kind, "Classifier output is not a JSON object, scanning raw text");
                Self::Raw(raw)
            }
        }
    }

    /// First present string value under any of `keys`.
    fn string(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self {
            Self::Json(map) => match map.get(*key)? {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            Self::Raw(text) => scan_string(text, key),
        })
    }

    /// First present numeric value under any of `keys`.
    ///
    /// Accepts numbers and numeric strings; anything else, including
    /// non-finite values, is treated as absent.
    fn number(&self, keys: &[&str], field: &str) -> Option<f64> {
        let raw = keys.iter().find_map(|key| match self {
            Self::Json(map) => match map.get(*key)? {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            },
            Self::Raw(text) => scan_number(text, key).or_else(|| scan_string(text, key)),
        })?;

        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                warn!(field, value = %raw, "Unparsable numeric field, using default");
                None
            }
        }
    }

    fn intent_scores(&self) -> Option<HashMap<EmailIntent, f64>> {
        let Self::Json(map) = self else {
            return None;
        };
        let scores = map
            .get("intentScores")
            .or_else(|| map.get("intent_scores"))?
            .as_object()?;

        let parsed: HashMap<EmailIntent, f64> = scores
            .iter()
            .filter_map(|(name, value)| {
                let intent = name.parse::<EmailIntent>().ok()?;
                let score = match value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .filter(|v: &f64| v.is_finite())?;
                Some((intent, score.clamp(0.0, 1.0)))
            })
            .collect();

        if parsed.len() < scores.len() {
            warn!(
                kept = parsed.len(),
                total = scores.len(),
                "Dropped unreadable intent scores"
            );
        }
        (!parsed.is_empty()).then_some(parsed)
    }
}

/// `"key": "value"` pairs anywhere in raw text.
static STRING_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([A-Za-z0-9_]+)"\s*:\s*"([^"]*)""#).expect("valid regex")
});

/// `"key": number` pairs anywhere in raw text.
static NUMBER_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([A-Za-z0-9_]+)"\s*:\s*(-?[0-9][0-9.eE+\-]*)"#).expect("valid regex")
});

/// Tolerant `"key": "value"` scan over raw text.
fn scan_string(text: &str, key: &str) -> Option<String> {
    scan(&STRING_FIELD, text, key)
}

/// Tolerant `"key": number` scan over raw text.
fn scan_number(text: &str, key: &str) -> Option<String> {
    scan(&NUMBER_FIELD, text, key)
}

fn scan(pattern: &Regex, text: &str, key: &str) -> Option<String> {
    pattern
        .captures_iter(text)
        .find(|c| &c[1] == key)
        .map(|c| c[2].to_string())
}

/// Extract a JSON object from model output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
