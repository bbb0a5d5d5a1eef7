//! Priority policy.

use crate::emails::Priority;
use crate::pipeline::types::{Sentiment, SentimentAnalysisResult, Urgency};

/// Scores strictly below this, with negative sentiment, escalate to `Urgent`.
const URGENT_SCORE_THRESHOLD: f64 = -0.5;

/// Derive a handling priority from sentiment analysis. First match wins.
pub fn derive_priority(sentiment: &SentimentAnalysisResult) -> Priority {
    let negative = sentiment.sentiment == Sentiment::Negative;

    if sentiment.urgency == Urgency::Urgent
        || (negative && sentiment.score < URGENT_SCORE_THRESHOLD)
    {
        Priority::Urgent
    } else if sentiment.urgency == Urgency::High || negative {
        Priority::High
    } else if sentiment.urgency == Urgency::Medium {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(sentiment: Sentiment, score: f64, urgency: Urgency) -> SentimentAnalysisResult {
        SentimentAnalysisResult {
            sentiment,
            score,
            urgency,
            ..Default::default()
        }
    }

    #[test]
    fn urgent_urgency_wins_regardless_of_sentiment() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Positive, 0.9, Urgency::Urgent)),
            Priority::Urgent
        );
    }

    #[test]
    fn strongly_negative_is_urgent() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Negative, -0.8, Urgency::Low)),
            Priority::Urgent
        );
    }

    #[test]
    fn boundary_score_is_high_not_urgent() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Negative, -0.5, Urgency::Low)),
            Priority::High
        );
        assert_eq!(
            derive_priority(&analysis(Sentiment::Negative, -0.5000001, Urgency::Low)),
            Priority::Urgent
        );
    }

    #[test]
    fn low_score_without_negative_sentiment_is_not_urgent() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Neutral, -0.9, Urgency::Low)),
            Priority::Low
        );
    }

    #[test]
    fn high_urgency_or_negative_is_high() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Positive, 0.5, Urgency::High)),
            Priority::High
        );
        assert_eq!(
            derive_priority(&analysis(Sentiment::Negative, -0.1, Urgency::Medium)),
            Priority::High
        );
    }

    #[test]
    fn medium_and_low() {
        assert_eq!(
            derive_priority(&analysis(Sentiment::Neutral, 0.0, Urgency::Medium)),
            Priority::Medium
        );
        assert_eq!(
            derive_priority(&SentimentAnalysisResult::default()),
            Priority::Low
        );
    }
}
