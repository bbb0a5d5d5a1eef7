//! Prompt construction for the classification and reply calls.

use crate::emails::{Email, EmailIntent};

/// Body text is truncated to this many characters before prompting.
const MAX_BODY_CHARS: usize = 4000;

fn preview(text: &str) -> String {
    text.chars().take(MAX_BODY_CHARS).collect()
}

/// Build the intent classification prompt.
pub fn intent_prompt(subject: &str, body: &str) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str("Analyze the following email and determine the customer's intent:\n\n");
    prompt.push_str(&format!("Subject: {}\n", subject));
    prompt.push_str(&format!("Body: {}\n\n", preview(body)));

    prompt.push_str("Intent categories:\n");
    for intent in EmailIntent::ALL {
        if intent == EmailIntent::Unknown {
            continue;
        }
        prompt.push_str(&format!("- {}: {}\n", intent.as_str(), intent.description()));
    }

    prompt.push_str(
        "\nRespond strictly with ONLY a JSON object:\n\
         {\"intent\": \"INTENT_CATEGORY\", \"confidence\": 0.95, \"reasoning\": \"Brief explanation\", \
         \"intentScores\": {\"REFUND_REQUEST\": 0.1, \"BUG_REPORT\": 0.8}}\n\
         Use UNKNOWN when no category fits.",
    );
    prompt
}

/// Build the sentiment and urgency prompt.
pub fn sentiment_prompt(subject: &str, body: &str) -> String {
    format!(
        "Analyze the sentiment and urgency of this text:\n\n\
         Text: {}\n{}\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"sentiment\": \"positive|negative|neutral\", \"score\": -0.85, \
         \"urgency\": \"low|medium|high|urgent\", \"language\": \"en\", \
         \"customerTier\": \"standard|premium|enterprise\"}}\n\
         The score ranges from -1.0 (very negative) to 1.0 (very positive).",
        subject,
        preview(body)
    )
}

/// Build the reply drafting prompt.
pub fn reply_prompt(
    email: &Email,
    tone: &str,
    style: &str,
    additional_context: Option<&str>,
) -> String {
    let intent = email.intent.unwrap_or_default();
    format!(
        "Generate a reply to this customer email.\n\n\
         Original Email:\n\
         From: {}\n\
         Subject: {}\n\
         Body: {}\n\n\
         Intent: {}\n\n\
         Requirements:\n\
         - Tone: {}\n\
         - Style: {}\n\
         - Additional Context: {}\n\n\
         Write a helpful and empathetic reply that addresses the customer's needs. \
         Output only the reply text.",
        email.from,
        email.subject,
        preview(&email.body),
        intent,
        tone,
        style,
        additional_context.unwrap_or("none"),
    )
}
