//! Completion client abstraction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::LlmError;

/// Generative text endpoint: prompt in, text out.
///
/// One call is one outbound request. Implementations do not retry and do not
/// cache; deadlines are applied by the caller.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Provider name used in logs and errors (e.g. "gemini").
    fn provider_name(&self) -> &str;

    /// Model identifier recorded on classified emails.
    fn model_name(&self) -> &str;

    /// Send `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Map a non-success HTTP status to the matching `LlmError`.
pub(crate) fn error_for_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        _ => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {}: {}", status, truncate(body, 200)),
        },
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
