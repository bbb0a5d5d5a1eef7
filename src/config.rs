//! Configuration types.
//!
//! Everything is read from environment variables. Unparsable numbers fall
//! back to their defaults; a missing credential or an unknown backend, intent
//! or agent roster is a hard error.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::emails::EmailIntent;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Agents the load balancer starts with when no roster is configured.
pub const DEFAULT_AGENT_ROSTER: [&str; 3] =
    ["alice@example.com", "bob@example.com", "carol@example.com"];

/// Prefix for start-time routing overrides, e.g. `TRIAGE_RULE_BUG_REPORT=qa-team`.
pub const RULE_ENV_PREFIX: &str = "TRIAGE_RULE_";

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deadline for a single completion call.
    pub completion_timeout: Duration,
    /// Emails processed concurrently by a batch.
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completion_timeout: Duration::from_secs(30),
            max_concurrent: 4,
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub llm: LlmConfig,
    pub db_path: PathBuf,
    pub pipeline: PipelineConfig,
    pub agent_roster: Vec<String>,
    /// Re-trigger sweep period; `None` disables the sweep.
    pub retry_interval: Option<Duration>,
    /// Intent → team name overrides applied on top of the defaults.
    pub rule_overrides: Vec<(EmailIntent, String)>,
}

impl TriageConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let backend: LlmBackend = match get("TRIAGE_LLM_BACKEND") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "TRIAGE_LLM_BACKEND".to_string(),
                message,
            })?,
            None => LlmBackend::Gemini,
        };

        let key_var = match backend {
            LlmBackend::Gemini => "GEMINI_API_KEY",
            LlmBackend::OpenAi => "OPENAI_API_KEY",
        };
        let api_key = get(key_var)
            .map(|k| SecretString::from(k.to_string()))
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = get("TRIAGE_MODEL")
            .map(String::from)
            .unwrap_or_else(|| backend.default_model().to_string());

        let secs = |key: &str, default: u64| -> u64 {
            get(key).and_then(|s| s.parse().ok()).unwrap_or(default)
        };

        let llm = LlmConfig {
            backend,
            api_key,
            model,
            base_url: get("TRIAGE_LLM_BASE_URL").map(String::from),
            request_timeout: Duration::from_secs(secs("TRIAGE_HTTP_TIMEOUT_SECS", 60)),
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            completion_timeout: Duration::from_secs(secs(
                "TRIAGE_COMPLETION_TIMEOUT_SECS",
                defaults.completion_timeout.as_secs(),
            )),
            max_concurrent: get("TRIAGE_MAX_CONCURRENT")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent),
        };

        let agent_roster: Vec<String> = match get("TRIAGE_AGENT_ROSTER") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_AGENT_ROSTER.iter().map(|s| s.to_string()).collect(),
        };
        if agent_roster.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "TRIAGE_AGENT_ROSTER".to_string(),
                message: "roster must name at least one agent".to_string(),
            });
        }

        let retry_interval = match secs("TRIAGE_RETRY_INTERVAL_SECS", 300) {
            0 => None,
            n => Some(Duration::from_secs(n)),
        };

        let mut rule_overrides = Vec::new();
        for (key, value) in &vars {
            let Some(intent_name) = key.strip_prefix(RULE_ENV_PREFIX) else {
                continue;
            };
            let intent: EmailIntent =
                intent_name
                    .parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: key.clone(),
                        message,
                    })?;
            rule_overrides.push((intent, value.trim().to_string()));
        }
        rule_overrides.sort_by_key(|(intent, _)| intent.as_str());

        Ok(Self {
            llm,
            db_path: PathBuf::from(get("TRIAGE_DB_PATH").unwrap_or("./data/mail-triage.db")),
            pipeline,
            agent_roster,
            retry_interval,
            rule_overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_with_only_gemini_key() {
        let config = TriageConfig::from_vars(vars(&[("GEMINI_API_KEY", "g-key")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Gemini);
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.llm.api_key.expose_secret(), "g-key");
        assert_eq!(config.pipeline.completion_timeout, Duration::from_secs(30));
        assert_eq!(config.agent_roster.len(), 3);
        assert_eq!(config.retry_interval, Some(Duration::from_secs(300)));
        assert!(config.rule_overrides.is_empty());
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = TriageConfig::from_vars(vars(&[("TRIAGE_LLM_BACKEND", "openai")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
    }

    #[test]
    fn rule_overrides_are_collected() {
        let config = TriageConfig::from_vars(vars(&[
            ("GEMINI_API_KEY", "k"),
            ("TRIAGE_RULE_BUG_REPORT", "qa-team"),
            ("TRIAGE_RULE_complaint", "escalations"),
        ]))
        .unwrap();
        assert_eq!(
            config.rule_overrides,
            vec![
                (EmailIntent::BugReport, "qa-team".to_string()),
                (EmailIntent::Complaint, "escalations".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_rule_intent_is_rejected() {
        let err = TriageConfig::from_vars(vars(&[
            ("GEMINI_API_KEY", "k"),
            ("TRIAGE_RULE_SPAM", "nobody"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn numeric_values_fall_back_and_zero_disables_sweep() {
        let config = TriageConfig::from_vars(vars(&[
            ("GEMINI_API_KEY", "k"),
            ("TRIAGE_COMPLETION_TIMEOUT_SECS", "soon"),
            ("TRIAGE_MAX_CONCURRENT", "0"),
            ("TRIAGE_RETRY_INTERVAL_SECS", "0"),
            ("TRIAGE_AGENT_ROSTER", "dana@example.com, erin@example.com"),
        ]))
        .unwrap();
        assert_eq!(config.pipeline.completion_timeout, Duration::from_secs(30));
        assert_eq!(config.pipeline.max_concurrent, 4);
        assert_eq!(config.retry_interval, None);
        assert_eq!(config.agent_roster, vec!["dana@example.com", "erin@example.com"]);
    }
}
