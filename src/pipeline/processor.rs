//! Triage pipeline: classification through routing for a single email.
//!
//! Flow per email:
//! 1. `RECEIVED → PROCESSING`, persisted
//! 2. Intent classification → `INTENT_DETECTED`
//! 3. Sentiment classification → priority + metadata
//! 4. Team assignment → `ASSIGNED`, or stays `INTENT_DETECTED` on a miss
//! 5. Persist, then charge the chosen team's workload
//!
//! Any failure in 2–5 persists the pre-run record with status `RECEIVED`.
//! Nothing is retried inline; the retry sweeper picks reverted emails up.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::emails::{Email, EmailMetadata, EmailStatus, NoteKind};
use crate::error::{LlmError, PipelineError};
use crate::llm::CompletionClient;
use crate::pipeline::assignment::{AssignmentRules, TeamAssignmentEngine};
use crate::pipeline::parser::{parse_intent, parse_sentiment};
use crate::pipeline::priority::derive_priority;
use crate::pipeline::prompts::{intent_prompt, sentiment_prompt};
use crate::store::Store;

/// Author recorded on notes written by the pipeline.
pub const SYSTEM_USER: &str = "system";

pub struct TriagePipeline {
    llm: Arc<dyn CompletionClient>,
    store: Arc<dyn Store>,
    assignment: TeamAssignmentEngine,
    config: PipelineConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl TriagePipeline {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        store: Arc<dyn Store>,
        rules: Arc<AssignmentRules>,
        config: PipelineConfig,
    ) -> Self {
        let assignment = TeamAssignmentEngine::new(Arc::clone(&store), rules);
        Self {
            llm,
            store,
            assignment,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn rules(&self) -> &Arc<AssignmentRules> {
        self.assignment.rules()
    }

    /// Run one email through the pipeline and return the updated record.
    ///
    /// The stored record is what gets triaged; `email` only names it. Emails
    /// that are not `RECEIVED`, or that are already being processed, are
    /// returned as they stand.
    pub async fn run(&self, email: Email) -> Result<Email, PipelineError> {
        if email.status != EmailStatus::Received {
            debug!(id = %email.id, status = %email.status, "Skipping email not in RECEIVED");
            return Ok(email);
        }
        let Some(_guard) = InFlight::claim(&self.in_flight, &email.id) else {
            debug!(id = %email.id, "Email already in flight");
            return Ok(email);
        };

        let Some(current) = self.store.get_email(&email.id).await? else {
            warn!(id = %email.id, "Email not found in store, skipping");
            return Ok(email);
        };
        if current.status != EmailStatus::Received {
            debug!(id = %current.id, status = %current.status, "Email moved on since it was listed");
            return Ok(current);
        }

        info!(id = %current.id, from = %current.from, "Triaging email");

        let snapshot = current.clone();
        let mut working = current;
        working.status = EmailStatus::Processing;
        working.processed_at = Some(Utc::now());
        self.store.save_email(&working).await?;

        match self.triage(&mut working).await {
            Ok(()) => Ok(working),
            Err(e) => {
                error!(id = %working.id, error = %e, "Triage failed, reverting to RECEIVED");
                let mut reverted = snapshot;
                reverted.status = EmailStatus::Received;
                if let Err(save_err) = self.store.save_email(&reverted).await {
                    error!(id = %reverted.id, error = %save_err, "Failed to persist revert");
                }
                Err(e)
            }
        }
    }

    /// Run several emails concurrently, bounded by `max_concurrent`.
    ///
    /// Failures are logged and left out of the result; they don't fail the
    /// batch.
    pub async fn process_batch(&self, emails: Vec<Email>) -> Vec<Email> {
        let count = emails.len();
        info!(count, "Processing email batch");

        let results: Vec<Result<Email, PipelineError>> = futures::stream::iter(emails)
            .map(|email| self.run(email))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let processed: Vec<Email> = results
            .into_iter()
            .filter_map(|r| match r {
                Ok(email) => Some(email),
                Err(e) => {
                    warn!(error = %e, "Email in batch failed");
                    None
                }
            })
            .collect();

        info!(
            processed = processed.len(),
            total = count,
            "Batch processing complete"
        );
        processed
    }

    async fn triage(&self, email: &mut Email) -> Result<(), PipelineError> {
        // Step 1: intent
        let raw = self
            .complete(&intent_prompt(&email.subject, &email.body))
            .await
            .map_err(PipelineError::Intent)?;
        let intent = parse_intent(&raw);
        email.record_intent(intent.intent, intent.confidence);
        info!(
            id = %email.id,
            intent = %intent.intent,
            confidence = intent.confidence,
            "Intent detected"
        );

        // Step 2: sentiment and priority
        let raw = self
            .complete(&sentiment_prompt(&email.subject, &email.body))
            .await
            .map_err(PipelineError::Sentiment)?;
        let sentiment = parse_sentiment(&raw);
        email.priority = derive_priority(&sentiment);
        email.metadata = Some(EmailMetadata::from_sentiment(
            &sentiment,
            Some(self.llm.model_name()),
        ));
        debug!(
            id = %email.id,
            sentiment = ?sentiment.sentiment,
            score = sentiment.score,
            urgency = ?sentiment.urgency,
            priority = %email.priority,
            "Sentiment analysed"
        );

        // Step 3: team assignment
        let team_id = self.assignment.select_team(email.intent).await?;
        match &team_id {
            Some(team_id) => {
                email.assign_team(team_id);
                email.add_note(
                    SYSTEM_USER,
                    format!(
                        "Automatically assigned to team {} for intent {}",
                        team_id, intent.intent
                    ),
                    NoteKind::AssignmentNote,
                );
                info!(id = %email.id, team_id = %team_id, "Email assigned");
            }
            None => {
                info!(id = %email.id, intent = %intent.intent, "No team for intent, left unassigned");
            }
        }

        self.store.save_email(email).await?;

        // Charge only once the assignment is stored.
        if let Some(team_id) = &team_id
            && let Err(e) = self.assignment.charge(team_id).await
        {
            warn!(id = %email.id, team_id = %team_id, error = %e, "Failed to record team load");
        }
        Ok(())
    }

    /// One completion call under the configured deadline.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let deadline = self.config.completion_timeout;
        tokio::time::timeout(deadline, self.llm.complete(prompt))
            .await
            .map_err(|_| LlmError::Timeout(deadline))?
    }
}

/// Marks an email id as being processed until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());
        inserted.then(|| Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}
