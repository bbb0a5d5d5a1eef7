//! End-to-end triage through the public service API with a scripted
//! completion client and an in-memory libSQL store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use mail_triage::config::PipelineConfig;
use mail_triage::emails::{EmailIntent, EmailStatus, NewEmail, Priority};
use mail_triage::error::LlmError;
use mail_triage::llm::CompletionClient;
use mail_triage::pipeline::email_processor::sweep_received;
use mail_triage::pipeline::{AgentLoadBalancer, AssignmentRules, TriagePipeline};
use mail_triage::replies::ReplyGenerator;
use mail_triage::service::EmailService;
use mail_triage::store::{EmailFilter, LibSqlBackend, Store};
use mail_triage::teams::seed_defaults;

/// Classifies everything as a furious refund request. The first
/// `failures` calls error out.
struct RefundLlm {
    failures: usize,
    calls: AtomicUsize,
}

impl RefundLlm {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionClient for RefundLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-1"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(LlmError::RateLimited {
                provider: "scripted".into(),
                retry_after: None,
            });
        }
        if prompt.contains("customer's intent") {
            Ok("Sure! ```json\n{\"intent\": \"REFUND_REQUEST\", \"confidence\": 0.93, \"reasoning\": \"asks for money back\"}\n```".into())
        } else {
            Ok(r#"{"sentiment": "negative", "score": -0.8, "urgency": "high", "language": "EN", "customerTier": "premium"}"#.into())
        }
    }
}

struct Harness {
    service: EmailService,
    store: Arc<dyn Store>,
    pipeline: Arc<TriagePipeline>,
}

async fn harness(llm: RefundLlm) -> Harness {
    let store: Arc<dyn Store> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    seed_defaults(store.as_ref()).await.unwrap();

    let llm: Arc<dyn CompletionClient> = Arc::new(llm);
    let config = PipelineConfig {
        completion_timeout: Duration::from_secs(2),
        max_concurrent: 4,
    };
    let pipeline = Arc::new(TriagePipeline::new(
        Arc::clone(&llm),
        Arc::clone(&store),
        Arc::new(AssignmentRules::with_defaults()),
        config.clone(),
    ));
    let replies = ReplyGenerator::new(
        llm,
        Arc::new(AgentLoadBalancer::new(["alice@example.com"])),
        config.completion_timeout,
    );
    Harness {
        service: EmailService::new(Arc::clone(&store), Arc::clone(&pipeline), replies),
        store,
        pipeline,
    }
}

fn refund_email(message_id: &str) -> NewEmail {
    NewEmail {
        message_id: Some(message_id.to_string()),
        from: "angry@example.com".into(),
        to: "support@example.com".into(),
        subject: "Charged twice, refund now".into(),
        body: "I was billed twice for my subscription. Refund me immediately.".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn refund_email_is_routed_to_billing() {
    let h = harness(RefundLlm::new(0)).await;
    let email = h.service.process_incoming(refund_email("<r1@mail>")).await.unwrap();

    let billing = h.store.find_team_by_name("billing-team").await.unwrap().unwrap();
    assert_eq!(email.status, EmailStatus::Assigned);
    assert_eq!(email.intent, Some(EmailIntent::RefundRequest));
    assert_eq!(email.intent_confidence, Some(0.93));
    assert_eq!(email.priority, Priority::Urgent);
    assert_eq!(email.assigned_team.as_deref(), Some(billing.id.as_str()));
    assert!(email.processed_at.is_some());
    assert!(email.assigned_at.is_some());

    let metadata = email.metadata.as_ref().unwrap();
    assert_eq!(metadata.language, "en");
    assert_eq!(metadata.ai_model_used.as_deref(), Some("scripted-1"));
    assert_eq!(billing.total_emails_handled, 1);

    assert_eq!(h.service.get_email(&email.id).await.unwrap(), email);
}

#[tokio::test]
async fn redelivered_message_is_not_triaged_twice() {
    let h = harness(RefundLlm::new(0)).await;
    let first = h.service.process_incoming(refund_email("<same@mail>")).await.unwrap();
    let second = h.service.process_incoming(refund_email("<same@mail>")).await.unwrap();

    assert_eq!(first, second);
    let all = h.service.list_emails(&EmailFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
    let billing = h.store.find_team_by_name("billing-team").await.unwrap().unwrap();
    assert_eq!(billing.total_emails_handled, 1);
}

#[tokio::test]
async fn failed_triage_is_picked_up_by_the_sweep() {
    let h = harness(RefundLlm::new(1)).await;

    let email = h.service.process_incoming(refund_email("<retry@mail>")).await.unwrap();
    assert_eq!(email.status, EmailStatus::Received);
    assert_eq!(email.intent, None);
    assert_eq!(email.priority, Priority::Medium);
    assert!(email.assigned_team.is_none());

    assert_eq!(sweep_received(&h.store, &h.pipeline).await, 1);
    let email = h.service.get_email(&email.id).await.unwrap();
    assert_eq!(email.status, EmailStatus::Assigned);
    assert_eq!(email.priority, Priority::Urgent);

    assert_eq!(sweep_received(&h.store, &h.pipeline).await, 0);
}

#[tokio::test]
async fn concurrent_intake_counts_every_assignment() {
    let h = harness(RefundLlm::new(0)).await;
    let intake = (0..8).map(|i| h.service.process_incoming(refund_email(&format!("<c{i}@mail>"))));
    let emails = futures::future::join_all(intake).await;

    assert!(emails
        .iter()
        .all(|e| e.as_ref().unwrap().status == EmailStatus::Assigned));
    let billing = h.store.find_team_by_name("billing-team").await.unwrap().unwrap();
    assert_eq!(billing.total_emails_handled, 8);

    let stats = h.service.statistics().await.unwrap();
    assert_eq!(stats.total, 8);
    assert_eq!(stats.pending, 8);
    assert_eq!(h.service.high_priority_pending().await.unwrap().len(), 8);
}
