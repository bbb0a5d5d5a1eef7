use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use mail_triage::config::TriageConfig;
use mail_triage::emails::{EmailIntent, NewEmail};
use mail_triage::llm::create_client;
use mail_triage::pipeline::email_processor::spawn_retry_sweeper;
use mail_triage::pipeline::{AgentLoadBalancer, AssignmentRules, TriagePipeline};
use mail_triage::replies::ReplyGenerator;
use mail_triage::service::EmailService;
use mail_triage::store::{LibSqlBackend, Store};
use mail_triage::teams::seed_defaults;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TriageConfig::from_env().context("invalid configuration")?;

    eprintln!("📬 Mail Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.llm.backend, config.llm.model);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Paste one JSON email per line. /rules, /rule INTENT TEAM, /stats, /quit.\n");

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    seed_defaults(store.as_ref()).await?;

    // ── Routing rules ────────────────────────────────────────────────────
    let rules = Arc::new(AssignmentRules::with_defaults());
    for (intent, team) in &config.rule_overrides {
        rules.set(*intent, team)?;
    }

    // ── Pipeline ─────────────────────────────────────────────────────────
    let llm = create_client(&config.llm)?;
    let pipeline = Arc::new(TriagePipeline::new(
        Arc::clone(&llm),
        Arc::clone(&store),
        rules,
        config.pipeline.clone(),
    ));
    let replies = ReplyGenerator::new(
        llm,
        Arc::new(AgentLoadBalancer::new(config.agent_roster.iter())),
        config.pipeline.completion_timeout,
    );
    let service = EmailService::new(Arc::clone(&store), Arc::clone(&pipeline), replies);

    let sweeper = config
        .retry_interval
        .map(|interval| spawn_retry_sweeper(Arc::clone(&store), Arc::clone(&pipeline), interval));

    // ── Intake loop ──────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = handle_line(&service, line).await {
            eprintln!("error: {e:#}");
        }
        eprint!("> ");
    }

    if let Some((handle, shutdown)) = sweeper {
        shutdown.store(true, Ordering::Relaxed);
        handle.abort();
    }
    tracing::info!("Shutting down");
    Ok(())
}

async fn handle_line(service: &EmailService, line: &str) -> anyhow::Result<()> {
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["/rules"] => {
            for (intent, team) in service.assignment_rules() {
                println!("{intent:<18} {team}");
            }
        }
        ["/rule", intent, team] => {
            let intent: EmailIntent = intent.parse().map_err(anyhow::Error::msg)?;
            service.set_assignment_rule(intent, team)?;
            println!("{intent} -> {team}");
        }
        ["/stats"] => {
            let stats = service.statistics().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        [cmd, ..] if cmd.starts_with('/') => {
            anyhow::bail!("unknown command {cmd}");
        }
        _ => {
            let envelope: NewEmail =
                serde_json::from_str(line).context("expected a JSON email envelope")?;
            let email = service.process_incoming(envelope).await?;
            println!("{}", serde_json::to_string(&email)?);
        }
    }
    Ok(())
}
