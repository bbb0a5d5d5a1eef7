//! Triage pipeline.
//!
//! Every inbound email flows through:
//! 1. Intent classification (completion call + `parser::parse_intent`)
//! 2. Sentiment classification (completion call + `parser::parse_sentiment`)
//! 3. `priority::derive_priority`
//! 4. `assignment::TeamAssignmentEngine` (override table, then least-loaded team)
//!
//! The agent `balancer` is independent of this flow and is used when replies
//! are drafted.

pub mod assignment;
pub mod balancer;
pub mod email_processor;
pub mod parser;
pub mod priority;
pub mod processor;
pub mod prompts;
pub mod types;

pub use assignment::{AssignmentRules, TeamAssignmentEngine};
pub use balancer::AgentLoadBalancer;
pub use processor::TriagePipeline;
