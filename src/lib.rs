//! Mail triage: classifies inbound support email with a completion service,
//! derives a priority, routes it to a team and tracks it through its lifecycle.

pub mod config;
pub mod emails;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod replies;
pub mod service;
pub mod store;
pub mod teams;
