//! AI reply drafting with tone and clarity feedback.

pub mod feedback;
pub mod generator;

pub use feedback::{FeedbackItem, Severity};
pub use generator::{ReplyDraft, ReplyGenerator, ReplyRequest};
