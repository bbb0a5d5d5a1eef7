//! Email records and their lifecycle.

pub mod model;

pub use model::{
    Email, EmailIntent, EmailMetadata, EmailNote, EmailStatus, NewEmail, NoteKind, Priority,
};
