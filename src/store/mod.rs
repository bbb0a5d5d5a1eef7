//! Persistence layer: libSQL-backed document storage for emails, teams, and users.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{EmailFilter, Store};
