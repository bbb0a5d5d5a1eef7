//! libSQL backend: async `Store` trait implementation.
//!
//! Records are kept as JSON documents in a single `documents` table keyed by
//! `(kind, id)`. Field lookups go through `json_extract` / `json_each`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::emails::{Email, EmailIntent, EmailStatus};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{EmailFilter, Store};
use crate::teams::{Team, User};

const KIND_EMAIL: &str = "email";
const KIND_TEAM: &str = "team";
const KIND_USER: &str = "user";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Document primitives ─────────────────────────────────────────

    async fn upsert<T: Serialize + Sync>(
        &self,
        kind: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), DatabaseError> {
        let body = serde_json::to_string(doc)
            .map_err(|e| DatabaseError::Serialization(format!("{kind} {id}: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO documents (kind, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (kind, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![kind, id, body, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert {kind}: {e}")))?;
        Ok(())
    }

    /// Run a `SELECT body FROM documents ...` query and decode every row.
    ///
    /// Rows that fail to decode are skipped with a warning.
    async fn query_docs<T: DeserializeOwned>(
        &self,
        op: &str,
        sql: &str,
        args: Vec<Value>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, args)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut docs = Vec::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
            };
            let body: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("{op} row parse: {e}")))?;
            match serde_json::from_str(&body) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(op, "Skipping undecodable document: {e}"),
            }
        }
        Ok(docs)
    }

    async fn query_one<T: DeserializeOwned>(
        &self,
        op: &str,
        sql: &str,
        args: Vec<Value>,
    ) -> Result<Option<T>, DatabaseError> {
        Ok(self.query_docs(op, sql, args).await?.into_iter().next())
    }

    async fn get_doc<T: DeserializeOwned>(
        &self,
        kind: &str,
        id: &str,
    ) -> Result<Option<T>, DatabaseError> {
        self.query_one(
            &format!("get {kind}"),
            "SELECT body FROM documents WHERE kind = ?1 AND id = ?2",
            vec![text(kind), text(id)],
        )
        .await
    }

    async fn find_by_field<T: DeserializeOwned>(
        &self,
        kind: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<T>, DatabaseError> {
        self.query_one(
            &format!("find {kind} by {field}"),
            &format!(
                "SELECT body FROM documents WHERE kind = ?1 AND json_extract(body, '$.{field}') = ?2
                 ORDER BY rowid LIMIT 1"
            ),
            vec![text(kind), text(value)],
        )
        .await
    }

    async fn list_kind<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, DatabaseError> {
        self.query_docs(
            &format!("list {kind}"),
            "SELECT body FROM documents WHERE kind = ?1 ORDER BY rowid",
            vec![text(kind)],
        )
        .await
    }
}

fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

fn optional_text(s: Option<impl Into<String>>) -> Value {
    s.map(text).unwrap_or(Value::Null)
}

#[async_trait]
impl Store for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Emails ──────────────────────────────────────────────────────

    async fn save_email(&self, email: &Email) -> Result<(), DatabaseError> {
        self.upsert(KIND_EMAIL, &email.id, email).await
    }

    async fn get_email(&self, id: &str) -> Result<Option<Email>, DatabaseError> {
        self.get_doc(KIND_EMAIL, id).await
    }

    async fn find_email_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<Email>, DatabaseError> {
        self.find_by_field(KIND_EMAIL, "message_id", message_id)
            .await
    }

    async fn list_emails(&self, filter: &EmailFilter) -> Result<Vec<Email>, DatabaseError> {
        self.query_docs(
            "list_emails",
            "SELECT body FROM documents WHERE kind = 'email'
               AND (?1 IS NULL OR json_extract(body, '$.status') = ?1)
               AND (?2 IS NULL OR json_extract(body, '$.assigned_team') = ?2)
               AND (?3 IS NULL OR json_extract(body, '$.assigned_user') = ?3)
               AND (?4 IS NULL OR json_extract(body, '$.intent') = ?4)
             ORDER BY rowid",
            vec![
                optional_text(filter.status.map(|s| s.as_str())),
                optional_text(filter.assigned_team.clone()),
                optional_text(filter.assigned_user.clone()),
                optional_text(filter.intent.map(|i| i.as_str())),
            ],
        )
        .await
    }

    async fn count_emails_by_status(&self, status: EmailStatus) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM documents WHERE kind = 'email' AND json_extract(body, '$.status') = ?1",
                params![status.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_emails_by_status: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("row parse: {e}")))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_emails_by_status: {e}"))),
        }
    }

    // ── Teams ───────────────────────────────────────────────────────

    async fn save_team(&self, team: &Team) -> Result<(), DatabaseError> {
        self.upsert(KIND_TEAM, &team.id, team).await
    }

    async fn get_team(&self, id: &str) -> Result<Option<Team>, DatabaseError> {
        self.get_doc(KIND_TEAM, id).await
    }

    async fn find_team_by_name(&self, name: &str) -> Result<Option<Team>, DatabaseError> {
        self.find_by_field(KIND_TEAM, "name", name).await
    }

    async fn increment_team_load(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn()
            .execute(
                "UPDATE documents SET
                   body = json_set(body,
                     '$.total_emails_handled', COALESCE(json_extract(body, '$.total_emails_handled'), 0) + 1,
                     '$.updated_at', ?2),
                   updated_at = ?2
                 WHERE kind = 'team' AND id = ?1",
                params![id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("increment_team_load: {e}")))?;
        Ok(updated > 0)
    }

    async fn teams_handling(&self, intent: EmailIntent) -> Result<Vec<Team>, DatabaseError> {
        self.query_docs(
            "teams_handling",
            "SELECT body FROM documents WHERE kind = 'team'
               AND EXISTS (
                 SELECT 1 FROM json_each(documents.body, '$.handled_intents') WHERE json_each.value = ?1
               )
             ORDER BY rowid",
            vec![text(intent.as_str())],
        )
        .await
    }

    async fn list_teams(&self) -> Result<Vec<Team>, DatabaseError> {
        self.list_kind(KIND_TEAM).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn save_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.upsert(KIND_USER, &user.id, user).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, DatabaseError> {
        self.get_doc(KIND_USER, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        self.find_by_field(KIND_USER, "email", email).await
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        self.list_kind(KIND_USER).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emails::NewEmail;
    use crate::teams::{TeamStatus, UserRole};

    fn email(message_id: &str) -> Email {
        Email::new(NewEmail {
            message_id: Some(message_id.into()),
            from: "customer@example.com".into(),
            to: "support@example.com".into(),
            subject: "Help".into(),
            body: "Something broke".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn save_and_get_email_round_trips() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let e = email("<m1@mail>");
        store.save_email(&e).await.unwrap();

        let loaded = store.get_email(&e.id).await.unwrap().unwrap();
        assert_eq!(loaded, e);
        assert!(store.get_email("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let mut e = email("<m1@mail>");
        store.save_email(&e).await.unwrap();
        e.status = EmailStatus::Processing;
        store.save_email(&e).await.unwrap();

        let all = store.list_emails(&EmailFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, EmailStatus::Processing);
    }

    #[tokio::test]
    async fn find_by_message_id() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let e = email("<dedup@mail>");
        store.save_email(&e).await.unwrap();

        let found = store
            .find_email_by_message_id("<dedup@mail>")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, e.id);
        assert!(store
            .find_email_by_message_id("<other@mail>")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_emails_applies_filter() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let mut a = email("<a@mail>");
        a.record_intent(EmailIntent::BugReport, 0.8);
        a.assign_team("team-1");
        let b = email("<b@mail>");
        store.save_email(&a).await.unwrap();
        store.save_email(&b).await.unwrap();

        let assigned = store
            .list_emails(&EmailFilter::status(EmailStatus::Assigned))
            .await
            .unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].id, a.id);

        let by_team = store.list_emails(&EmailFilter::team("team-1")).await.unwrap();
        assert_eq!(by_team.len(), 1);

        let by_intent = store
            .list_emails(&EmailFilter::intent(EmailIntent::BugReport))
            .await
            .unwrap();
        assert_eq!(by_intent.len(), 1);

        assert_eq!(
            store
                .count_emails_by_status(EmailStatus::Received)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn teams_handling_keeps_insertion_order() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let first = Team::new("first", "", vec![EmailIntent::Complaint]);
        let mut second = Team::new(
            "second",
            "",
            vec![EmailIntent::GeneralInquiry, EmailIntent::Complaint],
        );
        second.status = TeamStatus::Inactive;
        let other = Team::new("other", "", vec![EmailIntent::BugReport]);
        store.save_team(&first).await.unwrap();
        store.save_team(&second).await.unwrap();
        store.save_team(&other).await.unwrap();

        // A later update must not move the row.
        store.save_team(&first).await.unwrap();

        let teams = store.teams_handling(EmailIntent::Complaint).await.unwrap();
        let names: Vec<_> = teams.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);

        let found = store.find_team_by_name("other").await.unwrap().unwrap();
        assert_eq!(found.id, other.id);
    }

    #[tokio::test]
    async fn increment_team_load_updates_counter() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let team = Team::new("billing-team", "", vec![EmailIntent::BillingIssue]);
        store.save_team(&team).await.unwrap();

        assert!(store.increment_team_load(&team.id).await.unwrap());
        assert!(store.increment_team_load(&team.id).await.unwrap());
        assert!(!store.increment_team_load("missing").await.unwrap());

        let loaded = store.get_team(&team.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_emails_handled, 2);
        assert!(loaded.updated_at >= team.updated_at);
    }

    #[tokio::test]
    async fn users_round_trip() {
        let store = LibSqlBackend::new_memory().await.unwrap();
        let user = User::new("agent@example.com", "Agent", UserRole::Agent);
        store.save_user(&user).await.unwrap();

        assert_eq!(store.get_user(&user.id).await.unwrap().unwrap(), user);
        assert_eq!(
            store
                .find_user_by_email("agent@example.com")
                .await
                .unwrap()
                .unwrap()
                .id,
            user.id
        );
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn local_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("triage.db");
        let e = email("<persist@mail>");
        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            store.save_email(&e).await.unwrap();
        }
        let store = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(store.get_email(&e.id).await.unwrap().is_some());
    }
}
