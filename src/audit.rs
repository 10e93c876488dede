//! Append-only activity log. Entries are written, never read back by the importer.

use rusqlite::Connection;

use crate::db::{new_id, now_stamp};
use crate::resolver::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entry<'a> {
    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: &'a str,
    pub subject: String,
    pub description: Option<String>,
    pub severity: Severity,
}

impl<'a> Entry<'a> {
    pub fn info(action: &'a str, entity_type: &'a str, entity_id: &'a str, subject: impl Into<String>) -> Self {
        Self {
            action,
            entity_type,
            entity_id,
            subject: subject.into(),
            description: None,
            severity: Severity::Info,
        }
    }

    pub fn error(
        action: &'a str,
        entity_type: &'a str,
        entity_id: &'a str,
        subject: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id,
            subject: subject.into(),
            description: Some(description.into()),
            severity: Severity::Error,
        }
    }

    /// An error entry downgraded to a warning.
    pub fn warning(
        action: &'a str,
        entity_type: &'a str,
        entity_id: &'a str,
        subject: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(action, entity_type, entity_id, subject, description)
        }
    }

    fn details(&self) -> String {
        match &self.description {
            Some(desc) => format!("{}: {}", self.subject, desc),
            None => self.subject.clone(),
        }
    }
}

/// Record an entry. Failures are logged and swallowed so auditing never fails an import.
pub fn record(conn: &Connection, actor: Option<&Actor>, entry: Entry<'_>) -> Option<String> {
    let Some(actor) = actor else {
        tracing::warn!(action = entry.action, "no actor identity, activity log entry skipped");
        return None;
    };
    let id = new_id();
    let result = conn.execute(
        "INSERT INTO activity_log (id, action, entity_type, entity_id, details, severity, user_id, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            id,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            entry.details(),
            entry.severity.as_str(),
            actor.user_id,
            now_stamp(),
        ],
    );
    match result {
        Ok(_) => {
            tracing::debug!(id = %id, action = entry.action, entity = entry.entity_type, "activity logged");
            Some(id)
        }
        Err(e) => {
            tracing::error!(error = %e, action = entry.action, "failed to write activity log");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;

    fn actor() -> Actor {
        Actor {
            user_id: "user-1".to_string(),
        }
    }

    #[test]
    fn test_record_writes_entry() {
        let (_dir, conn) = test_db();
        let id = record(
            &conn,
            Some(&actor()),
            Entry::error("PROCESS_ERROR", "System", "error", "Error processing x.xlsx", "bad sheet"),
        )
        .unwrap();
        let (details, severity, user): (String, String, String) = conn
            .query_row(
                "SELECT details, severity, user_id FROM activity_log WHERE id = ?1",
                [&id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(details, "Error processing x.xlsx: bad sheet");
        assert_eq!(severity, "ERROR");
        assert_eq!(user, "user-1");
    }

    #[test]
    fn test_record_without_actor_is_skipped() {
        let (_dir, conn) = test_db();
        assert!(record(&conn, None, Entry::info("CREATE", "Service", "s1", "Created")).is_none());
        let count: i64 = conn.query_row("SELECT count(*) FROM activity_log", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_record_failure_is_swallowed() {
        let (_dir, conn) = test_db();
        conn.execute_batch("DROP TABLE activity_log").unwrap();
        assert!(record(&conn, Some(&actor()), Entry::info("CREATE", "Service", "s1", "Created")).is_none());
    }
}
