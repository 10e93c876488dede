use chrono::{Local, Months, NaiveDate};
use rusqlite::{Connection, OptionalExtension};

use crate::db::{new_id, now_stamp};
use crate::error::{IngestError, Result};
use crate::kind::ProviderKind;
use crate::models::{FileMeta, ImportStatus};

pub const SYSTEM_USER_EMAIL: &str = "system@internal.app";

/// Revenue share stamped on auto-generated contracts.
pub const DEFAULT_REVENUE_PERCENTAGE: f64 = 10.0;

/// Identity stamped on created-by fields and audit entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
}

/// Outcome of a get-or-create lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: String,
    pub created: bool,
}

impl Resolved {
    fn found(id: String) -> Self {
        Self { id, created: false }
    }

    fn created(id: String) -> Self {
        Self { id, created: true }
    }
}

/// Look up the system user, creating it on first use.
pub fn system_actor(conn: &Connection) -> Result<Actor> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM users WHERE email = ?1", [SYSTEM_USER_EMAIL], |r| r.get(0))
        .optional()?;
    if let Some(user_id) = existing {
        return Ok(Actor { user_id });
    }
    let user_id = new_id();
    conn.execute(
        "INSERT INTO users (id, name, email, role) VALUES (?1, 'System User', ?2, 'ADMIN')",
        rusqlite::params![user_id, SYSTEM_USER_EMAIL],
    )?;
    tracing::info!(user_id = %user_id, "created system user");
    Ok(Actor { user_id })
}

/// Pick the actor: an explicit user id wins, otherwise the system user.
/// Returns `None` when neither is available.
pub fn current_actor(conn: &Connection, user_arg: Option<&str>) -> Option<Actor> {
    if let Some(id) = user_arg.map(str::trim).filter(|id| !id.is_empty()) {
        tracing::info!(user_id = id, "using supplied user id");
        return Some(Actor {
            user_id: id.to_string(),
        });
    }
    tracing::warn!("no user id supplied, falling back to system user");
    match system_actor(conn) {
        Ok(actor) => Some(actor),
        Err(e) => {
            tracing::error!(error = %e, "could not resolve system user");
            None
        }
    }
}

pub fn resolve_provider(conn: &Connection, kind: ProviderKind, name: &str) -> Result<Resolved> {
    let table = kind.provider_table();
    let existing: Option<String> = conn
        .query_row(&format!("SELECT id FROM {table} WHERE name = ?1"), [name], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        tracing::info!(provider = name, id = %id, "found existing provider");
        return Ok(Resolved::found(id));
    }
    let id = new_id();
    conn.execute(
        &format!("INSERT INTO {table} (id, name, is_active, import_status) VALUES (?1, ?2, 1, ?3)"),
        rusqlite::params![id, name, ImportStatus::Pending.as_str()],
    )?;
    tracing::info!(provider = name, id = %id, kind = %kind, "created provider");
    Ok(Resolved::created(id))
}

/// Get or create the service keyed by its 4-digit code.
pub fn resolve_service(conn: &Connection, kind: ProviderKind, code: &str) -> Result<Resolved> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM services WHERE name = ?1", [code], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        tracing::debug!(code, id = %id, "found existing service");
        return Ok(Resolved::found(id));
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO services (id, name, service_type, billing_type, description, is_active) \
         VALUES (?1, ?2, ?3, 'PREPAID', ?4, 1)",
        rusqlite::params![
            id,
            code,
            kind.contract_type(),
            format!("Auto-created {} service: {code}", kind.key()),
        ],
    )?;
    tracing::info!(code, id = %id, "created service");
    Ok(Resolved::created(id))
}

fn contract_number(kind: ProviderKind, provider_id: &str, on: NaiveDate) -> String {
    let prefix: String = provider_id.chars().take(8).collect();
    format!("AUTO-{}-{prefix}-{}", kind.contract_type(), on.format("%Y%m%d"))
}

/// Get the provider's active contract of this kind, creating one if none exists.
///
/// Creation needs an actor to stamp as creator.
pub fn resolve_contract(
    conn: &Connection,
    kind: ProviderKind,
    provider_id: &str,
    actor: Option<&Actor>,
) -> Result<Resolved> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM contracts WHERE provider_id = ?1 AND contract_type = ?2 AND status = 'ACTIVE'",
            rusqlite::params![provider_id, kind.contract_type()],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(Resolved::found(id));
    }
    let actor = actor.ok_or(IngestError::MissingActor)?;

    let start = Local::now().date_naive();
    let end = start.checked_add_months(Months::new(12)).unwrap_or(start);
    let id = new_id();
    conn.execute(
        "INSERT INTO contracts (id, name, contract_number, contract_type, status, start_date, end_date, \
         revenue_percentage, provider_id, created_by_id) \
         VALUES (?1, ?2, ?3, ?4, 'ACTIVE', ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            id,
            format!("Auto-generated contract for {}", kind.name().to_lowercase()),
            contract_number(kind, provider_id, start),
            kind.contract_type(),
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
            DEFAULT_REVENUE_PERCENTAGE,
            provider_id,
            actor.user_id,
        ],
    )?;
    tracing::info!(contract_id = %id, provider_id, "created contract");
    Ok(Resolved::created(id))
}

pub fn resolve_service_contract(conn: &Connection, contract_id: &str, service_id: &str) -> Result<Resolved> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM service_contracts WHERE contract_id = ?1 AND service_id = ?2",
            [contract_id, service_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(Resolved::found(id));
    }
    let id = new_id();
    conn.execute(
        "INSERT INTO service_contracts (id, contract_id, service_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, contract_id, service_id],
    )?;
    tracing::info!(service_contract_id = %id, "created service contract");
    Ok(Resolved::created(id))
}

/// Overwrite the provider's file metadata for the current import.
pub fn stamp_file_metadata(
    conn: &Connection,
    kind: ProviderKind,
    provider_id: &str,
    meta: &FileMeta,
    status: ImportStatus,
    actor: Option<&Actor>,
) -> Result<()> {
    let now = now_stamp();
    conn.execute(
        &format!(
            "UPDATE {} SET original_file_name = ?1, file_path = ?2, file_size = ?3, mime_type = ?4, \
             last_import_date = ?5, imported_by = ?6, import_status = ?7, updated_at = ?5 WHERE id = ?8",
            kind.provider_table()
        ),
        rusqlite::params![
            meta.original_file_name,
            meta.file_path,
            meta.file_size as i64,
            meta.mime_type,
            now,
            actor.map(|a| a.user_id.as_str()),
            status.as_str(),
            provider_id,
        ],
    )?;
    Ok(())
}

/// Record where the file ended up and the final import status.
pub fn set_import_outcome(
    conn: &Connection,
    kind: ProviderKind,
    provider_id: &str,
    file_path: &str,
    status: ImportStatus,
) -> Result<()> {
    let table = kind.provider_table();
    let current: Option<String> = conn
        .query_row(&format!("SELECT import_status FROM {table} WHERE id = ?1"), [provider_id], |r| r.get(0))
        .optional()?
        .flatten();
    let from = current.as_deref().and_then(ImportStatus::parse);
    if let Some(from) = from.filter(|from| !from.can_transition_to(status)) {
        tracing::warn!(provider_id, from = from.as_str(), to = status.as_str(), "unexpected import status transition");
    }
    conn.execute(
        &format!(
            "UPDATE {} SET file_path = ?1, import_status = ?2, updated_at = ?3 WHERE id = ?4",
            kind.provider_table()
        ),
        rusqlite::params![file_path, status.as_str(), now_stamp(), provider_id],
    )?;
    Ok(())
}
