use rusqlite::Connection;

use crate::db::{new_id, now_stamp};
use crate::error::Result;
use crate::kind::ProviderKind;
use crate::models::TransactionRecord;

pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub errors: usize,
}

impl UpsertSummary {
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn absorb(&mut self, other: UpsertSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
}

fn apply_one(conn: &Connection, kind: ProviderKind, record: &TransactionRecord) -> Result<Applied> {
    let table = kind.transaction_table();
    let exists = conn
        .prepare_cached(&format!(
            "SELECT 1 FROM {table} WHERE provider_id = ?1 AND date = ?2 AND service_name = ?3 AND grp = ?4"
        ))?
        .exists(rusqlite::params![
            record.provider_id,
            record.date,
            record.service_name,
            record.group
        ])?;
    conn.prepare_cached(&format!(
        "INSERT INTO {table} (id, provider_id, service_id, date, grp, service_name, price, quantity, amount, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT (provider_id, date, service_name, grp) DO UPDATE SET \
         price = excluded.price, quantity = excluded.quantity, amount = excluded.amount"
    ))?
    .execute(rusqlite::params![
        new_id(),
        record.provider_id,
        record.service_id,
        record.date,
        record.group,
        record.service_name,
        record.price,
        record.quantity,
        record.amount,
        now_stamp(),
    ])?;
    Ok(if exists { Applied::Updated } else { Applied::Inserted })
}

/// Merge records into the kind's transaction table under the natural key
/// (provider, date, service name, group).
///
/// Each record runs in its own savepoint: a failing record is rolled back and
/// counted, the rest continue. The enclosing transaction is committed after
/// every `batch_size` applied records and once more at the end.
pub fn upsert_transactions(
    conn: &mut Connection,
    kind: ProviderKind,
    records: &[TransactionRecord],
    batch_size: usize,
) -> Result<UpsertSummary> {
    let batch_size = batch_size.max(1);
    let mut summary = UpsertSummary::default();
    let mut pending = 0usize;
    let mut tx = conn.transaction()?;

    for (i, record) in records.iter().enumerate() {
        let sp = tx.savepoint()?;
        match apply_one(&sp, kind, record) {
            Ok(applied) => {
                sp.commit()?;
                match applied {
                    Applied::Inserted => summary.inserted += 1,
                    Applied::Updated => summary.updated += 1,
                }
                pending += 1;
            }
            Err(e) => {
                // Dropping the savepoint rolls the record back.
                drop(sp);
                summary.errors += 1;
                tracing::error!(record = i, error = %e, service = %record.service_name, date = %record.date, "upsert failed");
                continue;
            }
        }
        if pending == batch_size {
            tx.commit()?;
            tx = conn.transaction()?;
            pending = 0;
        }
    }
    tx.commit()?;

    tracing::info!(
        kind = %kind,
        inserted = summary.inserted,
        updated = summary.updated,
        errors = summary.errors,
        "import completed"
    );
    Ok(summary)
}
