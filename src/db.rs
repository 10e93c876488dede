use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;

use crate::error::{IngestError, Result};

pub const MAX_POOL_SIZE: usize = 20;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS parking_services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    is_active INTEGER DEFAULT 1,
    original_file_name TEXT,
    file_path TEXT,
    file_size INTEGER,
    mime_type TEXT,
    last_import_date TEXT,
    imported_by TEXT,
    import_status TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    is_active INTEGER DEFAULT 1,
    original_file_name TEXT,
    file_path TEXT,
    file_size INTEGER,
    mime_type TEXT,
    last_import_date TEXT,
    imported_by TEXT,
    import_status TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS services (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    service_type TEXT NOT NULL,
    billing_type TEXT NOT NULL,
    description TEXT,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS contracts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contract_number TEXT NOT NULL UNIQUE,
    contract_type TEXT NOT NULL,
    status TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    revenue_percentage REAL NOT NULL,
    provider_id TEXT NOT NULL,
    created_by_id TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS service_contracts (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL,
    service_id TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (contract_id, service_id),
    FOREIGN KEY (contract_id) REFERENCES contracts(id),
    FOREIGN KEY (service_id) REFERENCES services(id)
);

CREATE TABLE IF NOT EXISTS parking_transactions (
    id TEXT PRIMARY KEY,
    provider_id TEXT NOT NULL,
    service_id TEXT,
    date TEXT NOT NULL,
    grp TEXT NOT NULL,
    service_name TEXT NOT NULL,
    price REAL NOT NULL,
    quantity REAL NOT NULL,
    amount REAL NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (provider_id, date, service_name, grp),
    FOREIGN KEY (provider_id) REFERENCES parking_services(id),
    FOREIGN KEY (service_id) REFERENCES services(id)
);

CREATE TABLE IF NOT EXISTS vas_transactions (
    id TEXT PRIMARY KEY,
    provider_id TEXT NOT NULL,
    service_id TEXT,
    date TEXT NOT NULL,
    grp TEXT NOT NULL,
    service_name TEXT NOT NULL,
    price REAL NOT NULL,
    quantity REAL NOT NULL,
    amount REAL NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (provider_id, date, service_name, grp),
    FOREIGN KEY (provider_id) REFERENCES providers(id),
    FOREIGN KEY (service_id) REFERENCES services(id)
);

CREATE TABLE IF NOT EXISTS activity_log (
    id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    details TEXT,
    severity TEXT NOT NULL,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Connection pool
// ---------------------------------------------------------------------------

struct PoolState {
    idle: Vec<Connection>,
    open: usize,
}

/// Bounded pool of connections to one database file.
///
/// Connections are opened lazily up to `max_size`. `get` blocks while every
/// connection is checked out; the guard hands its connection back on drop.
pub struct Pool {
    db_path: PathBuf,
    max_size: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl Pool {
    pub fn open(db_path: &Path, max_size: usize) -> Result<Self> {
        if max_size == 0 || max_size > MAX_POOL_SIZE {
            return Err(IngestError::InvalidPoolSize(max_size));
        }
        Ok(Self {
            db_path: db_path.to_path_buf(),
            max_size,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                open: 0,
            }),
            available: Condvar::new(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get(&self) -> Result<PooledConnection<'_>> {
        self.get_timeout(ACQUIRE_TIMEOUT)
    }

    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection<'_>> {
        let mut state = self.state.lock();
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if state.open < self.max_size {
                state.open += 1;
                drop(state);
                return match get_connection(&self.db_path) {
                    Ok(conn) => Ok(PooledConnection {
                        pool: self,
                        conn: Some(conn),
                    }),
                    Err(e) => {
                        self.state.lock().open -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }
            if self.available.wait_for(&mut state, timeout).timed_out() {
                return Err(IngestError::PoolTimeout);
            }
        }
    }

    /// Verify the database answers before any file is touched.
    pub fn check(&self) -> Result<String> {
        let conn = self.get()?;
        let version: String = conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?;
        Ok(version)
    }

    fn release(&self, conn: Connection) {
        self.state.lock().idle.push(conn);
        self.available.notify_one();
    }
}

pub struct PooledConnection<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
