//! Credential and cursor maps keyed by user identifier.
//!
//! The two maps are independent: a user may hold a credential without a
//! cursor (authorized, never synced), and nothing in this module ever
//! deletes either value.

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Maps a user identifier to the access credential issued at authorization.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored credential, or `None` if the user never authorized.
    fn credential(&self, uid: &str) -> StoreResult<Option<String>>;

    /// Stores (or replaces, on re-authorization) the user's credential.
    fn set_credential(&self, uid: &str, credential: &str) -> StoreResult<()>;
}

/// Maps a user identifier to the opaque cursor marking sync progress.
pub trait CursorStore: Send + Sync {
    /// Returns the stored cursor, or `None` before the first processed batch.
    fn cursor(&self, uid: &str) -> StoreResult<Option<String>>;

    /// Overwrites the user's cursor.
    fn set_cursor(&self, uid: &str, cursor: &str) -> StoreResult<()>;
}

fn check_uid(uid: &str) -> StoreResult<()> {
    if uid.is_empty() {
        return Err(StoreError::InvalidKey("empty user id".to_string()));
    }
    Ok(())
}

// ============================================================================
// SQLite
// ============================================================================

/// Account store backed by SQLite.
///
/// Holds two flat tables, `tokens` and `cursors`, each `(uid, value)`.
#[derive(Clone)]
pub struct SqliteAccountStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    /// Opens or creates an account store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        initialize_account_schema(&conn)?;
        debug!("opened account store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory account store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_account_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get(&self, table: Table, uid: &str) -> StoreResult<Option<String>> {
        check_uid(uid)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE uid = ?1", table.name()),
                params![uid],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, table: Table, uid: &str, value: &str) -> StoreResult<()> {
        check_uid(uid)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (uid, value) VALUES (?1, ?2)
                 ON CONFLICT(uid) DO UPDATE SET value = excluded.value",
                table.name()
            ),
            params![uid, value],
        )?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Table {
    Tokens,
    Cursors,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Tokens => "tokens",
            Table::Cursors => "cursors",
        }
    }
}

fn initialize_account_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tokens (
            uid TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS cursors (
            uid TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

impl CredentialStore for SqliteAccountStore {
    fn credential(&self, uid: &str) -> StoreResult<Option<String>> {
        self.get(Table::Tokens, uid)
    }

    fn set_credential(&self, uid: &str, credential: &str) -> StoreResult<()> {
        self.put(Table::Tokens, uid, credential)
    }
}

impl CursorStore for SqliteAccountStore {
    fn cursor(&self, uid: &str) -> StoreResult<Option<String>> {
        self.get(Table::Cursors, uid)
    }

    fn set_cursor(&self, uid: &str, cursor: &str) -> StoreResult<()> {
        self.put(Table::Cursors, uid, cursor)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Account store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryAccountStore {
    tokens: RwLock<HashMap<String, String>>,
    cursors: RwLock<HashMap<String, String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users holding a credential.
    pub fn credential_count(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }
}

impl CredentialStore for MemoryAccountStore {
    fn credential(&self, uid: &str) -> StoreResult<Option<String>> {
        check_uid(uid)?;
        let tokens = self.tokens.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.get(uid).cloned())
    }

    fn set_credential(&self, uid: &str, credential: &str) -> StoreResult<()> {
        check_uid(uid)?;
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        tokens.insert(uid.to_string(), credential.to_string());
        Ok(())
    }
}

impl CursorStore for MemoryAccountStore {
    fn cursor(&self, uid: &str) -> StoreResult<Option<String>> {
        check_uid(uid)?;
        let cursors = self.cursors.read().map_err(|_| StoreError::Poisoned)?;
        Ok(cursors.get(uid).cloned())
    }

    fn set_cursor(&self, uid: &str, cursor: &str) -> StoreResult<()> {
        check_uid(uid)?;
        let mut cursors = self.cursors.write().map_err(|_| StoreError::Poisoned)?;
        cursors.insert(uid.to_string(), cursor.to_string());
        Ok(())
    }
}
