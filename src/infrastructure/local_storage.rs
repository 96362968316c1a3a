//! Local SQLite key/value storage.
//!
//! Durable, single-client slots holding opaque string values. Each slot is
//! replaced as a whole inside a transaction, so readers never observe a
//! partially written value.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::domain::{AppError, Result};

/// Key/value repository using SQLite.
pub struct LocalStorage {
    conn: Connection,
}

impl LocalStorage {
    /// Opens or creates the local storage database.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create storage directory", e))?;
        }

        let conn = Connection::open(path).map_err(AppError::database)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(AppError::database)?;

        let storage = Self { conn };
        storage.init_schema()?;

        tracing::debug!(path = %path.display(), "Local storage opened");

        Ok(storage)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            CREATE TABLE IF NOT EXISTS kv_slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
            )
            .map_err(AppError::database)?;

        Ok(())
    }

    /// Read the raw value of a slot.
    pub fn read_slot(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv_slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(AppError::database)
    }

    /// Replace the value of a slot.
    pub fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        Self::upsert(&self.conn, key, value)
    }

    /// Read-modify-write a slot in one immediate transaction.
    ///
    /// `update` receives the current value and returns the replacement plus
    /// an output passed back to the caller. Nothing is written if it fails.
    pub fn update_slot<T, F>(&mut self, key: &str, update: F) -> Result<T>
    where
        F: FnOnce(Option<&str>) -> Result<(String, T)>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(AppError::database)?;

        let current: Option<String> = tx
            .query_row("SELECT value FROM kv_slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(AppError::database)?;

        let (next, output) = update(current.as_deref())?;
        Self::upsert(&tx, key, &next)?;
        tx.commit().map_err(AppError::database)?;

        Ok(output)
    }

    fn upsert(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            r"
            INSERT INTO kv_slots (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            ",
            params![key, value],
        )
        .map_err(AppError::database)?;

        Ok(())
    }
}
