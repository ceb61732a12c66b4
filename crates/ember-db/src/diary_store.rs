use std::path::Path;

use chrono::{DateTime, Utc};
use ember_common::{DiaryEntry, Error, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::parse_timestamp;

/// Append-only storage for synthesized diary entries.
pub struct DiaryStore {
    conn: Connection,
}

impl DiaryStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening diary store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open diary database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS diary (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    entry TEXT NOT NULL,
                    date TEXT NOT NULL
                );",
            )
            .map_err(|e| Error::Database(format!("diary migration failed: {e}")))?;
        Ok(())
    }

    pub fn insert_entry(&self, entry: &str, date: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO diary (entry, date) VALUES (?1, ?2)",
                params![entry, date.to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to insert diary entry: {e}")))?;
        Ok(())
    }

    /// All entries, newest first.
    pub fn list_entries(&self) -> Result<Vec<DiaryEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry, date FROM diary ORDER BY date DESC, id DESC")
            .map_err(|e| Error::Database(format!("failed to prepare diary query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let date_raw: String = row.get(1)?;
                Ok(DiaryEntry {
                    entry: row.get(0)?,
                    date: parse_timestamp(&date_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to list diary entries: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            entries
                .push(row.map_err(|e| Error::Database(format!("failed to read diary row: {e}")))?);
        }
        Ok(entries)
    }
}
