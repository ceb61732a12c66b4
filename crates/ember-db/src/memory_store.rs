use std::path::Path;

use chrono::{DateTime, Utc};
use ember_common::{Error, MemoryFact, Result};
use rusqlite::{Connection, params};
use tracing::info;

use crate::parse_timestamp;

/// Backing store for durable, session-independent memory facts. Storage is
/// unbounded; consumers read a bounded most-recent-first prefix.
pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening memory store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open memory database: {e}")))?;

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
                "CREATE TABLE IF NOT EXISTS memories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    text TEXT NOT NULL,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_memories_timestamp
                    ON memories(timestamp);",
            )
            .map_err(|e| Error::Database(format!("memory migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_fact(&self, text: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO memories (text, timestamp) VALUES (?1, ?2)",
                params![text, at.to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to insert memory: {e}")))?;
        Ok(())
    }

    /// The `limit` most recent facts, newest first. This is the bounded
    /// prefix folded into prompts.
    pub fn recent_facts(&self, limit: usize) -> Result<Vec<MemoryFact>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT text, timestamp FROM memories
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare memory query: {e}")))?;

        let rows = stmt
            .query_map(params![limit as i64], row_to_fact)
            .map_err(|e| Error::Database(format!("failed to load memories: {e}")))?;

        collect_facts(rows)
    }

    /// Every fact, newest first. Management/UI read path.
    pub fn list_facts(&self) -> Result<Vec<MemoryFact>> {
        let mut stmt = self
            .conn
            .prepare("SELECT text, timestamp FROM memories ORDER BY timestamp DESC, id DESC")
            .map_err(|e| Error::Database(format!("failed to prepare memory list query: {e}")))?;

        let rows = stmt
            .query_map([], row_to_fact)
            .map_err(|e| Error::Database(format!("failed to list memories: {e}")))?;

        collect_facts(rows)
    }

    /// Delete facts by exact text match. Returns the number removed.
    pub fn delete_fact(&self, text: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM memories WHERE text = ?1", params![text])
            .map_err(|e| Error::Database(format!("failed to delete memory: {e}")))?;
        Ok(deleted)
    }
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryFact> {
    let timestamp_raw: String = row.get(1)?;
    Ok(MemoryFact {
        text: row.get(0)?,
        timestamp: parse_timestamp(&timestamp_raw),
    })
}

fn collect_facts(
    rows: impl Iterator<Item = rusqlite::Result<MemoryFact>>,
) -> Result<Vec<MemoryFact>> {
    let mut facts = Vec::new();
    for row in rows {
        facts.push(row.map_err(|e| Error::Database(format!("failed to read memory row: {e}")))?);
    }
    Ok(facts)
}
