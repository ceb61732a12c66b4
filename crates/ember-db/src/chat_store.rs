use std::path::Path;

use chrono::{DateTime, Utc};
use ember_common::{Error, NewTurn, Result, SessionSummary, Turn};
use rusqlite::{Connection, params};
use tracing::info;

use crate::parse_timestamp;

/// Persistent storage for the session-partitioned turn log, plus the
/// single-row notifier state used by the inactivity watcher.
pub struct ChatStore {
    conn: Connection,
}

impl ChatStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening chat store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

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
                "CREATE TABLE IF NOT EXISTS turns (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_id TEXT NOT NULL,
                    user_msg TEXT,
                    bot_reply TEXT NOT NULL,
                    image_ref TEXT,
                    timestamp TEXT NOT NULL,
                    title TEXT NOT NULL DEFAULT ''
                );

                CREATE INDEX IF NOT EXISTS idx_turns_session
                    ON turns(session_id, timestamp);

                CREATE TABLE IF NOT EXISTS notifier_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    last_notified_at TEXT
                );",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Append a single turn. Turns are immutable after this point except
    /// for title rewrites via [`ChatStore::rename_session`].
    pub fn append_turn(&self, turn: &NewTurn) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO turns (session_id, user_msg, bot_reply, image_ref, timestamp, title)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    turn.session_id,
                    turn.user_msg,
                    turn.bot_reply,
                    turn.image_ref,
                    turn.timestamp.to_rfc3339(),
                    turn.title,
                ],
            )
            .map_err(|e| Error::Database(format!("failed to append turn: {e}")))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Load the most recent `limit` turns for a session, newest first.
    /// Callers reverse for chronological rendering.
    pub fn recent_turns(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, user_msg, bot_reply, image_ref, timestamp, title
                 FROM turns
                 WHERE session_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare recent-turns query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], row_to_turn)
            .map_err(|e| Error::Database(format!("failed to load recent turns: {e}")))?;

        collect_turns(rows)
    }

    /// Full turn sequence for a session in chronological order.
    pub fn session_history(&self, session_id: &str) -> Result<Vec<Turn>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, user_msg, bot_reply, image_ref, timestamp, title
                 FROM turns
                 WHERE session_id = ?1
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare history query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id], row_to_turn)
            .map_err(|e| Error::Database(format!("failed to load history: {e}")))?;

        collect_turns(rows)
    }

    /// Distinct sessions with their most recently set title and latest
    /// activity, recency descending. A session whose turns all carry an
    /// empty title shows as "New Conversation".
    pub fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT t.session_id,
                        COALESCE(
                            (SELECT title FROM turns t2
                             WHERE t2.session_id = t.session_id AND t2.title <> ''
                             ORDER BY t2.id DESC LIMIT 1),
                            'New Conversation'),
                        MAX(t.timestamp)
                 FROM turns t
                 GROUP BY t.session_id
                 ORDER BY MAX(t.timestamp) DESC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare session list query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let timestamp_raw: String = row.get(2)?;
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    title: row.get(1)?,
                    last_activity: parse_timestamp(&timestamp_raw),
                })
            })
            .map_err(|e| Error::Database(format!("failed to list sessions: {e}")))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions
                .push(row.map_err(|e| Error::Database(format!("failed to read session row: {e}")))?);
        }
        Ok(sessions)
    }

    /// Bulk title update across every turn of a session. This is the
    /// authoritative displayed title and overrides any per-turn default.
    pub fn rename_session(&self, session_id: &str, new_title: &str) -> Result<usize> {
        let updated = self
            .conn
            .execute(
                "UPDATE turns SET title = ?1 WHERE session_id = ?2",
                params![new_title, session_id],
            )
            .map_err(|e| Error::Database(format!("failed to rename session: {e}")))?;
        Ok(updated)
    }

    /// Delete every turn of a session. Returns the number of deleted rows.
    pub fn delete_session(&self, session_id: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM turns WHERE session_id = ?1", params![session_id])
            .map_err(|e| Error::Database(format!("failed to delete session: {e}")))?;
        Ok(deleted)
    }

    /// The single most recent turn across all sessions, if any.
    pub fn latest_turn(&self) -> Result<Option<Turn>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, user_msg, bot_reply, image_ref, timestamp, title
                 FROM turns
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
            )
            .map_err(|e| Error::Database(format!("failed to prepare latest-turn query: {e}")))?;

        let mut rows = stmt
            .query_map([], row_to_turn)
            .map_err(|e| Error::Database(format!("failed to load latest turn: {e}")))?;

        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| Error::Database(format!("failed to read turn row: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    /// All turns at or after `cutoff`, chronological. Diary read path.
    pub fn turns_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Turn>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, session_id, user_msg, bot_reply, image_ref, timestamp, title
                 FROM turns
                 WHERE timestamp >= ?1
                 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| Error::Database(format!("failed to prepare turns-since query: {e}")))?;

        let rows = stmt
            .query_map(params![cutoff.to_rfc3339()], row_to_turn)
            .map_err(|e| Error::Database(format!("failed to load turns since cutoff: {e}")))?;

        collect_turns(rows)
    }

    /// Number of turns recorded for a session. Used for first-turn titling.
    pub fn count_turns(&self, session_id: &str) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM turns WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to count turns: {e}")))?;
        Ok(count)
    }

    /// When the inactivity watcher last dispatched a notification.
    pub fn last_notified_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT last_notified_at FROM notifier_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .ok()
            .flatten();
        Ok(raw.map(|s| parse_timestamp(&s)))
    }

    /// Record a notification dispatch so the next watcher fire in the same
    /// idle period is a no-op.
    pub fn set_last_notified_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO notifier_state (id, last_notified_at) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET last_notified_at = excluded.last_notified_at",
                params![at.to_rfc3339()],
            )
            .map_err(|e| Error::Database(format!("failed to record notification: {e}")))?;
        Ok(())
    }
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let timestamp_raw: String = row.get(5)?;
    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_msg: row.get(2)?,
        bot_reply: row.get(3)?,
        image_ref: row.get(4)?,
        timestamp: parse_timestamp(&timestamp_raw),
        title: row.get(6)?,
    })
}

fn collect_turns(
    rows: impl Iterator<Item = rusqlite::Result<Turn>>,
) -> Result<Vec<Turn>> {
    let mut turns = Vec::new();
    for row in rows {
        turns.push(row.map_err(|e| Error::Database(format!("failed to read turn row: {e}")))?);
    }
    Ok(turns)
}
