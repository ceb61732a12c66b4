use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mint an opaque session identifier for a conversation thread.
pub fn mint_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A persisted conversation turn: one user message and the model's reply.
/// Immutable once written, except for the title which a rename may rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: i64,
    pub session_id: String,
    /// Absent for model-only or malformed entries; turns without a user
    /// message are skipped when assembling context.
    pub user_msg: Option<String>,
    pub bot_reply: String,
    /// Truncated preview of an inline image payload, never the full bytes.
    pub image_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub title: String,
}

/// Insert shape for a turn before the store assigns its row id.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub session_id: String,
    pub user_msg: Option<String>,
    pub bot_reply: String,
    pub image_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub title: String,
}

/// A durable free-text fact folded into future prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A synthesized reflection over one day's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub entry: String,
    pub date: DateTime<Utc>,
}

/// One row of the session list: a thread's display title and latest activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: String,
    pub last_activity: DateTime<Utc>,
}

/// Take at most `max` characters from the front of `text`, on a char
/// boundary. Used for turn titles and image previews.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
