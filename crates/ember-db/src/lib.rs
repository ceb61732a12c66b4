pub mod chat_store;
pub mod diary_store;
pub mod memory_store;

pub use chat_store::ChatStore;
pub use diary_store::DiaryStore;
pub use memory_store::MemoryStore;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Parse a stored RFC 3339 timestamp, falling back to now on corruption so
/// a single bad row never poisons a whole query.
pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("failed to parse timestamp '{value}': {e}, falling back to now");
            Utc::now()
        })
}
