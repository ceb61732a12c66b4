pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    DiaryEntry, MemoryFact, NewTurn, SessionSummary, Turn, mint_session_id, truncate_chars,
};
