use std::sync::Arc;

use chrono_tz::Tz;
use ember_agents::{ChatEngine, DiaryWriter};
use ember_db::{ChatStore, DiaryStore, MemoryStore};
use tokio::sync::Mutex;

/// Shared application state handed to every request handler.
pub struct AppState {
    pub engine: ChatEngine,
    pub diary_writer: DiaryWriter,
    pub chat: Arc<Mutex<ChatStore>>,
    pub memory: Arc<Mutex<MemoryStore>>,
    pub diary: Arc<Mutex<DiaryStore>>,
    /// Timezone for user-facing timestamps.
    pub display_tz: Tz,
}

pub type SharedState = Arc<AppState>;
