pub mod context;
pub mod diary;
pub mod engine;
pub mod image;
pub mod keys;
pub mod providers;
pub mod watcher;

pub use context::ContextAssembler;
pub use diary::{DiaryOutcome, DiaryWriter};
pub use engine::{ChatEngine, TurnOutcome, TurnRequest};
pub use keys::{ApiKey, KeyRotator};
pub use providers::{GenerateRequest, InlineImage, LlmProvider, gemini::GeminiProvider};
pub use watcher::{InactivityWatcher, WatcherHandle};
