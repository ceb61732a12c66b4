use std::sync::Arc;

use ember_common::Result;
use ember_config::PersonaConfig;
use ember_db::{ChatStore, MemoryStore};
use tokio::sync::Mutex;
use tracing::warn;

/// Most recent memory facts folded into the system prompt.
pub const MEMORY_WINDOW: usize = 20;

/// Most recent turns included verbatim in a new prompt.
pub const HISTORY_WINDOW: usize = 10;

/// Builds model input from the persona, durable memory, and the recent
/// turn window for a session.
///
/// Prompt ordering is a contract: persona and memory first, then the
/// chronological turn window, then the new utterance directly before the
/// instruction reminder. The model treats earlier text as standing
/// context and the text adjacent to the new input as most salient.
pub struct ContextAssembler {
    persona: Arc<PersonaConfig>,
    chat: Arc<Mutex<ChatStore>>,
    memory: Arc<Mutex<MemoryStore>>,
}

impl ContextAssembler {
    pub fn new(
        persona: Arc<PersonaConfig>,
        chat: Arc<Mutex<ChatStore>>,
        memory: Arc<Mutex<MemoryStore>>,
    ) -> Self {
        Self {
            persona,
            chat,
            memory,
        }
    }

    /// The persona block plus a bounded bulleted slice of memory facts.
    /// A failing memory read degrades to omitting the block; prompt
    /// construction itself never fails.
    pub async fn build_system_prompt(&self) -> String {
        let mut base = self.persona.render();

        match self.memory.lock().await.recent_facts(MEMORY_WINDOW) {
            Ok(facts) if !facts.is_empty() => {
                let rendered: Vec<String> =
                    facts.iter().map(|f| format!("- {}", f.text)).collect();
                base.push_str(&format!(
                    "\n\n[PERMANENT MEMORIES]:\n{}\n(Use these memories to stay close to them.)",
                    rendered.join("\n")
                ));
            }
            Ok(_) => {}
            Err(e) => warn!("memory read failed, omitting memories from prompt: {e}"),
        }

        base
    }

    /// The recent turn window rendered as `User:` / `<name>:` pairs in
    /// chronological order. Turns without a user message are skipped.
    pub async fn build_turn_context(&self, session_id: &str) -> Result<String> {
        let recent = self
            .chat
            .lock()
            .await
            .recent_turns(session_id, HISTORY_WINDOW)?;

        let mut history = String::new();
        for turn in recent.iter().rev() {
            let Some(user_msg) = &turn.user_msg else {
                continue;
            };
            history.push_str(&format!(
                "User: {user_msg}\n{name}: {reply}\n",
                name = self.persona.name(),
                reply = turn.bot_reply,
            ));
        }
        Ok(history)
    }

    /// The full prompt for one turn.
    pub async fn build_prompt(&self, session_id: &str, user_input: &str) -> Result<String> {
        let system = self.build_system_prompt().await;
        let history = self.build_turn_context(session_id).await?;

        Ok(format!(
            "{system}\n\nCURRENT CONVERSATION:\n{history}\n\nUser: {user_input}\n\
             (Reply authentically as {name}. If they ask you to remember something, \
             include [SAVE: the fact] once in your reply; it will be stored and \
             hidden from them.)",
            name = self.persona.name(),
        ))
    }
}
