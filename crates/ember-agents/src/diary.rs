use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use ember_common::Result;
use ember_config::PersonaConfig;
use ember_db::{ChatStore, DiaryStore};
use tokio::sync::Mutex;

use crate::keys::KeyRotator;
use crate::providers::{GenerateRequest, LlmProvider, generate_with_rotation};

/// Result of a diary synthesis request.
#[derive(Debug, Clone)]
pub enum DiaryOutcome {
    /// No turns today; nothing to reflect on.
    NothingToWrite,
    /// The synthesized entry, already persisted.
    Written(String),
}

/// Synthesizes a first-person diary entry from a day's turns on demand.
///
/// Unlike chat turns, a failed model call here is surfaced to the caller:
/// the diary is an explicit action, not a conversational reply, so
/// error-as-content does not apply.
pub struct DiaryWriter {
    chat: Arc<Mutex<ChatStore>>,
    diary: Arc<Mutex<DiaryStore>>,
    provider: Arc<dyn LlmProvider>,
    rotator: Arc<KeyRotator>,
    persona: Arc<PersonaConfig>,
}

impl DiaryWriter {
    pub fn new(
        chat: Arc<Mutex<ChatStore>>,
        diary: Arc<Mutex<DiaryStore>>,
        provider: Arc<dyn LlmProvider>,
        rotator: Arc<KeyRotator>,
        persona: Arc<PersonaConfig>,
    ) -> Self {
        Self {
            chat,
            diary,
            provider,
            rotator,
            persona,
        }
    }

    pub async fn write_today(&self) -> Result<DiaryOutcome> {
        let midnight = Utc::now()
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();

        let turns = self.chat.lock().await.turns_since(midnight)?;
        if turns.is_empty() {
            return Ok(DiaryOutcome::NothingToWrite);
        }

        let transcript: Vec<String> = turns
            .iter()
            .filter_map(|t| {
                t.user_msg.as_ref().map(|user| {
                    format!(
                        "{partner}: {user}\nMe: {reply}",
                        partner = self.persona.identity.partner_name,
                        reply = t.bot_reply,
                    )
                })
            })
            .collect();

        let prompt = format!(
            "Write a short first-person diary entry for today as {name}, reflecting \
             on these chats with {partner}:\n{transcript}\n\nWrite it warmly and honestly.",
            name = self.persona.name(),
            partner = self.persona.identity.partner_name,
            transcript = transcript.join("\n"),
        );

        let entry = generate_with_rotation(
            &self.rotator,
            self.provider.as_ref(),
            &GenerateRequest::text(prompt),
        )
        .await?;

        self.diary.lock().await.insert_entry(&entry, Utc::now())?;
        Ok(DiaryOutcome::Written(entry))
    }
}
