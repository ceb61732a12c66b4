use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use ember_common::{NewTurn, Result, mint_session_id, truncate_chars};
use ember_config::PersonaConfig;
use ember_db::{ChatStore, MemoryStore};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::context::ContextAssembler;
use crate::image;
use crate::keys::KeyRotator;
use crate::providers::{GenerateRequest, LlmProvider};

/// Characters of the user message used as a session's default title.
pub const TITLE_MAX_CHARS: usize = 40;

/// Characters of the raw image payload kept as a stored preview.
pub const IMAGE_PREVIEW_CHARS: usize = 100;

/// Opening token of the memory-extraction marker in model replies.
const SAVE_MARKER: &str = "[SAVE:";

/// One incoming chat turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Empty or absent mints a fresh session.
    pub session_id: Option<String>,
    pub message: String,
    /// Inline image payload, optionally with a data-URI prefix.
    pub image: Option<String>,
}

/// The user-facing result of a processed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub session_id: String,
    /// Clock time in the configured display timezone, e.g. "07:05 PM".
    pub time: String,
}

/// The turn-processing state machine: credential selection, context
/// assembly, model invocation, reply post-processing, persistence.
///
/// Provider-class failures (no credentials, bad image, model errors) are
/// converted into reply text by [`ChatEngine::degraded_reply`] so the
/// conversation stays responsive; only store failures propagate as errors.
pub struct ChatEngine {
    provider: Arc<dyn LlmProvider>,
    rotator: Arc<KeyRotator>,
    assembler: ContextAssembler,
    chat: Arc<Mutex<ChatStore>>,
    memory: Arc<Mutex<MemoryStore>>,
    display_tz: Tz,
}

impl ChatEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        rotator: Arc<KeyRotator>,
        persona: Arc<PersonaConfig>,
        chat: Arc<Mutex<ChatStore>>,
        memory: Arc<Mutex<MemoryStore>>,
        display_tz: Tz,
    ) -> Self {
        let assembler = ContextAssembler::new(persona, Arc::clone(&chat), Arc::clone(&memory));
        Self {
            provider,
            rotator,
            assembler,
            chat,
            memory,
            display_tz,
        }
    }

    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(mint_session_id);

        let reply = self.generate_reply(&session_id, &request).await?;

        let (reply, extracted_fact) = extract_save_marker(&reply);
        if let Some(fact) = extracted_fact {
            info!("model marked a fact for memory");
            if let Err(e) = self.memory.lock().await.insert_fact(&fact, Utc::now()) {
                warn!("failed to persist extracted memory: {e}");
            }
        }

        let now = Utc::now();
        let image_ref = request.image.as_deref().map(image_preview);
        {
            let chat = self.chat.lock().await;
            // Titles are assigned on a session's first turn only; a rename
            // later overrides them wholesale.
            let title = if chat.count_turns(&session_id)? == 0 {
                truncate_chars(&request.message, TITLE_MAX_CHARS)
            } else {
                String::new()
            };
            chat.append_turn(&NewTurn {
                session_id: session_id.clone(),
                user_msg: Some(request.message),
                bot_reply: reply.clone(),
                image_ref,
                timestamp: now,
                title,
            })?;
        }

        Ok(TurnOutcome {
            reply,
            session_id,
            time: format_clock(now, self.display_tz),
        })
    }

    /// Steps 2-5 of the turn pipeline. Every failure path lands in a
    /// non-empty reply string; only context-assembly store errors escape.
    async fn generate_reply(&self, session_id: &str, request: &TurnRequest) -> Result<String> {
        let Some(key) = self.rotator.next_key() else {
            return Ok(self.degraded_reply("no provider credentials configured"));
        };

        let prompt = self.assembler.build_prompt(session_id, &request.message).await?;

        let image = match request.image.as_deref() {
            Some(payload) => match image::decode_inline_image(payload) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!("inline image rejected: {e}");
                    return Ok(self.degraded_image_reply(&e.to_string()));
                }
            },
            None => None,
        };

        let gen_request = GenerateRequest { prompt, image };
        match self.provider.generate(&key, &gen_request).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) => {
                warn!("model invocation failed, degrading to text: {e}");
                Ok(self.degraded_reply(&e.to_string()))
            }
        }
    }

    /// Error-as-content: the single place internal failures become chat
    /// text. Keep every degradation path routed through here.
    fn degraded_reply(&self, detail: &str) -> String {
        format!(
            "I'm so sorry, my head feels a little foggy right now. \
             Give me a moment and ask me again? ({detail})"
        )
    }

    fn degraded_image_reply(&self, detail: &str) -> String {
        format!(
            "I'm having trouble making out that photo. \
             Could you try sending it again? ({detail})"
        )
    }
}

/// Find the first `[SAVE: …]` marker, returning the cleaned reply and the
/// enclosed fact. Unterminated or empty markers leave the reply untouched.
fn extract_save_marker(reply: &str) -> (String, Option<String>) {
    let Some(start) = reply.find(SAVE_MARKER) else {
        return (reply.to_string(), None);
    };
    let after = start + SAVE_MARKER.len();
    let Some(close) = reply[after..].find(']').map(|i| after + i) else {
        return (reply.to_string(), None);
    };

    let fact = reply[after..close].trim().to_string();
    if fact.is_empty() {
        return (reply.to_string(), None);
    }

    let mut cleaned = String::with_capacity(reply.len());
    cleaned.push_str(&reply[..start]);
    cleaned.push_str(&reply[close + 1..]);
    (cleaned.trim().to_string(), Some(fact))
}

/// Shorten a raw image payload to a stored preview so the turn log never
/// holds full image bytes.
fn image_preview(payload: &str) -> String {
    if payload.chars().count() <= IMAGE_PREVIEW_CHARS {
        payload.to_string()
    } else {
        format!("{}...", truncate_chars(payload, IMAGE_PREVIEW_CHARS))
    }
}

fn format_clock(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ember_common::Error;

    use crate::keys::ApiKey;

    enum Scripted {
        Reply(String),
        Fail(String),
    }

    struct ScriptedProvider(Scripted);

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _key: &ApiKey, _request: &GenerateRequest) -> Result<String> {
            match &self.0 {
                Scripted::Reply(text) => Ok(text.clone()),
                Scripted::Fail(detail) => Err(Error::Provider(detail.clone())),
            }
        }
    }

    fn engine(provider: ScriptedProvider, keys: Vec<String>) -> ChatEngine {
        ChatEngine::new(
            Arc::new(provider),
            Arc::new(KeyRotator::new(keys)),
            Arc::new(PersonaConfig::fallback()),
            Arc::new(Mutex::new(ChatStore::in_memory().expect("store"))),
            Arc::new(Mutex::new(MemoryStore::in_memory().expect("store"))),
            chrono_tz::Tz::UTC,
        )
    }

    fn request(message: &str) -> TurnRequest {
        TurnRequest {
            session_id: None,
            message: message.to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn mints_a_session_and_persists_the_turn() {
        let engine = engine(
            ScriptedProvider(Scripted::Reply("hello there".into())),
            vec!["k".into()],
        );

        let outcome = engine.process_turn(request("hi")).await.unwrap();
        assert_eq!(outcome.reply, "hello there");
        assert!(!outcome.session_id.is_empty());
        assert!(!outcome.time.is_empty());

        let history = engine
            .chat
            .lock()
            .await
            .session_history(&outcome.session_id)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bot_reply, "hello there");
        assert_eq!(history[0].title, "hi");
    }

    #[tokio::test]
    async fn title_is_set_on_first_turn_only() {
        let engine = engine(
            ScriptedProvider(Scripted::Reply("ok".into())),
            vec!["k".into()],
        );

        let first = engine.process_turn(request("the opening message")).await.unwrap();
        let second = engine
            .process_turn(TurnRequest {
                session_id: Some(first.session_id.clone()),
                message: "a follow-up".to_string(),
                image: None,
            })
            .await
            .unwrap();
        assert_eq!(first.session_id, second.session_id);

        let history = engine
            .chat
            .lock()
            .await
            .session_history(&first.session_id)
            .unwrap();
        assert_eq!(history[0].title, "the opening message");
        assert_eq!(history[1].title, "");
    }

    #[tokio::test]
    async fn save_marker_creates_one_fact_and_is_stripped() {
        let engine = engine(
            ScriptedProvider(Scripted::Reply(
                "Of course! [SAVE: loves coffee] I'll remember that.".into(),
            )),
            vec!["k".into()],
        );

        let outcome = engine.process_turn(request("remember I love coffee")).await.unwrap();
        assert_eq!(outcome.reply, "Of course!  I'll remember that.");
        assert!(!outcome.reply.contains('['));
        assert!(!outcome.reply.contains(']'));

        let facts = engine.memory.lock().await.list_facts().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].text, "loves coffee");

        // The persisted reply is the cleaned one.
        let history = engine
            .chat
            .lock()
            .await
            .session_history(&outcome.session_id)
            .unwrap();
        assert_eq!(history[0].bot_reply, outcome.reply);
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_reply_text() {
        let engine = engine(
            ScriptedProvider(Scripted::Fail("quota exhausted".into())),
            vec!["k".into()],
        );

        let outcome = engine.process_turn(request("hi")).await.unwrap();
        assert!(outcome.reply.contains("quota exhausted"));

        let history = engine
            .chat
            .lock()
            .await
            .session_history(&outcome.session_id)
            .unwrap();
        assert_eq!(history.len(), 1, "degraded turn must still be persisted");
    }

    #[tokio::test]
    async fn empty_credential_set_degrades_without_calling_the_model() {
        let engine = engine(
            ScriptedProvider(Scripted::Fail("must not be reached".into())),
            Vec::new(),
        );

        let outcome = engine.process_turn(request("hi")).await.unwrap();
        assert!(outcome.reply.contains("no provider credentials configured"));
        assert!(!outcome.reply.contains("must not be reached"));
    }

    #[tokio::test]
    async fn malformed_image_degrades_and_still_persists() {
        let engine = engine(
            ScriptedProvider(Scripted::Reply("unreachable".into())),
            vec!["k".into()],
        );

        let outcome = engine
            .process_turn(TurnRequest {
                session_id: None,
                message: "look at this".to_string(),
                image: Some("data:image/png;base64,@@not-base64@@".to_string()),
            })
            .await
            .unwrap();

        assert!(!outcome.reply.is_empty());
        assert!(outcome.reply.contains("base64"));
        assert_ne!(outcome.reply, "unreachable");

        let history = engine
            .chat
            .lock()
            .await
            .session_history(&outcome.session_id)
            .unwrap();
        assert_eq!(history.len(), 1);
        let preview = history[0].image_ref.as_deref().expect("preview stored");
        assert!(preview.chars().count() <= IMAGE_PREVIEW_CHARS + 3);
    }

    #[test]
    fn marker_extraction_handles_the_edge_cases() {
        // First occurrence only.
        let (clean, fact) =
            extract_save_marker("a [SAVE: one] b [SAVE: two] c");
        assert_eq!(fact.as_deref(), Some("one"));
        assert!(clean.contains("[SAVE: two]"));

        // Unterminated markers are ignored.
        let (clean, fact) = extract_save_marker("hello [SAVE: dangling");
        assert_eq!(fact, None);
        assert_eq!(clean, "hello [SAVE: dangling");

        // Empty markers are ignored.
        let (clean, fact) = extract_save_marker("hello [SAVE: ] there");
        assert_eq!(fact, None);
        assert_eq!(clean, "hello [SAVE: ] there");

        // No marker at all.
        let (clean, fact) = extract_save_marker("plain reply");
        assert_eq!(fact, None);
        assert_eq!(clean, "plain reply");
    }

    #[test]
    fn image_preview_truncates_long_payloads() {
        let long = "x".repeat(500);
        let preview = image_preview(&long);
        assert_eq!(preview.chars().count(), IMAGE_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));

        let short = "tiny";
        assert_eq!(image_preview(short), "tiny");
    }
}
