use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use ember_agents::{
    ChatEngine, DiaryWriter, GeminiProvider, InactivityWatcher, KeyRotator, LlmProvider,
};
use ember_channels::{Notifier, SmtpMailer};
use ember_common::Result;
use ember_config::{AppConfig, PersonaConfig};
use ember_db::{ChatStore, DiaryStore, MemoryStore};
use tokio::sync::Mutex;
use tracing::warn;

use crate::state::{AppState, SharedState};

/// Wire the stores, provider, engine, and watcher from configuration.
/// Secrets may be missing: no API keys degrades chat to apologies, no SMTP
/// section disables the notifier. Only store and client construction can
/// fail here.
pub fn build_state(config: &AppConfig) -> Result<(SharedState, InactivityWatcher)> {
    let persona = Arc::new(match &config.persona_path {
        Some(path) => PersonaConfig::load(Path::new(path)),
        None => PersonaConfig::fallback(),
    });

    let display_tz = resolve_timezone(config.display_timezone.as_deref());

    let db_path = Path::new(&config.database.path);
    let chat = Arc::new(Mutex::new(ChatStore::open(db_path)?));
    let memory = Arc::new(Mutex::new(MemoryStore::open(db_path)?));
    let diary = Arc::new(Mutex::new(DiaryStore::open(db_path)?));

    let rotator = Arc::new(KeyRotator::new(config.provider.api_keys.clone()));
    if rotator.is_empty() {
        warn!("no provider credentials configured; chat replies will degrade");
    }

    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(
        config.provider.model.clone(),
        Duration::from_secs(config.provider.timeout_secs),
    )?);

    let notifier: Option<Arc<dyn Notifier>> = match &config.smtp {
        Some(smtp) => match SmtpMailer::new(smtp, persona.name()) {
            Ok(mailer) => Some(Arc::new(mailer)),
            Err(e) => {
                warn!("SMTP notifier disabled: {e}");
                None
            }
        },
        None => None,
    };

    let engine = ChatEngine::new(
        Arc::clone(&provider),
        Arc::clone(&rotator),
        Arc::clone(&persona),
        Arc::clone(&chat),
        Arc::clone(&memory),
        display_tz,
    );

    let diary_writer = DiaryWriter::new(
        Arc::clone(&chat),
        Arc::clone(&diary),
        Arc::clone(&provider),
        Arc::clone(&rotator),
        Arc::clone(&persona),
    );

    let watcher = InactivityWatcher::new(
        &config.watcher,
        Arc::clone(&chat),
        provider,
        rotator,
        notifier,
        persona,
    );

    let state = Arc::new(AppState {
        engine,
        diary_writer,
        chat,
        memory,
        diary,
        display_tz,
    });

    Ok((state, watcher))
}

fn resolve_timezone(name: Option<&str>) -> Tz {
    let name = name.unwrap_or("Asia/Kolkata");
    name.parse().unwrap_or_else(|_| {
        warn!("unknown display timezone '{name}', falling back to UTC");
        Tz::UTC
    })
}

#[cfg(test)]
mod tests {
    use super::resolve_timezone;

    #[test]
    fn timezone_resolution_falls_back_to_utc() {
        assert_eq!(resolve_timezone(Some("Asia/Kolkata")).name(), "Asia/Kolkata");
        assert_eq!(resolve_timezone(None).name(), "Asia/Kolkata");
        assert_eq!(resolve_timezone(Some("Not/AZone")).name(), "UTC");
    }
}
