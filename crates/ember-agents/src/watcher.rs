use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ember_channels::Notifier;
use ember_common::{Result, Turn};
use ember_config::{PersonaConfig, WatcherConfig};
use ember_db::ChatStore;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::keys::KeyRotator;
use crate::providers::{GenerateRequest, LlmProvider, generate_with_rotation};

/// Handle for controlling a running inactivity watcher.
#[derive(Debug, Clone)]
pub struct WatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl WatcherHandle {
    /// Signal the watcher to stop.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Recurring background task that checks the most recent global activity
/// and dispatches a check-in notification once a threshold of silence has
/// passed.
///
/// De-duplication policy: `last_notified_at` is persisted alongside the
/// turn log, and a notification fires only when the latest turn is newer
/// than it — at most one send per idle period, re-armed by new activity.
pub struct InactivityWatcher {
    chat: Arc<Mutex<ChatStore>>,
    provider: Arc<dyn LlmProvider>,
    rotator: Arc<KeyRotator>,
    notifier: Option<Arc<dyn Notifier>>,
    persona: Arc<PersonaConfig>,
    check_interval: Duration,
    idle_threshold: chrono::Duration,
}

impl InactivityWatcher {
    pub fn new(
        config: &WatcherConfig,
        chat: Arc<Mutex<ChatStore>>,
        provider: Arc<dyn LlmProvider>,
        rotator: Arc<KeyRotator>,
        notifier: Option<Arc<dyn Notifier>>,
        persona: Arc<PersonaConfig>,
    ) -> Self {
        Self {
            chat,
            provider,
            rotator,
            notifier,
            persona,
            check_interval: Duration::from_secs(config.check_interval_secs),
            idle_threshold: chrono::Duration::hours(config.idle_threshold_hours),
        }
    }

    /// Start the watcher loop. Each tick's work is awaited inline before
    /// the next sleep, so fires never overlap; a slow model call delays
    /// the following check rather than stacking a second one.
    pub fn start(self) -> WatcherHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let handle = WatcherHandle { shutdown_tx };

        tokio::spawn(async move {
            info!(interval = ?self.check_interval, "inactivity watcher started");
            loop {
                tokio::select! {
                    () = tokio::time::sleep(self.check_interval) => {
                        match self.check_and_notify().await {
                            Ok(true) => info!("inactivity check-in dispatched"),
                            Ok(false) => debug!("inactivity check: nothing to do"),
                            Err(e) => warn!("inactivity check failed: {e}"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("inactivity watcher shutting down");
                        break;
                    }
                }
            }
        });

        handle
    }

    /// One watcher tick. Returns whether a notification was dispatched.
    /// Failures bubble up to the loop, which logs and moves on — the
    /// background path never takes the process down.
    pub async fn check_and_notify(&self) -> Result<bool> {
        let Some(notifier) = &self.notifier else {
            return Ok(false);
        };

        // Read what we need, then release the lock before the model call.
        let (latest, last_notified) = {
            let chat = self.chat.lock().await;
            (chat.latest_turn()?, chat.last_notified_at()?)
        };

        let Some(latest) = latest else {
            return Ok(false);
        };

        if Utc::now() - latest.timestamp <= self.idle_threshold {
            return Ok(false);
        }

        if let Some(notified_at) = last_notified
            && notified_at >= latest.timestamp
        {
            debug!("already notified for this idle period");
            return Ok(false);
        }

        let prompt = self.checkin_prompt(&latest);
        let body = generate_with_rotation(
            &self.rotator,
            self.provider.as_ref(),
            &GenerateRequest::text(prompt),
        )
        .await?;

        let subject = format!("{} misses you...", self.persona.name());
        notifier.notify(&subject, &body).await?;
        self.chat.lock().await.set_last_notified_at(Utc::now())?;
        Ok(true)
    }

    fn checkin_prompt(&self, latest: &Turn) -> String {
        format!(
            "Last chat context: {partner} said '{user}' and you said '{reply}'. \
             It has been more than {hours} hours since you talked. As {name}, write a \
             short, emotional message asking them to come back, picking up from that \
             last exchange.",
            partner = self.persona.identity.partner_name,
            user = latest.user_msg.as_deref().unwrap_or(""),
            reply = latest.bot_reply,
            hours = self.idle_threshold.num_hours(),
            name = self.persona.name(),
        )
    }
}
