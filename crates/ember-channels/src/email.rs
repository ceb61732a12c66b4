use async_trait::async_trait;
use ember_common::{Error, Result};
use ember_config::SmtpConfig;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::traits::Notifier;

/// SMTP-backed notifier. STARTTLS on the configured relay, credentials
/// from config; the sender address doubles as the login username.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, display_name: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| Error::Notify(format!("invalid SMTP relay '{}': {e}", config.host)))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from: Mailbox = format!("{display_name} <{}>", config.username)
            .parse()
            .map_err(|e| Error::Notify(format!("invalid sender address: {e}")))?;
        let to: Mailbox = config
            .recipient
            .parse()
            .map_err(|e| Error::Notify(format!("invalid recipient address: {e}")))?;

        info!(relay = %config.host, "SMTP notifier configured");
        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| Error::Notify(format!("failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Notify(format!("SMTP send failed: {e}")))?;
        Ok(())
    }
}
