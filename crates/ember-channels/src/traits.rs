use async_trait::async_trait;
use ember_common::Result;

/// Send-only interface for dispatching an outbound notification.
///
/// Designed to be wrapped in `Arc` and shared with background tasks (the
/// inactivity watcher). Delivery is best-effort: callers log failures and
/// move on, they never retry or escalate.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Unique identifier for this channel type.
    fn name(&self) -> &str;

    /// Deliver one message through this channel.
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}
