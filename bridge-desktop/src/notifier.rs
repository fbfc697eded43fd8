//! Notification sink that writes to the tracing log.

use async_trait::async_trait;
use bridge_traits::{error::Result, GuildId, Notification, NotificationSink};
use tracing::info;

/// Logs every notification at `info`. Useful when the host has no text
/// channel to post into, and as the default for headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn send(&self, guild: &GuildId, notification: Notification) -> Result<()> {
        info!(guild_id = %guild, "{notification}");
        Ok(())
    }
}
