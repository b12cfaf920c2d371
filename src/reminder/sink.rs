use anyhow::Result;
use serenity::all::{ChannelId, CreateAllowedMentions, CreateMessage, Http};
use std::sync::Arc;

/// Delivers a rendered reminder to its destination.
#[serenity::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel_id: u64, rendered: &str) -> Result<()>;
}

/// Posts reminders to Discord channels over the REST API.
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[serenity::async_trait]
impl NotificationSink for DiscordSink {
    async fn send(&self, channel_id: u64, rendered: &str) -> Result<()> {
        // User mentions only.  Reminder text must not be able to ping roles or @everyone.
        let mentions = CreateAllowedMentions::new().all_users(true);
        let message = CreateMessage::new()
            .content(rendered)
            .allowed_mentions(mentions);

        ChannelId::new(channel_id)
            .send_message(&self.http, message)
            .await?;
        Ok(())
    }
}
