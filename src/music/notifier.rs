use std::sync::Arc;
use std::time::Duration;

use poise::serenity_prelude::{ChannelId, CreateEmbed, CreateMessage, Http};
use serenity::async_trait;
use tracing::{debug, warn};

/// Embed colour of autoplay warnings.
pub const WARNING_COLOR: u32 = 0xFFD93D;

/// Best-effort sink for short notices in a guild text channel.
///
/// Implementations must swallow their own failures: a notice that cannot be
/// delivered is logged, never propagated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: ChannelId, message: &str, auto_delete: Option<Duration>);
}

/// Create the embed used for autoplay warnings
pub fn warning_embed(message: &str) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!("> {}", message))
        .color(WARNING_COLOR)
}

/// Posts notices through the Discord HTTP API.
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel: ChannelId, message: &str, auto_delete: Option<Duration>) {
        let create_message = CreateMessage::new().embed(warning_embed(message));

        let sent = match channel.send_message(self.http.clone(), create_message).await {
            Ok(sent) => sent,
            Err(e) => {
                warn!("Failed to send notice to channel {}: {}", channel, e);
                return;
            }
        };

        let Some(delay) = auto_delete else {
            return;
        };

        // Delete the notice in the background once it has been up long enough
        let http = self.http.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match http.delete_message(channel, sent.id, None).await {
                Ok(()) => debug!("Deleted notice {} in channel {}", sent.id, channel),
                Err(e) => warn!(
                    "Failed to delete notice {} in channel {}: {}",
                    sent.id, channel, e
                ),
            }
        });
    }
}
