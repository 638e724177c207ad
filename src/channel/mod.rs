//! Outbound channel abstraction
//!
//! The runner talks to the messaging transport through [`ChannelAdapter`]:
//! plain text, quick-reply buttons (at most 3, titles clamped to 20 chars by
//! the transport), or a selectable list. Each send returns the provider's
//! message id when one is available; the runner uses it for bookkeeping only.

mod console;
mod whatsapp;

pub use console::ConsoleChannel;
pub use whatsapp::WhatsAppChannel;

use async_trait::async_trait;

use crate::config::ChannelConfig;
use crate::workflow::ListPayload;
use crate::Result;

/// Core outbound transport trait
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Name of this channel
    fn name(&self) -> &str;

    /// Send a plain text message.
    async fn send_text(&self, to: &str, text: &str) -> Result<Option<String>>;

    /// Send a prompt with quick-reply buttons.
    async fn send_buttons(&self, to: &str, text: &str, options: &[String])
        -> Result<Option<String>>;

    /// Send a selectable list.
    async fn send_list(&self, to: &str, list: &ListPayload) -> Result<Option<String>>;
}

/// Create a channel adapter based on configuration
pub fn create_channel(config: &ChannelConfig) -> Box<dyn ChannelAdapter> {
    match config {
        ChannelConfig::Whatsapp { .. } => match WhatsAppChannel::from_config(config) {
            Some(channel) => Box::new(channel),
            None => Box::new(ConsoleChannel),
        },
        ChannelConfig::Console => Box::new(ConsoleChannel),
    }
}
