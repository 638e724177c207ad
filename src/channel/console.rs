//! Console channel for local simulation and debugging

use async_trait::async_trait;

use super::ChannelAdapter;
use crate::workflow::ListPayload;
use crate::Result;

/// Prints outbound messages to stdout. Used by `chatflow chat` and in tests
/// where the transport does not matter.
pub struct ConsoleChannel;

#[async_trait]
impl ChannelAdapter for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_text(&self, _to: &str, text: &str) -> Result<Option<String>> {
        println!("bot> {}", text);
        Ok(None)
    }

    async fn send_buttons(
        &self,
        _to: &str,
        text: &str,
        options: &[String],
    ) -> Result<Option<String>> {
        println!("bot> {}", text);
        println!("     [{}]", options.join(" | "));
        Ok(None)
    }

    async fn send_list(&self, _to: &str, list: &ListPayload) -> Result<Option<String>> {
        println!("bot> {}", list.body.text);
        for section in &list.action.sections {
            if let Some(title) = &section.title {
                println!("     -- {} --", title);
            }
            for row in &section.rows {
                println!("     * {}", row.title);
            }
        }
        Ok(None)
    }
}
