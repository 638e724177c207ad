//! WhatsApp Cloud API channel
//!
//! Sends messages through the Meta Graph API. Button titles are clamped to
//! the API's 20-character limit; at most the first three options are offered
//! as buttons (the runner never asks for more).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::ChannelAdapter;
use crate::config::ChannelConfig;
use crate::workflow::ListPayload;
use crate::{Error, Result};

const BUTTON_TITLE_LIMIT: usize = 20;

pub struct WhatsAppChannel {
    api_url: String,
    phone_number_id: String,
    token: String,
    client: reqwest::Client,
}

/// Response envelope of a successful send.
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppChannel {
    pub fn new(api_url: String, phone_number_id: String, token: String) -> Self {
        WhatsAppChannel {
            api_url,
            phone_number_id,
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Option<Self> {
        match config {
            ChannelConfig::Whatsapp {
                api_url,
                phone_number_id,
                token,
            } => Some(Self::new(
                api_url.clone(),
                crate::config::resolve_env(phone_number_id),
                crate::config::resolve_env(token),
            )),
            _ => None,
        }
    }

    async fn post(&self, payload: serde_json::Value) -> Result<Option<String>> {
        let url = format!("{}/{}/messages", self.api_url, self.phone_number_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "whatsapp send failed ({}): {}",
                status, body
            )));
        }

        let parsed: SendResponse = response.json().await?;
        let id = parsed.messages.into_iter().next().map(|m| m.id);
        debug!(message_id = ?id, "whatsapp message sent");
        Ok(id)
    }
}

#[async_trait]
impl ChannelAdapter for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<Option<String>> {
        self.post(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        }))
        .await
    }

    async fn send_buttons(
        &self,
        to: &str,
        text: &str,
        options: &[String],
    ) -> Result<Option<String>> {
        let buttons: Vec<serde_json::Value> = options
            .iter()
            .enumerate()
            .map(|(i, opt)| {
                let title: String = opt.chars().take(BUTTON_TITLE_LIMIT).collect();
                serde_json::json!({
                    "type": "reply",
                    "reply": { "id": format!("opt_{}", i), "title": title }
                })
            })
            .collect();

        self.post(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons }
            }
        }))
        .await
    }

    async fn send_list(&self, to: &str, list: &ListPayload) -> Result<Option<String>> {
        self.post(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": list
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ListAction, ListBody, ListRow, ListSection};

    fn sample_list() -> ListPayload {
        ListPayload {
            kind: Some("list".to_string()),
            body: ListBody {
                text: "Pick a department".to_string(),
            },
            action: ListAction {
                button: "Select".to_string(),
                sections: vec![ListSection {
                    title: None,
                    rows: vec![ListRow {
                        id: "opt_0".to_string(),
                        title: "Billing".to_string(),
                        description: None,
                    }],
                }],
            },
        }
    }

    #[tokio::test]
    async fn test_send_text_posts_to_messages_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/5550001/messages")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_body(r#"{"messages": [{"id": "wamid.1"}]}"#)
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(server.url(), "5550001".into(), "secret".into());
        let id = channel.send_text("15550002222", "hello").await.unwrap();
        assert_eq!(id.as_deref(), Some("wamid.1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_channel_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/5550001/messages")
            .with_status(401)
            .with_body(r#"{"error": {"message": "bad token"}}"#)
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(server.url(), "5550001".into(), "bad".into());
        let err = channel.send_text("15550002222", "hello").await.unwrap_err();
        assert!(matches!(err, Error::Channel(_)));
    }

    #[tokio::test]
    async fn test_send_list_serializes_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/5550001/messages")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"type": "interactive", "interactive": {"body": {"text": "Pick a department"}}}"#
                    .to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"messages": []}"#)
            .create_async()
            .await;

        let channel = WhatsAppChannel::new(server.url(), "5550001".into(), "secret".into());
        let id = channel.send_list("15550002222", &sample_list()).await.unwrap();
        assert!(id.is_none());
        mock.assert_async().await;
    }
}
