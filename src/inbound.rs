//! Inbound webhook payload decoding
//!
//! The messaging platform delivers batches of messages inside a nested
//! envelope (`entry[].changes[].value`). This module flattens that envelope
//! into [`InboundEvent`]s for the runner and extracts a text representation
//! per message type. HTTP routing and signature verification live outside
//! this crate; only the wire shapes are modeled here.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// What the runner consumes: one message from one conversation.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub conversation_id: String,
    pub text: String,
    pub display_name: String,
}

impl InboundEvent {
    pub fn new(conversation_id: &str, text: &str, display_name: &str) -> Self {
        InboundEvent {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

/// Top-level webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: String,
}

/// One delivered message. Exactly one of the typed payloads is populated,
/// matching `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub image: Option<MediaContent>,
    #[serde(default)]
    pub video: Option<MediaContent>,
    #[serde(default)]
    pub audio: Option<MediaContent>,
    #[serde(default)]
    pub document: Option<MediaContent>,
    #[serde(default)]
    pub sticker: Option<MediaContent>,
    #[serde(default)]
    pub location: Option<LocationContent>,
    #[serde(default)]
    pub button: Option<ButtonContent>,
    #[serde(default)]
    pub interactive: Option<InteractiveContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationContent {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonContent {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveContent {
    #[serde(default)]
    pub button_reply: Option<ReplyContent>,
    #[serde(default)]
    pub list_reply: Option<ReplyContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyContent {
    #[serde(default)]
    pub title: String,
}

/// Media reference carried by a message, when present.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub media_id: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

impl InboundMessage {
    /// Text representation of the message, per type. Replies to buttons and
    /// lists surface the selected title, which is what question validation
    /// compares against.
    pub fn content(&self) -> String {
        match self.kind.as_str() {
            "text" => self.text.as_ref().map(|t| t.body.clone()).unwrap_or_default(),
            "image" => caption(&self.image),
            "video" => caption(&self.video),
            "audio" => String::new(),
            "document" => self
                .document
                .as_ref()
                .and_then(|d| d.filename.clone())
                .unwrap_or_else(|| "file".to_string()),
            "location" => match &self.location {
                Some(l) => format!("[Location: {}, {}]", l.latitude, l.longitude),
                None => String::new(),
            },
            "sticker" => "[Sticker]".to_string(),
            "button" => match &self.button {
                Some(b) if !b.text.is_empty() => b.text.clone(),
                _ => "[Button Response]".to_string(),
            },
            "interactive" => {
                let reply = self.interactive.as_ref().and_then(|i| {
                    i.button_reply
                        .as_ref()
                        .or(i.list_reply.as_ref())
                        .map(|r| r.title.clone())
                });
                reply.unwrap_or_else(|| "[Interactive Response]".to_string())
            }
            other => format!("[Unsupported message type: {}]", other),
        }
    }

    /// Media metadata, for message types that carry an attachment.
    pub fn media(&self) -> Option<MediaInfo> {
        let media = match self.kind.as_str() {
            "image" => self.image.as_ref(),
            "video" => self.video.as_ref(),
            "audio" => self.audio.as_ref(),
            "document" => self.document.as_ref(),
            "sticker" => self.sticker.as_ref(),
            _ => None,
        }?;
        Some(MediaInfo {
            media_id: media.id.clone(),
            mime_type: media.mime_type.clone(),
            filename: media.filename.clone(),
        })
    }

    /// Delivery time, when the platform stamped one (unix seconds).
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        let seconds: i64 = self.timestamp.as_deref()?.parse().ok()?;
        Utc.timestamp_opt(seconds, 0).single()
    }
}

/// Flatten a webhook payload into runner events. Messages are paired with
/// contacts by position; a missing contact leaves the display name as
/// "Unknown".
pub fn events(payload: &WebhookPayload) -> Vec<InboundEvent> {
    let mut out = Vec::new();

    if payload.object != "whatsapp_business_account" {
        return out;
    }

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                continue;
            }
            for (i, message) in change.value.messages.iter().enumerate() {
                let display_name = change
                    .value
                    .contacts
                    .get(i)
                    .and_then(|c| c.profile.as_ref())
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());

                out.push(InboundEvent {
                    conversation_id: message.from.clone(),
                    text: message.content(),
                    display_name,
                });
            }
        }
    }

    out
}

fn caption(media: &Option<MediaContent>) -> String {
    media
        .as_ref()
        .and_then(|m| m.caption.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "metadata": { "phone_number_id": "5550001" },
                    "contacts": [
                        { "profile": { "name": "Dana" } }
                    ],
                    "messages": [
                        { "id": "wamid.1", "from": "15550002222", "timestamp": "1700000000",
                          "type": "text", "text": { "body": "hello" } },
                        { "id": "wamid.2", "from": "15550003333",
                          "type": "interactive",
                          "interactive": { "list_reply": { "id": "opt_1", "title": "Billing" } } }
                    ]
                }
            }]
        }]
    }"#;

    #[test]
    fn test_events_flatten_and_pair_contacts() {
        let payload: WebhookPayload = serde_json::from_str(SAMPLE).unwrap();
        let events = events(&payload);
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].conversation_id, "15550002222");
        assert_eq!(events[0].text, "hello");
        assert_eq!(events[0].display_name, "Dana");

        // Second message has no paired contact.
        assert_eq!(events[1].text, "Billing");
        assert_eq!(events[1].display_name, "Unknown");
    }

    #[test]
    fn test_other_objects_ignored() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"object": "instagram", "entry": []}"#).unwrap();
        assert!(events(&payload).is_empty());
    }

    #[test]
    fn test_content_extraction_per_type() {
        let msg = |json: &str| -> InboundMessage { serde_json::from_str(json).unwrap() };

        assert_eq!(
            msg(r#"{"id":"1","from":"p","type":"document","document":{"filename":"a.pdf"}}"#)
                .content(),
            "a.pdf"
        );
        assert_eq!(
            msg(r#"{"id":"1","from":"p","type":"document","document":{}}"#).content(),
            "file"
        );
        assert_eq!(
            msg(r#"{"id":"1","from":"p","type":"sticker","sticker":{"id":"m1"}}"#).content(),
            "[Sticker]"
        );
        assert_eq!(
            msg(r#"{"id":"1","from":"p","type":"location","location":{"latitude":1.5,"longitude":2.25}}"#)
                .content(),
            "[Location: 1.5, 2.25]"
        );
        assert_eq!(
            msg(r#"{"id":"1","from":"p","type":"reaction"}"#).content(),
            "[Unsupported message type: reaction]"
        );
    }

    #[test]
    fn test_media_info() {
        let message: InboundMessage = serde_json::from_str(
            r#"{"id":"1","from":"p","type":"image",
                "image":{"id":"m9","mime_type":"image/jpeg","caption":"receipt"}}"#,
        )
        .unwrap();
        assert_eq!(message.content(), "receipt");
        let media = message.media().unwrap();
        assert_eq!(media.media_id.as_deref(), Some("m9"));
        assert_eq!(media.mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_received_at() {
        let message: InboundMessage = serde_json::from_str(
            r#"{"id":"1","from":"p","timestamp":"1700000000","type":"text","text":{"body":"x"}}"#,
        )
        .unwrap();
        let ts = message.received_at().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }
}
