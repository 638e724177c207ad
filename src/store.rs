//! Message records and the persistence callback
//!
//! The runner emits one record per message sent or received. Where those
//! records go is someone else's concern: the [`MessageSink`] trait is the
//! narrow seam, with an in-memory store for local runs and a no-op sink for
//! tests. The engine must behave identically with either.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One sent or received message, as handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    /// Provider message id when known, otherwise a generated one.
    pub id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub content: String,
    /// Display name of the sender, when the event carried one.
    pub sender_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(
        conversation_id: &str,
        direction: Direction,
        content: &str,
        provider_id: Option<String>,
    ) -> Self {
        MessageRecord {
            id: provider_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            conversation_id: conversation_id.to_string(),
            direction,
            content: content.to_string(),
            sender_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_sender_name(mut self, name: &str) -> Self {
        self.sender_name = Some(name.to_string());
        self
    }
}

/// Persistence callback for message records
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn record(&self, record: MessageRecord) -> Result<()>;
}

/// Sink that drops everything.
pub struct NullSink;

#[async_trait]
impl MessageSink for NullSink {
    async fn record(&self, _record: MessageRecord) -> Result<()> {
        Ok(())
    }
}

/// Rolling summary of one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub customer_name: String,
    pub status: String,
    pub unread_count: u32,
    pub last_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory message store. Records are lost on process exit; this backs
/// local runs and tests, not production persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    conversations: HashMap<String, ConversationSummary>,
    messages: HashMap<String, Vec<MessageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All conversations, most recently updated first.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let inner = self.inner.lock().expect("store poisoned");
        let mut all: Vec<_> = inner.conversations.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all
    }

    /// Messages of one conversation, oldest first. Marks the conversation
    /// read.
    pub fn messages(&self, conversation_id: &str) -> Vec<MessageRecord> {
        let mut inner = self.inner.lock().expect("store poisoned");
        if let Some(summary) = inner.conversations.get_mut(conversation_id) {
            summary.unread_count = 0;
        }
        inner
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageSink for MemoryStore {
    async fn record(&self, record: MessageRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("store poisoned");
        let now = record.created_at;

        let summary = inner
            .conversations
            .entry(record.conversation_id.clone())
            .or_insert_with(|| ConversationSummary {
                conversation_id: record.conversation_id.clone(),
                customer_name: "Unknown".to_string(),
                status: "open".to_string(),
                unread_count: 0,
                last_message: String::new(),
                created_at: now,
                updated_at: now,
            });

        summary.updated_at = now;
        summary.last_message = record.content.clone();
        if record.direction == Direction::Inbound {
            summary.unread_count += 1;
            if let Some(name) = &record.sender_name {
                summary.customer_name = name.clone();
            }
        }

        inner
            .messages
            .entry(record.conversation_id.clone())
            .or_default()
            .push(record);

        Ok(())
    }
}
