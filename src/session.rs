//! Per-conversation session state and registry
//!
//! The registry maps a conversation id to its live interpreter state.
//! Expiry is lazy: `get` evicts a session whose idle window has elapsed and
//! refreshes the activity clock otherwise; there is no background sweep.
//!
//! Sessions are handed out behind a per-conversation `tokio::sync::Mutex`.
//! The runner holds the lock for the whole of one inbound message, so two
//! near-simultaneous events for the same conversation are serialized while
//! different conversations stay fully concurrent.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default idle window after which a session is evicted on lookup.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Contact record of a conversation. Fields are written by save-response
/// actions in the workflow.
#[derive(Debug, Clone, Default)]
pub struct Contact {
    pub name: String,
    pub phone_number: String,
    pub email: String,
}

impl Contact {
    /// Write a named field. Unknown field names are ignored.
    pub fn set_field(&mut self, field: &str, value: &str) {
        match field {
            "name" => self.name = value.to_string(),
            "phone_number" => self.phone_number = value.to_string(),
            "email" => self.email = value.to_string(),
            other => debug!(field = other, "ignoring unknown contact field"),
        }
    }
}

/// Mutable interpreter state for one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub variables: HashMap<String, String>,
    pub contact: Contact,
    /// Question step currently awaiting a reply, if any. At most one.
    pub waiting_for_step: Option<String>,
    /// Per-jump-node fire counters; reset only by session recreation.
    pub jump_counts: HashMap<String, u32>,
}

impl Session {
    pub fn new(conversation_id: &str, display_name: &str) -> Self {
        Session {
            variables: HashMap::new(),
            contact: Contact {
                name: display_name.to_string(),
                phone_number: conversation_id.to_string(),
                email: String::new(),
            },
            waiting_for_step: None,
            jump_counts: HashMap::new(),
        }
    }
}

/// Shared handle to one conversation's session.
pub type SessionHandle = std::sync::Arc<tokio::sync::Mutex<Session>>;

struct Entry {
    session: SessionHandle,
    last_activity: Instant,
}

/// Conversation id → session, with lazy idle expiry.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Look a session up. The single entry point for read/modify access:
    /// evicts on idle timeout, refreshes the activity clock otherwise.
    pub fn get(&self, conversation_id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        let entry = sessions.get_mut(conversation_id)?;

        if entry.last_activity.elapsed() > self.idle_timeout {
            debug!(conversation = conversation_id, "session expired, evicting");
            sessions.remove(conversation_id);
            return None;
        }

        entry.last_activity = Instant::now();
        Some(entry.session.clone())
    }

    /// Create a fresh session: empty variables, contact seeded from the
    /// inbound event, no pending question, zero jump counts.
    pub fn create(&self, conversation_id: &str, display_name: &str) -> SessionHandle {
        let handle: SessionHandle = std::sync::Arc::new(tokio::sync::Mutex::new(Session::new(
            conversation_id,
            display_name,
        )));
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        sessions.insert(
            conversation_id.to_string(),
            Entry {
                session: handle.clone(),
                last_activity: Instant::now(),
            },
        );
        handle
    }

    /// Remove a session (workflow completion).
    pub fn delete(&self, conversation_id: &str) {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        sessions.remove(conversation_id);
    }

    /// Number of live (possibly stale) entries.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_refreshes_activity() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        registry.create("c1", "Dana");

        // Touch every 40s; the session must survive well past one window.
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(40)).await;
            assert!(registry.get("c1").is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_evicted_on_lookup() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        registry.create("c1", "Dana");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(registry.get("c1").is_none());
        // The entry is gone, not just hidden.
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_session_starts_clean() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        {
            let handle = registry.create("c1", "Dana");
            let mut session = handle.lock().await;
            session.variables.insert("left".into(), "over".into());
            session.jump_counts.insert("j1".into(), 9);
        }

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(registry.get("c1").is_none());

        let handle = registry.create("c1", "Dana");
        let session = handle.lock().await;
        assert!(session.variables.is_empty());
        assert!(session.jump_counts.is_empty());
        assert!(session.waiting_for_step.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let registry = SessionRegistry::default();
        registry.create("c1", "Dana");
        registry.delete("c1");
        assert!(registry.get("c1").is_none());
    }

    #[tokio::test]
    async fn test_create_seeds_contact() {
        let registry = SessionRegistry::default();
        let handle = registry.create("15550001111", "Dana");
        let session = handle.lock().await;
        assert_eq!(session.contact.name, "Dana");
        assert_eq!(session.contact.phone_number, "15550001111");
        assert_eq!(session.contact.email, "");
    }

    #[test]
    fn test_contact_set_field() {
        let mut contact = Contact::default();
        contact.set_field("email", "dana@example.com");
        contact.set_field("name", "Dana");
        contact.set_field("favorite_color", "blue");
        assert_eq!(contact.email, "dana@example.com");
        assert_eq!(contact.name, "Dana");
    }
}
