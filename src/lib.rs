//! Chatflow: scripted-conversation workflow engine
//!
//! Routes inbound messages from a messaging-platform webhook into a
//! statically defined conversation workflow and sends the scripted
//! replies back out through a channel adapter.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Inbound event (webhook)          │
//! │  { conversation id, text, name }        │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          Session registry               │
//! │  per-conversation state, idle expiry    │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          Workflow runner                │
//! │  walks the step tree, suspends on       │
//! │  questions, resumes on replies          │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          Channel adapter                │
//! │  text / buttons / list over transport   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The workflow definition is a JSON tree of steps loaded once at startup;
//! everything mutable lives in per-conversation sessions.

pub mod channel;
pub mod config;
pub mod inbound;
pub mod otp;
pub mod session;
pub mod store;
pub mod template;
pub mod workflow;

// Re-exports for convenience
pub use channel::{ChannelAdapter, ConsoleChannel, WhatsAppChannel};
pub use config::Config;
pub use inbound::InboundEvent;
pub use otp::{OtpStore, VerifyOutcome};
pub use session::{Session, SessionRegistry};
pub use store::{MemoryStore, MessageRecord, MessageSink, NullSink};
pub use workflow::{RunnerOptions, StepKind, Workflow, WorkflowNode, WorkflowRunner};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow definition error: {0}")]
    Definition(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
