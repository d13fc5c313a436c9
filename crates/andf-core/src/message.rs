//! Conversation history.
//!
//! The store is append-only: insertion order is the conversation order and a
//! message never changes once it is in. `created_at` is for display only.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::backend::SourceRef;

pub const WELCOME_TEXT: &str = "Bonjour ! Je suis l'assistant intelligent de l'ANDF (Agence Nationale du Domaine et du Foncier) du Bénin. Je peux vous aider avec vos questions sur le foncier, les titres de propriété, les procédures administratives et la réglementation. Comment puis-je vous aider aujourd'hui ?";

/// Session-unique, strictly increasing message identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    pub confidence: Option<f64>,
    pub sources: Vec<SourceRef>,
    pub is_error: bool,
    pub created_at: DateTime<Local>,
    /// Round-trip time of the exchange that produced this reply
    pub latency: Option<Duration>,
}

impl ChatMessage {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: ChatRole::User,
            content: content.into(),
            confidence: None,
            sources: Vec::new(),
            is_error: false,
            created_at: Local::now(),
            latency: None,
        }
    }

    pub fn assistant(
        id: MessageId,
        content: impl Into<String>,
        confidence: Option<f64>,
        sources: Vec<SourceRef>,
    ) -> Self {
        Self {
            id,
            role: ChatRole::Assistant,
            content: content.into(),
            confidence,
            sources,
            is_error: false,
            created_at: Local::now(),
            latency: None,
        }
    }

    /// Placeholder for an exchange that failed
    pub fn error(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(id, content, None, Vec::new())
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Local>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// A store holding only the welcome message
    pub fn new() -> Self {
        let mut store = Self {
            messages: Vec::new(),
            next_id: 1,
        };
        let id = store.next_id();
        store.append(ChatMessage::assistant(id, WELCOME_TEXT, None, Vec::new()));
        store
    }

    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a message at the end.
    ///
    /// Ids must come from [`next_id`](Self::next_id) and be appended in the
    /// order they were issued; anything else is a bug in the caller.
    pub fn append(&mut self, message: ChatMessage) {
        if let Some(last) = self.messages.last() {
            assert!(
                message.id > last.id,
                "message id {} appended after {}",
                message.id,
                last.id
            );
        }
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Only the seeded welcome message so far
    pub fn is_initial(&self) -> bool {
        self.messages.len() == 1
    }
}
