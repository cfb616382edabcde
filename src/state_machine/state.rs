//! Chat state types

use crate::features::FeatureId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Title given to a session before one is generated from its first message
pub const DEFAULT_TITLE: &str = "New Chat";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// Displayable image reference carried on a message.
/// The payload is stored with the message so it survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub media_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

/// One turn in a conversation, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageData>,
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub feature: Option<FeatureId>,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    /// Monotonic message-id counter. Never reset, so ids stay unique within
    /// the session even after the message list is replaced.
    #[serde(default = "default_next_message_id")]
    pub next_message_id: u64,
}

fn default_next_message_id() -> u64 {
    1
}

impl ChatSession {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            feature: None,
            messages: Vec::new(),
            created_at,
            next_message_id: 1,
        }
    }

    /// Append a message, allocating its id from the session counter
    pub fn push_message(
        &mut self,
        role: Role,
        text: impl Into<String>,
        image: Option<ImageData>,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_message_id,
            role,
            text: text.into(),
            image,
        };
        self.next_message_id += 1;
        self.messages.push(message.clone());
        message
    }

    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Sessions without a feature show the task-selection view
    #[allow(dead_code)] // State query utility
    pub fn needs_feature(&self) -> bool {
        self.feature.is_none()
    }
}

/// The full chat model: every session, the active pointer, and transient
/// request-tracking state. Only the transition function mutates this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    /// Sessions, newest first
    pub sessions: Vec<ChatSession>,
    pub active_id: Option<String>,
    /// Session ids with a generation request in flight
    pub in_flight: BTreeSet<String>,
    /// Most recent generation failure, cleared on the next send
    pub last_error: Option<String>,
}

impl ChatState {
    /// Rebuild state from persisted sessions; the newest becomes active
    pub fn from_sessions(sessions: Vec<ChatSession>) -> Self {
        let active_id = sessions.first().map(|s| s.id.clone());
        Self {
            sessions,
            active_id,
            in_flight: BTreeSet::new(),
            last_error: None,
        }
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active_id.as_deref().and_then(|id| self.session(id))
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }
}
