//! Effects produced by state transitions

use crate::features::FeatureId;
use crate::state_machine::state::{ChatMessage, ImageData};
use serde::Serialize;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Persist the session-list record
    SaveSessions,

    /// Request an assistant reply (spawns as a background task)
    RequestCompletion {
        session_id: String,
        text: String,
        image: Option<ImageData>,
        /// Trailing window of messages preceding the new user message
        history: Vec<ChatMessage>,
        feature: Option<FeatureId>,
    },

    /// Request a short session title, fire and forget
    RequestTitle { session_id: String, text: String },

    /// Notify connected clients
    Notify(Notice),
}

/// Client-facing change notification, serialized onto the event stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// The session list or active pointer changed; clients refetch
    SessionsChanged,
    MessageAppended {
        session_id: String,
        message: ChatMessage,
    },
    TitleUpdated {
        session_id: String,
        title: String,
    },
    BusyChanged {
        session_id: String,
        busy: bool,
    },
    ErrorRaised {
        session_id: String,
        message: String,
    },
}

impl Notice {
    /// Event name used on the SSE stream
    pub fn event_name(&self) -> &'static str {
        match self {
            Notice::SessionsChanged => "sessions_changed",
            Notice::MessageAppended { .. } => "message",
            Notice::TitleUpdated { .. } => "title",
            Notice::BusyChanged { .. } => "busy",
            Notice::ErrorRaised { .. } => "error",
        }
    }
}
