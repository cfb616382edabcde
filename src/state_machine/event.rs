//! Events that drive the chat state machine
//!
//! Session ids and timestamps are generated at the edge and carried in the
//! event so transitions stay pure.

use crate::features::FeatureId;
use crate::state_machine::state::ImageData;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    NewChat {
        id: String,
        created_at: DateTime<Utc>,
    },
    SelectChat {
        id: String,
    },
    DeleteChat {
        id: String,
    },
    FeatureChosen {
        session_id: String,
        feature: FeatureId,
    },
    /// Send a message to the active session
    UserMessage {
        text: String,
        image: Option<ImageData>,
    },

    // Collaborator completions
    CompletionFinished {
        session_id: String,
        /// Generated reply text, or a human-readable failure message
        outcome: Result<String, String>,
    },
    TitleReady {
        session_id: String,
        title: String,
    },
}
