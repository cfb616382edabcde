//! Common types for generation requests

/// One-shot generation request
#[derive(Debug, Clone)]
pub struct GenRequest {
    /// System instruction; empty string means none
    pub system_instruction: String,
    /// Role-tagged conversation turns, oldest first
    pub turns: Vec<Turn>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenRequest {
    /// Request consisting of a single user turn with no system instruction
    pub fn single_turn(text: impl Into<String>) -> Self {
        Self {
            system_instruction: String::new(),
            turns: vec![Turn::text(TurnRole::User, text)],
            temperature: None,
            max_output_tokens: None,
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn text(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

/// Turn author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

/// Content part within a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text {
        text: String,
    },
    /// Base64-encoded image payload
    InlineImage {
        media_type: String,
        data: String,
    },
}

/// Generation response, normalized to plain text
#[derive(Debug, Clone)]
pub struct GenResponse {
    pub text: String,
    pub usage: Usage,
}

/// Token usage statistics
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
