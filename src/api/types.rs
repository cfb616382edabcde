//! API request and response types

use crate::features::{Feature, FeatureId};
use crate::profile::UserProfile;
use crate::state_machine::{ChatSession, ChatState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feature descriptor as exposed over the API. The prompt prefix is
/// internal framing and stays out of the payload.
#[derive(Debug, Serialize)]
pub struct FeatureInfo {
    pub id: FeatureId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub welcome_message: &'static str,
}

impl From<&'static Feature> for FeatureInfo {
    fn from(feature: &'static Feature) -> Self {
        Self {
            id: feature.id,
            name: feature.name,
            description: feature.description,
            icon: feature.icon,
            welcome_message: feature.welcome_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureListResponse {
    pub features: Vec<FeatureInfo>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Option<UserProfile>,
}

/// Session as shown in the sidebar list
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub feature: Option<FeatureId>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    pub busy: bool,
}

impl SessionSummary {
    pub fn from_session(session: &ChatSession, state: &ChatState) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            feature: session.feature,
            created_at: session.created_at,
            message_count: session.messages.len(),
            busy: state.is_busy(&session.id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionSummary>,
    pub active_id: Option<String>,
}

impl SessionListResponse {
    pub fn from_state(state: &ChatState) -> Self {
        Self {
            sessions: state
                .sessions
                .iter()
                .map(|s| SessionSummary::from_session(s, state))
                .collect(),
            active_id: state.active_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: ChatSession,
    pub busy: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignFeatureRequest {
    pub feature: FeatureId,
}

/// Incoming message. Text may be blank when an image is attached.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub media_type: String,
    /// Base64-encoded bytes
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct FactResponse {
    pub fact: String,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
