//! HTTP request handlers

use super::sse::notice_stream;
use super::types::{
    AssignFeatureRequest, ChatRequest, ErrorResponse, FactResponse, FeatureInfo,
    FeatureListResponse, ProfileResponse, SessionListResponse, SessionResponse, SuccessResponse,
    VersionResponse,
};
use super::AppState;
use crate::fact;
use crate::features::ALL_FEATURES;
use crate::profile::UserProfile;
use crate::runtime::RuntimeError;
use crate::state_machine::{Event, ImageData, TransitionError};
use crate::store::PROFILE_KEY;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use chrono::Utc;
use serde_json::json;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Task catalog
        .route("/api/features", get(list_features))
        // Profile
        .route("/api/profile", get(get_profile).put(put_profile))
        // Session listing and lifecycle
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/new", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/select", post(select_session))
        .route("/api/sessions/:id/delete", post(delete_session))
        .route("/api/sessions/:id/feature", post(assign_feature))
        // Message flow, targets the active session
        .route("/api/chat", post(send_chat))
        // Event streaming
        .route("/api/events", get(stream_events))
        // Extras
        .route("/api/fact", get(get_fact))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Features
// ============================================================

async fn list_features() -> Json<FeatureListResponse> {
    Json(FeatureListResponse {
        features: ALL_FEATURES
            .iter()
            .map(|id| FeatureInfo::from(id.descriptor()))
            .collect(),
    })
}

// ============================================================
// Profile
// ============================================================

async fn get_profile(State(state): State<AppState>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        profile: state.profile.read().await.clone(),
    })
}

async fn put_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<SuccessResponse>, AppError> {
    profile
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.issues))?;

    *state.profile.write().await = Some(profile.clone());

    // Storage failures stay internal; the in-memory profile is authoritative
    if let Err(e) = state.store.write(PROFILE_KEY, &profile) {
        tracing::warn!(error = %e, "failed to persist profile");
    }

    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Sessions
// ============================================================

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let snapshot = state.chat.snapshot().await;
    Json(SessionListResponse::from_state(&snapshot))
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    state
        .chat
        .apply(Event::NewChat {
            id: id.clone(),
            created_at: Utc::now(),
        })
        .await?;

    let snapshot = state.chat.snapshot().await;
    let session = snapshot
        .session(&id)
        .cloned()
        .ok_or_else(|| AppError::Internal("created session not found".to_string()))?;
    Ok(Json(SessionResponse {
        busy: snapshot.is_busy(&session.id),
        session,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let snapshot = state.chat.snapshot().await;
    let session = snapshot
        .session(&id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("No such session: {id}")))?;
    Ok(Json(SessionResponse {
        busy: snapshot.is_busy(&session.id),
        session,
    }))
}

async fn select_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.chat.apply(Event::SelectChat { id }).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.chat.apply(Event::DeleteChat { id }).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn assign_feature(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AssignFeatureRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .chat
        .apply(Event::FeatureChosen {
            session_id: id,
            feature: request.feature,
        })
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Message flow
// ============================================================

async fn send_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let image = match request.image {
        Some(payload) => Some(validate_image(payload)?),
        None => None,
    };

    state
        .chat
        .apply(Event::UserMessage {
            text: request.text,
            image,
        })
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

fn validate_image(payload: super::types::ImagePayload) -> Result<ImageData, AppError> {
    if !payload.media_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!(
            "Unsupported media type: {}",
            payload.media_type
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(&payload.data)
        .map_err(|_| AppError::BadRequest("Image data is not valid base64".to_string()))?;
    Ok(ImageData {
        media_type: payload.media_type,
        data: payload.data,
    })
}

// ============================================================
// Event streaming
// ============================================================

async fn stream_events(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before snapshotting so no change between the two is lost
    let receiver = state.chat.subscribe();
    let snapshot = state.chat.snapshot().await;
    let init = json!({
        "type": "init",
        "sessions": SessionListResponse::from_state(&snapshot),
    });
    notice_stream(init, receiver)
}

// ============================================================
// Extras
// ============================================================

async fn get_fact(State(state): State<AppState>) -> Json<FactResponse> {
    Json(FactResponse {
        fact: fact::nutrition_fact(state.llm.clone()).await,
    })
}

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Error mapping
// ============================================================

/// Handler-level error with an HTTP status
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(Vec<String>),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Transition(TransitionError::SessionBusy) => {
                AppError::Conflict(TransitionError::SessionBusy.to_string())
            }
            RuntimeError::Transition(TransitionError::UnknownSession(id)) => {
                AppError::NotFound(format!("No such session: {id}"))
            }
            RuntimeError::Stopped => {
                AppError::Internal("Chat runtime is not running".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableEntity(issues) => {
                (StatusCode::UNPROCESSABLE_ENTITY, issues.join("; "))
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    #[test]
    fn validate_image_accepts_base64_png() {
        let payload = super::super::types::ImagePayload {
            media_type: "image/png".to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(b"fake image bytes"),
        };
        let image = validate_image(payload).unwrap();
        assert_eq!(image.media_type, "image/png");
    }

    #[test]
    fn validate_image_rejects_non_image_media_type() {
        let payload = super::super::types::ImagePayload {
            media_type: "application/pdf".to_string(),
            data: "Zm9v".to_string(),
        };
        assert!(matches!(
            validate_image(payload),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn validate_image_rejects_bad_base64() {
        let payload = super::super::types::ImagePayload {
            media_type: "image/jpeg".to_string(),
            data: "not base64!!".to_string(),
        };
        assert!(matches!(
            validate_image(payload),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn busy_rejection_maps_to_conflict() {
        let err = AppError::from(RuntimeError::Transition(TransitionError::SessionBusy));
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
