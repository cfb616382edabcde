//! NutriGuide - nutrition chat service
//!
//! A Rust backend implementing a chat-session state machine over a hosted
//! generative-language model, with durable local persistence.

mod api;
mod fact;
mod features;
mod llm;
mod profile;
mod prompt;
mod runtime;
mod state_machine;
mod store;
mod title;

use api::AppState;
use llm::{GeminiModel, GeminiService, LlmService, LoggingService};
use profile::UserProfile;
use runtime::traits::StoreSink;
use runtime::ChatRuntime;
use state_machine::{ChatSession, ChatState};
use std::net::SocketAddr;
use std::sync::Arc;
use store::{Store, PROFILE_KEY, SESSIONS_KEY};
use tokio::sync::RwLock;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutriguide=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let data_dir = std::env::var("NUTRIGUIDE_DATA_DIR").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.nutriguide")
    });

    let port: u16 = std::env::var("NUTRIGUIDE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| "GEMINI_API_KEY environment variable not set")?;
    let gateway = std::env::var("LLM_GATEWAY").ok();
    let model = match std::env::var("GEMINI_MODEL").ok().as_deref() {
        Some("pro" | "gemini-2.5-pro") => GeminiModel::Pro25,
        _ => GeminiModel::Flash25,
    };

    // Open the store and load persisted records
    tracing::info!(path = %data_dir, "Opening store");
    let store = Store::open(&data_dir)?;
    let sessions: Vec<ChatSession> = store.read_or_default(SESSIONS_KEY, Vec::new());
    let profile: Option<UserProfile> = store.read_or_default(PROFILE_KEY, None);

    let state = ChatState::from_sessions(sessions);
    tracing::info!(
        sessions = state.sessions.len(),
        has_profile = profile.is_some(),
        "Loaded chat state"
    );

    // Generation collaborator
    let gemini = GeminiService::new(api_key, model, gateway.as_deref())?;
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(gemini)));
    tracing::info!(model = %llm.model_id(), "Generation service initialized");

    // Spawn the chat runtime
    let profile = Arc::new(RwLock::new(profile));
    let chat = ChatRuntime::spawn(
        state,
        StoreSink::new(store.clone()),
        Arc::clone(&llm),
        Arc::clone(&profile),
    );

    let app_state = AppState {
        chat,
        profile,
        store,
        llm,
    };

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = api::create_router(app_state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("NutriGuide server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
