//! HTTP API for NutriGuide

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::LlmService;
use crate::profile::UserProfile;
use crate::runtime::ChatHandle;
use crate::store::Store;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatHandle,
    pub profile: Arc<RwLock<Option<UserProfile>>>,
    pub store: Store,
    pub llm: Arc<dyn LlmService>,
}
