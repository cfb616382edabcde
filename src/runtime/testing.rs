//! Test doubles for the runtime seams

use super::traits::StateSink;
use crate::llm::{GenRequest, GenResponse, LlmError, LlmService, Usage};
use crate::state_machine::ChatSession;
use crate::store::StoreResult;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Sink that records every persisted session list
#[derive(Default)]
pub struct MemorySink {
    pub saves: Arc<Mutex<Vec<Vec<ChatSession>>>>,
}

impl StateSink for MemorySink {
    fn save_sessions(&self, sessions: &[ChatSession]) -> StoreResult<()> {
        self.saves.lock().unwrap().push(sessions.to_vec());
        Ok(())
    }
}

type ReplyFn = dyn Fn(&GenRequest) -> Result<String, LlmError> + Send + Sync;

/// Scriptable generation service. An optional semaphore gate holds every
/// request until the test releases permits, making in-flight windows
/// deterministic.
pub struct MockLlm {
    reply: Box<ReplyFn>,
    gate: Option<Arc<Semaphore>>,
}

impl MockLlm {
    /// Answer chat requests with `reply` and title requests with `title`.
    /// Title requests are recognized by their empty system instruction.
    pub fn scripted(reply: &str, title: &str) -> Self {
        let reply = reply.to_string();
        let title = title.to_string();
        Self {
            reply: Box::new(move |request| {
                if request.system_instruction.is_empty() {
                    Ok(title.clone())
                } else {
                    Ok(reply.clone())
                }
            }),
            gate: None,
        }
    }

    /// Fail every request with the given message
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self {
            reply: Box::new(move |_| Err(LlmError::rate_limit(message.clone()))),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn generate(&self, request: &GenRequest) -> Result<GenResponse, LlmError> {
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| LlmError::unknown("gate closed"))?;
            permit.forget();
        }
        (self.reply)(request).map(|text| GenResponse {
            text,
            usage: Usage::default(),
        })
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}
