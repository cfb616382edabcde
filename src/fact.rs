//! One-shot nutrition fact generation

use crate::llm::{GenRequest, LlmService};
use std::sync::Arc;

const FACT_PROMPT: &str =
    "Tell me a short, surprising, and interesting nutrition fact. Keep it to 1-2 sentences.";

/// Shown when the generation collaborator is unavailable
pub const FALLBACK_FACT: &str = "Did you know? Honey never spoils. Archaeologists have found pots of honey in ancient Egyptian tombs that are over 3,000 years old and still perfectly edible.";

/// Fetch a nutrition fact, falling back to a fixed one on any failure
pub async fn nutrition_fact(llm_service: Arc<dyn LlmService>) -> String {
    let request = GenRequest::single_turn(FACT_PROMPT);
    match llm_service.generate(&request).await {
        Ok(response) => response.text.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e.message, "nutrition fact generation failed");
            FALLBACK_FACT.to_string()
        }
    }
}
