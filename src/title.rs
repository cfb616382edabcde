//! Session title generation
//!
//! Generates a short title from the first user message of a session. Any
//! failure keeps the default "New Chat" title; nothing here is fatal.

use crate::llm::{GenRequest, LlmService};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TITLE_PROMPT: &str = "Generate a very short, concise title (4-5 words max) for the following user query. The title should be suitable for a chat history list. Do not use quotes or any introductory text. Just provide the title.";

const TITLE_TIMEOUT: Duration = Duration::from_secs(10);
const TITLE_TEMPERATURE: f32 = 0.2;
const MAX_TITLE_LENGTH: usize = 60;
const MAX_QUERY_LENGTH: usize = 500;

/// Generate a title for a session based on its first user message.
///
/// Returns None if title generation fails (timeout, error, blank output);
/// the caller keeps the default title in that case.
pub async fn generate_chat_title(
    message_text: &str,
    llm_service: Arc<dyn LlmService>,
) -> Option<String> {
    let truncated = truncate_chars(message_text, MAX_QUERY_LENGTH);
    let prompt = format!("{TITLE_PROMPT}\n\nQuery: \"{truncated}\"");

    let mut request = GenRequest::single_turn(prompt);
    request.temperature = Some(TITLE_TEMPERATURE);
    request.max_output_tokens = Some(50);

    match timeout(TITLE_TIMEOUT, llm_service.generate(&request)).await {
        Ok(Ok(response)) => {
            let title = sanitize_title(&response.text);
            if title.is_empty() {
                None
            } else {
                Some(title)
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e.message, "title generation failed");
            None
        }
        Err(_) => {
            tracing::warn!("title generation timed out");
            None
        }
    }
}

/// Strip markdown quoting the model tends to add and cap the length
fn sanitize_title(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| *c != '"' && *c != '*').collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_TITLE_LENGTH)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect::<String>().trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_asterisks() {
        assert_eq!(sanitize_title("\"Weekly Meal Plan\""), "Weekly Meal Plan");
        assert_eq!(sanitize_title("**Bold Title**"), "Bold Title");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(
            sanitize_title("  Label \n Reading   Basics  "),
            "Label Reading Basics"
        );
    }

    #[test]
    fn sanitize_caps_length_on_char_boundary() {
        let long = "a very long title ".repeat(10);
        let result = sanitize_title(&long);
        assert!(result.chars().count() <= MAX_TITLE_LENGTH);
    }

    #[test]
    fn truncate_handles_multibyte_text() {
        let text = "üñïçödé ".repeat(100);
        let result = truncate_chars(&text, MAX_QUERY_LENGTH);
        assert!(result.chars().count() <= MAX_QUERY_LENGTH);
    }
}
