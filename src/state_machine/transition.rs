//! Pure state transition function
//!
//! Given the same state and event this always produces the same new state
//! and effects, with no I/O. The runtime executes the effects.

use super::effect::{Effect, Notice};
use super::event::Event;
use super::state::{ChatState, Role};
use thiserror::Error;

/// Trailing window of prior messages sent with each generation request
pub const HISTORY_WINDOW: usize = 8;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A response is already pending for this session")]
    SessionBusy,
    #[error("No such session: {0}")]
    UnknownSession(String),
}

/// Pure transition function
pub fn transition(state: &ChatState, event: Event) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // Session lifecycle
        // ============================================================
        Event::NewChat { id, created_at } => {
            let mut new = state.clone();
            new.sessions
                .insert(0, super::state::ChatSession::new(id.clone(), created_at));
            new.active_id = Some(id);
            Ok(TransitionResult::new(new)
                .with_effect(Effect::SaveSessions)
                .with_effect(Effect::Notify(Notice::SessionsChanged)))
        }

        Event::SelectChat { id } => {
            if state.session(&id).is_none() {
                return Ok(TransitionResult::new(state.clone()));
            }
            let mut new = state.clone();
            new.active_id = Some(id);
            Ok(TransitionResult::new(new).with_effect(Effect::Notify(Notice::SessionsChanged)))
        }

        Event::DeleteChat { id } => {
            let Some(removed_idx) = state.index_of(&id) else {
                return Ok(TransitionResult::new(state.clone()));
            };
            let mut new = state.clone();
            new.sessions.remove(removed_idx);
            new.in_flight.remove(&id);

            if new.active_id.as_deref() == Some(id.as_str()) {
                // Prefer the next-lower original index; when the head was
                // deleted, the session that shifted into its place; none if
                // the list is now empty.
                new.active_id = if new.sessions.is_empty() {
                    None
                } else {
                    let idx = removed_idx.saturating_sub(1).min(new.sessions.len() - 1);
                    Some(new.sessions[idx].id.clone())
                };
            }

            Ok(TransitionResult::new(new)
                .with_effect(Effect::SaveSessions)
                .with_effect(Effect::Notify(Notice::SessionsChanged)))
        }

        // ============================================================
        // Task assignment
        // ============================================================
        Event::FeatureChosen {
            session_id,
            feature,
        } => {
            let Some(idx) = state.index_of(&session_id) else {
                return Err(TransitionError::UnknownSession(session_id));
            };
            let mut new = state.clone();
            new.last_error = None;
            let session = &mut new.sessions[idx];
            session.feature = Some(feature);
            session.messages.clear();
            let welcome =
                session.push_message(Role::Model, feature.descriptor().welcome_message, None);
            Ok(TransitionResult::new(new)
                .with_effect(Effect::SaveSessions)
                .with_effect(Effect::Notify(Notice::SessionsChanged))
                .with_effect(Effect::Notify(Notice::MessageAppended {
                    session_id,
                    message: welcome,
                })))
        }

        // ============================================================
        // Message flow
        // ============================================================
        Event::UserMessage { text, image } => {
            let Some(session_id) = state.active_id.clone() else {
                return Ok(TransitionResult::new(state.clone()));
            };
            let blank = text.trim().is_empty();
            if blank && image.is_none() {
                return Ok(TransitionResult::new(state.clone()));
            }
            if state.is_busy(&session_id) {
                return Err(TransitionError::SessionBusy);
            }
            let Some(idx) = state.index_of(&session_id) else {
                debug_assert!(false, "active session must exist");
                return Ok(TransitionResult::new(state.clone()));
            };

            let mut new = state.clone();
            new.last_error = None;
            new.in_flight.insert(session_id.clone());

            let session = &mut new.sessions[idx];
            let first_user_message = session.user_message_count() == 0;
            let feature = session.feature;
            let history: Vec<_> = session
                .messages
                .iter()
                .rev()
                .take(HISTORY_WINDOW)
                .rev()
                .cloned()
                .collect();
            let user_message =
                session.push_message(Role::User, text.clone(), image.clone());

            let mut result = TransitionResult::new(new)
                .with_effect(Effect::SaveSessions)
                .with_effect(Effect::Notify(Notice::MessageAppended {
                    session_id: session_id.clone(),
                    message: user_message,
                }))
                .with_effect(Effect::Notify(Notice::BusyChanged {
                    session_id: session_id.clone(),
                    busy: true,
                }));

            if first_user_message && !blank {
                result = result.with_effect(Effect::RequestTitle {
                    session_id: session_id.clone(),
                    text: text.clone(),
                });
            }

            Ok(result.with_effect(Effect::RequestCompletion {
                session_id,
                text,
                image,
                history,
                feature,
            }))
        }

        Event::CompletionFinished {
            session_id,
            outcome,
        } => {
            let mut new = state.clone();
            new.in_flight.remove(&session_id);
            let Some(idx) = new.index_of(&session_id) else {
                // The session was deleted while the request was in flight
                return Ok(TransitionResult::new(new));
            };

            let (text, failure) = match outcome {
                Ok(text) => (text, None),
                Err(message) => (
                    format!("Sorry, I encountered an error: {message}"),
                    Some(message),
                ),
            };
            let message = new.sessions[idx].push_message(Role::Model, text, None);
            new.last_error.clone_from(&failure);

            let mut result = TransitionResult::new(new).with_effect(Effect::SaveSessions);
            if let Some(failure) = failure {
                result = result.with_effect(Effect::Notify(Notice::ErrorRaised {
                    session_id: session_id.clone(),
                    message: failure,
                }));
            }
            Ok(result
                .with_effect(Effect::Notify(Notice::MessageAppended {
                    session_id: session_id.clone(),
                    message,
                }))
                .with_effect(Effect::Notify(Notice::BusyChanged {
                    session_id,
                    busy: false,
                })))
        }

        Event::TitleReady { session_id, title } => {
            let Some(idx) = state.index_of(&session_id) else {
                return Ok(TransitionResult::new(state.clone()));
            };
            let mut new = state.clone();
            new.sessions[idx].title.clone_from(&title);
            Ok(TransitionResult::new(new)
                .with_effect(Effect::SaveSessions)
                .with_effect(Effect::Notify(Notice::TitleUpdated { session_id, title })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureId;
    use crate::state_machine::state::{ImageData, DEFAULT_TITLE};
    use chrono::Utc;

    fn apply(state: &ChatState, event: Event) -> TransitionResult {
        transition(state, event).expect("transition should succeed")
    }

    fn new_chat(state: &ChatState, id: &str) -> ChatState {
        apply(
            state,
            Event::NewChat {
                id: id.to_string(),
                created_at: Utc::now(),
            },
        )
        .new_state
    }

    fn send(state: &ChatState, text: &str) -> Result<TransitionResult, TransitionError> {
        transition(
            state,
            Event::UserMessage {
                text: text.to_string(),
                image: None,
            },
        )
    }

    fn completion_effect(effects: &[Effect]) -> Option<&Effect> {
        effects
            .iter()
            .find(|e| matches!(e, Effect::RequestCompletion { .. }))
    }

    fn title_effect_count(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::RequestTitle { .. }))
            .count()
    }

    // ================================================================
    // Session lifecycle
    // ================================================================

    #[test]
    fn new_chat_is_empty_featureless_and_active() {
        let state = new_chat(&ChatState::default(), "a");
        let session = state.active_session().unwrap();
        assert_eq!(session.id, "a");
        assert_eq!(session.title, DEFAULT_TITLE);
        assert!(session.feature.is_none());
        assert!(session.messages.is_empty());
    }

    #[test]
    fn new_chat_prepends() {
        let mut state = new_chat(&ChatState::default(), "a");
        state = new_chat(&state, "b");
        let ids: Vec<_> = state.sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(state.active_id.as_deref(), Some("b"));
    }

    #[test]
    fn select_unknown_session_is_noop() {
        let state = new_chat(&ChatState::default(), "a");
        let result = apply(
            &state,
            Event::SelectChat {
                id: "missing".to_string(),
            },
        );
        assert_eq!(result.new_state, state);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn select_existing_session_moves_active_pointer() {
        let mut state = new_chat(&ChatState::default(), "a");
        state = new_chat(&state, "b");
        let result = apply(
            &state,
            Event::SelectChat {
                id: "a".to_string(),
            },
        );
        assert_eq!(result.new_state.active_id.as_deref(), Some("a"));
    }

    // ================================================================
    // Deletion policy
    // ================================================================

    #[test]
    fn delete_active_head_of_two_activates_survivor() {
        // Sessions newest-first: [a(active), b]
        let mut state = new_chat(&ChatState::default(), "b");
        state = new_chat(&state, "a");
        let result = apply(
            &state,
            Event::DeleteChat {
                id: "a".to_string(),
            },
        );
        assert_eq!(result.new_state.active_id.as_deref(), Some("b"));
    }

    #[test]
    fn delete_active_middle_prefers_next_lower_index() {
        // [a, b(active), c]
        let mut state = new_chat(&ChatState::default(), "c");
        state = new_chat(&state, "b");
        state = new_chat(&state, "a");
        state = apply(
            &state,
            Event::SelectChat {
                id: "b".to_string(),
            },
        )
        .new_state;

        let result = apply(
            &state,
            Event::DeleteChat {
                id: "b".to_string(),
            },
        );
        assert_eq!(result.new_state.active_id.as_deref(), Some("a"));
    }

    #[test]
    fn delete_active_tail_prefers_next_lower_index() {
        // [a, b, c(active)]
        let mut state = new_chat(&ChatState::default(), "c");
        state = new_chat(&state, "b");
        state = new_chat(&state, "a");
        state = apply(
            &state,
            Event::SelectChat {
                id: "c".to_string(),
            },
        )
        .new_state;

        let result = apply(
            &state,
            Event::DeleteChat {
                id: "c".to_string(),
            },
        );
        assert_eq!(result.new_state.active_id.as_deref(), Some("b"));
    }

    #[test]
    fn delete_non_active_keeps_active_pointer() {
        let mut state = new_chat(&ChatState::default(), "b");
        state = new_chat(&state, "a");
        let result = apply(
            &state,
            Event::DeleteChat {
                id: "b".to_string(),
            },
        );
        assert_eq!(result.new_state.active_id.as_deref(), Some("a"));
    }

    #[test]
    fn delete_last_session_clears_active() {
        let state = new_chat(&ChatState::default(), "a");
        let result = apply(
            &state,
            Event::DeleteChat {
                id: "a".to_string(),
            },
        );
        assert!(result.new_state.active_id.is_none());
        assert!(result.new_state.sessions.is_empty());
    }

    #[test]
    fn delete_unknown_session_is_noop() {
        let state = new_chat(&ChatState::default(), "a");
        let result = apply(
            &state,
            Event::DeleteChat {
                id: "missing".to_string(),
            },
        );
        assert_eq!(result.new_state, state);
    }

    // ================================================================
    // Feature assignment
    // ================================================================

    #[test]
    fn assign_feature_resets_messages_to_welcome() {
        let state = new_chat(&ChatState::default(), "a");
        let result = apply(
            &state,
            Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: FeatureId::MealPlan,
            },
        );
        let session = result.new_state.session("a").unwrap();
        assert_eq!(session.feature, Some(FeatureId::MealPlan));
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::Model);
        assert_eq!(
            session.messages[0].text,
            FeatureId::MealPlan.descriptor().welcome_message
        );
    }

    #[test]
    fn assign_feature_overwrites_and_keeps_ids_unique() {
        let state = new_chat(&ChatState::default(), "a");
        let state = apply(
            &state,
            Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: FeatureId::GeneralQa,
            },
        )
        .new_state;
        let first_welcome_id = state.session("a").unwrap().messages[0].id;

        let state = apply(
            &state,
            Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: FeatureId::RecipeAnalysis,
            },
        )
        .new_state;
        let session = state.session("a").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_ne!(session.messages[0].id, first_welcome_id);
    }

    #[test]
    fn assign_feature_to_unknown_session_errors() {
        let state = ChatState::default();
        let result = transition(
            &state,
            Event::FeatureChosen {
                session_id: "ghost".to_string(),
                feature: FeatureId::GeneralQa,
            },
        );
        assert_eq!(
            result.unwrap_err(),
            TransitionError::UnknownSession("ghost".to_string())
        );
    }

    // ================================================================
    // Sending messages
    // ================================================================

    #[test]
    fn blank_text_without_image_is_noop() {
        let state = new_chat(&ChatState::default(), "a");
        let result = send(&state, "   \n").unwrap();
        assert_eq!(result.new_state, state);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn blank_text_with_image_still_sends() {
        let state = new_chat(&ChatState::default(), "a");
        let result = transition(
            &state,
            Event::UserMessage {
                text: String::new(),
                image: Some(ImageData {
                    media_type: "image/jpeg".to_string(),
                    data: "Zm9v".to_string(),
                }),
            },
        )
        .unwrap();
        assert!(completion_effect(&result.effects).is_some());
        let session = result.new_state.session("a").unwrap();
        assert!(session.messages.last().unwrap().image.is_some());
        // A blank first message never triggers title generation
        assert_eq!(title_effect_count(&result.effects), 0);
    }

    #[test]
    fn send_with_no_active_session_is_noop() {
        let state = ChatState::default();
        let result = send(&state, "hello").unwrap();
        assert_eq!(result.new_state, state);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn send_appends_user_message_and_marks_busy() {
        let state = new_chat(&ChatState::default(), "a");
        let result = send(&state, "plan my week").unwrap();
        let session = result.new_state.session("a").unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[0].text, "plan my week");
        assert!(result.new_state.is_busy("a"));
        assert!(completion_effect(&result.effects).is_some());
    }

    #[test]
    fn send_while_pending_is_rejected() {
        let state = new_chat(&ChatState::default(), "a");
        let state = send(&state, "first").unwrap().new_state;
        assert_eq!(send(&state, "second").unwrap_err(), TransitionError::SessionBusy);
    }

    #[test]
    fn only_first_user_message_requests_title() {
        let state = new_chat(&ChatState::default(), "a");
        let result = send(&state, "first question").unwrap();
        assert_eq!(title_effect_count(&result.effects), 1);

        let state = apply(
            &result.new_state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Ok("answer".to_string()),
            },
        )
        .new_state;
        let result = send(&state, "second question").unwrap();
        assert_eq!(title_effect_count(&result.effects), 0);
    }

    #[test]
    fn welcome_message_does_not_suppress_title_request() {
        let state = new_chat(&ChatState::default(), "a");
        let state = apply(
            &state,
            Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: FeatureId::GeneralQa,
            },
        )
        .new_state;
        let result = send(&state, "is honey vegan?").unwrap();
        assert_eq!(title_effect_count(&result.effects), 1);
    }

    #[test]
    fn history_excludes_new_message_and_caps_at_window() {
        let mut state = new_chat(&ChatState::default(), "a");
        for i in 0..12 {
            state = send(&state, &format!("question {i}")).unwrap().new_state;
            state = apply(
                &state,
                Event::CompletionFinished {
                    session_id: "a".to_string(),
                    outcome: Ok(format!("answer {i}")),
                },
            )
            .new_state;
        }

        let result = send(&state, "latest").unwrap();
        let Some(Effect::RequestCompletion { history, text, .. }) =
            completion_effect(&result.effects)
        else {
            panic!("expected completion effect");
        };
        assert_eq!(text, "latest");
        assert_eq!(history.len(), HISTORY_WINDOW);
        assert!(history.iter().all(|m| m.text != "latest"));
        // The window is the trailing end of the conversation
        assert_eq!(history.last().unwrap().text, "answer 11");
    }

    // ================================================================
    // Completion handling
    // ================================================================

    #[test]
    fn completion_success_appends_one_model_message() {
        let state = new_chat(&ChatState::default(), "a");
        let state = send(&state, "hello").unwrap().new_state;
        let before = state.session("a").unwrap().messages.len();

        let result = apply(
            &state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Ok("hi there".to_string()),
            },
        );
        let session = result.new_state.session("a").unwrap();
        assert_eq!(session.messages.len(), before + 1);
        assert_eq!(session.messages.last().unwrap().role, Role::Model);
        assert_eq!(session.messages.last().unwrap().text, "hi there");
        assert!(!result.new_state.is_busy("a"));
        assert!(result.new_state.last_error.is_none());
    }

    #[test]
    fn completion_failure_surfaces_error_inline() {
        let state = new_chat(&ChatState::default(), "a");
        let state = send(&state, "hello").unwrap().new_state;

        let result = apply(
            &state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Err("rate limited".to_string()),
            },
        );
        let session = result.new_state.session("a").unwrap();
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, Role::Model);
        assert!(last.text.contains("rate limited"));
        assert!(!result.new_state.is_busy("a"));
        assert_eq!(
            result.new_state.last_error.as_deref(),
            Some("rate limited")
        );
    }

    #[test]
    fn next_send_clears_error_banner() {
        let state = new_chat(&ChatState::default(), "a");
        let state = send(&state, "hello").unwrap().new_state;
        let state = apply(
            &state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Err("boom".to_string()),
            },
        )
        .new_state;

        let state = send(&state, "retrying").unwrap().new_state;
        assert!(state.last_error.is_none());
    }

    #[test]
    fn completion_for_deleted_session_is_absorbed() {
        let state = new_chat(&ChatState::default(), "a");
        let state = send(&state, "hello").unwrap().new_state;
        let state = apply(
            &state,
            Event::DeleteChat {
                id: "a".to_string(),
            },
        )
        .new_state;

        let result = apply(
            &state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Ok("late reply".to_string()),
            },
        );
        assert!(result.new_state.sessions.is_empty());
        assert!(result.new_state.in_flight.is_empty());
        assert!(result.effects.is_empty());
    }

    #[test]
    fn net_two_messages_per_send_completion_cycle() {
        let state = new_chat(&ChatState::default(), "a");
        let before = state.session("a").unwrap().messages.len();
        let state = send(&state, "hello").unwrap().new_state;
        let state = apply(
            &state,
            Event::CompletionFinished {
                session_id: "a".to_string(),
                outcome: Ok("hi".to_string()),
            },
        )
        .new_state;
        assert_eq!(state.session("a").unwrap().messages.len(), before + 2);
    }

    // ================================================================
    // Titles
    // ================================================================

    #[test]
    fn title_ready_overwrites_default_title() {
        let state = new_chat(&ChatState::default(), "a");
        let result = apply(
            &state,
            Event::TitleReady {
                session_id: "a".to_string(),
                title: "Weekly Meal Plan".to_string(),
            },
        );
        assert_eq!(
            result.new_state.session("a").unwrap().title,
            "Weekly Meal Plan"
        );
    }

    #[test]
    fn title_for_deleted_session_is_absorbed() {
        let state = ChatState::default();
        let result = apply(
            &state,
            Event::TitleReady {
                session_id: "gone".to_string(),
                title: "Anything".to_string(),
            },
        );
        assert_eq!(result.new_state, state);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn message_ids_are_unique_within_session() {
        let mut state = new_chat(&ChatState::default(), "a");
        state = apply(
            &state,
            Event::FeatureChosen {
                session_id: "a".to_string(),
                feature: FeatureId::GeneralQa,
            },
        )
        .new_state;
        for i in 0..5 {
            state = send(&state, &format!("q{i}")).unwrap().new_state;
            state = apply(
                &state,
                Event::CompletionFinished {
                    session_id: "a".to_string(),
                    outcome: Ok(format!("a{i}")),
                },
            )
            .new_state;
        }
        let session = state.session("a").unwrap();
        let mut ids: Vec<_> = session.messages.iter().map(|m| m.id).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
