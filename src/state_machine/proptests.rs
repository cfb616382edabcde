//! Property-based tests for the state machine
//!
//! Drives the transition function with arbitrary operation sequences and
//! checks the structural invariants that every reachable state must hold.

use super::event::Event;
use super::state::{ChatState, ImageData};
use super::transition::transition;
use crate::features::FeatureId;
use chrono::Utc;
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Operation model
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    New,
    /// Select the session at this index (modulo the session count)
    Select(usize),
    Delete(usize),
    /// Select or delete a session id that does not exist
    SelectMissing,
    DeleteMissing,
    Feature(usize, FeatureId),
    Send(String, bool),
    /// Settle the oldest in-flight request, successfully or not
    Complete(bool),
    /// Deliver a completion for a session that no longer exists
    CompleteStale,
    Title(usize, String),
}

fn arb_feature() -> impl Strategy<Value = FeatureId> {
    prop_oneof![
        Just(FeatureId::GeneralQa),
        Just(FeatureId::MealPlan),
        Just(FeatureId::RecipeAnalysis),
        Just(FeatureId::ImageAnalysis),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::New),
        2 => (0usize..8).prop_map(Op::Select),
        2 => (0usize..8).prop_map(Op::Delete),
        1 => Just(Op::SelectMissing),
        1 => Just(Op::DeleteMissing),
        2 => ((0usize..8), arb_feature()).prop_map(|(i, f)| Op::Feature(i, f)),
        4 => ("[a-z ]{0,12}", any::<bool>()).prop_map(|(text, img)| Op::Send(text, img)),
        4 => any::<bool>().prop_map(Op::Complete),
        1 => Just(Op::CompleteStale),
        2 => ((0usize..8), "[A-Za-z ]{1,20}").prop_map(|(i, t)| Op::Title(i, t)),
    ]
}

fn session_id_at(state: &ChatState, index: usize) -> Option<String> {
    if state.sessions.is_empty() {
        None
    } else {
        Some(state.sessions[index % state.sessions.len()].id.clone())
    }
}

fn apply_op(state: ChatState, op: Op, counter: &mut u64) -> ChatState {
    let event = match op {
        Op::New => {
            *counter += 1;
            Event::NewChat {
                id: format!("s{counter}"),
                created_at: Utc::now(),
            }
        }
        Op::Select(i) => match session_id_at(&state, i) {
            Some(id) => Event::SelectChat { id },
            None => return state,
        },
        Op::Delete(i) => match session_id_at(&state, i) {
            Some(id) => Event::DeleteChat { id },
            None => return state,
        },
        Op::SelectMissing => Event::SelectChat {
            id: "missing".to_string(),
        },
        Op::DeleteMissing => Event::DeleteChat {
            id: "missing".to_string(),
        },
        Op::Feature(i, feature) => match session_id_at(&state, i) {
            Some(session_id) => Event::FeatureChosen {
                session_id,
                feature,
            },
            None => return state,
        },
        Op::Send(text, with_image) => Event::UserMessage {
            text,
            image: with_image.then(|| ImageData {
                media_type: "image/png".to_string(),
                data: "Zm9v".to_string(),
            }),
        },
        Op::Complete(ok) => match state.in_flight.iter().next().cloned() {
            Some(session_id) => Event::CompletionFinished {
                session_id,
                outcome: if ok {
                    Ok("reply".to_string())
                } else {
                    Err("upstream failure".to_string())
                },
            },
            None => return state,
        },
        Op::CompleteStale => Event::CompletionFinished {
            session_id: "missing".to_string(),
            outcome: Ok("late".to_string()),
        },
        Op::Title(i, title) => match session_id_at(&state, i) {
            Some(session_id) => Event::TitleReady { session_id, title },
            None => return state,
        },
    };

    match transition(&state, event) {
        Ok(result) => result.new_state,
        // Rejected events (busy session, unknown session) leave state as-is
        Err(_) => state,
    }
}

fn assert_invariants(state: &ChatState) {
    // The active pointer exists exactly when there are sessions, and it
    // always names a live session.
    assert_eq!(state.active_id.is_some(), !state.sessions.is_empty());
    if let Some(active) = state.active_id.as_deref() {
        assert!(state.session(active).is_some());
    }

    // Session ids are unique.
    let ids: HashSet<_> = state.sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.len(), state.sessions.len());

    // Every in-flight marker points at a live session.
    for id in &state.in_flight {
        assert!(state.session(id).is_some());
    }

    for session in &state.sessions {
        // Message ids are unique within a session and below the counter.
        let message_ids: HashSet<_> = session.messages.iter().map(|m| m.id).collect();
        assert_eq!(message_ids.len(), session.messages.len());
        assert!(session
            .messages
            .iter()
            .all(|m| m.id < session.next_message_id));

        // A session without a feature never has model prose beyond nothing:
        // messages only appear after a feature welcome or a user send.
        if session.feature.is_none() && !session.messages.is_empty() {
            assert!(session.user_message_count() > 0);
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_for_arbitrary_operation_sequences(
        ops in proptest::collection::vec(arb_op(), 0..60)
    ) {
        let mut counter = 0u64;
        let mut state = ChatState::default();
        for op in ops {
            state = apply_op(state, op, &mut counter);
            assert_invariants(&state);
        }
    }

    #[test]
    fn at_most_one_request_in_flight_per_session(
        ops in proptest::collection::vec(arb_op(), 0..60)
    ) {
        let mut counter = 0u64;
        let mut state = ChatState::default();
        for op in ops {
            let before = state.in_flight.len();
            state = apply_op(state, op, &mut counter);
            // A single operation can add at most one in-flight marker.
            prop_assert!(state.in_flight.len() <= before + 1);
            if let Some(active) = state.active_id.clone() {
                // Sending into a busy session is rejected outright.
                if state.is_busy(&active) {
                    let result = transition(&state, Event::UserMessage {
                        text: "again".to_string(),
                        image: None,
                    });
                    prop_assert!(result.is_err());
                }
            }
        }
    }
}
