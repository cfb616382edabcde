//! Runtime for executing chat events
//!
//! A single task owns the chat state: handlers submit events over a channel
//! and every mutation goes through the pure transition function, so updates
//! are serialized reducer-style. Generation calls are spawned tasks whose
//! completions come back through the same channel as events.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ChatHandle, ChatRuntime, Command};

use crate::state_machine::TransitionError;
use thiserror::Error;

/// Errors surfaced to callers submitting events
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Chat runtime is not running")]
    Stopped,
}
