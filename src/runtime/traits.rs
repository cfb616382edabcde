//! Trait abstractions for runtime I/O
//!
//! These seams let the executor run against mock implementations in tests.

use crate::state_machine::ChatSession;
use crate::store::{Store, StoreResult, SESSIONS_KEY};

/// Durable sink for the session-list record
pub trait StateSink: Send + Sync {
    fn save_sessions(&self, sessions: &[ChatSession]) -> StoreResult<()>;
}

/// Production adapter writing through the key-value store
pub struct StoreSink {
    store: Store,
}

impl StoreSink {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl StateSink for StoreSink {
    fn save_sessions(&self, sessions: &[ChatSession]) -> StoreResult<()> {
        self.store.write(SESSIONS_KEY, sessions)
    }
}
