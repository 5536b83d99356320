use std::sync::Arc;

pub mod attendees;
pub mod database;
pub mod error;
pub mod events;
pub mod render;
pub mod store;

#[cfg(test)]
pub(crate) mod test_utils;

use store::EventStore;

/// The roster engine: composes store calls into create/join/leave and renders
/// the result.
///
/// Cloning is cheap; clones share the same store.
#[derive(Clone)]
pub struct Roster {
    store: Arc<dyn EventStore>,
}

impl std::fmt::Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("store", &"<REDACTED>")
            .finish()
    }
}

impl Roster {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// The store backing this engine.
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }
}
