use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::store::{MemoryStore, Store};

/// Handle to one board: a store plus the clock every timestamp comes from.
///
/// Components are borrowed views (`board.tasks()`, `board.runs()`, ...) so
/// they can call each other without owning shared state. Cloning is cheap.
#[derive(Clone)]
pub struct Board {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Board {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Ephemeral board on the wall clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board").finish_non_exhaustive()
    }
}
