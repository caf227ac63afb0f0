use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::filters::{FilterPatch, FilterSnapshot};

pub const STORE_EVENT_CAPACITY: usize = 64;

/// Shared store holding the applied filters and current page.
pub trait FilterStore: Send + Sync {
    fn read(&self) -> FilterSnapshot;
    fn write(&self, patch: FilterPatch);
    /// Receives the new state after every write that changed it.
    fn subscribe(&self) -> broadcast::Receiver<FilterSnapshot>;
}

#[derive(Debug)]
pub struct MemoryFilterStore {
    state: RwLock<FilterSnapshot>,
    tx: broadcast::Sender<FilterSnapshot>,
}

impl MemoryFilterStore {
    pub fn new(initial: FilterSnapshot) -> Self {
        let (tx, _) = broadcast::channel(STORE_EVENT_CAPACITY);
        Self {
            state: RwLock::new(initial),
            tx,
        }
    }
}

impl Default for MemoryFilterStore {
    fn default() -> Self {
        Self::new(FilterSnapshot::default())
    }
}

impl FilterStore for MemoryFilterStore {
    fn read(&self) -> FilterSnapshot {
        self.state.read().clone()
    }

    fn write(&self, patch: FilterPatch) {
        let next = {
            let mut state = self.state.write();
            let next = patch.apply_to(&state);
            if next == *state {
                return;
            }
            *state = next.clone();
            next
        };
        let _ = self.tx.send(next);
    }

    fn subscribe(&self) -> broadcast::Receiver<FilterSnapshot> {
        self.tx.subscribe()
    }
}
