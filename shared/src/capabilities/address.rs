use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const ADDRESS_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressChange {
    pub search: String,
}

/// The browser address bar, reduced to its search string (`"?type=house"`
/// or `""`).
pub trait AddressBar: Send + Sync {
    fn read(&self) -> String;
    /// Rewrites the current history entry in place. Never adds an entry and
    /// never scrolls.
    fn replace(&self, search: &str);
    fn subscribe(&self) -> broadcast::Receiver<AddressChange>;
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    cursor: usize,
}

/// In-memory address bar with a browser-like history stack.
#[derive(Debug)]
pub struct MemoryAddressBar {
    history: Mutex<History>,
    replacements: Mutex<usize>,
    tx: broadcast::Sender<AddressChange>,
}

impl MemoryAddressBar {
    pub fn new(initial: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(ADDRESS_EVENT_CAPACITY);
        Self {
            history: Mutex::new(History {
                entries: vec![initial.into()],
                cursor: 0,
            }),
            replacements: Mutex::new(0),
            tx,
        }
    }

    /// User navigation: pushes a new history entry.
    pub fn navigate(&self, search: impl Into<String>) {
        let search = search.into();
        {
            let mut history = self.history.lock();
            let keep = history.cursor + 1;
            history.entries.truncate(keep);
            history.entries.push(search.clone());
            history.cursor = history.entries.len() - 1;
        }
        self.emit(search);
    }

    pub fn back(&self) -> bool {
        self.step(|cursor, _| cursor.checked_sub(1))
    }

    pub fn forward(&self) -> bool {
        self.step(|cursor, len| (cursor + 1 < len).then_some(cursor + 1))
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().entries.len()
    }

    pub fn replace_count(&self) -> usize {
        *self.replacements.lock()
    }

    fn step(&self, next: impl FnOnce(usize, usize) -> Option<usize>) -> bool {
        let search = {
            let mut history = self.history.lock();
            let Some(cursor) = next(history.cursor, history.entries.len()) else {
                return false;
            };
            history.cursor = cursor;
            history.entries[cursor].clone()
        };
        self.emit(search);
        true
    }

    fn emit(&self, search: String) {
        // no receivers is fine
        let _ = self.tx.send(AddressChange { search });
    }
}

impl Default for MemoryAddressBar {
    fn default() -> Self {
        Self::new("")
    }
}

impl AddressBar for MemoryAddressBar {
    fn read(&self) -> String {
        let history = self.history.lock();
        history.entries[history.cursor].clone()
    }

    fn replace(&self, search: &str) {
        {
            let mut history = self.history.lock();
            let cursor = history.cursor;
            history.entries[cursor] = search.to_string();
        }
        *self.replacements.lock() += 1;
        self.emit(search.to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<AddressChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_keeps_history_length() {
        let bar = MemoryAddressBar::new("?type=house");
        bar.replace("?type=apartment");
        assert_eq!(bar.read(), "?type=apartment");
        assert_eq!(bar.history_len(), 1);
        assert_eq!(bar.replace_count(), 1);
    }

    #[test]
    fn test_back_and_forward() {
        let bar = MemoryAddressBar::new("");
        bar.navigate("?page=2");
        bar.navigate("?page=3");
        assert!(bar.back());
        assert_eq!(bar.read(), "?page=2");
        assert!(bar.forward());
        assert_eq!(bar.read(), "?page=3");
        assert!(!bar.forward());
    }

    #[test]
    fn test_navigate_after_back_truncates() {
        let bar = MemoryAddressBar::new("");
        bar.navigate("?page=2");
        bar.back();
        bar.navigate("?page=5");
        assert_eq!(bar.history_len(), 2);
        assert!(!bar.forward());
    }

    #[test]
    fn test_changes_are_broadcast() {
        let bar = MemoryAddressBar::new("");
        let mut rx = bar.subscribe();
        bar.navigate("?q=loft");
        bar.replace("?q=loft&page=2");
        assert_eq!(rx.try_recv().unwrap().search, "?q=loft");
        assert_eq!(rx.try_recv().unwrap().search, "?q=loft&page=2");
    }
}
