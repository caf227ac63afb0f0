//! Injected collaborators.
//!
//! Every side effect the core performs goes through one of these traits, so
//! the shell decides what a cache, a backend call or a toast actually is.

mod address;
mod backend;
mod cache;
mod notify;
mod store;

use std::sync::Arc;

pub use self::address::{AddressBar, AddressChange, MemoryAddressBar, ADDRESS_EVENT_CAPACITY};
pub use self::backend::{BackendError, ListingBackend};
pub use self::cache::{FetchTicket, MemoryQueryCache, QueryCache};
pub use self::notify::{Notice, NoticeAction, NoticeHandle, NoticeQueue, Notifier, ToastKind};
pub use self::store::{FilterStore, MemoryFilterStore, STORE_EVENT_CAPACITY};

#[derive(Clone)]
pub struct Capabilities {
    pub cache: Arc<dyn QueryCache>,
    pub backend: Arc<dyn ListingBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub address: Arc<dyn AddressBar>,
    pub store: Arc<dyn FilterStore>,
}

impl Capabilities {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        backend: Arc<dyn ListingBackend>,
        notifier: Arc<dyn Notifier>,
        address: Arc<dyn AddressBar>,
        store: Arc<dyn FilterStore>,
    ) -> Self {
        Self {
            cache,
            backend,
            notifier,
            address,
            store,
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
