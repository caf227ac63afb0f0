//! Runs a [`FilterSynchronizer`] on tokio: forwards address and store change
//! notifications to it, owns the per-field debounce timers and provides the
//! deferred tick that clears the direction flags.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::draft::{DraftCommit, EditOutcome};
use super::sync::FilterSynchronizer;
use super::{DraftField, FilterChange, ResetScope};
use crate::capabilities::{AddressBar, AddressChange, FilterStore};
use crate::config::FilterConfig;
use crate::filters::FilterSnapshot;
use crate::ErrorKind;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("change subscription closed")]
    ChannelClosed,

    #[error("synchronizer task failed: {0}")]
    Task(String),
}

impl SyncError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ChannelClosed => ErrorKind::ChannelClosed,
            Self::Task(_) => ErrorKind::TaskFailed,
        }
    }
}

type Shared = Arc<Mutex<FilterSynchronizer>>;

pub struct FilterSyncDriver {
    sync: Shared,
    timers: Arc<Mutex<HashMap<DraftField, JoinHandle<()>>>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), SyncError>>>,
}

impl FilterSyncDriver {
    /// Subscribes to both collaborators, runs initialization and starts the
    /// event loop. Must be called inside a tokio runtime.
    pub fn start(
        address: Arc<dyn AddressBar>,
        store: Arc<dyn FilterStore>,
        config: FilterConfig,
    ) -> Self {
        // Subscribe first so the notifications caused by initialization are
        // seen by the loop while the direction flags are still raised.
        let address_rx = address.subscribe();
        let store_rx = store.subscribe();

        let mut sync = FilterSynchronizer::new(address, store, config);
        let outcome = sync.initialize();
        info!(?outcome, "filter synchronizer started");

        let sync = Arc::new(Mutex::new(sync));
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run(sync.clone(), address_rx, store_rx, stop_rx));

        Self {
            sync,
            timers: Arc::new(Mutex::new(HashMap::new())),
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Keystroke in a free-text field; arms (or re-arms) its debounce.
    pub fn edit(&self, field: DraftField, text: &str) -> EditOutcome {
        let outcome = self.sync.lock().edit(field, text);
        match outcome {
            EditOutcome::Scheduled { generation, delay } => {
                let sync = self.sync.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let result = sync.lock().on_debounce_elapsed(field, generation);
                    debug!(field = %field, ?result, "debounce elapsed");
                });
                if let Some(previous) = self.timers.lock().insert(field, handle) {
                    previous.abort();
                }
            }
            EditOutcome::Cleared => self.cancel_timer(field),
        }
        outcome
    }

    pub fn blur(&self, field: DraftField) -> DraftCommit {
        self.cancel_timer(field);
        self.sync.lock().blur(field)
    }

    pub fn apply(&self, change: FilterChange) -> bool {
        self.sync.lock().apply(change)
    }

    pub fn set_page(&self, page: u32) -> bool {
        self.sync.lock().set_page(page)
    }

    pub fn reset(&self, scope: ResetScope) -> bool {
        for field in scope.fields() {
            self.cancel_timer(*field);
        }
        self.sync.lock().reset(scope)
    }

    pub fn snapshot(&self) -> FilterSnapshot {
        self.sync.lock().snapshot()
    }

    /// Read access to the synchronizer (drafts, field errors, flags).
    pub fn with<R>(&self, f: impl FnOnce(&FilterSynchronizer) -> R) -> R {
        f(&self.sync.lock())
    }

    fn cancel_timer(&self, field: DraftField) {
        if let Some(handle) = self.timers.lock().remove(&field) {
            handle.abort();
        }
    }

    /// Stops the loop and drops pending debounces. Returns how the loop ended.
    pub async fn shutdown(mut self) -> Result<(), SyncError> {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
        if let Some(stop) = self.stop.take() {
            // loop may already be gone
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(|e| SyncError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }
}

impl Drop for FilterSyncDriver {
    fn drop(&mut self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for FilterSyncDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterSyncDriver")
            .field("running", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

async fn run(
    sync: Shared,
    mut address_rx: broadcast::Receiver<AddressChange>,
    mut store_rx: broadcast::Receiver<FilterSnapshot>,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<(), SyncError> {
    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                debug!("filter synchronizer stopping");
                return Ok(());
            }
            received = address_rx.recv() => {
                observed(received)?;
                sync.lock().on_address_changed();
            }
            received = store_rx.recv() => {
                observed(received)?;
                sync.lock().on_store_changed();
            }
        }

        drain(&sync, &mut address_rx, &mut store_rx)?;
        // Deferred tick: anything reacting to this batch runs before the
        // flags come down.
        tokio::task::yield_now().await;
        drain(&sync, &mut address_rx, &mut store_rx)?;
        let outcome = sync.lock().settle();
        debug!(?outcome, "filter state settled");
    }
}

fn observed<T>(received: Result<T, RecvError>) -> Result<(), SyncError> {
    match received {
        Ok(_) => Ok(()),
        Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "filter change notifications lagged");
            Ok(())
        }
        Err(RecvError::Closed) => Err(SyncError::ChannelClosed),
    }
}

/// Handles every notification already queued.
fn drain(
    sync: &Shared,
    address_rx: &mut broadcast::Receiver<AddressChange>,
    store_rx: &mut broadcast::Receiver<FilterSnapshot>,
) -> Result<(), SyncError> {
    loop {
        let address = ready(address_rx.try_recv())?;
        if address {
            sync.lock().on_address_changed();
        }
        let store = ready(store_rx.try_recv())?;
        if store {
            sync.lock().on_store_changed();
        }
        if !address && !store {
            return Ok(());
        }
    }
}

fn ready<T>(received: Result<T, TryRecvError>) -> Result<bool, SyncError> {
    match received {
        Ok(_) | Err(TryRecvError::Lagged(_)) => Ok(true),
        Err(TryRecvError::Empty) => Ok(false),
        Err(TryRecvError::Closed) => Err(SyncError::ChannelClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{MemoryAddressBar, MemoryFilterStore};
    use crate::filters::PropertyType;
    use std::time::Duration;

    fn start(search: &str) -> (Arc<MemoryAddressBar>, Arc<MemoryFilterStore>, FilterSyncDriver) {
        let address = Arc::new(MemoryAddressBar::new(search));
        let store = Arc::new(MemoryFilterStore::default());
        let driver = FilterSyncDriver::start(address.clone(), store.clone(), FilterConfig::default());
        (address, store, driver)
    }

    async fn idle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(SyncError::ChannelClosed.kind(), ErrorKind::ChannelClosed);
        assert_eq!(
            SyncError::Task("panicked".into()).kind(),
            ErrorKind::TaskFailed
        );
        assert_eq!(SyncError::Task("panicked".into()).kind().code(), "TASK_FAILED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_edit_reaches_address() {
        let (address, store, driver) = start("");

        driver.edit(DraftField::PriceMin, "1");
        tokio::time::sleep(Duration::from_millis(200)).await;
        driver.edit(DraftField::PriceMin, "1 200 000");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.read().applied.price_min, None);
        assert!(driver.with(FilterSynchronizer::is_user_editing));

        tokio::time::sleep(Duration::from_millis(400)).await;
        idle().await;
        assert_eq!(store.read().applied.price_min, Some(1_200_000));
        assert_eq!(address.read(), "?priceMin=1200000");
        assert_eq!(address.history_len(), 1);
        assert!(!driver.with(FilterSynchronizer::is_user_editing));

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_navigation_restores_store() {
        let (address, store, driver) = start("");

        assert!(driver.apply(FilterChange::PropertyType(Some(PropertyType::House))));
        idle().await;
        assert_eq!(address.read(), "?type=house");

        address.navigate("?type=land&page=2");
        idle().await;
        assert_eq!(store.read().applied.property_type, Some(PropertyType::Land));
        assert_eq!(store.read().page, 2);

        address.back();
        idle().await;
        assert_eq!(store.read().applied.property_type, Some(PropertyType::House));
        assert_eq!(store.read().page, 1);
        assert_eq!(address.read(), "?type=house");
        assert_eq!(address.replace_count(), 1);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_beats_debounce() {
        let (address, store, driver) = start("");

        driver.edit(DraftField::Query, "студия");
        assert_eq!(driver.blur(DraftField::Query), DraftCommit::Promoted);
        idle().await;
        assert_eq!(store.read().applied.query.as_deref(), Some("студия"));
        assert!(address.read().starts_with("?q="));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(address.replace_count(), 1);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_with_filters_does_not_replace() {
        let (address, store, driver) = start("?type=apartment&priceMin=1000000&page=2");
        idle().await;

        assert_eq!(store.read().page, 2);
        assert_eq!(driver.with(|s| s.draft(DraftField::PriceMin).to_string()), "1000000");
        assert_eq!(address.replace_count(), 0);

        driver.shutdown().await.unwrap();
    }
}
