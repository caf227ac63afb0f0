//! Deferred commit with undo for destructive operations.
//!
//! `begin` mutates the cache optimistically and starts a grace window.
//! From `Pending` an operation leaves exactly once: through `undo`
//! (snapshot restored, no request), or through the timer / an explicit
//! flush / scope teardown (request sent, then invalidate on success or
//! restore on failure).
//!
//! Each deadline task holds the scheduler alive, so dropping every handle
//! still commits pending operations when their windows close.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{
    BackendError, Capabilities, ListingBackend, Notice, NoticeHandle, Notifier, QueryCache,
    ToastKind,
};
use crate::config::{ConfigError, SchedulerConfig};
use crate::model::{CacheKey, SubjectId};
use crate::snapshot::{apply_optimistic_removal, CacheSnapshot};
use crate::COMMIT_EVENT_CAPACITY;

const DEFAULT_LABEL: &str = "Объявление";
const UNDO_ACTION_LABEL: &str = "Отменить";

// ============================================================================
// Mutation kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    DeleteListing,
    RemoveFavorite,
}

impl MutationKind {
    /// Cache regions the operation rewrites, snapshots and invalidates.
    #[must_use]
    pub fn affected_prefixes(self, subject: &SubjectId) -> Vec<CacheKey> {
        match self {
            Self::DeleteListing => vec![
                CacheKey::root("listings"),
                CacheKey::new(["listing", subject.as_str()]),
                CacheKey::root("favorites"),
            ],
            Self::RemoveFavorite => vec![CacheKey::root("favorites")],
        }
    }

    fn pending_message(self, label: &str) -> String {
        match self {
            Self::DeleteListing => format!("«{label}» удалено"),
            Self::RemoveFavorite => format!("«{label}» удалено из избранного"),
        }
    }

    fn failure_message(self, label: &str) -> String {
        match self {
            Self::DeleteListing => format!("Не удалось удалить «{label}»"),
            Self::RemoveFavorite => format!("Не удалось удалить «{label}» из избранного"),
        }
    }

    const fn confirmation_message(self) -> &'static str {
        "Удаление отменено"
    }

    async fn send(
        self,
        backend: &dyn ListingBackend,
        subject: &SubjectId,
    ) -> Result<(), BackendError> {
        match self {
            Self::DeleteListing => backend.delete_listing(subject).await,
            Self::RemoveFavorite => backend.remove_favorite(subject).await,
        }
    }
}

// ============================================================================
// Operation state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Pending,
    Executing,
    Cancelled,
}

impl OperationStatus {
    /// Undo, timer expiry, explicit flush and teardown all start here.
    #[must_use]
    pub const fn can_leave_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Terminal result of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOutcome {
    Committed,
    RolledBack(BackendError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub kind: MutationKind,
    pub subject: SubjectId,
    pub outcome: CommitOutcome,
}

struct PendingOperation {
    label: String,
    snapshot: CacheSnapshot,
    status: OperationStatus,
    deadline: Option<JoinHandle<()>>,
    notice: Option<NoticeHandle>,
    /// Subjects committed after this snapshot was captured.
    committed_since: Vec<SubjectId>,
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("label", &self.label)
            .field("status", &self.status)
            .field("snapshot_entries", &self.snapshot.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Deadline,
    Explicit,
    Teardown,
}

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    pub begun: AtomicU64,
    pub rejected_duplicates: AtomicU64,
    pub undone: AtomicU64,
    pub committed: AtomicU64,
    pub rolled_back: AtomicU64,
    pub flushed_on_teardown: AtomicU64,
}

impl SchedulerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            begun: self.begun.load(Ordering::Relaxed),
            rejected_duplicates: self.rejected_duplicates.load(Ordering::Relaxed),
            undone: self.undone.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            flushed_on_teardown: self.flushed_on_teardown.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub begun: u64,
    pub rejected_duplicates: u64,
    pub undone: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub flushed_on_teardown: u64,
}

// ============================================================================
// Scheduler
// ============================================================================

struct Inner {
    kind: MutationKind,
    cache: Arc<dyn QueryCache>,
    backend: Arc<dyn ListingBackend>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    operations: Mutex<HashMap<SubjectId, PendingOperation>>,
    metrics: SchedulerMetrics,
    events: broadcast::Sender<CommitEvent>,
}

/// One scheduler per [`MutationKind`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct DeferredCommitScheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for DeferredCommitScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCommitScheduler")
            .field("kind", &self.inner.kind)
            .field("pending", &self.inner.operations.lock().len())
            .finish_non_exhaustive()
    }
}

impl DeferredCommitScheduler {
    pub fn new(
        kind: MutationKind,
        caps: &Capabilities,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events, _) = broadcast::channel(COMMIT_EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                kind,
                cache: caps.cache.clone(),
                backend: caps.backend.clone(),
                notifier: caps.notifier.clone(),
                config,
                operations: Mutex::new(HashMap::new()),
                metrics: SchedulerMetrics::default(),
                events,
            }),
        })
    }

    /// Removes `subject` from the cache now and commits after the grace
    /// window. Returns `false` if an operation for `subject` already exists
    /// or no tokio runtime is available to run the deadline.
    #[instrument(skip(self, subject, label), fields(subject = %subject, kind = ?self.inner.kind))]
    pub fn begin(&self, subject: SubjectId, label: Option<&str>) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime; operation not started");
            return false;
        };
        let inner = &self.inner;
        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LABEL)
            .to_string();

        {
            let mut operations = inner.operations.lock();
            if operations.contains_key(&subject) {
                inner.metrics.rejected_duplicates.fetch_add(1, Ordering::Relaxed);
                warn!("operation already pending; rejected");
                return false;
            }

            // Snapshot and mutate before anything can await, so a second
            // begin never sees pre-mutation state.
            let prefixes = inner.kind.affected_prefixes(&subject);
            for prefix in &prefixes {
                inner.cache.cancel_in_flight(prefix);
            }
            let snapshot = CacheSnapshot::capture(inner.cache.as_ref(), &prefixes);
            let mut removed = 0;
            for prefix in &prefixes {
                removed += apply_optimistic_removal(inner.cache.as_ref(), prefix, &subject)
                    .items_removed;
            }

            operations.insert(
                subject.clone(),
                PendingOperation {
                    label: label.clone(),
                    snapshot,
                    status: OperationStatus::Pending,
                    deadline: None,
                    notice: None,
                    committed_since: Vec::new(),
                },
            );
            inner.metrics.begun.fetch_add(1, Ordering::Relaxed);
            info!(removed, "optimistic removal applied");
        }

        let deadline = runtime.spawn(run_deadline(
            inner.clone(),
            subject.clone(),
            inner.config.grace_window(),
        ));
        let weak = Arc::downgrade(inner);

        // Shown outside the lock: the action re-enters the scheduler.
        let notice = Notice::new(inner.kind.pending_message(&label), ToastKind::Info)
            .with_duration_ms(inner.config.grace_window_ms)
            .with_action(UNDO_ACTION_LABEL);
        let undo_subject = subject.clone();
        let handle = inner.notifier.show(
            notice,
            Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.undo(&undo_subject);
                }
            })),
        );

        let orphaned = {
            let mut operations = inner.operations.lock();
            match operations.get_mut(&subject) {
                Some(op) if op.status == OperationStatus::Pending => {
                    op.deadline = Some(deadline);
                    op.notice = Some(handle);
                    None
                }
                _ => Some(deadline),
            }
        };
        // left Pending while the notice was being shown
        if let Some(deadline) = orphaned {
            deadline.abort();
            inner.notifier.dismiss(handle);
        }
        true
    }

    /// Cancels a pending operation and restores the cache. Only valid while
    /// `Pending`; repeated or late calls return `false` and do nothing.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub fn undo(&self, subject: &SubjectId) -> bool {
        self.inner.undo(subject)
    }

    /// Commits now instead of waiting for the grace window.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub async fn flush(&self, subject: &SubjectId) -> Option<CommitOutcome> {
        if !self.inner.start_executing(subject, Trigger::Explicit) {
            return None;
        }
        Some(self.inner.clone().execute(subject.clone()).await)
    }

    /// Commits every pending operation and waits for all of them.
    pub async fn flush_all(&self) -> Vec<(SubjectId, CommitOutcome)> {
        let subjects = self.inner.start_all(Trigger::Explicit);
        let tasks: Vec<_> = subjects
            .into_iter()
            .map(|subject| {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    let outcome = inner.execute(subject.clone()).await;
                    (subject, outcome)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(result) => outcomes.push(result),
                Err(e) => warn!(error = %e, "flush task failed"),
            }
        }
        outcomes
    }

    /// The owning UI went away: every pending operation moves to
    /// `Executing` immediately and its request is sent in the background.
    /// Returns how many were flushed.
    pub fn teardown(&self) -> usize {
        let Ok(runtime) = Handle::try_current() else {
            warn!("no tokio runtime; pending operations left to their deadlines");
            return 0;
        };
        let subjects = self.inner.start_all(Trigger::Teardown);
        let count = subjects.len();
        for subject in subjects {
            runtime.spawn(self.inner.clone().execute(subject));
        }
        if count > 0 {
            self.inner
                .metrics
                .flushed_on_teardown
                .fetch_add(count as u64, Ordering::Relaxed);
            info!(count, "pending operations flushed on teardown");
        }
        count
    }

    /// Guard that calls [`Self::teardown`] when dropped.
    #[must_use]
    pub fn scope(&self) -> SchedulerScope {
        SchedulerScope {
            scheduler: self.clone(),
        }
    }

    pub fn status(&self, subject: &SubjectId) -> Option<OperationStatus> {
        self.inner.operations.lock().get(subject).map(|op| op.status)
    }

    /// Whether Undo is still possible for `subject`.
    pub fn is_pending(&self, subject: &SubjectId) -> bool {
        self.status(subject) == Some(OperationStatus::Pending)
    }

    pub fn pending_count(&self) -> usize {
        self.inner
            .operations
            .lock()
            .values()
            .filter(|op| op.status == OperationStatus::Pending)
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.inner.events.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn kind(&self) -> MutationKind {
        self.inner.kind
    }
}

async fn run_deadline(inner: Arc<Inner>, subject: SubjectId, grace: std::time::Duration) {
    tokio::time::sleep(grace).await;
    if inner.start_executing(&subject, Trigger::Deadline) {
        inner.execute(subject).await;
    }
}

impl Inner {
    fn undo(&self, subject: &SubjectId) -> bool {
        let op = {
            let mut operations = self.operations.lock();
            match operations.get(subject).map(|op| op.status) {
                Some(status) if status.can_leave_pending() => operations.remove(subject),
                Some(status) => {
                    debug!(?status, "undo ignored");
                    None
                }
                None => None,
            }
        };
        let Some(mut op) = op else {
            return false;
        };

        op.status = OperationStatus::Cancelled;
        if let Some(deadline) = op.deadline.take() {
            deadline.abort();
        }
        if let Some(handle) = op.notice.take() {
            self.notifier.dismiss(handle);
        }
        self.roll_back(subject, &op);

        self.notifier.show(
            Notice::new(self.kind.confirmation_message(), ToastKind::Success)
                .with_duration_ms(self.config.confirmation_ms),
            None,
        );
        self.metrics.undone.fetch_add(1, Ordering::Relaxed);
        info!(subject = %subject, status = ?op.status, "operation undone");
        self.emit(subject, CommitOutcome::Cancelled);
        true
    }

    /// `Pending -> Executing`. Stops the deadline (unless it is the caller)
    /// and dismisses the undo notice. Returns `false` if the operation is
    /// gone or already past `Pending`.
    fn start_executing(&self, subject: &SubjectId, trigger: Trigger) -> bool {
        let notice = {
            let mut operations = self.operations.lock();
            let Some(op) = operations.get_mut(subject) else {
                return false;
            };
            if !op.status.can_leave_pending() {
                return false;
            }
            op.status = OperationStatus::Executing;
            if let Some(deadline) = op.deadline.take() {
                if trigger != Trigger::Deadline {
                    deadline.abort();
                }
            }
            op.notice.take()
        };
        if let Some(handle) = notice {
            self.notifier.dismiss(handle);
        }
        debug!(subject = %subject, ?trigger, "operation executing");
        true
    }

    fn start_all(&self, trigger: Trigger) -> Vec<SubjectId> {
        let subjects: Vec<SubjectId> = self
            .operations
            .lock()
            .iter()
            .filter(|(_, op)| op.status.can_leave_pending())
            .map(|(subject, _)| subject.clone())
            .collect();
        subjects
            .into_iter()
            .filter(|subject| self.start_executing(subject, trigger))
            .collect()
    }

    /// Sends the request for an `Executing` operation and finishes it.
    async fn execute(self: Arc<Self>, subject: SubjectId) -> CommitOutcome {
        let result = self.kind.send(self.backend.as_ref(), &subject).await;
        let op = self.operations.lock().remove(&subject);

        let outcome = match result {
            Ok(()) => {
                for prefix in self.kind.affected_prefixes(&subject) {
                    self.cache.invalidate(&prefix);
                }
                for other in self.operations.lock().values_mut() {
                    other.committed_since.push(subject.clone());
                }
                self.metrics.committed.fetch_add(1, Ordering::Relaxed);
                info!(subject = %subject, "operation committed");
                CommitOutcome::Committed
            }
            Err(error) => {
                let label = op.as_ref().map_or(DEFAULT_LABEL, |op| op.label.as_str());
                match &op {
                    Some(op) => self.roll_back(&subject, op),
                    None => self.reapply_others(&subject),
                }
                self.notifier.show(
                    Notice::new(self.kind.failure_message(label), ToastKind::Error)
                        .with_duration_ms(self.config.error_notice_ms),
                    None,
                );
                self.metrics.rolled_back.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subject = %subject,
                    error = %error,
                    code = error.kind().code(),
                    "commit failed; rolled back"
                );
                CommitOutcome::RolledBack(error)
            }
        };
        self.emit(&subject, outcome.clone());
        outcome
    }

    /// Puts `op`'s snapshot back, then removes again every subject the
    /// snapshot predates: operations still registered, and ones committed
    /// since capture. Regions of the committed ones stay marked for refetch.
    fn roll_back(&self, subject: &SubjectId, op: &PendingOperation) {
        op.snapshot.restore(self.cache.as_ref());
        self.reapply_others(subject);
        for committed in &op.committed_since {
            for prefix in self.kind.affected_prefixes(committed) {
                apply_optimistic_removal(self.cache.as_ref(), &prefix, committed);
                self.cache.invalidate(&prefix);
            }
        }
        if !op.committed_since.is_empty() {
            debug!(
                subject = %subject,
                committed = op.committed_since.len(),
                "replayed commits over restored snapshot"
            );
        }
    }

    /// A restored snapshot may predate other operations still in progress;
    /// their removals are applied again on top of it.
    fn reapply_others(&self, restored: &SubjectId) {
        let others: Vec<SubjectId> = self
            .operations
            .lock()
            .keys()
            .filter(|subject| *subject != restored)
            .cloned()
            .collect();
        for subject in others {
            for prefix in self.kind.affected_prefixes(&subject) {
                apply_optimistic_removal(self.cache.as_ref(), &prefix, &subject);
            }
        }
    }

    fn emit(&self, subject: &SubjectId, outcome: CommitOutcome) {
        // no subscribers is fine
        let _ = self.events.send(CommitEvent {
            kind: self.kind,
            subject: subject.clone(),
            outcome,
        });
    }
}

/// Flushes every pending operation of a scheduler when dropped.
#[derive(Debug)]
pub struct SchedulerScope {
    scheduler: DeferredCommitScheduler,
}

impl Deref for SchedulerScope {
    type Target = DeferredCommitScheduler;

    fn deref(&self) -> &Self::Target {
        &self.scheduler
    }
}

impl Drop for SchedulerScope {
    fn drop(&mut self) {
        self.scheduler.teardown();
    }
}
