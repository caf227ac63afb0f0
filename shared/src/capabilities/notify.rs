use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoticeHandle(Uuid);

impl NoticeHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NoticeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Error => 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
    pub action_label: Option<String>,
}

impl Notice {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
            action_label: None,
        }
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    #[must_use]
    pub fn with_action(mut self, label: impl Into<String>) -> Self {
        self.action_label = Some(label.into());
        self
    }
}

pub type NoticeAction = Box<dyn FnOnce() + Send + 'static>;

/// Notification surface. `on_action` runs when the user presses the notice's
/// action button, at most once.
pub trait Notifier: Send + Sync {
    fn show(&self, notice: Notice, on_action: Option<NoticeAction>) -> NoticeHandle;
    fn dismiss(&self, handle: NoticeHandle);
}

/// Headless [`Notifier`]: records requests for a shell to render and lets the
/// shell fire a notice's action.
///
/// Keeps the full history of shown and dismissed notices, so it suits tests
/// and short-lived sessions rather than a long-running process.
#[derive(Default)]
pub struct NoticeQueue {
    shown: Mutex<Vec<(NoticeHandle, Notice)>>,
    dismissed: Mutex<Vec<NoticeHandle>>,
    actions: Mutex<HashMap<NoticeHandle, NoticeAction>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice ever shown, oldest first.
    pub fn shown(&self) -> Vec<Notice> {
        self.shown.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    /// Notices shown and not yet dismissed.
    pub fn visible(&self) -> Vec<(NoticeHandle, Notice)> {
        let dismissed = self.dismissed.lock();
        self.shown
            .lock()
            .iter()
            .filter(|(h, _)| !dismissed.contains(h))
            .cloned()
            .collect()
    }

    pub fn is_dismissed(&self, handle: NoticeHandle) -> bool {
        self.dismissed.lock().contains(&handle)
    }

    pub fn last(&self) -> Option<(NoticeHandle, Notice)> {
        self.shown.lock().last().cloned()
    }

    /// Runs the action attached to `handle`. Returns `false` if there is none
    /// or it already ran.
    pub fn trigger_action(&self, handle: NoticeHandle) -> bool {
        // take it out first: the action may call back into this queue
        let action = self.actions.lock().remove(&handle);
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for NoticeQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoticeQueue")
            .field("shown", &self.shown.lock().len())
            .field("dismissed", &self.dismissed.lock().len())
            .finish_non_exhaustive()
    }
}

impl Notifier for NoticeQueue {
    fn show(&self, notice: Notice, on_action: Option<NoticeAction>) -> NoticeHandle {
        let handle = NoticeHandle::generate();
        debug!(%handle, message = %notice.message, "notice shown");
        if let Some(action) = on_action {
            self.actions.lock().insert(handle, action);
        }
        self.shown.lock().push((handle, notice));
        handle
    }

    fn dismiss(&self, handle: NoticeHandle) {
        self.actions.lock().remove(&handle);
        let mut dismissed = self.dismissed.lock();
        if !dismissed.contains(&handle) {
            dismissed.push(handle);
        }
    }
}
