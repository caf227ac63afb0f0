// lib.rs - Client-side optimistic mutation and filter synchronization core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod filters;
pub mod model;
pub mod scheduler;
pub mod snapshot;

use serde::{Deserialize, Serialize};

pub use capabilities::Capabilities;
pub use config::{ConfigError, CoreConfig, FilterConfig, SchedulerConfig};
pub use filters::driver::{FilterSyncDriver, SyncError};
pub use filters::sync::FilterSynchronizer;
pub use model::{CacheKey, CacheValue, Collection, Record, SubjectId};
pub use scheduler::{
    CommitEvent, CommitOutcome, DeferredCommitScheduler, MutationKind, OperationStatus,
    SchedulerScope,
};
pub use snapshot::CacheSnapshot;

pub const DEFAULT_GRACE_WINDOW_MS: u64 = 5_000;
pub const DEFAULT_CONFIRMATION_MS: u64 = 2_000;
pub const DEFAULT_ERROR_NOTICE_MS: u64 = 5_000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_MAX_QUERY_LEN: usize = 200;
pub const COMMIT_EVENT_CAPACITY: usize = 64;
pub const FIRST_PAGE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    NotFound,
    Server,
    Validation,
    Config,
    ChannelClosed,
    TaskFailed,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::Server => "SERVER_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Config => "CONFIG_ERROR",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::TaskFailed => "TASK_FAILED",
        }
    }

    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            404 | 410 => Self::NotFound,
            408 | 504 => Self::Timeout,
            400 | 422 => Self::Validation,
            _ => Self::Server,
        }
    }
}

/// Truncate to at most `max_bytes`, never splitting a code point.
pub(crate) fn truncate_utf8_safe(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }

    let mut truncate_at = max_bytes;
    while truncate_at > 0 && !s.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    s.truncate(truncate_at);
}
