use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SubjectId;
use crate::ErrorKind;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum BackendError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {id}")]
    NotFound { id: String },

    #[error("request timed out")]
    Timeout,
}

impl BackendError {
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Status { status, .. } => ErrorKind::from_http_status(*status),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Timeout => ErrorKind::Timeout,
        }
    }
}

/// Backing-store client for the destructive operations the scheduler defers.
#[async_trait::async_trait]
pub trait ListingBackend: Send + Sync {
    async fn delete_listing(&self, id: &SubjectId) -> Result<(), BackendError>;
    async fn remove_favorite(&self, id: &SubjectId) -> Result<(), BackendError>;
}
