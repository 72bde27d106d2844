/// GridSync Error Taxonomy
///
/// Derivation (filter/sort/paginate) is infallible: malformed values are
/// filtered out or sorted last, never raised. Errors exist only
/// at the network and storage boundaries, and they are typed so callers can
/// branch on them: a transport failure rolls everything back and keeps the
/// edits pending, a partial failure rolls back only the failed cells.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    /// The initial view snapshot could not be fetched. Nothing to roll back.
    #[error("failed to fetch view '{view_id}': {message}")]
    Fetch { view_id: String, message: String },

    /// The bulk update never reached the server. All optimistic edits were
    /// rolled back and remain pending for retry.
    #[error("bulk update transport failure: {message}")]
    Transport { message: String },

    /// The server responded but rejected some items. Failed cells were
    /// reverted individually; successful ones are committed.
    #[error("{failed} of {total} updates failed")]
    PartialUpdate { total: usize, failed: usize },

    /// A local check rejected the edit before submission.
    #[error("validation failed for field '{field_name}': {message}")]
    Validation { field_name: String, message: String },

    /// No fresh stats and the durable fallback is missing or older than the
    /// grace window.
    #[error("stats unavailable: {message}")]
    StatsUnavailable { message: String },

    /// The injected key-value store failed.
    #[error("key-value store error: {message}")]
    Storage { message: String },

    /// Persisted cache blob could not be decoded.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl GridError {
    pub fn fetch(view_id: impl Into<String>, message: impl Into<String>) -> Self {
        GridError::Fetch {
            view_id: view_id.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        GridError::Transport {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        GridError::Storage {
            message: message.into(),
        }
    }

    /// True when retrying the same submission is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GridError::Transport { .. } | GridError::Fetch { .. })
    }
}
