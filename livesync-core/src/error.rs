use thiserror::Error;

/// Conditions the engine reports to its callers.
///
/// Only `FetchFailed` is meant for the user (as a retry affordance). An event
/// for an unknown id and a fetch superseded by a newer query are not errors;
/// see `ReconcileOutcome::Ignored` and `Resolution::Stale`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Network or server failure while loading a page; the collection is unchanged
    #[error("failed to load page {page}: {message}")]
    FetchFailed { page: u32, message: String },

    /// A push event that could not be decoded
    #[error("malformed push event: {0}")]
    EventDecode(String),

    /// A backend object without a usable id
    #[error("malformed record: {0}")]
    RecordDecode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn fetch_failed(page: u32, err: &anyhow::Error) -> Self {
        SyncError::FetchFailed {
            page,
            message: format!("{:#}", err),
        }
    }

    /// Whether the user can recover by retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::FetchFailed { .. })
    }
}
