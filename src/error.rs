//! Error types for the sync layer.
//!
//! Errors are classified by how the layer recovers:
//! - Retryable: remote unreachable (fall back to cache, retry on reconnect)
//! - NonRetryable: remote rejected the write (surface it, never re-queue)
//! - Degraded: storage unavailable or no cached data (keep running)

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;
use crate::types::EntityKind;

/// Errors surfaced by cache controllers, the pending-write queue, and the
/// reconciler.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network call failed or timed out. Recovered locally where a cached
    /// mirror exists; otherwise retried on the next drain or refresh.
    #[error("Remote unreachable: {0}")]
    RemoteUnreachable(String),

    /// The remote system returned a structured error (validation, auth).
    /// Retrying would repeat the same rejection, so the operation is never
    /// queued.
    #[error("Remote rejected the operation: {0}")]
    RemoteRejected(String),

    /// Durable storage could not be opened or written. The session degrades
    /// to memory-only operation; this is logged, not fatal.
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    /// First-ever load with no connectivity and no prior cache. Distinct
    /// from a hard error; the UI shows an explicit empty state.
    #[error("No cached data available for {0}")]
    NoDataAvailable(EntityKind),
}

impl SyncError {
    /// Returns true if a later retry (reconnect, manual refresh) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnreachable(_) | SyncError::NoDataAvailable(_)
        )
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unreachable(msg) => SyncError::RemoteUnreachable(msg),
            RemoteError::Rejected(msg) => SyncError::RemoteRejected(msg),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::StorageUnavailable(err.to_string())
    }
}

/// Serializable error representation for the UI layer.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorReport {
    pub message: String,
    pub kind: SyncErrorKind,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncErrorKind {
    RemoteUnreachable,
    RemoteRejected,
    StorageUnavailable,
    NoData,
}

impl From<&SyncError> for SyncErrorReport {
    fn from(err: &SyncError) -> Self {
        let kind = match err {
            SyncError::RemoteUnreachable(_) => SyncErrorKind::RemoteUnreachable,
            SyncError::RemoteRejected(_) => SyncErrorKind::RemoteRejected,
            SyncError::StorageUnavailable(_) => SyncErrorKind::StorageUnavailable,
            SyncError::NoDataAvailable(_) => SyncErrorKind::NoData,
        };

        SyncErrorReport {
            message: err.to_string(),
            kind,
            can_retry: err.is_retryable(),
        }
    }
}
