//! Remote-system seam.
//!
//! The backend is an external collaborator behind `RemoteStore`: a
//! full-table read per entity (no pagination; each read-through fetch is a
//! full pull) and a single-operation write. Concrete transports implement
//! this trait outside the sync layer.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{EntityKind, EntityRecord, PendingOperation};

/// Structured failure from the remote system.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Call failed or timed out; worth retrying later.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The remote system processed the request and said no (validation,
    /// auth). Retrying repeats the rejection.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}

/// Remote reads and writes for the authenticated account.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the full current record set for one entity table.
    async fn fetch_all(
        &self,
        entity: EntityKind,
        account: &str,
    ) -> Result<Vec<EntityRecord>, RemoteError>;

    /// Submit one mutation. Success means the remote system has durably
    /// acknowledged it.
    async fn submit(&self, op: &PendingOperation) -> Result<(), RemoteError>;
}

/// Per-entity transform from a UI-shaped record into the remote system's
/// expected write payload.
///
/// Required at controller construction so shape-conversion logic lives in
/// one typed place instead of ad hoc at call sites.
pub trait PayloadShaper: Send + Sync {
    fn shape(&self, record: &serde_json::Value) -> serde_json::Value;
}

/// Shaper for entities whose UI shape already matches the remote shape.
pub struct PassthroughShape;

impl PayloadShaper for PassthroughShape {
    fn shape(&self, record: &serde_json::Value) -> serde_json::Value {
        record.clone()
    }
}

/// Shaper backed by a plain function, for entities with a small fixed
/// transform.
pub struct ShapeFn<F>(pub F);

impl<F> PayloadShaper for ShapeFn<F>
where
    F: Fn(&serde_json::Value) -> serde_json::Value + Send + Sync,
{
    fn shape(&self, record: &serde_json::Value) -> serde_json::Value {
        (self.0)(record)
    }
}
