//! Core data types shared across the sync layer.
//!
//! Entity payloads are opaque `serde_json::Value` snapshots; the remote
//! system owns the schema, this layer only moves records around and keys
//! them by id.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The business entity tables this layer mirrors locally.
///
/// `Settings` has a local table but no cache controller; it is written
/// rarely and read directly from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Products,
    Customers,
    Sales,
    Settings,
}

impl EntityKind {
    /// Stable table name used for both the local mirror and log output.
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Products => "products",
            EntityKind::Customers => "customers",
            EntityKind::Sales => "sales",
            EntityKind::Settings => "settings",
        }
    }

    /// Parse a stored table name back into a kind.
    pub fn from_table_name(name: &str) -> Option<Self> {
        match name {
            "products" => Some(EntityKind::Products),
            "customers" => Some(EntityKind::Customers),
            "sales" => Some(EntityKind::Sales),
            "settings" => Some(EntityKind::Settings),
            _ => None,
        }
    }

    /// Every entity table, in a fixed order (used by sign-out teardown).
    pub fn all() -> [EntityKind; 4] {
        [
            EntityKind::Products,
            EntityKind::Customers,
            EntityKind::Sales,
            EntityKind::Settings,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// One business record: a stable id plus an immutable value snapshot.
///
/// Mutation means "replace the record for this id", never a partial patch
/// inside the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    pub data: serde_json::Value,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// A queued mutation intent awaiting confirmed remote execution.
///
/// `local_id` is assigned locally and is distinct from any server-assigned
/// identifier. Operations are retried as a whole unit, never mutated in
/// place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub local_id: String,
    pub entity: EntityKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Build a fresh operation with a generated local id and current timestamp.
    pub fn new(entity: EntityKind, payload: serde_json::Value) -> Self {
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            entity,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle phase of an entity cache controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePhase {
    /// Never activated, or reset by sign-out. Nothing is served.
    #[default]
    Uninitialized,
    /// A load is in flight.
    Loading,
    /// Last load succeeded, from remote or from the local mirror.
    Ready,
    /// Last remote attempt failed; serving whatever the mirror holds.
    Degraded,
}

/// What a controller currently holds, as served to the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub phase: CachePhase,
    pub records: Vec<EntityRecord>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Result of a controller's cache-health probe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfTestReport {
    pub passed: bool,
    pub message: String,
    pub cached_records: usize,
}

/// Immediate outcome of a write submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteReceipt {
    /// The remote system acknowledged the write directly.
    Confirmed,
    /// The write is queued for a later drain; `local_id` identifies it in
    /// drain events so optimistic UI rows can be reconciled.
    Queued { local_id: String },
}

/// Per-operation event emitted while draining the pending-write queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainEvent {
    pub local_id: String,
    pub entity: EntityKind,
    pub outcome: DrainOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum DrainOutcome {
    /// Remote acknowledged; the operation left the queue.
    Submitted,
    /// Remote returned a structured rejection; the operation left the queue
    /// and will NOT be retried (retrying repeats the rejection).
    Rejected(String),
    /// Remote was unreachable; the operation stays queued and draining for
    /// its entity type halted to preserve ordering.
    Failed(String),
}

/// Aggregate result of one drain pass. Partial progress is normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub submitted: usize,
    pub rejected: usize,
    pub remaining: usize,
}

/// Process-wide sync status, for dashboards and the pending-work badge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub online: bool,
    pub pending_writes: usize,
    pub last_sync: HashMap<EntityKind, DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_table_name_round_trip() {
        for kind in EntityKind::all() {
            assert_eq!(EntityKind::from_table_name(kind.table_name()), Some(kind));
        }
        assert_eq!(EntityKind::from_table_name("invoices"), None);
    }

    #[test]
    fn test_pending_operation_gets_unique_local_ids() {
        let a = PendingOperation::new(EntityKind::Sales, serde_json::json!({"total": 1}));
        let b = PendingOperation::new(EntityKind::Sales, serde_json::json!({"total": 1}));
        assert_ne!(a.local_id, b.local_id);
    }

    #[test]
    fn test_drain_event_serializes_camel_case() {
        let event = DrainEvent {
            local_id: "op-1".to_string(),
            entity: EntityKind::Sales,
            outcome: DrainOutcome::Rejected("bad payload".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["localId"], "op-1");
        assert_eq!(json["entity"], "sales");
        assert_eq!(json["outcome"]["status"], "rejected");
        assert_eq!(json["outcome"]["reason"], "bad payload");
    }
}
