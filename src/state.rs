//! Process-wide sync state shared by controllers and the reconciler.
//!
//! Connectivity and pending-count live with their owning components
//! (monitor, queue); this holds what's left: the last successful full
//! sync per entity. One instance per session, cleared on sign-out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::EntityKind;

#[derive(Default)]
pub struct SyncState {
    last_sync: Mutex<HashMap<EntityKind, DateTime<Utc>>>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful full sync for one entity.
    pub fn record_sync(&self, entity: EntityKind, at: DateTime<Utc>) {
        self.last_sync.lock().insert(entity, at);
    }

    pub fn last_sync(&self, entity: EntityKind) -> Option<DateTime<Utc>> {
        self.last_sync.lock().get(&entity).copied()
    }

    pub fn last_sync_map(&self) -> HashMap<EntityKind, DateTime<Utc>> {
        self.last_sync.lock().clone()
    }

    /// Sign-out teardown.
    pub fn reset(&self) {
        self.last_sync.lock().clear();
    }
}
