//! Scripted remote-system double shared across module tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::remote::{RemoteError, RemoteStore};
use crate::store::{DurableStore, MemoryStore, StoreError};
use crate::types::{EntityKind, EntityRecord, PendingOperation};

/// In-memory remote with per-call scripting.
///
/// Submissions are matched by the payload's `"ref"` field when present
/// (tests pick their own markers), falling back to the operation's
/// local id. A successful sale submission decrements the referenced
/// product's `stock`, mimicking the server-side effect a reconcile
/// refresh is expected to pick up.
#[derive(Default)]
pub(crate) struct MockRemote {
    tables: Mutex<HashMap<EntityKind, Vec<EntityRecord>>>,
    calls: Mutex<Vec<String>>,
    failing_fetches: Mutex<HashSet<EntityKind>>,
    unreachable_refs: Mutex<HashSet<String>>,
    rejected_refs: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_table(&self, entity: EntityKind, records: Vec<EntityRecord>) {
        self.tables.lock().insert(entity, records);
    }

    pub fn fail_fetch(&self, entity: EntityKind) {
        self.failing_fetches.lock().insert(entity);
    }

    /// Make submissions with this payload `"ref"` fail as unreachable.
    pub fn unreachable_ref(&self, r: &str) {
        self.unreachable_refs.lock().insert(r.to_string());
    }

    pub fn restore_ref(&self, r: &str) {
        self.unreachable_refs.lock().remove(r);
    }

    /// Make submissions with this payload `"ref"` fail as rejected.
    pub fn reject_ref(&self, r: &str) {
        self.rejected_refs.lock().insert(r.to_string());
    }

    /// Delay every fetch, to hold a load in flight during tests.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// Every call in order, as `"fetch:<table>"` / `"submit:<ref>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fetch_count(&self, entity: EntityKind) -> usize {
        let marker = format!("fetch:{entity}");
        self.calls.lock().iter().filter(|c| **c == marker).count()
    }

    pub fn submit_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with("submit:"))
            .count()
    }

    fn op_ref(op: &PendingOperation) -> String {
        op.payload
            .get("ref")
            .and_then(|v| v.as_str())
            .unwrap_or(&op.local_id)
            .to_string()
    }

    fn apply_sale(&self, op: &PendingOperation) {
        if op.entity != EntityKind::Sales {
            return;
        }
        let Some(product_id) = op.payload.get("productId").and_then(|v| v.as_str()) else {
            return;
        };
        let quantity = op
            .payload
            .get("quantity")
            .and_then(|v| v.as_i64())
            .unwrap_or(1);

        let mut tables = self.tables.lock();
        if let Some(products) = tables.get_mut(&EntityKind::Products) {
            if let Some(product) = products.iter_mut().find(|p| p.id == product_id) {
                let stock = product.data.get("stock").and_then(|v| v.as_i64()).unwrap_or(0);
                product.data["stock"] = serde_json::json!(stock - quantity);
            }
        }
        // The accepted sale also shows up in the remote sales table
        if let Some(sales) = tables.get_mut(&EntityKind::Sales) {
            sales.push(EntityRecord::new(op.local_id.clone(), op.payload.clone()));
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn fetch_all(
        &self,
        entity: EntityKind,
        _account: &str,
    ) -> Result<Vec<EntityRecord>, RemoteError> {
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(format!("fetch:{entity}"));

        if self.failing_fetches.lock().contains(&entity) {
            return Err(RemoteError::Unreachable(format!(
                "fetch {entity} failed"
            )));
        }
        Ok(self.tables.lock().get(&entity).cloned().unwrap_or_default())
    }

    async fn submit(&self, op: &PendingOperation) -> Result<(), RemoteError> {
        let op_ref = Self::op_ref(op);
        self.calls.lock().push(format!("submit:{op_ref}"));

        if self.unreachable_refs.lock().contains(&op_ref) {
            return Err(RemoteError::Unreachable(format!(
                "submit {op_ref} failed"
            )));
        }
        if self.rejected_refs.lock().contains(&op_ref) {
            return Err(RemoteError::Rejected(format!(
                "submit {op_ref} rejected"
            )));
        }

        self.apply_sale(op);
        Ok(())
    }
}

/// Durable store whose reads can be switched to fail, for exercising the
/// degraded paths a broken mirror puts a controller on.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

impl DurableStore for FlakyStore {
    fn put_all(&self, entity: EntityKind, records: &[EntityRecord]) -> Result<(), StoreError> {
        self.inner.put_all(entity, records)
    }

    fn get_all(&self, entity: EntityKind) -> Result<Vec<EntityRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        self.inner.get_all(entity)
    }

    fn clear(&self, entity: EntityKind) -> Result<(), StoreError> {
        self.inner.clear(entity)
    }

    fn append_pending(&self, op: &PendingOperation) -> Result<(), StoreError> {
        self.inner.append_pending(op)
    }

    fn remove_pending(&self, local_id: &str) -> Result<(), StoreError> {
        self.inner.remove_pending(local_id)
    }

    fn pending_operations(&self) -> Result<Vec<PendingOperation>, StoreError> {
        self.inner.pending_operations()
    }

    fn clear_pending(&self) -> Result<(), StoreError> {
        self.inner.clear_pending()
    }
}
