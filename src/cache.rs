//! Read-through entity cache controller.
//!
//! One instance per entity table. Reads go to the remote system when
//! online and worth a round-trip, otherwise to the local mirror; every
//! successful remote read is persisted back into the mirror as a full
//! replace. State is owned per instance and injected (no module-level
//! flags), and loads are serialized by an in-flight flag rather than a
//! lock, since there is no preemption between awaits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncError;
use crate::queue::PendingWriteQueue;
use crate::remote::{PayloadShaper, RemoteStore};
use crate::session::IdentityProvider;
use crate::state::SyncState;
use crate::store::{DurableStore, StoreError};
use crate::types::{CachePhase, CacheSnapshot, EntityKind, SelfTestReport, WriteReceipt};

/// Shared collaborators injected into every controller.
#[derive(Clone)]
pub struct ControllerDeps {
    pub store: Arc<dyn DurableStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub identity: Arc<dyn IdentityProvider>,
    pub sync_state: Arc<SyncState>,
    pub queue: Arc<PendingWriteQueue>,
}

#[derive(Default)]
struct Inner {
    phase: CachePhase,
    records: Vec<crate::types::EntityRecord>,
    has_loaded: bool,
    last_sync: Option<chrono::DateTime<Utc>>,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct EntityCacheController {
    entity: EntityKind,
    shaper: Arc<dyn PayloadShaper>,
    deps: ControllerDeps,
    inner: Mutex<Inner>,
    load_in_flight: AtomicBool,
}

impl EntityCacheController {
    pub fn new(entity: EntityKind, shaper: Arc<dyn PayloadShaper>, deps: ControllerDeps) -> Self {
        Self {
            entity,
            shaper,
            deps,
            inner: Mutex::new(Inner::default()),
            load_in_flight: AtomicBool::new(false),
        }
    }

    pub fn entity(&self) -> EntityKind {
        self.entity
    }

    /// Load the entity table, read-through style.
    ///
    /// A remote round-trip happens only when online AND this is either a
    /// forced refresh or the first load since controller creation;
    /// subsequent renders reuse the mirror. While a load is in flight a
    /// second call is a no-op returning the current snapshot.
    ///
    /// A failed remote attempt falls back to the mirror; a nonempty mirror
    /// is a usable degraded answer and no error surfaces. When the mirror
    /// itself cannot be read, records already held in memory keep being
    /// served. `NoDataAvailable` surfaces only when there is nothing to
    /// serve at all, distinct from a hard error.
    pub async fn load_data(&self, force_refresh: bool) -> Result<CacheSnapshot, SyncError> {
        if self
            .load_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Cache[{}]: load already in flight", self.entity);
            return Ok(self.snapshot());
        }
        let _guard = InFlightGuard(&self.load_in_flight);

        let Some(account) = self.deps.identity.current_identity() else {
            log::debug!("Cache[{}]: no authenticated caller, resetting", self.entity);
            self.reset();
            return Ok(self.snapshot());
        };

        let first_load = !self.inner.lock().has_loaded;

        if self.deps.connectivity.is_online() && (force_refresh || first_load) {
            self.inner.lock().phase = CachePhase::Loading;

            return match self.deps.remote.fetch_all(self.entity, &account).await {
                Ok(records) => {
                    if let Err(e) = self.deps.store.put_all(self.entity, &records) {
                        // Memory-only from here; the session keeps working
                        log::warn!("Cache[{}]: mirror write failed: {e}", self.entity);
                    }
                    let now = Utc::now();
                    self.deps.sync_state.record_sync(self.entity, now);

                    let mut inner = self.inner.lock();
                    inner.phase = CachePhase::Ready;
                    inner.records = records;
                    inner.has_loaded = true;
                    inner.last_sync = Some(now);
                    log::info!(
                        "Cache[{}]: remote load ok ({} records)",
                        self.entity,
                        inner.records.len()
                    );
                    Ok(Self::snapshot_of(&inner))
                }
                Err(e) => {
                    log::warn!(
                        "Cache[{}]: remote load failed, serving mirror: {e}",
                        self.entity
                    );
                    let fallback = self.read_mirror();

                    let mut inner = self.inner.lock();
                    inner.phase = CachePhase::Degraded;
                    inner.has_loaded = true;
                    match fallback {
                        Ok(records) if !records.is_empty() => {
                            inner.records = records;
                            Ok(Self::snapshot_of(&inner))
                        }
                        Ok(_) => {
                            inner.records.clear();
                            Err(SyncError::NoDataAvailable(self.entity))
                        }
                        // Mirror unreadable: the records already in hand are
                        // the best (and only) answer, keep serving them
                        Err(store_err) => {
                            log::warn!(
                                "Cache[{}]: mirror read failed: {store_err}",
                                self.entity
                            );
                            if inner.records.is_empty() {
                                Err(SyncError::NoDataAvailable(self.entity))
                            } else {
                                Ok(Self::snapshot_of(&inner))
                            }
                        }
                    }
                }
            };
        }

        // Offline, or online with nothing refresh-worthy: serve the mirror
        // without a remote call.
        let mirror = self.read_mirror();
        let offline = !self.deps.connectivity.is_online();

        let mut inner = self.inner.lock();
        let records = match mirror {
            Ok(records) => records,
            Err(store_err) => {
                log::warn!("Cache[{}]: mirror read failed: {store_err}", self.entity);
                inner.phase = CachePhase::Degraded;
                inner.has_loaded = true;
                if inner.records.is_empty() {
                    return Err(SyncError::NoDataAvailable(self.entity));
                }
                return Ok(Self::snapshot_of(&inner));
            }
        };
        if records.is_empty() && offline && !inner.has_loaded {
            // First-ever load with no connectivity and no prior cache
            inner.phase = CachePhase::Degraded;
            inner.has_loaded = true;
            return Err(SyncError::NoDataAvailable(self.entity));
        }
        inner.phase = CachePhase::Ready;
        inner.records = records;
        inner.has_loaded = true;
        Ok(Self::snapshot_of(&inner))
    }

    /// Force a remote round-trip (user-triggered reload, reconnect).
    pub async fn refresh(&self) -> Result<CacheSnapshot, SyncError> {
        self.load_data(true).await
    }

    /// State and entity table as currently held, without loading.
    pub fn snapshot(&self) -> CacheSnapshot {
        Self::snapshot_of(&self.inner.lock())
    }

    /// Submit a write for this entity, shaped into the remote payload form.
    ///
    /// Remote-first when online; queued when offline or unreachable. Never
    /// blocks on network availability beyond the one optimistic attempt.
    pub async fn submit_write(
        &self,
        record: &serde_json::Value,
    ) -> Result<WriteReceipt, SyncError> {
        let payload = self.shaper.shape(record);
        self.deps.queue.submit(self.entity, payload).await
    }

    /// Cache-health probe: checks the offline serve path (a nonempty,
    /// readable local mirror) without touching controller state or the
    /// network. A pass means offline reads have data; it is not a
    /// correctness proof of the mirror's contents.
    pub fn diagnostic_self_test(&self) -> SelfTestReport {
        match self.read_mirror() {
            Ok(records) if !records.is_empty() => SelfTestReport {
                passed: true,
                message: format!(
                    "{} mirror is servable offline ({} records)",
                    self.entity,
                    records.len()
                ),
                cached_records: records.len(),
            },
            Ok(_) => SelfTestReport {
                passed: false,
                message: format!(
                    "{} mirror is empty; offline reads would surface no data",
                    self.entity
                ),
                cached_records: 0,
            },
            Err(e) => SelfTestReport {
                passed: false,
                message: format!("{} mirror unreadable: {e}", self.entity),
                cached_records: 0,
            },
        }
    }

    /// Sign-out reset. The mirror is not cleared here (the engine owns
    /// that); the controller just stops serving it.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }

    /// The offline serve path: one mirror read, errors left to the caller
    /// so an unreadable mirror is distinguishable from an empty one.
    fn read_mirror(&self) -> Result<Vec<crate::types::EntityRecord>, StoreError> {
        self.deps.store.get_all(self.entity)
    }

    fn snapshot_of(inner: &Inner) -> CacheSnapshot {
        CacheSnapshot {
            phase: inner.phase,
            records: inner.records.clone(),
            last_sync: inner.last_sync,
        }
    }
}
