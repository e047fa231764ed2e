//! Top-level wiring for the sync layer.
//!
//! `SyncEngine` owns one store, one connectivity monitor, one queue, one
//! reconciler, and a cache controller per business entity. The UI talks to
//! the controllers and the queue through this facade and never touches the
//! store or the remote system directly.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cache::{ControllerDeps, EntityCacheController};
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::queue::PendingWriteQueue;
use crate::reconciler::{ReconcileSummary, SyncReconciler};
use crate::remote::{PassthroughShape, PayloadShaper, RemoteStore};
use crate::session::IdentityProvider;
use crate::state::SyncState;
use crate::store::{self, DurableStore};
use crate::types::{DrainEvent, EntityKind, SyncStatus};

/// Per-entity write-payload shapers, fixed at engine construction.
///
/// Defaults to passthrough for entities whose UI shape already matches the
/// remote shape.
pub struct Shapers {
    pub products: Arc<dyn PayloadShaper>,
    pub customers: Arc<dyn PayloadShaper>,
    pub sales: Arc<dyn PayloadShaper>,
}

impl Default for Shapers {
    fn default() -> Self {
        let passthrough: Arc<dyn PayloadShaper> = Arc::new(PassthroughShape);
        Self {
            products: passthrough.clone(),
            customers: passthrough.clone(),
            sales: passthrough,
        }
    }
}

pub struct SyncEngine {
    store: Arc<dyn DurableStore>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: Arc<PendingWriteQueue>,
    reconciler: Arc<SyncReconciler>,
    sync_state: Arc<SyncState>,
    products: Arc<EntityCacheController>,
    customers: Arc<EntityCacheController>,
    sales: Arc<EntityCacheController>,
}

impl SyncEngine {
    /// Wire up the sync layer. Opens the configured durable store,
    /// degrading to a memory-only session if it is unavailable; never
    /// touches the network.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        shapers: Shapers,
        config: &SyncConfig,
    ) -> Self {
        let store = store::open_or_memory(config);
        Self::with_store(store, remote, identity, shapers, config)
    }

    /// Wire up against an explicit store. Useful for testing.
    pub fn with_store(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        shapers: Shapers,
        config: &SyncConfig,
    ) -> Self {
        let connectivity = Arc::new(ConnectivityMonitor::new(false, config.event_capacity));
        let sync_state = Arc::new(SyncState::new());
        let queue = Arc::new(PendingWriteQueue::new(
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            config.event_capacity,
        ));
        let reconciler = Arc::new(SyncReconciler::new(queue.clone(), connectivity.clone()));

        let deps = ControllerDeps {
            store: store.clone(),
            remote,
            connectivity: connectivity.clone(),
            identity,
            sync_state: sync_state.clone(),
            queue: queue.clone(),
        };

        let products = Arc::new(EntityCacheController::new(
            EntityKind::Products,
            shapers.products,
            deps.clone(),
        ));
        let customers = Arc::new(EntityCacheController::new(
            EntityKind::Customers,
            shapers.customers,
            deps.clone(),
        ));
        let sales = Arc::new(EntityCacheController::new(
            EntityKind::Sales,
            shapers.sales,
            deps,
        ));

        for controller in [&products, &customers, &sales] {
            reconciler.register(controller.clone());
        }

        Self {
            store,
            connectivity,
            queue,
            reconciler,
            sync_state,
            products,
            customers,
            sales,
        }
    }

    pub fn products(&self) -> &Arc<EntityCacheController> {
        &self.products
    }

    pub fn customers(&self) -> &Arc<EntityCacheController> {
        &self.customers
    }

    pub fn sales(&self) -> &Arc<EntityCacheController> {
        &self.sales
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn queue(&self) -> &Arc<PendingWriteQueue> {
        &self.queue
    }

    /// Durable-store handle for the `settings` table and diagnostics.
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Drain-event subscription for reconciling optimistic UI rows.
    pub fn subscribe_drain_events(&self) -> tokio::sync::broadcast::Receiver<DrainEvent> {
        self.queue.subscribe()
    }

    /// Spawn the automatic reconcile-on-reconnect loop.
    pub fn spawn_reconcile_loop(&self) -> JoinHandle<()> {
        tokio::spawn(self.reconciler.clone().run_reconcile_loop())
    }

    /// Manual "retry sync": same pass the reconnect trigger runs.
    pub async fn retry_sync(&self) -> Result<ReconcileSummary, crate::error::SyncError> {
        self.reconciler.run().await
    }

    /// Current status for dashboards and the pending-work badge.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.connectivity.is_online(),
            pending_writes: self.queue.pending_count(),
            last_sync: self.sync_state.last_sync_map(),
        }
    }

    /// Sign-out teardown: stop serving cached data, clear every local
    /// table, discard unconfirmed writes, and reset sync state. The caller
    /// clears the identity provider itself.
    pub fn sign_out(&self) {
        for controller in [&self.products, &self.customers, &self.sales] {
            controller.reset();
        }
        for entity in EntityKind::all() {
            if let Err(e) = self.store.clear(entity) {
                log::warn!("Sign-out: failed to clear {entity} table: {e}");
            }
        }
        if let Err(e) = self.queue.clear() {
            log::warn!("Sign-out: failed to clear pending queue: {e}");
        }
        self.sync_state.reset();
        log::info!("Sign-out: local caches and pending queue cleared");
    }
}
