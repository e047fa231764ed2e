//! Recovery coordination when connectivity returns.
//!
//! One pass: drain the pending-write queue first, then force-refresh every
//! registered controller. The steps run sequentially so refreshed mirrors
//! reflect the just-drained writes (server-side stock decrements included)
//! rather than a stale pre-drain snapshot.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::cache::EntityCacheController;
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::error::SyncError;
use crate::queue::PendingWriteQueue;
use crate::types::DrainSummary;

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileSummary {
    pub drain: DrainSummary,
    pub controllers_refreshed: usize,
}

pub struct SyncReconciler {
    queue: Arc<PendingWriteQueue>,
    connectivity: Arc<ConnectivityMonitor>,
    controllers: Mutex<Vec<Arc<EntityCacheController>>>,
}

impl SyncReconciler {
    pub fn new(queue: Arc<PendingWriteQueue>, connectivity: Arc<ConnectivityMonitor>) -> Self {
        Self {
            queue,
            connectivity,
            controllers: Mutex::new(Vec::new()),
        }
    }

    /// Register a controller for post-drain refresh.
    pub fn register(&self, controller: Arc<EntityCacheController>) {
        self.controllers.lock().push(controller);
    }

    /// One reconcile pass: drain, then refresh each controller in turn.
    ///
    /// A controller refresh failure is logged and does not stop the
    /// others; they are independent (no cross-entity ordering guarantee).
    pub async fn run(&self) -> Result<ReconcileSummary, SyncError> {
        let drain = self.queue.drain().await?;

        let controllers: Vec<Arc<EntityCacheController>> = self.controllers.lock().clone();
        let mut refreshed = 0;
        for controller in controllers {
            match controller.refresh().await {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    log::warn!("Reconciler: {} refresh failed: {e}", controller.entity());
                }
            }
        }

        log::info!(
            "Reconciler: pass complete (drained={}, remaining={}, refreshed={refreshed})",
            drain.submitted,
            drain.remaining
        );
        Ok(ReconcileSummary {
            drain,
            controllers_refreshed: refreshed,
        })
    }

    /// Long-running task: reconcile automatically on every went-online
    /// transition. Offline transitions are noted and otherwise ignored.
    pub async fn run_reconcile_loop(self: Arc<Self>) {
        log::info!("Reconciler: watching for connectivity transitions");
        let mut rx = self.connectivity.subscribe();

        loop {
            match rx.recv().await {
                Ok(ConnectivityEvent::WentOnline) => {
                    log::info!("Reconciler: back online, reconciling");
                    if let Err(e) = self.run().await {
                        log::warn!("Reconciler: pass failed: {e}");
                    }
                }
                Ok(ConnectivityEvent::WentOffline) => {
                    log::debug!("Reconciler: offline, writes will queue");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Transitions coalesce fine; reconcile runs on the next event
                    log::warn!("Reconciler: missed {missed} connectivity event(s)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
