//! Durable pending-write queue.
//!
//! Writes made offline (or that fail remotely) are queued as whole
//! operations and replayed FIFO once connectivity returns; sales must
//! reach the remote system in the order they happened. An operation leaves
//! the queue only after the remote system acknowledges it; a drain that
//! gets partway through is a normal outcome, not an error.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncError;
use crate::remote::{RemoteError, RemoteStore};
use crate::store::DurableStore;
use crate::types::{DrainEvent, DrainOutcome, DrainSummary, EntityKind, PendingOperation, WriteReceipt};

/// Releases an in-flight flag when the owning operation finishes, on every
/// exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PendingWriteQueue {
    store: Arc<dyn DurableStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<ConnectivityMonitor>,
    drain_in_flight: AtomicBool,
    events: broadcast::Sender<DrainEvent>,
}

impl PendingWriteQueue {
    pub fn new(
        store: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<ConnectivityMonitor>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            store,
            remote,
            connectivity,
            drain_in_flight: AtomicBool::new(false),
            events,
        }
    }

    /// Per-operation success/rejection/failure events emitted during drains,
    /// so optimistic UI rows can be reconciled instead of assumed correct.
    pub fn subscribe(&self) -> broadcast::Receiver<DrainEvent> {
        self.events.subscribe()
    }

    /// Submit one write: remote-first when online, queued otherwise.
    ///
    /// A structured remote rejection is surfaced and NOT queued; retrying
    /// it would repeat the same rejection. An unreachable remote queues the
    /// operation for the next drain.
    pub async fn submit(
        &self,
        entity: EntityKind,
        payload: serde_json::Value,
    ) -> Result<WriteReceipt, SyncError> {
        let op = PendingOperation::new(entity, payload);

        if self.connectivity.is_online() {
            match self.remote.submit(&op).await {
                Ok(()) => return Ok(WriteReceipt::Confirmed),
                Err(RemoteError::Rejected(reason)) => {
                    log::warn!("Queue: {entity} write rejected, not queued: {reason}");
                    return Err(SyncError::RemoteRejected(reason));
                }
                Err(RemoteError::Unreachable(reason)) => {
                    log::warn!("Queue: {entity} write unreachable, queuing: {reason}");
                }
            }
        }

        self.enqueue(op)
    }

    /// Queue an already-shaped operation without attempting the remote.
    fn enqueue(&self, op: PendingOperation) -> Result<WriteReceipt, SyncError> {
        self.store.append_pending(&op)?;
        log::info!(
            "Queue: enqueued {} op {} (pending={})",
            op.entity,
            op.local_id,
            self.pending_count()
        );
        Ok(WriteReceipt::Queued {
            local_id: op.local_id,
        })
    }

    /// Number of operations awaiting remote confirmation.
    pub fn pending_count(&self) -> usize {
        self.store
            .pending_operations()
            .map(|ops| ops.len())
            .unwrap_or(0)
    }

    /// Replay queued operations in enqueue order.
    ///
    /// An unreachable failure halts draining for that operation's entity
    /// type (ordering is per entity) but keeps the operation queued. Only a
    /// remote ack removes an operation; a rejection removes it too, with a
    /// `Rejected` event, since replaying it can never succeed. At most one
    /// drain runs at a time; a second call while one is in flight is a
    /// no-op.
    pub async fn drain(&self) -> Result<DrainSummary, SyncError> {
        if self
            .drain_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Queue: drain already in flight, skipping");
            return Ok(DrainSummary {
                remaining: self.pending_count(),
                ..DrainSummary::default()
            });
        }
        let _guard = InFlightGuard(&self.drain_in_flight);

        let ops = self.store.pending_operations()?;
        if ops.is_empty() {
            return Ok(DrainSummary::default());
        }
        log::info!("Queue: draining {} pending operation(s)", ops.len());

        let mut summary = DrainSummary::default();
        let mut halted: HashSet<EntityKind> = HashSet::new();

        for op in ops {
            if halted.contains(&op.entity) {
                continue;
            }

            match self.remote.submit(&op).await {
                Ok(()) => {
                    self.store.remove_pending(&op.local_id)?;
                    summary.submitted += 1;
                    self.emit(&op, DrainOutcome::Submitted);
                }
                Err(RemoteError::Rejected(reason)) => {
                    log::warn!(
                        "Queue: {} op {} rejected during drain, dropping: {reason}",
                        op.entity,
                        op.local_id
                    );
                    self.store.remove_pending(&op.local_id)?;
                    summary.rejected += 1;
                    self.emit(&op, DrainOutcome::Rejected(reason));
                }
                Err(RemoteError::Unreachable(reason)) => {
                    log::warn!(
                        "Queue: {} op {} unreachable, halting {} drain: {reason}",
                        op.entity,
                        op.local_id,
                        op.entity
                    );
                    halted.insert(op.entity);
                    self.emit(&op, DrainOutcome::Failed(reason));
                }
            }
        }

        summary.remaining = self.pending_count();
        log::info!(
            "Queue: drain finished (submitted={}, rejected={}, remaining={})",
            summary.submitted,
            summary.rejected,
            summary.remaining
        );
        Ok(summary)
    }

    /// Sign-out teardown: discard everything unconfirmed.
    pub fn clear(&self) -> Result<(), SyncError> {
        self.store.clear_pending()?;
        Ok(())
    }

    fn emit(&self, op: &PendingOperation, outcome: DrainOutcome) {
        let _ = self.events.send(DrainEvent {
            local_id: op.local_id.clone(),
            entity: op.entity,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testutil::MockRemote;
    use serde_json::json;

    fn queue_with(remote: Arc<MockRemote>, online: bool) -> PendingWriteQueue {
        PendingWriteQueue::new(
            Arc::new(MemoryStore::new()),
            remote,
            Arc::new(ConnectivityMonitor::new(online, 8)),
            8,
        )
    }

    #[tokio::test]
    async fn test_offline_submit_queues_without_remote_call() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), false);

        let receipt = queue
            .submit(EntityKind::Sales, json!({"ref": "A"}))
            .await
            .unwrap();

        assert!(matches!(receipt, WriteReceipt::Queued { .. }));
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(remote.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_online_submit_confirms_directly() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), true);

        let receipt = queue
            .submit(EntityKind::Sales, json!({"ref": "A"}))
            .await
            .unwrap();

        assert_eq!(receipt, WriteReceipt::Confirmed);
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_online_rejection_surfaces_and_does_not_queue() {
        let remote = Arc::new(MockRemote::new());
        remote.reject_ref("A");
        let queue = queue_with(remote.clone(), true);

        let err = queue
            .submit(EntityKind::Sales, json!({"ref": "A"}))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RemoteRejected(_)));
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_online_unreachable_falls_back_to_queue() {
        let remote = Arc::new(MockRemote::new());
        remote.unreachable_ref("A");
        let queue = queue_with(remote.clone(), true);

        let receipt = queue
            .submit(EntityKind::Sales, json!({"ref": "A"}))
            .await
            .unwrap();

        assert!(matches!(receipt, WriteReceipt::Queued { .. }));
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_is_fifo_and_halts_on_failure() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), false);

        for r in ["A", "B", "C"] {
            queue.submit(EntityKind::Sales, json!({"ref": r})).await.unwrap();
        }
        remote.unreachable_ref("A");

        let summary = queue.drain().await.unwrap();
        assert_eq!(summary.submitted, 0);
        assert_eq!(summary.remaining, 3);
        // Only A was attempted; B and C stay behind it, unreordered
        assert_eq!(remote.calls(), vec!["submit:A"]);

        remote.restore_ref("A");
        let summary = queue.drain().await.unwrap();
        assert_eq!(summary.submitted, 3);
        assert_eq!(summary.remaining, 0);
        assert_eq!(
            remote.calls(),
            vec!["submit:A", "submit:A", "submit:B", "submit:C"]
        );
    }

    #[tokio::test]
    async fn test_drain_halt_is_per_entity() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), false);

        queue.submit(EntityKind::Sales, json!({"ref": "S1"})).await.unwrap();
        queue
            .submit(EntityKind::Customers, json!({"ref": "C1"}))
            .await
            .unwrap();
        remote.unreachable_ref("S1");

        let summary = queue.drain().await.unwrap();

        // Customer write proceeds; the sales lane is halted
        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.remaining, 1);
        let remaining = queue.store.pending_operations().unwrap();
        assert_eq!(remaining[0].entity, EntityKind::Sales);
    }

    #[tokio::test]
    async fn test_drain_drops_rejected_with_event() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), false);
        let mut events = queue.subscribe();

        queue.submit(EntityKind::Sales, json!({"ref": "A"})).await.unwrap();
        remote.reject_ref("A");

        let summary = queue.drain().await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.remaining, 0);

        let event = events.try_recv().unwrap();
        assert!(matches!(event.outcome, DrainOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn test_concurrent_drains_submit_each_op_once() {
        let remote = Arc::new(MockRemote::new());
        let queue = Arc::new(queue_with(remote.clone(), false));
        queue.submit(EntityKind::Sales, json!({"ref": "A"})).await.unwrap();

        let (a, b) = tokio::join!(queue.drain(), queue.drain());
        a.unwrap();
        b.unwrap();

        assert_eq!(remote.submit_count(), 1);
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_drain_emits_submitted_events_in_order() {
        let remote = Arc::new(MockRemote::new());
        let queue = queue_with(remote.clone(), false);
        let mut events = queue.subscribe();

        let first = queue
            .submit(EntityKind::Sales, json!({"ref": "A"}))
            .await
            .unwrap();
        queue.submit(EntityKind::Sales, json!({"ref": "B"})).await.unwrap();

        queue.drain().await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.outcome, DrainOutcome::Submitted);
        if let WriteReceipt::Queued { local_id } = first {
            assert_eq!(event.local_id, local_id);
        } else {
            panic!("expected queued receipt");
        }
    }
}
