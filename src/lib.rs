//! Offline-first synchronization layer for a retail point-of-sale.
//!
//! Reads and writes of business data (products, customers, sales) work
//! whether or not the device is connected: reads come through per-entity
//! cache controllers backed by a durable local mirror, writes made offline
//! land in a pending queue and replay FIFO once connectivity returns, and a
//! reconciler ties the two together on reconnect.
//!
//! The UI talks to [`SyncEngine`], the cache controllers, and the queue; it
//! never touches the durable store or the remote system directly. The
//! remote backend and the session/auth layer are collaborators injected via
//! [`RemoteStore`] and [`IdentityProvider`].

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod queue;
pub mod reconciler;
pub mod remote;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{ControllerDeps, EntityCacheController};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor};
pub use engine::{Shapers, SyncEngine};
pub use error::{SyncError, SyncErrorKind, SyncErrorReport};
pub use queue::PendingWriteQueue;
pub use reconciler::{ReconcileSummary, SyncReconciler};
pub use remote::{PassthroughShape, PayloadShaper, RemoteError, RemoteStore, ShapeFn};
pub use session::{IdentityProvider, SessionIdentity};
pub use state::SyncState;
pub use store::{DurableStore, MemoryStore, SqliteStore, StoreError};
pub use types::{
    CachePhase, CacheSnapshot, DrainEvent, DrainOutcome, DrainSummary, EntityKind, EntityRecord,
    PendingOperation, SelfTestReport, SyncStatus, WriteReceipt,
};
