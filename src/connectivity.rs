//! Single source of truth for "are we online".
//!
//! Platform connectivity callbacks feed `set_online`; everything else reads
//! the flag synchronously or subscribes to edge-triggered transitions.
//! No probing is performed; platform-reported connectivity can be
//! optimistic about actual remote reachability, and callers handle that by
//! treating remote failures as a cache-fallback case, not a surprise.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

/// A connectivity transition. Emitted exactly once per edge, never repeated
/// while the state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    WentOnline,
    WentOffline,
}

/// Tracks online/offline status and notifies subscribers on transitions.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            online: AtomicBool::new(initially_online),
            events,
        }
    }

    /// Current status, synchronously.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a platform connectivity signal. Emits a transition event only
    /// when the state actually changed.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }

        let event = if online {
            ConnectivityEvent::WentOnline
        } else {
            ConnectivityEvent::WentOffline
        };
        log::info!("Connectivity: {event:?}");

        // No subscribers yet is fine
        let _ = self.events.send(event);
    }

    /// Subscribe to future transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_is_edge_triggered_once() {
        let monitor = ConnectivityMonitor::new(false, 8);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        monitor.set_online(true); // already online, no second event

        assert_eq!(rx.try_recv().unwrap(), ConnectivityEvent::WentOnline);
        assert!(rx.try_recv().is_err());
        assert!(monitor.is_online());
    }

    #[test]
    fn test_offline_transition_emits() {
        let monitor = ConnectivityMonitor::new(true, 8);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);

        assert_eq!(rx.try_recv().unwrap(), ConnectivityEvent::WentOffline);
        assert!(!monitor.is_online());
    }

    #[test]
    fn test_status_readable_without_subscribers() {
        let monitor = ConnectivityMonitor::new(false, 8);
        monitor.set_online(true);
        assert!(monitor.is_online());
    }
}
