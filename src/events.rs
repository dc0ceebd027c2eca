//! Notifications posted by the engine.
//!
//! The engine never calls application code directly. It posts [`Event`]s into
//! a bounded queue owned by the context through an [`EventSender`]; the
//! application drains the queue on a thread or task of its choosing (see
//! [`Context::dispatch_pending`](crate::Context::dispatch_pending) and
//! [`Context::run_dispatcher`](crate::Context::run_dispatcher)).
//!
//! Posting never blocks. When the queue is full the event is dropped and
//! counted, so a slow consumer cannot stall network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::network::{NodeSnapshot, VariableSnapshot};
use crate::types::ChangeKind;

/// A notification from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A trapped variable changed on its node.
    Trap {
        handle: u8,
        variable: VariableSnapshot,
    },
    /// A node joined, left or moved.
    Network {
        change: ChangeKind,
        node: NodeSnapshot,
    },
}

/// Engine-side handle to a context's event queue.
///
/// Cheap to clone; all clones feed the same queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Queue an event without blocking.
    ///
    /// Returns `false` if the event was dropped because the queue is full or
    /// the context is gone.
    pub fn post(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    jip.event = event_kind(&event),
                    jip.dropped = dropped,
                    "event queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("event queue closed, context gone");
                false
            }
        }
    }

    /// Events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn event_kind(event: &Event) -> &'static str {
    match event {
        Event::Trap { .. } => "trap",
        Event::Network { .. } => "network",
    }
}

/// Create a bounded event queue.
pub(crate) fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = EventSender {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Network, NodeSpec};
    use crate::types::DeviceFilter;

    fn node_event() -> Event {
        let network = Network::new();
        let key = network
            .insert_node(&NodeSpec::new("[fd04::1]:1873".parse().unwrap(), 1))
            .unwrap();
        assert_eq!(network.node_addresses(DeviceFilter::Any).len(), 1);
        Event::Network {
            change: ChangeKind::Join,
            node: network.node(key).unwrap(),
        }
    }

    #[test]
    fn test_post_and_receive() {
        let (tx, mut rx) = channel(4);
        assert!(tx.post(node_event()));
        assert!(matches!(
            rx.try_recv(),
            Ok(Event::Network {
                change: ChangeKind::Join,
                ..
            })
        ));
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let (tx, mut rx) = channel(2);
        assert!(tx.post(node_event()));
        assert!(tx.post(node_event()));
        assert!(!tx.post(node_event()));
        assert!(!tx.post(node_event()));
        assert_eq!(tx.dropped(), 2);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue() {
        let (tx, rx) = channel(2);
        drop(rx);
        assert!(tx.is_closed());
        assert!(!tx.post(node_event()));
        assert_eq!(tx.dropped(), 0);
    }
}
