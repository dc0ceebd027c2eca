//! Network monitor subscriptions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::network::NodeSnapshot;
use crate::types::ChangeKind;

pub(crate) type MonitorCallback = Arc<dyn Fn(ChangeKind, &NodeSnapshot) + Send + Sync>;

/// Handle to one monitor subscription.
///
/// Pass it to [`Context::stop_monitor`](crate::Context::stop_monitor) to end
/// the subscription. Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    id: u64,
    changes: Arc<AtomicU64>,
}

impl MonitorHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Topology changes delivered to this subscription so far.
    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::SeqCst)
    }
}

struct Subscription {
    id: u64,
    callback: MonitorCallback,
    changes: Arc<AtomicU64>,
}

#[derive(Default)]
pub(crate) struct MonitorRegistry {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl MonitorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub(crate) fn add(&mut self, callback: MonitorCallback) -> MonitorHandle {
        self.next_id += 1;
        let changes = Arc::new(AtomicU64::new(0));
        self.subscriptions.push(Subscription {
            id: self.next_id,
            callback,
            changes: changes.clone(),
        });
        MonitorHandle {
            id: self.next_id,
            changes,
        }
    }

    /// Remove one subscription. Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, handle: &MonitorHandle) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != handle.id);
        self.subscriptions.len() != before
    }

    /// Remove every subscription, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.subscriptions.len();
        self.subscriptions.clear();
        count
    }

    /// Callbacks paired with their change counters, in registration order.
    pub(crate) fn subscribers(&self) -> Vec<(MonitorCallback, Arc<AtomicU64>)> {
        self.subscriptions
            .iter()
            .map(|s| (s.callback.clone(), s.changes.clone()))
            .collect()
    }
}
