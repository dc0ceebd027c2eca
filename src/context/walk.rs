//! Lock-coordinated traversal of the node set.
//!
//! A [`NodeWalk`] copies the matching node addresses under the context lock,
//! releases it, then visits the addresses one at a time. Each address is
//! resolved against the live network; nodes that left in the meantime are
//! skipped. A yielded [`LockedNode`] holds that node's lock until the walk
//! advances or is dropped.

use std::net::SocketAddrV6;

use super::Context;
use super::handles::{Mib, MibIter};
use crate::engine::Engine;
use crate::error::{Error, LockOp, Result};
use crate::network::{MibKey, MibSelector, NodeKey, NodeSnapshot};
use crate::types::DeviceFilter;

enum State {
    Start,
    Walking {
        remaining: std::vec::IntoIter<SocketAddrV6>,
        held: Option<NodeKey>,
    },
    Done,
}

/// One traversal session.
///
/// Created by [`Context::walk`]. This is a lending iterator: the node
/// returned by [`next_node`](Self::next_node) borrows the walk, so at most
/// one node lock is held at a time.
pub struct NodeWalk<'c, E: Engine> {
    context: &'c Context<E>,
    filter: DeviceFilter,
    state: State,
    skipped: usize,
}

impl<'c, E: Engine> NodeWalk<'c, E> {
    pub(crate) fn new(context: &'c Context<E>, filter: DeviceFilter) -> Self {
        Self {
            context,
            filter,
            state: State::Start,
            skipped: 0,
        }
    }

    /// Snapshot entries that no longer resolved to a live node.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Release the current node and lock the next live one.
    ///
    /// Returns `None` once the snapshot is exhausted. An error ends the walk.
    pub fn next_node(&mut self) -> Option<Result<LockedNode<'_, E>>> {
        let context = self.context;
        let engine = context.engine();
        loop {
            match &mut self.state {
                State::Start => {
                    if let Err(e) = context.ensure_live() {
                        self.state = State::Done;
                        return Some(Err(e));
                    }
                    match snapshot(engine, self.filter) {
                        Ok(addresses) => {
                            tracing::trace!(jip.nodes = addresses.len(), "node snapshot taken");
                            self.state = State::Walking {
                                remaining: addresses.into_iter(),
                                held: None,
                            };
                        }
                        Err(e) => {
                            self.state = State::Done;
                            return Some(Err(e));
                        }
                    }
                }
                State::Walking { remaining, held } => {
                    if let Some(node) = held.take() {
                        let status = engine.unlock_node(node);
                        if !status.is_ok() {
                            self.state = State::Done;
                            return Some(Err(Error::engine(LockOp::UnlockNode, status)));
                        }
                    }

                    let Some(address) = remaining.next() else {
                        self.finish();
                        return None;
                    };
                    let Some(node) = engine.lookup_node(&address) else {
                        tracing::trace!(jip.node = %address, "node left before visit");
                        self.skipped += 1;
                        continue;
                    };

                    let status = engine.lock_node(node);
                    if !status.is_ok() {
                        if !engine.network().contains_node(node) {
                            tracing::trace!(jip.node = %address, "node left while locking");
                            self.skipped += 1;
                            continue;
                        }
                        self.state = State::Done;
                        return Some(Err(Error::engine(LockOp::LockNode, status)));
                    }
                    let Some(snapshot) = engine.network().node(node) else {
                        // Removed without its lock being taken.
                        let status = engine.unlock_node(node);
                        if !status.is_ok() {
                            tracing::warn!(
                                jip.node = %address,
                                jip.status = %status,
                                "unlock of removed node failed"
                            );
                        }
                        self.skipped += 1;
                        continue;
                    };
                    *held = Some(node);
                    tracing::trace!(jip.node = %address, "node locked");
                    return Some(Ok(LockedNode {
                        context,
                        node: snapshot,
                    }));
                }
                State::Done => return None,
            }
        }
    }

    fn finish(&mut self) {
        self.state = State::Done;
        if self.skipped > 0 {
            tracing::warn!(jip.skipped = self.skipped, "nodes left the network during traversal");
        }
    }
}

impl<E: Engine> Drop for NodeWalk<'_, E> {
    fn drop(&mut self) {
        if let State::Walking {
            held: Some(node), ..
        } = self.state
        {
            let status = self.context.engine().unlock_node(node);
            if !status.is_ok() {
                tracing::warn!(jip.node = %node, jip.status = %status, "node unlock on drop failed");
            }
        }
    }
}

/// Copy the matching addresses under the context lock.
fn snapshot<E: Engine>(engine: &E, filter: DeviceFilter) -> Result<Vec<SocketAddrV6>> {
    let status = engine.lock();
    if !status.is_ok() {
        return Err(Error::engine(LockOp::LockContext, status));
    }
    let addresses = engine.node_address_list(filter);
    let status = engine.unlock();
    let addresses = addresses.map_err(|status| Error::engine(LockOp::Snapshot, status))?;
    if !status.is_ok() {
        return Err(Error::engine(LockOp::UnlockContext, status));
    }
    Ok(addresses)
}

/// A node held locked by a [`NodeWalk`].
pub struct LockedNode<'w, E: Engine> {
    context: &'w Context<E>,
    node: NodeSnapshot,
}

impl<'w, E: Engine> LockedNode<'w, E> {
    pub fn snapshot(&self) -> &NodeSnapshot {
        &self.node
    }

    pub fn key(&self) -> NodeKey {
        self.node.key
    }

    pub fn address(&self) -> SocketAddrV6 {
        self.node.address
    }

    pub fn device_id(&self) -> u32 {
        self.node.device_id
    }

    pub fn context(&self) -> &'w Context<E> {
        self.context
    }

    /// The node's mibs in order.
    pub fn mibs(&self) -> MibIter<'w, E> {
        MibIter::new(self.context, self.node.key)
    }

    /// First mib with exactly this name.
    pub fn lookup_mib(&self, name: &str) -> Option<Mib<'w, E>> {
        self.mib(self.context.network().lookup_mib(self.node.key, name))
    }

    pub fn lookup_mib_id(&self, id: u32) -> Option<Mib<'w, E>> {
        self.mib(self.context.network().lookup_mib_id(self.node.key, id))
    }

    /// Look a mib up by id or name, as parsed from user input.
    pub fn find_mib(&self, selector: &MibSelector) -> Option<Mib<'w, E>> {
        self.mib(self.context.network().find_mib(self.node.key, selector))
    }

    fn mib(&self, key: Option<MibKey>) -> Option<Mib<'w, E>> {
        let info = self.context.network().mib(key?)?;
        Some(Mib::new(self.context, info))
    }
}

impl<E: Engine> std::fmt::Debug for LockedNode<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LockedNode").field(&self.node).finish()
    }
}
