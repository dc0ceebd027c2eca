//! In-process engine.
//!
//! [`MemoryEngine`] keeps the network in memory and performs no I/O. For a
//! client context it plays the part of the remote nodes: each variable has a
//! "remote" value that reads copy into the cache and writes update. For a
//! server context it hosts nodes whose cached values are the local values.
//!
//! Topology changes are driven with [`join`](MemoryEngine::join),
//! [`leave`](MemoryEngine::leave) and [`relocate`](MemoryEngine::relocate),
//! which follow the same locking rules a networked engine must: the context
//! lock guards the node set and a node's own lock is taken before removal.

use std::collections::HashMap;
use std::net::{Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use super::Engine;
use crate::codec::{self, Table};
use crate::context::ContextConfig;
use crate::error::{LockOp, Operation, Result, Status};
use crate::events::{Event, EventSender};
use crate::network::{LockToken, Network, NodeKey, NodeSnapshot, NodeSpec, VarKey};
use crate::types::{ChangeKind, ContextKind, DeviceFilter, GetFlags, Ipv4Transport, VarType};
use crate::value::Value;

/// Where an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Request(Operation),
    Coordination(LockOp),
}

impl From<Operation> for FaultPoint {
    fn from(op: Operation) -> Self {
        FaultPoint::Request(op)
    }
}

impl From<LockOp> for FaultPoint {
    fn from(op: LockOp) -> Self {
        FaultPoint::Coordination(op)
    }
}

/// Counts of successful lock calls and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockStats {
    pub context_locks: u64,
    pub context_unlocks: u64,
    pub node_locks: u64,
    pub node_unlocks: u64,
    pub snapshots: u64,
}

impl LockStats {
    /// Every acquired lock has been released.
    pub fn balanced(&self) -> bool {
        self.context_locks == self.context_unlocks && self.node_locks == self.node_unlocks
    }
}

/// A multicast write accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastWrite {
    pub var: VarKey,
    pub data: Bytes,
    pub target: SocketAddrV6,
    pub hops: u8,
    pub send_count: u32,
    /// Hosted or simulated nodes whose value was updated.
    pub delivered: usize,
}

#[derive(Debug, Default)]
struct Counters {
    context_locks: AtomicU64,
    context_unlocks: AtomicU64,
    node_locks: AtomicU64,
    node_unlocks: AtomicU64,
    snapshots: AtomicU64,
}

#[derive(Debug, Default)]
struct State {
    kind: Option<ContextKind>,
    config: ContextConfig,
    border_router: Option<SocketAddrV6>,
    groups: Vec<Ipv6Addr>,
    listening: Option<u16>,
    remote: HashMap<VarKey, Bytes>,
    traps: HashMap<VarKey, (u8, EventSender)>,
    monitor: Option<EventSender>,
    multicast_log: Vec<MulticastWrite>,
}

/// Engine that keeps the whole network in memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    network: Network,
    context_lock: LockToken,
    state: Mutex<State>,
    counters: Counters,
    faults: Mutex<HashMap<FaultPoint, Status>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Topology simulation
    // ========================================================================

    /// A node joins the network.
    ///
    /// Initial values become the node's remote values; the cache starts
    /// empty for client contexts. Rejoining an address replaces the old node.
    pub fn join(&self, spec: &NodeSpec) -> Result<NodeKey> {
        if let Some(old) = self.network.lookup_node(&spec.address()) {
            self.leave(old);
        }

        self.context_lock.acquire();
        let inserted = self.network.insert_node(spec);
        let key = match inserted {
            Ok(key) => key,
            Err(e) => {
                self.context_lock.release();
                return Err(e);
            }
        };
        let hosted = self.state.lock().kind == Some(ContextKind::Server);
        if !hosted {
            let mut state = self.state.lock();
            for var in self.network.node_vars(key) {
                let raw = match self.network.take_raw(var) {
                    Some(raw) => raw,
                    None => self.default_raw(var),
                };
                state.remote.insert(var, raw);
            }
        }
        self.context_lock.release();

        tracing::debug!(jip.node = %spec.address(), jip.device_id = spec.device_id(), "node joined");
        if let Some(node) = self.network.node(key) {
            self.notify(ChangeKind::Join, node);
        }
        Ok(key)
    }

    /// A node leaves the network.
    ///
    /// Blocks until no traversal holds the node.
    pub fn leave(&self, key: NodeKey) -> Option<NodeSnapshot> {
        let token = self.network.node_lock(key)?;
        token.acquire();
        self.context_lock.acquire();

        let vars = self.network.node_vars(key);
        let removed = self.network.remove_node(key);
        {
            let mut state = self.state.lock();
            for var in &vars {
                state.remote.remove(var);
                state.traps.remove(var);
            }
        }

        self.context_lock.release();
        token.release();

        let node = removed?;
        tracing::debug!(jip.node = %node.address, "node left");
        self.notify(ChangeKind::Leave, node.clone());
        Some(node)
    }

    /// A node re-registers under a new address.
    pub fn relocate(&self, key: NodeKey, address: SocketAddrV6) -> Option<NodeSnapshot> {
        self.context_lock.acquire();
        let moved = self.network.relocate_node(key, address);
        self.context_lock.release();

        let node = moved?;
        tracing::debug!(jip.node = %node.address, "node moved");
        self.notify(ChangeKind::Move, node.clone());
        Some(node)
    }

    /// Record a simulated node as a member of a multicast group.
    pub fn join_group(&self, key: NodeKey, group: Ipv6Addr) -> bool {
        self.network.set_node_group(key, group, true)
    }

    /// A variable changes on its node.
    ///
    /// Updates the remote value and, if the variable is trapped, the cache,
    /// then posts a trap event.
    pub fn update_remote(&self, var: VarKey, value: &Value) -> Result<()> {
        let Some(snapshot) = self.network.variable(var) else {
            return Err(crate::Error::StaleVariable { var });
        };
        let raw = match (snapshot.ty, value) {
            (VarType::TableBlob, Value::Table(rows)) => {
                let mut table = Table::new();
                for (index, row) in rows {
                    table.set_row(*index, row.clone())?;
                }
                table.to_raw()
            }
            (ty, value) => codec::encode(ty, value)?,
        };
        self.state.lock().remote.insert(var, raw.clone());
        self.publish_trap(var, raw);
        Ok(())
    }

    /// Current remote (node-side) value of a variable.
    pub fn remote_value(&self, var: VarKey) -> Option<Value> {
        let snapshot = self.network.variable(var)?;
        let raw = self.state.lock().remote.get(&var).cloned()?;
        codec::decode(snapshot.ty, &raw).ok()
    }

    // ========================================================================
    // Inspection and fault injection
    // ========================================================================

    pub fn lock_stats(&self) -> LockStats {
        LockStats {
            context_locks: self.counters.context_locks.load(Ordering::SeqCst),
            context_unlocks: self.counters.context_unlocks.load(Ordering::SeqCst),
            node_locks: self.counters.node_locks.load(Ordering::SeqCst),
            node_unlocks: self.counters.node_unlocks.load(Ordering::SeqCst),
            snapshots: self.counters.snapshots.load(Ordering::SeqCst),
        }
    }

    /// Make the next call at `point` return `status` without effect.
    pub fn fail_next(&self, point: impl Into<FaultPoint>, status: Status) {
        self.faults.lock().insert(point.into(), status);
    }

    pub fn kind(&self) -> Option<ContextKind> {
        self.state.lock().kind
    }

    pub fn config(&self) -> ContextConfig {
        self.state.lock().config.clone()
    }

    pub fn border_router(&self) -> Option<SocketAddrV6> {
        self.state.lock().border_router
    }

    pub fn groups(&self) -> Vec<Ipv6Addr> {
        self.state.lock().groups.clone()
    }

    pub fn listening_port(&self) -> Option<u16> {
        self.state.lock().listening
    }

    /// Handle of the engine-side trap on `var`, if any.
    pub fn trapped(&self, var: VarKey) -> Option<u8> {
        self.state.lock().traps.get(&var).map(|(handle, _)| *handle)
    }

    pub fn trap_count(&self) -> usize {
        self.state.lock().traps.len()
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.lock().monitor.is_some()
    }

    pub fn multicast_log(&self) -> Vec<MulticastWrite> {
        self.state.lock().multicast_log.clone()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn fault(&self, point: impl Into<FaultPoint>) -> Option<Status> {
        let point = point.into();
        let status = self.faults.lock().remove(&point)?;
        tracing::trace!(jip.fault = ?point, jip.status = %status, "injected failure");
        Some(status)
    }

    fn is_server(&self) -> bool {
        self.state.lock().kind == Some(ContextKind::Server)
    }

    fn default_raw(&self, var: VarKey) -> Bytes {
        match self.network.variable(var).map(|v| v.ty) {
            Some(VarType::TableBlob) => Table::new().to_raw(),
            Some(ty) => Bytes::from(vec![0u8; ty.fixed_width().unwrap_or(0)]),
            None => Bytes::new(),
        }
    }

    fn notify(&self, change: ChangeKind, node: NodeSnapshot) {
        let monitor = self.state.lock().monitor.clone();
        if let Some(events) = monitor {
            events.post(Event::Network { change, node });
        }
    }

    /// Store `raw` in the cache and post a trap event if `var` is trapped.
    fn publish_trap(&self, var: VarKey, raw: Bytes) {
        let trap = self.state.lock().traps.get(&var).cloned();
        let Some((handle, events)) = trap else {
            return;
        };
        if !self.network.store_raw(var, raw).is_ok() {
            return;
        }
        if let Some(variable) = self.network.variable(var) {
            events.post(Event::Trap { handle, variable });
        }
    }

    /// Checks shared by every write to a variable.
    fn writable(&self, var: VarKey) -> std::result::Result<(), Status> {
        let Some(snapshot) = self.network.variable(var) else {
            return Err(Status::BadVarIndex);
        };
        if !snapshot.enabled.is_enabled() {
            return Err(Status::Disabled);
        }
        if !snapshot.access.is_writable() {
            return Err(Status::NoAccess);
        }
        Ok(())
    }

    /// Apply a write: cache first (validates size), then the remote value.
    fn apply(&self, var: VarKey, data: &[u8]) -> Status {
        let raw = Bytes::copy_from_slice(data);
        let status = self.network.store_raw(var, raw.clone());
        if !status.is_ok() {
            return status;
        }
        if !self.is_server() {
            self.state.lock().remote.insert(var, raw.clone());
        }
        self.publish_trap(var, raw);
        Status::Ok
    }
}

impl Engine for MemoryEngine {
    fn network(&self) -> &Network {
        &self.network
    }

    fn init(&self, kind: ContextKind, config: &ContextConfig) -> Status {
        if let Some(status) = self.fault(Operation::Init) {
            return status;
        }
        let mut state = self.state.lock();
        state.kind = Some(kind);
        state.config = config.clone();
        Status::Ok
    }

    fn destroy(&self) -> Status {
        if let Some(status) = self.fault(Operation::Destroy) {
            return status;
        }
        {
            let mut state = self.state.lock();
            state.traps.clear();
            state.monitor = None;
            state.remote.clear();
            state.listening = None;
            state.border_router = None;
            state.kind = None;
        }
        self.network.clear();
        Status::Ok
    }

    fn connect(&self, address: SocketAddrV6) -> Status {
        if let Some(status) = self.fault(Operation::Connect) {
            return status;
        }
        if self.is_server() {
            return Status::WrongContext;
        }
        self.state.lock().border_router = Some(address);
        Status::Ok
    }

    fn connect4(
        &self,
        gateway: SocketAddrV4,
        address: SocketAddrV6,
        transport: Ipv4Transport,
    ) -> Status {
        if let Some(status) = self.fault(Operation::Connect4) {
            return status;
        }
        if self.is_server() {
            return Status::WrongContext;
        }
        tracing::trace!(jip.gateway = %gateway, jip.transport = ?transport, "IPv4 encapsulation");
        self.state.lock().border_router = Some(address);
        Status::Ok
    }

    fn group_join(&self, group: Ipv6Addr) -> Status {
        if let Some(status) = self.fault(Operation::GroupJoin) {
            return status;
        }
        if !group.is_multicast() {
            return Status::BadValue;
        }
        let mut state = self.state.lock();
        if !state.groups.contains(&group) {
            state.groups.push(group);
        }
        Status::Ok
    }

    fn group_leave(&self, group: Ipv6Addr) -> Status {
        if let Some(status) = self.fault(Operation::GroupLeave) {
            return status;
        }
        self.state.lock().groups.retain(|g| *g != group);
        Status::Ok
    }

    fn discover_network(&self) -> Status {
        if let Some(status) = self.fault(Operation::Discover) {
            return status;
        }
        if self.is_server() {
            return Status::WrongContext;
        }
        if self.state.lock().border_router.is_none() {
            return Status::NetworkError;
        }
        Status::Ok
    }

    fn get_var(&self, var: VarKey, flags: GetFlags) -> Status {
        if let Some(status) = self.fault(Operation::Get) {
            return status;
        }
        let Some(snapshot) = self.network.variable(var) else {
            return Status::BadVarIndex;
        };
        if !snapshot.enabled.is_enabled() {
            return Status::Disabled;
        }
        if self.is_server() {
            return Status::Ok;
        }
        tracing::trace!(jip.var = %var, jip.flags = flags.bits(), "remote read");
        let remote = self.state.lock().remote.get(&var).cloned();
        let raw = remote.unwrap_or_else(|| self.default_raw(var));
        self.network.store_raw(var, raw)
    }

    fn set_var(&self, var: VarKey, data: &[u8]) -> Status {
        if let Some(status) = self.fault(Operation::Set) {
            return status;
        }
        if let Err(status) = self.writable(var) {
            return status;
        }
        self.apply(var, data)
    }

    fn multicast_set_var(
        &self,
        var: VarKey,
        data: &[u8],
        target: SocketAddrV6,
        hops: u8,
    ) -> Status {
        if let Some(status) = self.fault(Operation::MulticastSet) {
            return status;
        }
        if !target.ip().is_multicast() {
            return Status::BadValue;
        }
        let Some(template) = self.network.variable(var) else {
            return Status::BadVarIndex;
        };
        let Some(mib) = self.network.mib(template.mib) else {
            return Status::BadMibIndex;
        };

        // Deliver to every member node exposing the same mib id and var index.
        let mut delivered = 0;
        for node in self.network.node_keys() {
            let member = self
                .network
                .node_groups(node)
                .is_some_and(|groups| groups.contains(target.ip()));
            if !member {
                continue;
            }
            let Some(peer) = self
                .network
                .lookup_mib_id(node, mib.id)
                .and_then(|m| self.network.lookup_var_index(m, template.index))
            else {
                continue;
            };
            if self.writable(peer).is_ok() && self.apply(peer, data).is_ok() {
                delivered += 1;
            }
        }

        let mut state = self.state.lock();
        let send_count = state.config.multicast_send_count;
        state.multicast_log.push(MulticastWrite {
            var,
            data: Bytes::copy_from_slice(data),
            target,
            hops,
            send_count,
            delivered,
        });
        Status::Ok
    }

    fn update_table_row(&self, var: VarKey, row: u32, data: &[u8]) -> Status {
        if let Some(status) = self.fault(Operation::UpdateTableRow) {
            return status;
        }
        if let Err(status) = self.writable(var) {
            return status;
        }
        if self.is_server() {
            let status = self.network.store_table_row(var, row, data);
            if !status.is_ok() {
                return status;
            }
            if let Some(raw) = self.network.raw_value(var) {
                self.publish_trap(var, raw);
            }
            return Status::Ok;
        }

        // The node's table is the base; the cache may be stale or empty.
        let raw = {
            let mut state = self.state.lock();
            let base = match state.remote.get(&var) {
                Some(raw) => raw.clone(),
                None => self.default_raw(var),
            };
            let Ok(mut table) = Table::from_raw(&base) else {
                return Status::BadValue;
            };
            if table.set_row(row, Bytes::copy_from_slice(data)).is_err() {
                return Status::BadValue;
            }
            let raw = table.to_raw();
            state.remote.insert(var, raw.clone());
            raw
        };
        let status = self.network.store_raw(var, raw.clone());
        if !status.is_ok() {
            return status;
        }
        self.publish_trap(var, raw);
        Status::Ok
    }

    fn set_var_value(&self, var: VarKey, data: &[u8]) -> Status {
        if let Some(status) = self.fault(Operation::SetValue) {
            return status;
        }
        if !self.is_server() {
            return Status::WrongContext;
        }
        self.network.store_raw(var, Bytes::copy_from_slice(data))
    }

    fn lock(&self) -> Status {
        if let Some(status) = self.fault(LockOp::LockContext) {
            return status;
        }
        self.context_lock.acquire();
        self.counters.context_locks.fetch_add(1, Ordering::SeqCst);
        Status::Ok
    }

    fn unlock(&self) -> Status {
        if let Some(status) = self.fault(LockOp::UnlockContext) {
            return status;
        }
        if !self.context_lock.release() {
            return Status::Failed;
        }
        self.counters.context_unlocks.fetch_add(1, Ordering::SeqCst);
        Status::Ok
    }

    fn lock_node(&self, node: NodeKey) -> Status {
        if let Some(status) = self.fault(LockOp::LockNode) {
            return status;
        }
        let Some(token) = self.network.node_lock(node) else {
            return Status::BadDeviceId;
        };
        token.acquire();
        // Removed while we waited: the token we hold is orphaned.
        if !self.network.contains_node(node) {
            token.release();
            return Status::BadDeviceId;
        }
        self.counters.node_locks.fetch_add(1, Ordering::SeqCst);
        Status::Ok
    }

    fn unlock_node(&self, node: NodeKey) -> Status {
        if let Some(status) = self.fault(LockOp::UnlockNode) {
            return status;
        }
        let Some(token) = self.network.node_lock(node) else {
            return Status::BadDeviceId;
        };
        if !token.release() {
            return Status::Failed;
        }
        self.counters.node_unlocks.fetch_add(1, Ordering::SeqCst);
        Status::Ok
    }

    fn node_address_list(&self, filter: DeviceFilter) -> std::result::Result<Vec<SocketAddrV6>, Status> {
        if let Some(status) = self.fault(LockOp::Snapshot) {
            return Err(status);
        }
        self.counters.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(self.network.node_addresses(filter))
    }

    fn trap_var(&self, var: VarKey, handle: u8, events: EventSender) -> Status {
        if let Some(status) = self.fault(Operation::Trap) {
            return status;
        }
        if !self.network.set_trap_handle(var, Some(handle)) {
            return Status::BadVarIndex;
        }
        self.state.lock().traps.insert(var, (handle, events));
        Status::Ok
    }

    fn untrap_var(&self, var: VarKey, handle: u8) -> Status {
        if let Some(status) = self.fault(Operation::Untrap) {
            return status;
        }
        let mut state = self.state.lock();
        if state.traps.get(&var).is_some_and(|(h, _)| *h == handle) {
            state.traps.remove(&var);
            self.network.set_trap_handle(var, None);
        }
        Status::Ok
    }

    fn monitor_network(&self, events: EventSender) -> Status {
        if let Some(status) = self.fault(Operation::Monitor) {
            return status;
        }
        self.state.lock().monitor = Some(events);
        Status::Ok
    }

    fn monitor_network_stop(&self) -> Status {
        if let Some(status) = self.fault(Operation::MonitorStop) {
            return status;
        }
        self.state.lock().monitor = None;
        Status::Ok
    }

    fn listen(&self, port: u16) -> Status {
        if let Some(status) = self.fault(Operation::Listen) {
            return status;
        }
        if !self.is_server() {
            return Status::WrongContext;
        }
        self.state.lock().listening = Some(port);
        Status::Ok
    }

    fn node_add(&self, spec: &NodeSpec) -> std::result::Result<NodeKey, Status> {
        if let Some(status) = self.fault(Operation::NodeAdd) {
            return Err(status);
        }
        if !self.is_server() {
            return Err(Status::WrongContext);
        }
        if self.network.lookup_node(&spec.address()).is_some() {
            return Err(Status::BadDeviceId);
        }
        self.join(spec).map_err(|e| e.status().unwrap_or(Status::WrongType))
    }

    fn node_remove(&self, node: NodeKey) -> Status {
        if let Some(status) = self.fault(Operation::NodeRemove) {
            return status;
        }
        if !self.is_server() {
            return Status::WrongContext;
        }
        match self.leave(node) {
            Some(_) => Status::Ok,
            None => Status::BadDeviceId,
        }
    }

    fn node_group_join(&self, node: NodeKey, group: Ipv6Addr) -> Status {
        if let Some(status) = self.fault(Operation::NodeGroupJoin) {
            return status;
        }
        if !self.is_server() {
            return Status::WrongContext;
        }
        if !group.is_multicast() {
            return Status::BadValue;
        }
        if self.network.set_node_group(node, group, true) {
            Status::Ok
        } else {
            Status::BadDeviceId
        }
    }

    fn node_group_leave(&self, node: NodeKey, group: Ipv6Addr) -> Status {
        if let Some(status) = self.fault(Operation::NodeGroupLeave) {
            return status;
        }
        if !self.is_server() {
            return Status::WrongContext;
        }
        if self.network.set_node_group(node, group, false) {
            Status::Ok
        } else {
            Status::BadDeviceId
        }
    }
}
