//! Tree model of a discovered network.
//!
//! The [`Network`] holds every node, mib and variable in generational arenas.
//! Parents own ordered chains of child keys and children store their parent's
//! key, so any handle can be resolved back to its owning node without
//! pointers.
//!
//! The engine is the only writer. Readers get memory safety from the
//! internal reader/writer lock; *semantic* stability while walking a node's
//! mibs and variables comes from holding that node's [`LockToken`], which the
//! engine must take before removing the node.

mod arena;
mod definition;
mod lock;
mod selector;
mod snapshot;

pub use arena::{MibKey, NodeKey, VarKey};
pub use definition::{MibSpec, NodeSpec, VarSpec};
pub use lock::LockToken;
pub use selector::{MibSelector, VarSelector};
pub use snapshot::{MibInfo, NodeSnapshot, VariableSnapshot};

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::codec::{self, MAX_VARIABLE_SIZE, Table};
use crate::error::{DecodeErrorKind, Error, Result, Status};
use crate::types::{AccessType, DeviceFilter, Enabled, Security, VarType};
use crate::value::Value;
use arena::Arena;

#[derive(Debug)]
struct NodeRecord {
    address: SocketAddrV6,
    device_id: u32,
    lock: Arc<LockToken>,
    groups: Vec<Ipv6Addr>,
    mibs: SmallVec<[MibKey; 8]>,
}

#[derive(Debug)]
struct MibRecord {
    node: NodeKey,
    id: u32,
    index: u8,
    name: Arc<str>,
    vars: SmallVec<[VarKey; 8]>,
}

#[derive(Debug)]
struct VarRecord {
    mib: MibKey,
    index: u8,
    name: Arc<str>,
    ty: VarType,
    access: AccessType,
    security: Security,
    enabled: Enabled,
    size: u8,
    raw: Option<Bytes>,
    trap_handle: Option<u8>,
}

#[derive(Debug)]
struct Tree {
    nodes: Arena<NodeKey, NodeRecord>,
    mibs: Arena<MibKey, MibRecord>,
    vars: Arena<VarKey, VarRecord>,
    order: Vec<NodeKey>,
}

impl Tree {
    fn node_snapshot(&self, key: NodeKey) -> Option<NodeSnapshot> {
        let node = self.nodes.get(key)?;
        Some(NodeSnapshot {
            key,
            address: node.address,
            device_id: node.device_id,
            mib_count: node.mibs.len(),
        })
    }

    fn mib_info(&self, key: MibKey) -> Option<MibInfo> {
        let mib = self.mibs.get(key)?;
        Some(MibInfo {
            key,
            node: mib.node,
            id: mib.id,
            index: mib.index,
            name: mib.name.clone(),
        })
    }

    fn var_snapshot(&self, key: VarKey) -> Option<VariableSnapshot> {
        let var = self.vars.get(key)?;
        let mib = self.mibs.get(var.mib)?;
        if !self.nodes.contains(mib.node) {
            return None;
        }
        Some(VariableSnapshot {
            key,
            mib: var.mib,
            node: mib.node,
            index: var.index,
            name: var.name.clone(),
            ty: var.ty,
            access: var.access,
            security: var.security,
            enabled: var.enabled,
            size: var.size,
            raw: var.raw.clone(),
        })
    }
}

/// The tree of nodes, mibs and variables owned by an engine.
#[derive(Debug)]
pub struct Network {
    tree: RwLock<Tree>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree {
                nodes: Arena::new(),
                mibs: Arena::new(),
                vars: Arena::new(),
                order: Vec::new(),
            }),
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.tree.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live nodes in join order.
    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.tree.read().order.clone()
    }

    /// Addresses of live nodes matching `filter`, in join order.
    pub fn node_addresses(&self, filter: DeviceFilter) -> Vec<SocketAddrV6> {
        let tree = self.tree.read();
        tree.order
            .iter()
            .filter_map(|key| tree.nodes.get(*key))
            .filter(|node| filter.matches(node.device_id))
            .map(|node| node.address)
            .collect()
    }

    /// Resolve an address against the live node set.
    pub fn lookup_node(&self, address: &SocketAddrV6) -> Option<NodeKey> {
        let tree = self.tree.read();
        tree.order
            .iter()
            .copied()
            .find(|key| tree.nodes.get(*key).is_some_and(|n| n.address == *address))
    }

    pub fn contains_node(&self, key: NodeKey) -> bool {
        self.tree.read().nodes.contains(key)
    }

    pub fn node(&self, key: NodeKey) -> Option<NodeSnapshot> {
        self.tree.read().node_snapshot(key)
    }

    /// The node's lock token; engines use it to implement node locking.
    pub fn node_lock(&self, key: NodeKey) -> Option<Arc<LockToken>> {
        self.tree.read().nodes.get(key).map(|n| n.lock.clone())
    }

    /// Multicast groups a hosted node has joined.
    pub fn node_groups(&self, key: NodeKey) -> Option<Vec<Ipv6Addr>> {
        self.tree.read().nodes.get(key).map(|n| n.groups.clone())
    }

    pub fn mib(&self, key: MibKey) -> Option<MibInfo> {
        self.tree.read().mib_info(key)
    }

    /// The mib at `position` in the node's chain.
    pub fn mib_at(&self, node: NodeKey, position: usize) -> Option<MibInfo> {
        let tree = self.tree.read();
        let key = *tree.nodes.get(node)?.mibs.get(position)?;
        tree.mib_info(key)
    }

    /// The variable at `position` in the mib's chain.
    pub fn var_at(&self, mib: MibKey, position: usize) -> Option<VariableSnapshot> {
        let tree = self.tree.read();
        let key = *tree.mibs.get(mib)?.vars.get(position)?;
        tree.var_snapshot(key)
    }

    /// First mib of `node` whose name matches exactly.
    pub fn lookup_mib(&self, node: NodeKey, name: &str) -> Option<MibKey> {
        self.find_mib_by(node, |mib| &*mib.name == name)
    }

    /// First mib of `node` with the given id.
    pub fn lookup_mib_id(&self, node: NodeKey, id: u32) -> Option<MibKey> {
        self.find_mib_by(node, |mib| mib.id == id)
    }

    pub fn find_mib(&self, node: NodeKey, selector: &MibSelector) -> Option<MibKey> {
        match selector {
            MibSelector::Id(id) => self.lookup_mib_id(node, *id),
            MibSelector::Name(name) => self.lookup_mib(node, name),
        }
    }

    /// First variable of `mib` whose name matches exactly.
    pub fn lookup_var(&self, mib: MibKey, name: &str) -> Option<VarKey> {
        self.find_var_by(mib, |var| &*var.name == name)
    }

    /// First variable of `mib` with the given index.
    pub fn lookup_var_index(&self, mib: MibKey, index: u8) -> Option<VarKey> {
        self.find_var_by(mib, |var| var.index == index)
    }

    pub fn find_var(&self, mib: MibKey, selector: &VarSelector) -> Option<VarKey> {
        match selector {
            VarSelector::Index(index) => self.lookup_var_index(mib, *index),
            VarSelector::Name(name) => self.lookup_var(mib, name),
        }
    }

    fn find_mib_by(&self, node: NodeKey, pred: impl Fn(&MibRecord) -> bool) -> Option<MibKey> {
        let tree = self.tree.read();
        tree.nodes
            .get(node)?
            .mibs
            .iter()
            .copied()
            .find(|key| tree.mibs.get(*key).is_some_and(&pred))
    }

    fn find_var_by(&self, mib: MibKey, pred: impl Fn(&VarRecord) -> bool) -> Option<VarKey> {
        let tree = self.tree.read();
        tree.mibs
            .get(mib)?
            .vars
            .iter()
            .copied()
            .find(|key| tree.vars.get(*key).is_some_and(&pred))
    }

    /// Variable state, or `None` if it or any owner has been removed.
    pub fn variable(&self, key: VarKey) -> Option<VariableSnapshot> {
        self.tree.read().var_snapshot(key)
    }

    /// Resolve a variable's owning mib and node.
    pub fn owners(&self, key: VarKey) -> Option<(MibKey, NodeKey)> {
        let tree = self.tree.read();
        let mib = tree.vars.get(key)?.mib;
        let node = tree.mibs.get(mib)?.node;
        tree.nodes.contains(node).then_some((mib, node))
    }

    /// Address of the node owning a variable.
    pub fn var_address(&self, key: VarKey) -> Option<SocketAddrV6> {
        let tree = self.tree.read();
        let mib = tree.vars.get(key)?.mib;
        let node = tree.mibs.get(mib)?.node;
        tree.nodes.get(node).map(|n| n.address)
    }

    pub fn raw_value(&self, key: VarKey) -> Option<Bytes> {
        self.tree.read().vars.get(key)?.raw.clone()
    }

    pub fn trap_handle(&self, key: VarKey) -> Option<u8> {
        self.tree.read().vars.get(key)?.trap_handle
    }

    /// Keys of every variable of a node, mib by mib.
    pub fn node_vars(&self, node: NodeKey) -> Vec<VarKey> {
        let tree = self.tree.read();
        let Some(record) = tree.nodes.get(node) else {
            return Vec::new();
        };
        record
            .mibs
            .iter()
            .filter_map(|mib| tree.mibs.get(*mib))
            .flat_map(|mib| mib.vars.iter().copied())
            .collect()
    }

    // ========================================================================
    // Writing (engine side)
    // ========================================================================

    /// Add a node with all of its mibs and variables.
    ///
    /// Initial values in the definition are stored as the cached raw values.
    /// Fails without modifying the tree if an initial value does not match
    /// its variable's type.
    pub fn insert_node(&self, spec: &NodeSpec) -> Result<NodeKey> {
        let mut initial = Vec::new();
        for mib in &spec.mibs {
            for var in &mib.vars {
                let raw = var
                    .initial
                    .as_ref()
                    .map(|value| initial_raw(var.ty, value))
                    .transpose()?;
                initial.push(raw);
            }
        }
        let mut initial = initial.into_iter();

        let mut tree = self.tree.write();
        let node = tree.nodes.insert(NodeRecord {
            address: spec.address,
            device_id: spec.device_id,
            lock: Arc::new(LockToken::new()),
            groups: Vec::new(),
            mibs: SmallVec::new(),
        });
        for mib_spec in &spec.mibs {
            let mib = tree.mibs.insert(MibRecord {
                node,
                id: mib_spec.id,
                index: mib_spec.index,
                name: mib_spec.name.clone(),
                vars: SmallVec::new(),
            });
            for var_spec in &mib_spec.vars {
                let raw = initial.next().flatten();
                let size = raw.as_ref().map_or_else(
                    || var_spec.ty.fixed_width().unwrap_or(0) as u8,
                    |r| r.len().min(MAX_VARIABLE_SIZE) as u8,
                );
                let var = tree.vars.insert(VarRecord {
                    mib,
                    index: var_spec.index,
                    name: var_spec.name.clone(),
                    ty: var_spec.ty,
                    access: var_spec.access,
                    security: var_spec.security,
                    enabled: var_spec.enabled,
                    size,
                    raw,
                    trap_handle: None,
                });
                if let Some(record) = tree.mibs.get_mut(mib) {
                    record.vars.push(var);
                }
            }
            if let Some(record) = tree.nodes.get_mut(node) {
                record.mibs.push(mib);
            }
        }
        tree.order.push(node);
        tracing::trace!(jip.node = %spec.address, jip.device_id = spec.device_id, "node inserted");
        Ok(node)
    }

    /// Remove a node and everything it owns.
    ///
    /// Callers must hold the node's lock token so no traversal is inside it.
    pub fn remove_node(&self, key: NodeKey) -> Option<NodeSnapshot> {
        let mut tree = self.tree.write();
        let snapshot = tree.node_snapshot(key)?;
        let node = tree.nodes.remove(key)?;
        for mib_key in node.mibs {
            if let Some(mib) = tree.mibs.remove(mib_key) {
                for var_key in mib.vars {
                    tree.vars.remove(var_key);
                }
            }
        }
        tree.order.retain(|k| *k != key);
        tracing::trace!(jip.node = %snapshot.address, "node removed");
        Some(snapshot)
    }

    /// Change a node's address. Returns the updated snapshot.
    pub fn relocate_node(&self, key: NodeKey, address: SocketAddrV6) -> Option<NodeSnapshot> {
        let mut tree = self.tree.write();
        tree.nodes.get_mut(key)?.address = address;
        tree.node_snapshot(key)
    }

    /// Record a hosted node joining or leaving a multicast group.
    pub fn set_node_group(&self, key: NodeKey, group: Ipv6Addr, member: bool) -> bool {
        let mut tree = self.tree.write();
        let Some(node) = tree.nodes.get_mut(key) else {
            return false;
        };
        let present = node.groups.contains(&group);
        match (member, present) {
            (true, false) => node.groups.push(group),
            (false, true) => node.groups.retain(|g| *g != group),
            _ => {}
        }
        true
    }

    /// Store a new cached raw value.
    ///
    /// Fixed-width types must supply exactly their width; strings and blobs
    /// update the variable's size; table blobs must be well formed.
    pub fn store_raw(&self, key: VarKey, raw: Bytes) -> Status {
        let mut tree = self.tree.write();
        let Some(var) = tree.vars.get_mut(key) else {
            return Status::BadVarIndex;
        };
        match check_raw(var.ty, &raw) {
            Ok(size) => {
                var.size = size;
                var.raw = Some(raw);
                Status::Ok
            }
            Err(status) => status,
        }
    }

    /// Remove and return the cached raw value.
    pub fn take_raw(&self, key: VarKey) -> Option<Bytes> {
        self.tree.write().vars.get_mut(key)?.raw.take()
    }

    /// Replace one row of a table blob's cached value.
    pub fn store_table_row(&self, key: VarKey, row: u32, data: &[u8]) -> Status {
        let mut tree = self.tree.write();
        let Some(var) = tree.vars.get_mut(key) else {
            return Status::BadVarIndex;
        };
        if var.ty != VarType::TableBlob {
            return Status::WrongType;
        }
        let mut table = match var.raw.as_deref().map(Table::from_raw) {
            Some(Ok(table)) => table,
            Some(Err(_)) => return Status::BadValue,
            None => Table::new(),
        };
        if table.set_row(row, Bytes::copy_from_slice(data)).is_err() {
            return Status::BadValue;
        }
        var.raw = Some(table.to_raw());
        Status::Ok
    }

    pub fn set_enabled(&self, key: VarKey, enabled: Enabled) -> bool {
        match self.tree.write().vars.get_mut(key) {
            Some(var) => {
                var.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn set_trap_handle(&self, key: VarKey, handle: Option<u8>) -> bool {
        match self.tree.write().vars.get_mut(key) {
            Some(var) => {
                var.trap_handle = handle;
                true
            }
            None => false,
        }
    }

    /// Drop every node.
    pub fn clear(&self) {
        let mut tree = self.tree.write();
        tree.nodes.clear();
        tree.mibs.clear();
        tree.vars.clear();
        tree.order.clear();
    }
}

fn initial_raw(ty: VarType, value: &Value) -> Result<Bytes> {
    match (ty, value) {
        (VarType::TableBlob, Value::Table(rows)) => {
            let mut table = Table::new();
            for (index, row) in rows {
                table.set_row(*index, row.clone())?;
            }
            Ok(table.to_raw())
        }
        _ => codec::encode(ty, value),
    }
}

fn check_raw(ty: VarType, raw: &[u8]) -> std::result::Result<u8, Status> {
    match ty.fixed_width() {
        Some(width) if raw.len() == width => Ok(width as u8),
        Some(_) => Err(Status::BadBufferSize),
        None if ty == VarType::TableBlob => match Table::from_raw(raw) {
            Ok(_) => Ok(0),
            Err(Error::Decode {
                kind: DecodeErrorKind::InsufficientData { .. },
                ..
            }) => Err(Status::BadBufferSize),
            Err(_) => Err(Status::BadValue),
        },
        None if raw.len() > MAX_VARIABLE_SIZE => Err(Status::BadBufferSize),
        None => Ok(raw.len() as u8),
    }
}
