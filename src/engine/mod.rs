//! Protocol engine abstraction.
//!
//! The engine performs all network I/O, owns the authoritative [`Network`]
//! and is its only writer. The object model issues every request through the
//! [`Engine`] trait and never touches the wire itself.
//!
//! [`MemoryEngine`] is an in-process implementation that keeps the tree in
//! memory. It hosts server-mode nodes and lets an application or test drive
//! topology and value changes directly.

mod memory;

pub use memory::{FaultPoint, LockStats, MemoryEngine, MulticastWrite};

use std::net::{Ipv6Addr, SocketAddrV4, SocketAddrV6};

use crate::context::ContextConfig;
use crate::error::Status;
use crate::events::EventSender;
use crate::network::{Network, NodeKey, NodeSpec, VarKey};
use crate::types::{ContextKind, DeviceFilter, GetFlags, Ipv4Transport};

/// Boundary to the protocol engine.
///
/// Every request reports a [`Status`]; the object model converts non-OK
/// statuses into errors without altering them. Requests may block up to the
/// protocol timeout.
///
/// # Locking contract
///
/// - [`lock`](Self::lock)/[`unlock`](Self::unlock) guard the node set; the
///   engine must hold the same lock while adding, removing or moving nodes.
/// - [`lock_node`](Self::lock_node) must fail (without holding anything) if
///   the node was removed while the caller waited.
/// - The engine must hold a node's lock while removing it.
pub trait Engine: Send + Sync + 'static {
    /// The tree this engine maintains.
    fn network(&self) -> &Network;

    fn init(&self, kind: ContextKind, config: &ContextConfig) -> Status;

    /// Release all engine resources. Called once, after traps are dropped.
    fn destroy(&self) -> Status;

    /// Connect to a border router over IPv6.
    fn connect(&self, address: SocketAddrV6) -> Status;

    /// Connect to a border router through an IPv4 gateway.
    fn connect4(
        &self,
        gateway: SocketAddrV4,
        address: SocketAddrV6,
        transport: Ipv4Transport,
    ) -> Status;

    fn group_join(&self, group: Ipv6Addr) -> Status;

    fn group_leave(&self, group: Ipv6Addr) -> Status;

    /// Populate the network from the connected border router.
    fn discover_network(&self) -> Status;

    /// Read a variable from its node into the cached raw value.
    fn get_var(&self, var: VarKey, flags: GetFlags) -> Status;

    /// Write an encoded value to the variable's node.
    fn set_var(&self, var: VarKey, data: &[u8]) -> Status;

    /// Write an encoded value to every node in a multicast group.
    ///
    /// `OK` means the request was accepted for transmission.
    fn multicast_set_var(&self, var: VarKey, data: &[u8], target: SocketAddrV6, hops: u8)
    -> Status;

    fn update_table_row(&self, var: VarKey, row: u32, data: &[u8]) -> Status;

    /// Change the value a server context exposes for a hosted variable.
    fn set_var_value(&self, _var: VarKey, _data: &[u8]) -> Status {
        Status::WrongContext
    }

    fn lock(&self) -> Status;

    fn unlock(&self) -> Status;

    fn lock_node(&self, node: NodeKey) -> Status;

    fn unlock_node(&self, node: NodeKey) -> Status;

    /// Copy of the node addresses matching `filter`. Caller holds the lock.
    fn node_address_list(&self, filter: DeviceFilter) -> Result<Vec<SocketAddrV6>, Status>;

    /// Resolve a snapshot address against the live node set.
    fn lookup_node(&self, address: &SocketAddrV6) -> Option<NodeKey> {
        self.network().lookup_node(address)
    }

    /// Start posting [`Event::Trap`](crate::Event::Trap) for `var`.
    fn trap_var(&self, var: VarKey, handle: u8, events: EventSender) -> Status;

    fn untrap_var(&self, var: VarKey, handle: u8) -> Status;

    /// Start posting [`Event::Network`](crate::Event::Network) for topology changes.
    fn monitor_network(&self, events: EventSender) -> Status;

    fn monitor_network_stop(&self) -> Status;

    /// Accept client requests on `port` (server contexts).
    fn listen(&self, _port: u16) -> Status {
        Status::WrongContext
    }

    /// Host a node (server contexts).
    fn node_add(&self, _spec: &NodeSpec) -> Result<NodeKey, Status> {
        Err(Status::WrongContext)
    }

    fn node_remove(&self, _node: NodeKey) -> Status {
        Status::WrongContext
    }

    fn node_group_join(&self, _node: NodeKey, _group: Ipv6Addr) -> Status {
        Status::WrongContext
    }

    fn node_group_leave(&self, _node: NodeKey, _group: Ipv6Addr) -> Status {
        Status::WrongContext
    }
}
