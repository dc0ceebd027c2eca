//! Context: the root handle of the object model.
//!
//! A [`Context`] owns one [`Engine`] and, through it, one [`Network`]. Every
//! operation on the tree goes through the context: traversal
//! ([`walk`](Context::walk)), variable access, trap and monitor
//! subscriptions, and the server-mode calls that host local nodes.
//!
//! `Context` is cheap to clone; clones share one engine and one set of
//! subscriptions. The context is torn down by [`Context::destroy`], when the
//! last clone is dropped, or by [`lifecycle::shutdown_all`](crate::lifecycle::shutdown_all).
//!
//! # Examples
//!
//! ```rust
//! use jip_model::{AccessType, Context, Value, VarType};
//! use jip_model::engine::MemoryEngine;
//! use jip_model::network::NodeSpec;
//!
//! # fn main() -> jip_model::Result<()> {
//! let context = Context::client().build(MemoryEngine::new())?;
//! context.engine().join(
//!     &NodeSpec::new("[fd04::1]:1873".parse().unwrap(), 0x8010_0001)
//!         .mib(0xfffffe02, "BulbControl", |m| {
//!             m.var("Mode", VarType::UInt8, |v| v.access(AccessType::ReadWrite))
//!         }),
//! )?;
//!
//! let mut walk = context.walk(0x8010_0001);
//! while let Some(node) = walk.next_node() {
//!     let node = node?;
//!     if let Some(mode) = node.lookup_mib("BulbControl").and_then(|m| m.lookup_var("Mode")) {
//!         mode.set(&Value::UInt8(2))?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatch;
mod handles;
mod walk;

pub use config::{ContextBuilder, ContextConfig, MonitorPolicy};
pub use handles::{Mib, MibIter, VarIter, Variable};
pub use walk::{LockedNode, NodeWalk};

use std::fmt;
use std::net::{Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::engine::{Engine, MemoryEngine};
use crate::error::{Error, Operation, Result};
use crate::events::{self, Event, EventSender};
use crate::lifecycle::{self, Teardown};
use crate::network::{Network, NodeKey, NodeSnapshot, NodeSpec, VarKey, VariableSnapshot};
use crate::registry::{MonitorHandle, MonitorRegistry, TrapRegistry, random_handle};
use crate::types::{
    ChangeKind, ContextKind, DEFAULT_MULTICAST_HOPS, DeviceFilter, GetFlags, Ipv4Transport, VarType,
};
use crate::value::Value;

/// Process-unique identity of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

struct ContextInner<E: Engine> {
    id: ContextId,
    engine: E,
    config: ContextConfig,
    events: EventSender,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Event>>,
    traps: Mutex<TrapRegistry>,
    monitors: Mutex<MonitorRegistry>,
    destroyed: AtomicBool,
    cancel: CancellationToken,
}

impl<E: Engine> ContextInner<E> {
    fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();

        // Traps are dropped before the engine is destroyed.
        let trapped = self.traps.lock().drain();
        for (var, handle) in trapped {
            let status = self.engine.untrap_var(var, handle);
            if !status.is_ok() {
                tracing::warn!(jip.context = %self.id, jip.var = %var, jip.status = %status, "untrap during teardown failed");
            }
        }
        if self.monitors.lock().clear() > 0 {
            let status = self.engine.monitor_network_stop();
            if !status.is_ok() {
                tracing::warn!(jip.context = %self.id, jip.status = %status, "monitor stop during teardown failed");
            }
        }

        let result = self.engine.destroy().check(Operation::Destroy);
        lifecycle::deregister(self.id);
        tracing::debug!(jip.context = %self.id, "context destroyed");
        result
    }

    fn deliver(&self, event: Event) {
        match event {
            Event::Trap { handle, variable } => {
                let callback = self.traps.lock().callback_for(variable.key, handle);
                match callback {
                    Some(callback) => callback(&variable),
                    None => {
                        tracing::trace!(jip.var = %variable.key, jip.handle = handle, "trap event without subscription");
                    }
                }
            }
            Event::Network { change, node } => {
                let subscribers = self.monitors.lock().subscribers();
                for (callback, changes) in subscribers {
                    changes.fetch_add(1, Ordering::SeqCst);
                    callback(change, &node);
                }
            }
        }
    }
}

impl<E: Engine> Teardown for ContextInner<E> {
    fn teardown(&self) -> Result<()> {
        self.destroy()
    }
}

impl<E: Engine> Drop for ContextInner<E> {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::warn!(jip.context = %self.id, error = %e, "teardown on drop failed");
        }
    }
}

/// Root handle of the object model.
pub struct Context<E: Engine = MemoryEngine> {
    inner: Arc<ContextInner<E>>,
}

impl<E: Engine> Clone for Context<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Engine> fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.config.kind)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Start building a client context.
    pub fn client() -> ContextBuilder {
        ContextBuilder::new(ContextKind::Client)
    }

    /// Start building a server context.
    pub fn server() -> ContextBuilder {
        ContextBuilder::new(ContextKind::Server)
    }

    pub fn builder(kind: ContextKind) -> ContextBuilder {
        ContextBuilder::new(kind)
    }
}

impl<E: Engine> Context<E> {
    /// Initialize `engine` with `config` and register the new context.
    pub fn with_config(engine: E, config: ContextConfig) -> Result<Self> {
        engine.init(config.kind, &config).check(Operation::Init)?;

        let (events, receiver) = events::channel(config.event_capacity);
        let id = ContextId::next();
        let inner = Arc::new(ContextInner {
            id,
            engine,
            config,
            events,
            receiver: tokio::sync::Mutex::new(receiver),
            traps: Mutex::new(TrapRegistry::new()),
            monitors: Mutex::new(MonitorRegistry::new()),
            destroyed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        });
        let weak = Arc::downgrade(&inner);
        lifecycle::register(id, weak);

        tracing::debug!(jip.context = %id, jip.kind = %inner.config.kind, "context created");
        Ok(Self { inner })
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn kind(&self) -> ContextKind {
        self.inner.config.kind
    }

    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// The engine's tree, for direct reads outside a traversal.
    pub fn network(&self) -> &Network {
        self.inner.engine.network()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Events the engine dropped because the queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.inner.events.dropped()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ContextDestroyed { id: self.inner.id });
        }
        Ok(())
    }

    /// Tear the context down: untrap everything, stop monitors, destroy
    /// the engine and deregister. Calling it again is a no-op.
    pub fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Connect to a border router over IPv6.
    pub fn connect(&self, address: SocketAddrV6) -> Result<()> {
        self.ensure_live()?;
        self.inner
            .engine
            .connect(address)
            .check_for(Operation::Connect, Some(address))
    }

    /// Connect to a border router through an IPv4 gateway.
    pub fn connect4(
        &self,
        gateway: SocketAddrV4,
        address: SocketAddrV6,
        transport: Ipv4Transport,
    ) -> Result<()> {
        self.ensure_live()?;
        self.inner
            .engine
            .connect4(gateway, address, transport)
            .check_for(Operation::Connect4, Some(address))
    }

    /// Join a multicast group so group traffic reaches this context.
    pub fn group_join(&self, group: Ipv6Addr) -> Result<()> {
        self.ensure_live()?;
        require_multicast(group)?;
        self.inner.engine.group_join(group).check(Operation::GroupJoin)
    }

    pub fn group_leave(&self, group: Ipv6Addr) -> Result<()> {
        self.ensure_live()?;
        require_multicast(group)?;
        self.inner.engine.group_leave(group).check(Operation::GroupLeave)
    }

    /// Populate the network from the connected border router.
    pub fn discover(&self) -> Result<()> {
        self.ensure_live()?;
        self.inner.engine.discover_network().check(Operation::Discover)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Begin a traversal of the nodes matching `filter`.
    ///
    /// Nothing is locked until the first [`NodeWalk::next_node`].
    pub fn walk(&self, filter: impl Into<DeviceFilter>) -> NodeWalk<'_, E> {
        NodeWalk::new(self, filter.into())
    }

    /// Visit each matching node under its lock until `f` breaks.
    pub fn for_each_node<F>(&self, filter: impl Into<DeviceFilter>, mut f: F) -> Result<()>
    where
        F: FnMut(&LockedNode<'_, E>) -> std::ops::ControlFlow<()>,
    {
        let mut walk = self.walk(filter);
        while let Some(node) = walk.next_node() {
            if f(&node?).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Snapshots of every matching node, taken under the traversal protocol.
    pub fn nodes(&self, filter: impl Into<DeviceFilter>) -> Result<Vec<NodeSnapshot>> {
        let mut nodes = Vec::new();
        let mut walk = self.walk(filter);
        while let Some(node) = walk.next_node() {
            nodes.push(node?.snapshot().clone());
        }
        Ok(nodes)
    }

    /// Resolve an address to a live node.
    pub fn lookup_node(&self, address: &SocketAddrV6) -> Option<NodeKey> {
        self.inner.engine.lookup_node(address)
    }

    /// Handle for a variable key, if the variable is still live.
    pub fn variable_handle(&self, var: VarKey) -> Option<Variable<'_, E>> {
        self.network()
            .owners(var)
            .map(|_| Variable::new(self, var))
    }

    // ========================================================================
    // Variable access
    // ========================================================================

    /// Current state of a variable.
    pub fn variable(&self, var: VarKey) -> Result<VariableSnapshot> {
        self.network()
            .variable(var)
            .ok_or(Error::StaleVariable { var })
    }

    /// Read a variable from its node. Returns the refreshed state.
    pub fn get_var(&self, var: VarKey, flags: GetFlags) -> Result<VariableSnapshot> {
        self.ensure_live()?;
        let target = self.target(var)?;
        tracing::trace!(jip.var = %var, jip.node = %target, "get");
        self.inner
            .engine
            .get_var(var, flags)
            .check_for(Operation::Get, Some(target))?;
        self.variable(var)
    }

    /// Write a value to a variable on its node.
    pub fn set_var(&self, var: VarKey, value: &Value) -> Result<()> {
        self.ensure_live()?;
        let target = self.target(var)?;
        let variable = self.variable(var)?;
        let data = codec::encode(variable.ty, value)?;
        tracing::trace!(jip.var = %var, jip.node = %target, "set");
        self.inner
            .engine
            .set_var(var, &data)
            .check_for(Operation::Set, Some(target))
    }

    /// Parse `text` for the variable's type and write it.
    pub fn set_var_str(&self, var: VarKey, text: &str) -> Result<()> {
        let variable = self.variable(var)?;
        let value = Value::parse(variable.ty, text)?;
        self.set_var(var, &value)
    }

    /// Write a value to every node in a multicast group.
    ///
    /// `var` supplies the mib id, variable index and type. Success means the
    /// engine accepted the write for transmission.
    pub fn multicast_set_var(
        &self,
        var: VarKey,
        value: &Value,
        group: Ipv6Addr,
        hops: Option<u8>,
    ) -> Result<()> {
        self.ensure_live()?;
        require_multicast(group)?;
        let variable = self.variable(var)?;
        let data = codec::encode(variable.ty, value)?;
        let target = SocketAddrV6::new(
            group,
            self.inner.config.port,
            0,
            self.inner.config.multicast_interface.unwrap_or(0),
        );
        let hops = hops.unwrap_or(DEFAULT_MULTICAST_HOPS);
        tracing::trace!(jip.var = %var, jip.group = %target, jip.hops = hops, "multicast set");
        self.inner
            .engine
            .multicast_set_var(var, &data, target, hops)
            .check_for(Operation::MulticastSet, Some(target))
    }

    /// Replace one row of a table blob variable on its node.
    pub fn update_table_row(&self, var: VarKey, row: u32, data: &[u8]) -> Result<()> {
        self.ensure_live()?;
        let target = self.target(var)?;
        let variable = self.variable(var)?;
        if variable.ty != VarType::TableBlob {
            return Err(Error::WrongType {
                expected: VarType::TableBlob,
                actual: variable.ty,
            });
        }
        if row >= codec::MAX_TABLE_ROWS {
            return Err(Error::RowOutOfRange {
                row,
                max: codec::MAX_TABLE_ROWS,
            });
        }
        tracing::trace!(jip.var = %var, jip.row = row, "table row update");
        self.inner
            .engine
            .update_table_row(var, row, data)
            .check_for(Operation::UpdateTableRow, Some(target))
    }

    /// Change the value a server context exposes for a hosted variable.
    pub fn set_var_value(&self, var: VarKey, value: &Value) -> Result<()> {
        self.ensure_live()?;
        let variable = self.variable(var)?;
        let data = codec::encode(variable.ty, value)?;
        self.inner
            .engine
            .set_var_value(var, &data)
            .check(Operation::SetValue)
    }

    fn target(&self, var: VarKey) -> Result<SocketAddrV6> {
        self.network()
            .var_address(var)
            .ok_or(Error::StaleVariable { var })
    }

    // ========================================================================
    // Traps
    // ========================================================================

    /// Subscribe to changes of a variable. Returns the trap handle.
    ///
    /// Without an explicit `handle` one is chosen at random among those this
    /// context does not hold. Trapping a variable again replaces its
    /// subscription.
    pub fn trap_var<F>(&self, var: VarKey, callback: F, handle: Option<u8>) -> Result<u8>
    where
        F: Fn(&VariableSnapshot) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        self.variable(var)?;

        let mut traps = self.inner.traps.lock();
        let handle = match handle {
            Some(handle) => {
                if traps.collides(handle, var) {
                    tracing::warn!(jip.var = %var, jip.handle = handle, "trap handle already in use on this context");
                }
                handle
            }
            None => traps
                .allocate(random_handle(), var)
                .ok_or(Error::TrapHandlesExhausted)?,
        };

        let previous = traps.insert(var, handle, Arc::new(callback));
        let status = self.inner.engine.trap_var(var, handle, self.inner.events.clone());
        if let Err(e) = status.check(Operation::Trap) {
            traps.restore(var, previous);
            return Err(e);
        }
        tracing::debug!(jip.context = %self.inner.id, jip.var = %var, jip.handle = handle, "variable trapped");
        Ok(handle)
    }

    /// Drop the subscription on a variable.
    ///
    /// With `handle`, only a subscription holding that handle is removed.
    /// Untrapping a variable that is not trapped succeeds.
    pub fn untrap_var(&self, var: VarKey, handle: Option<u8>) -> Result<()> {
        self.ensure_live()?;
        let mut traps = self.inner.traps.lock();
        let Some(current) = traps.handle_of(var) else {
            return Ok(());
        };
        if handle.is_some_and(|h| h != current) {
            return Ok(());
        }
        let removed = traps.remove(var);
        let status = self.inner.engine.untrap_var(var, current);
        if let Err(e) = status.check(Operation::Untrap) {
            traps.restore(var, removed);
            return Err(e);
        }
        tracing::debug!(jip.context = %self.inner.id, jip.var = %var, jip.handle = current, "variable untrapped");
        Ok(())
    }

    /// Handle of this context's subscription on `var`.
    pub fn trap_handle(&self, var: VarKey) -> Option<u8> {
        self.inner.traps.lock().handle_of(var)
    }

    pub fn trap_count(&self) -> usize {
        self.inner.traps.lock().len()
    }

    // ========================================================================
    // Network monitoring
    // ========================================================================

    /// Subscribe to nodes joining, leaving and moving.
    ///
    /// Under [`MonitorPolicy::Replace`] existing subscriptions are dropped.
    pub fn monitor_network<F>(&self, callback: F) -> Result<MonitorHandle>
    where
        F: Fn(ChangeKind, &NodeSnapshot) + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let mut monitors = self.inner.monitors.lock();
        if monitors.is_empty() {
            self.inner
                .engine
                .monitor_network(self.inner.events.clone())
                .check(Operation::Monitor)?;
        } else if self.inner.config.monitor_policy == MonitorPolicy::Replace {
            let replaced = monitors.clear();
            tracing::debug!(jip.context = %self.inner.id, jip.replaced = replaced, "monitor subscriptions replaced");
        }
        let handle = monitors.add(Arc::new(callback));
        tracing::debug!(jip.context = %self.inner.id, jip.monitor = handle.id(), "network monitor started");
        Ok(handle)
    }

    /// End one monitor subscription. The engine stops monitoring when the
    /// last one ends.
    pub fn stop_monitor(&self, handle: &MonitorHandle) -> Result<()> {
        self.ensure_live()?;
        let mut monitors = self.inner.monitors.lock();
        if !monitors.remove(handle) || !monitors.is_empty() {
            return Ok(());
        }
        tracing::debug!(jip.context = %self.inner.id, "network monitor stopped");
        self.inner
            .engine
            .monitor_network_stop()
            .check(Operation::MonitorStop)
    }

    /// End every monitor subscription.
    pub fn stop_all_monitors(&self) -> Result<()> {
        self.ensure_live()?;
        let mut monitors = self.inner.monitors.lock();
        if monitors.clear() == 0 {
            return Ok(());
        }
        self.inner
            .engine
            .monitor_network_stop()
            .check(Operation::MonitorStop)
    }

    pub fn monitor_count(&self) -> usize {
        self.inner.monitors.lock().len()
    }

    // ========================================================================
    // Server mode
    // ========================================================================

    /// Accept client requests on `port`.
    pub fn listen(&self, port: u16) -> Result<()> {
        self.ensure_live()?;
        self.inner.engine.listen(port).check(Operation::Listen)
    }

    /// Host a node described by `spec`.
    pub fn node_add(&self, spec: &NodeSpec) -> Result<NodeKey> {
        self.ensure_live()?;
        self.inner
            .engine
            .node_add(spec)
            .map_err(|status| Error::Status {
                op: Operation::NodeAdd,
                target: Some(spec.address()),
                status,
            })
    }

    pub fn node_remove(&self, node: NodeKey) -> Result<()> {
        self.ensure_live()?;
        let target = self.network().node(node).map(|n| n.address);
        self.inner
            .engine
            .node_remove(node)
            .check_for(Operation::NodeRemove, target)
    }

    pub fn node_group_join(&self, node: NodeKey, group: Ipv6Addr) -> Result<()> {
        self.ensure_live()?;
        require_multicast(group)?;
        self.inner
            .engine
            .node_group_join(node, group)
            .check(Operation::NodeGroupJoin)
    }

    pub fn node_group_leave(&self, node: NodeKey, group: Ipv6Addr) -> Result<()> {
        self.ensure_live()?;
        require_multicast(group)?;
        self.inner
            .engine
            .node_group_leave(node, group)
            .check(Operation::NodeGroupLeave)
    }
}

fn require_multicast(addr: Ipv6Addr) -> Result<()> {
    if addr.is_multicast() {
        Ok(())
    } else {
        Err(Error::NotMulticast { addr })
    }
}
