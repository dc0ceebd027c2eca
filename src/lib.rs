//! Object model for JIP network management.
//!
//! JIP exposes typed variables on embedded nodes, grouped into mibs. This
//! crate models a discovered network as a tree (context, network, node, mib,
//! variable), marshals the 13 variable types to and from their raw form, and
//! coordinates traversal with the protocol engine that owns and mutates the
//! tree.
//!
//! # Layout
//!
//! - [`Context`]: root handle; traversal, variable access, traps, monitors
//! - [`network`]: the tree, its keys, snapshots and node definitions
//! - [`codec`]: raw value encoding and the table blob layout
//! - [`engine`]: the [`Engine`](engine::Engine) trait and an in-memory
//!   implementation
//! - [`lifecycle`]: process-wide shutdown of live contexts
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use jip_model::prelude::*;
//! use jip_model::engine::MemoryEngine;
//! use jip_model::network::NodeSpec;
//!
//! # fn main() -> jip_model::Result<()> {
//! let context = Context::client().build(MemoryEngine::new())?;
//!
//! let joined = Arc::new(AtomicUsize::new(0));
//! let counter = joined.clone();
//! context.monitor_network(move |change, node| {
//!     if change == ChangeKind::Join {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }
//!     println!("{}: {}", change, node);
//! })?;
//!
//! context.engine().join(
//!     &NodeSpec::new("[fd04::1]:1873".parse().unwrap(), 0x8010_0001)
//!         .mib(0xfffffe01, "NodeStatus", |m| {
//!             m.var("SystemStatus", VarType::UInt16, |v| v.initial(0u16))
//!         }),
//! )?;
//! context.dispatch_pending();
//! assert_eq!(joined.load(Ordering::SeqCst), 1);
//!
//! for node in context.nodes(DeviceFilter::Any)? {
//!     println!("{}", node);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod network;
pub mod prelude;
pub mod registry;
pub mod types;
pub mod value;

pub use context::{
    Context, ContextBuilder, ContextConfig, ContextId, LockedNode, Mib, MonitorPolicy, NodeWalk,
    Variable,
};
pub use error::{DecodeErrorKind, Error, LockOp, Operation, Result, Status};
pub use events::{Event, EventSender};
pub use registry::MonitorHandle;
pub use types::{
    AccessType, ChangeKind, ContextKind, DEFAULT_MULTICAST_HOPS, DEFAULT_MULTICAST_SEND_COUNT,
    DEFAULT_PORT, DEVICE_ID_ALL, DeviceFilter, Enabled, GetFlags, Ipv4Transport, Security, VarType,
};
pub use value::Value;
