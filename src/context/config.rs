//! Context configuration and builder.
//!
//! # Examples
//!
//! ```rust
//! use jip_model::{Context, MonitorPolicy};
//! use jip_model::engine::MemoryEngine;
//!
//! # fn main() -> jip_model::Result<()> {
//! let context = Context::client()
//!     .event_capacity(64)
//!     .monitor_policy(MonitorPolicy::Replace)
//!     .build(MemoryEngine::new())?;
//! assert_eq!(context.config().event_capacity, 64);
//! # Ok(())
//! # }
//! ```

use crate::engine::Engine;
use crate::error::Result;
use crate::types::{ContextKind, DEFAULT_MULTICAST_SEND_COUNT, DEFAULT_PORT};

use super::Context;

/// What a new monitor registration does to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MonitorPolicy {
    /// Each registration is a separate subscription.
    #[default]
    Independent,
    /// A new registration replaces every existing subscription.
    Replace,
}

/// Settings shared by the context and its engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextConfig {
    pub kind: ContextKind,
    /// Capacity of the engine-to-application event queue.
    pub event_capacity: usize,
    pub monitor_policy: MonitorPolicy,
    /// UDP port multicast writes are addressed to.
    pub port: u16,
    /// How many times each multicast write is transmitted.
    pub multicast_send_count: u32,
    /// Interface index for multicast traffic; `None` lets the engine choose.
    pub multicast_interface: Option<u32>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            kind: ContextKind::Client,
            event_capacity: 1024,
            monitor_policy: MonitorPolicy::Independent,
            port: DEFAULT_PORT,
            multicast_send_count: DEFAULT_MULTICAST_SEND_COUNT,
            multicast_interface: None,
        }
    }
}

/// Builder for [`Context`].
///
/// Created by [`Context::client`], [`Context::server`] or
/// [`Context::builder`].
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub(crate) fn new(kind: ContextKind) -> Self {
        Self {
            config: ContextConfig {
                kind,
                ..Default::default()
            },
        }
    }

    /// Set the event queue capacity (minimum 1).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    /// Set how repeated monitor registrations behave.
    pub fn monitor_policy(mut self, policy: MonitorPolicy) -> Self {
        self.config.monitor_policy = policy;
        self
    }

    /// Set the port multicast writes are sent to.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set how many times each multicast write is sent.
    pub fn multicast_send_count(mut self, count: u32) -> Self {
        self.config.multicast_send_count = count;
        self
    }

    /// Pin multicast traffic to an interface index.
    pub fn multicast_interface(mut self, index: u32) -> Self {
        self.config.multicast_interface = Some(index);
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Initialize `engine` and wrap it in a registered context.
    pub fn build<E: Engine>(self, engine: E) -> Result<Context<E>> {
        Context::with_config(engine, self.config)
    }
}
