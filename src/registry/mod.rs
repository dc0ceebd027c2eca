//! Per-context subscription bookkeeping.
//!
//! A context owns one trap registry, keyed by variable, and one monitor
//! registry. The registries only map identities to callbacks; engine calls
//! and event delivery are driven by the context.

mod monitor;
mod trap;

pub use monitor::MonitorHandle;
pub(crate) use monitor::MonitorRegistry;
pub(crate) use trap::{TrapRegistry, random_handle};
