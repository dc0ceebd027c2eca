//! Process-wide registry of live contexts.
//!
//! Every [`Context`](crate::Context) registers itself on creation and
//! deregisters when it is destroyed. [`shutdown_all`] tears down whatever is
//! still alive, for use at process exit:
//!
//! ```rust,standalone_crate
//! use jip_model::Context;
//! use jip_model::engine::MemoryEngine;
//! use jip_model::lifecycle::ShutdownGuard;
//!
//! # fn main() -> jip_model::Result<()> {
//! let _shutdown = ShutdownGuard::new();
//! let context = Context::client().build(MemoryEngine::new())?;
//! // ... use the context; it is destroyed when `_shutdown` drops at the
//! // latest.
//! # drop(context);
//! # Ok(())
//! # }
//! ```

use std::sync::{LazyLock, Weak};

use parking_lot::Mutex;

use crate::context::ContextId;
use crate::error::{Error, Result};

/// Teardown entry point of a registered context.
pub(crate) trait Teardown: Send + Sync {
    fn teardown(&self) -> Result<()>;
}

type Entry = (ContextId, Weak<dyn Teardown>);

static LIVE: LazyLock<Mutex<Vec<Entry>>> = LazyLock::new(|| Mutex::new(Vec::new()));

pub(crate) fn register(id: ContextId, context: Weak<dyn Teardown>) {
    LIVE.lock().push((id, context));
    tracing::trace!(jip.context = %id, "context registered");
}

pub(crate) fn deregister(id: ContextId) {
    LIVE.lock().retain(|(live, _)| *live != id);
}

/// Ids of registered contexts, in creation order.
pub fn live_contexts() -> Vec<ContextId> {
    LIVE.lock()
        .iter()
        .filter(|(_, context)| context.strong_count() > 0)
        .map(|(id, _)| *id)
        .collect()
}

/// Destroy every live context in creation order.
///
/// Returns the contexts whose teardown reported an error; each is
/// deregistered regardless.
pub fn shutdown_all() -> Vec<(ContextId, Error)> {
    let entries: Vec<Entry> = LIVE.lock().clone();
    let mut failures = Vec::new();
    for (id, context) in entries {
        let Some(context) = context.upgrade() else {
            deregister(id);
            continue;
        };
        if let Err(e) = context.teardown() {
            tracing::warn!(jip.context = %id, error = %e, "context teardown failed");
            failures.push((id, e));
        }
        deregister(id);
    }
    tracing::debug!(jip.failures = failures.len(), "all contexts shut down");
    failures
}

/// Runs [`shutdown_all`] when dropped.
#[derive(Debug, Default)]
#[must_use = "the guard shuts contexts down when it is dropped"]
pub struct ShutdownGuard {
    _private: (),
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Failures are already logged.
        let _ = shutdown_all();
    }
}
