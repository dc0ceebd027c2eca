//! Trap subscriptions keyed by variable.

use std::collections::HashMap;
use std::sync::Arc;

use crate::network::{VarKey, VariableSnapshot};

pub(crate) type TrapCallback = Arc<dyn Fn(&VariableSnapshot) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct TrapEntry {
    pub(crate) handle: u8,
    pub(crate) callback: TrapCallback,
}

impl std::fmt::Debug for TrapEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrapEntry")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// At most one subscription per variable.
#[derive(Debug, Default)]
pub(crate) struct TrapRegistry {
    entries: HashMap<VarKey, TrapEntry>,
}

impl TrapRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn handle_of(&self, var: VarKey) -> Option<u8> {
        self.entries.get(&var).map(|e| e.handle)
    }

    fn in_use(&self, handle: u8, except: VarKey) -> bool {
        self.entries
            .iter()
            .any(|(var, entry)| *var != except && entry.handle == handle)
    }

    /// First handle at or after `start` (wrapping) not held by another
    /// variable. The handle `var` already holds counts as free.
    pub(crate) fn allocate(&self, start: u8, var: VarKey) -> Option<u8> {
        (0..=u8::MAX)
            .map(|offset| start.wrapping_add(offset))
            .find(|handle| !self.in_use(*handle, var))
    }

    /// Whether another variable already holds `handle`.
    pub(crate) fn collides(&self, handle: u8, var: VarKey) -> bool {
        self.in_use(handle, var)
    }

    /// Register, returning the subscription it replaced.
    pub(crate) fn insert(
        &mut self,
        var: VarKey,
        handle: u8,
        callback: TrapCallback,
    ) -> Option<TrapEntry> {
        self.entries.insert(var, TrapEntry { handle, callback })
    }

    pub(crate) fn restore(&mut self, var: VarKey, previous: Option<TrapEntry>) {
        match previous {
            Some(entry) => {
                self.entries.insert(var, entry);
            }
            None => {
                self.entries.remove(&var);
            }
        }
    }

    pub(crate) fn remove(&mut self, var: VarKey) -> Option<TrapEntry> {
        self.entries.remove(&var)
    }

    /// Callback for an event, if `handle` still names the live subscription.
    pub(crate) fn callback_for(&self, var: VarKey, handle: u8) -> Option<TrapCallback> {
        self.entries
            .get(&var)
            .filter(|e| e.handle == handle)
            .map(|e| e.callback.clone())
    }

    /// Remove every subscription, returning what each variable held.
    pub(crate) fn drain(&mut self) -> Vec<(VarKey, u8)> {
        self.entries
            .drain()
            .map(|(var, entry)| (var, entry.handle))
            .collect()
    }
}

/// Starting point for handle allocation, drawn from OS randomness.
pub(crate) fn random_handle() -> u8 {
    let mut byte = [0u8; 1];
    match getrandom::fill(&mut byte) {
        Ok(()) => byte[0],
        Err(e) => {
            tracing::debug!(error = %e, "OS randomness unavailable, using clock");
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(clock_byte)
                .unwrap_or(0)
        }
    }
}

/// Low byte of the sub-second nanoseconds.
fn clock_byte(elapsed: std::time::Duration) -> u8 {
    elapsed.subsec_nanos().to_le_bytes()[0]
}
