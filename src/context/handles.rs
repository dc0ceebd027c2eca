//! Borrowed handles to mibs and variables of a locked node.

use std::net::Ipv6Addr;

use super::Context;
use crate::engine::Engine;
use crate::error::Result;
use crate::network::{MibInfo, MibKey, NodeKey, VarKey, VarSelector, VariableSnapshot};
use crate::types::GetFlags;
use crate::value::Value;

/// A mib of a node reached through a traversal.
pub struct Mib<'n, E: Engine> {
    context: &'n Context<E>,
    info: MibInfo,
}

impl<'n, E: Engine> Mib<'n, E> {
    pub(crate) fn new(context: &'n Context<E>, info: MibInfo) -> Self {
        Self { context, info }
    }

    pub fn info(&self) -> &MibInfo {
        &self.info
    }

    pub fn id(&self) -> u32 {
        self.info.id
    }

    pub fn index(&self) -> u8 {
        self.info.index
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// The mib's variables in order.
    pub fn vars(&self) -> VarIter<'n, E> {
        VarIter {
            context: self.context,
            mib: self.info.key,
            position: 0,
            exhausted: false,
        }
    }

    /// First variable with exactly this name.
    pub fn lookup_var(&self, name: &str) -> Option<Variable<'n, E>> {
        let key = self.context.network().lookup_var(self.info.key, name)?;
        Some(Variable::new(self.context, key))
    }

    pub fn lookup_var_index(&self, index: u8) -> Option<Variable<'n, E>> {
        let key = self.context.network().lookup_var_index(self.info.key, index)?;
        Some(Variable::new(self.context, key))
    }

    pub fn find_var(&self, selector: &VarSelector) -> Option<Variable<'n, E>> {
        let key = self.context.network().find_var(self.info.key, selector)?;
        Some(Variable::new(self.context, key))
    }
}

impl<E: Engine> std::fmt::Debug for Mib<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mib").field(&self.info).finish()
    }
}

/// A variable handle. Operations go through the owning context.
pub struct Variable<'n, E: Engine> {
    context: &'n Context<E>,
    key: VarKey,
}

impl<'n, E: Engine> Variable<'n, E> {
    pub(crate) fn new(context: &'n Context<E>, key: VarKey) -> Self {
        Self { context, key }
    }

    pub fn key(&self) -> VarKey {
        self.key
    }

    /// Current state, including the cached value.
    pub fn snapshot(&self) -> Result<VariableSnapshot> {
        self.context.variable(self.key)
    }

    /// Cached value without a network read.
    pub fn cached(&self) -> Result<Option<Value>> {
        self.snapshot()?.value()
    }

    /// Read from the node and return the decoded value.
    pub fn get(&self) -> Result<Option<Value>> {
        self.get_with(GetFlags::NONE)
    }

    pub fn get_with(&self, flags: GetFlags) -> Result<Option<Value>> {
        self.context.get_var(self.key, flags)?.value()
    }

    pub fn set(&self, value: &Value) -> Result<()> {
        self.context.set_var(self.key, value)
    }

    /// Parse `text` for this variable's type and write it.
    pub fn set_str(&self, text: &str) -> Result<()> {
        self.context.set_var_str(self.key, text)
    }

    pub fn multicast_set(&self, value: &Value, group: Ipv6Addr, hops: Option<u8>) -> Result<()> {
        self.context.multicast_set_var(self.key, value, group, hops)
    }

    pub fn update_table_row(&self, row: u32, data: &[u8]) -> Result<()> {
        self.context.update_table_row(self.key, row, data)
    }

    /// Trap with a randomly chosen handle.
    pub fn trap<F>(&self, callback: F) -> Result<u8>
    where
        F: Fn(&VariableSnapshot) + Send + Sync + 'static,
    {
        self.context.trap_var(self.key, callback, None)
    }

    pub fn untrap(&self) -> Result<()> {
        self.context.untrap_var(self.key, None)
    }
}

impl<E: Engine> std::fmt::Debug for Variable<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Variable").field(&self.key).finish()
    }
}

/// Forward-only iterator over a node's mibs.
///
/// Fused: once it returns `None` it stays exhausted.
pub struct MibIter<'n, E: Engine> {
    context: &'n Context<E>,
    node: NodeKey,
    position: usize,
    exhausted: bool,
}

impl<'n, E: Engine> MibIter<'n, E> {
    pub(crate) fn new(context: &'n Context<E>, node: NodeKey) -> Self {
        Self {
            context,
            node,
            position: 0,
            exhausted: false,
        }
    }
}

impl<'n, E: Engine> Iterator for MibIter<'n, E> {
    type Item = Mib<'n, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.context.network().mib_at(self.node, self.position) {
            Some(info) => {
                self.position += 1;
                Some(Mib::new(self.context, info))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl<E: Engine> std::iter::FusedIterator for MibIter<'_, E> {}

/// Forward-only iterator over a mib's variables.
pub struct VarIter<'n, E: Engine> {
    context: &'n Context<E>,
    mib: MibKey,
    position: usize,
    exhausted: bool,
}

impl<'n, E: Engine> Iterator for VarIter<'n, E> {
    type Item = (Variable<'n, E>, VariableSnapshot);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.context.network().var_at(self.mib, self.position) {
            Some(snapshot) => {
                self.position += 1;
                Some((Variable::new(self.context, snapshot.key), snapshot))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl<E: Engine> std::iter::FusedIterator for VarIter<'_, E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::network::NodeSpec;
    use crate::types::{AccessType, DeviceFilter, VarType};

    fn context() -> Context {
        let context = Context::client().build(MemoryEngine::new()).unwrap();
        let spec = NodeSpec::new("[fd04::7]:1873".parse().unwrap(), 0x8010_0001)
            .mib(0xfffffe01, "NodeStatus", |m| {
                m.var("SystemStatus", VarType::UInt16, |v| v.initial(3u16))
            })
            .mib(0xfffffe02, "BulbControl", |m| {
                m.var("Mode", VarType::UInt8, |v| {
                    v.access(AccessType::ReadWrite).initial(0u8)
                })
                .var("Name", VarType::String, |v| {
                    v.access(AccessType::ReadWrite).initial("Hall")
                })
            });
        context.engine().join(&spec).unwrap();
        context
    }

    #[test]
    fn test_iterate_mibs_and_vars() {
        let context = context();
        let mut walk = context.walk(DeviceFilter::Any);
        let node = walk.next_node().unwrap().unwrap();

        let names: Vec<String> = node.mibs().map(|m| m.name().to_owned()).collect();
        assert_eq!(names, vec!["NodeStatus", "BulbControl"]);

        let mib = node.lookup_mib_id(0xfffffe02).unwrap();
        let vars: Vec<_> = mib.vars().map(|(_, s)| (s.index, s.ty)).collect();
        assert_eq!(vars, vec![(0, VarType::UInt8), (1, VarType::String)]);

        let mut iter = node.mibs();
        assert_eq!(iter.by_ref().count(), 2);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_variable_read_write() {
        let context = context();
        let mut walk = context.walk(DeviceFilter::Any);
        let node = walk.next_node().unwrap().unwrap();
        let mib = node.find_mib(&"BulbControl".parse().unwrap()).unwrap();

        let name = mib.find_var(&"1".parse().unwrap()).unwrap();
        assert_eq!(name.cached().unwrap(), None);
        assert_eq!(name.get().unwrap(), Some(Value::from("Hall")));

        name.set_str("Kitchen").unwrap();
        assert_eq!(name.snapshot().unwrap().size, 7);
        assert_eq!(name.cached().unwrap(), Some(Value::from("Kitchen")));

        let mode = mib.lookup_var("Mode").unwrap();
        mode.set(&Value::UInt8(2)).unwrap();
        assert_eq!(mode.get_with(GetFlags::FORCE).unwrap(), Some(Value::UInt8(2)));
        assert!(mib.lookup_var_index(9).is_none());
    }

    #[test]
    fn test_variable_trap_helpers() {
        let context = context();
        let mut walk = context.walk(DeviceFilter::Any);
        let node = walk.next_node().unwrap().unwrap();
        let mode = node
            .lookup_mib("BulbControl")
            .and_then(|m| m.lookup_var("Mode"))
            .unwrap();
        let handle = mode.trap(|_| {}).unwrap();
        assert_eq!(context.trap_handle(mode.key()), Some(handle));
        mode.untrap().unwrap();
        assert_eq!(context.trap_count(), 0);
    }
}
