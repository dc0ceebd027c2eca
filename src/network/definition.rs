//! Definitions used by engines to populate a network.
//!
//! ```rust
//! use jip_model::network::NodeSpec;
//! use jip_model::{AccessType, Value, VarType};
//!
//! let addr = "[fd04:bd3:80e8:2::1]:1873".parse().unwrap();
//! let spec = NodeSpec::new(addr, 0x8010_0001)
//!     .mib(0xfffffe02, "BulbControl", |m| {
//!         m.var("Mode", VarType::UInt8, |v| {
//!             v.access(AccessType::ReadWrite).initial(Value::UInt8(1))
//!         })
//!         .var("Level", VarType::UInt8, |v| v.access(AccessType::ReadWrite))
//!     })
//!     .mib(0xfffffe01, "NodeStatus", |m| m.var("SystemStatus", VarType::UInt16, |v| v));
//! assert_eq!(spec.mibs().len(), 2);
//! ```

use std::net::SocketAddrV6;
use std::sync::Arc;

use crate::types::{AccessType, Enabled, Security, VarType};
use crate::value::Value;

/// Definition of a node and its mibs.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub(crate) address: SocketAddrV6,
    pub(crate) device_id: u32,
    pub(crate) mibs: Vec<MibSpec>,
}

impl NodeSpec {
    pub fn new(address: SocketAddrV6, device_id: u32) -> Self {
        Self {
            address,
            device_id,
            mibs: Vec::new(),
        }
    }

    /// Append a mib, configured by `configure`.
    pub fn mib<F>(mut self, id: u32, name: impl Into<Arc<str>>, configure: F) -> Self
    where
        F: FnOnce(MibSpec) -> MibSpec,
    {
        let index = self.mibs.len() as u8;
        self.mibs.push(configure(MibSpec::new(id, name, index)));
        self
    }

    pub fn address(&self) -> SocketAddrV6 {
        self.address
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    pub fn mibs(&self) -> &[MibSpec] {
        &self.mibs
    }
}

/// Definition of a mib and its variables.
#[derive(Debug, Clone)]
pub struct MibSpec {
    pub(crate) id: u32,
    pub(crate) name: Arc<str>,
    pub(crate) index: u8,
    pub(crate) vars: Vec<VarSpec>,
}

impl MibSpec {
    fn new(id: u32, name: impl Into<Arc<str>>, index: u8) -> Self {
        Self {
            id,
            name: name.into(),
            index,
            vars: Vec::new(),
        }
    }

    /// Override the mib index (defaults to its position in the node).
    pub fn index(mut self, index: u8) -> Self {
        self.index = index;
        self
    }

    /// Append a variable, configured by `configure`.
    pub fn var<F>(mut self, name: impl Into<Arc<str>>, ty: VarType, configure: F) -> Self
    where
        F: FnOnce(VarSpec) -> VarSpec,
    {
        let index = self.vars.len() as u8;
        self.vars.push(configure(VarSpec::new(name, ty, index)));
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &[VarSpec] {
        &self.vars
    }
}

/// Definition of a variable.
#[derive(Debug, Clone)]
pub struct VarSpec {
    pub(crate) name: Arc<str>,
    pub(crate) ty: VarType,
    pub(crate) index: u8,
    pub(crate) access: AccessType,
    pub(crate) security: Security,
    pub(crate) enabled: Enabled,
    pub(crate) initial: Option<Value>,
}

impl VarSpec {
    fn new(name: impl Into<Arc<str>>, ty: VarType, index: u8) -> Self {
        Self {
            name: name.into(),
            ty,
            index,
            access: AccessType::default(),
            security: Security::default(),
            enabled: Enabled::default(),
            initial: None,
        }
    }

    /// Override the variable index (defaults to its position in the mib).
    pub fn index(mut self, index: u8) -> Self {
        self.index = index;
        self
    }

    pub fn access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    pub fn enabled(mut self, enabled: Enabled) -> Self {
        self.enabled = enabled;
        self
    }

    /// Initial value held by the node.
    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var_type(&self) -> VarType {
        self.ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_follow_position() {
        let addr = "[fd04::1]:1873".parse().unwrap();
        let spec = NodeSpec::new(addr, 1)
            .mib(10, "A", |m| {
                m.var("x", VarType::UInt8, |v| v)
                    .var("y", VarType::UInt8, |v| v.index(9))
                    .var("z", VarType::UInt8, |v| v)
            })
            .mib(20, "B", |m| m.index(5));

        let a = &spec.mibs()[0];
        assert_eq!(a.index, 0);
        assert_eq!(
            a.vars().iter().map(|v| v.index).collect::<Vec<_>>(),
            vec![0, 9, 2]
        );
        assert_eq!(spec.mibs()[1].index, 5);
    }

    #[test]
    fn test_var_defaults() {
        let addr = "[fd04::1]:1873".parse().unwrap();
        let spec = NodeSpec::new(addr, 1).mib(1, "M", |m| m.var("v", VarType::Blob, |v| v));
        let var = &spec.mibs()[0].vars()[0];
        assert_eq!(var.access, AccessType::ReadOnly);
        assert_eq!(var.enabled, Enabled::Enabled);
        assert_eq!(var.security, Security::None);
        assert!(var.initial.is_none());
    }
}
