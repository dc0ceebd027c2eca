//! Owned copies of tree state.

use std::fmt;
use std::net::SocketAddrV6;
use std::sync::Arc;

use bytes::Bytes;

use super::{MibKey, NodeKey, VarKey};
use crate::codec;
use crate::error::Result;
use crate::types::{AccessType, Enabled, Security, VarType};
use crate::value::Value;

/// A node as it was when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub key: NodeKey,
    pub address: SocketAddrV6,
    pub device_id: u32,
    pub mib_count: usize,
}

impl fmt::Display for NodeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node: {} ID: 0x{:08x}", self.address, self.device_id)
    }
}

/// Immutable description of a mib.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MibInfo {
    pub key: MibKey,
    pub node: NodeKey,
    pub id: u32,
    pub index: u8,
    pub name: Arc<str>,
}

impl fmt::Display for MibInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mib, ID:0x{:08x} - '{}'", self.id, self.name)
    }
}

/// A variable, including its cached raw value, at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSnapshot {
    pub key: VarKey,
    pub mib: MibKey,
    pub node: NodeKey,
    pub index: u8,
    pub name: Arc<str>,
    pub ty: VarType,
    pub access: AccessType,
    pub security: Security,
    pub enabled: Enabled,
    pub size: u8,
    /// Absent until the value has been read at least once.
    pub raw: Option<Bytes>,
}

impl VariableSnapshot {
    /// Decoded value, or `None` if no value has been read yet.
    pub fn value(&self) -> Result<Option<Value>> {
        self.raw
            .as_ref()
            .map(|raw| codec::decode(self.ty, raw))
            .transpose()
    }
}

impl fmt::Display for VariableSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Variable {}: '{}'", self.index, self.name)?;
        writeln!(f, "  Type: {}", self.ty)?;
        writeln!(f, "  Access: {}", self.access)?;
        writeln!(f, "  Security: {}", self.security)?;
        writeln!(f, "  Enabled: {}", self.enabled)?;
        match self.value() {
            Ok(Some(value)) => write!(f, "  Data: {}", value),
            Ok(None) => write!(f, "  Data: ?"),
            Err(e) => write!(f, "  Data: <{}>", e),
        }
    }
}
