//! Protocol enumerations and constants.
//!
//! Each enum carries the raw code used by the protocol engine (`as_raw` /
//! `from_raw`) and displays as the protocol's canonical name.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Default JIP UDP port.
pub const DEFAULT_PORT: u16 = 1873;

/// Device id wildcard matching every node.
pub const DEVICE_ID_ALL: u32 = 0xFFFF_FFFF;

/// Default hop limit for multicast sets.
pub const DEFAULT_MULTICAST_HOPS: u8 = 2;

/// Default number of times each multicast set is transmitted.
pub const DEFAULT_MULTICAST_SEND_COUNT: u32 = 2;

/// Variable value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Blob,
    TableBlob,
}

impl VarType {
    /// All types, in protocol code order.
    pub const ALL: [VarType; 13] = [
        VarType::Int8,
        VarType::Int16,
        VarType::Int32,
        VarType::Int64,
        VarType::UInt8,
        VarType::UInt16,
        VarType::UInt32,
        VarType::UInt64,
        VarType::Float32,
        VarType::Float64,
        VarType::String,
        VarType::Blob,
        VarType::TableBlob,
    ];

    pub const fn as_raw(self) -> u8 {
        match self {
            VarType::Int8 => 0,
            VarType::Int16 => 1,
            VarType::Int32 => 2,
            VarType::Int64 => 3,
            VarType::UInt8 => 4,
            VarType::UInt16 => 5,
            VarType::UInt32 => 6,
            VarType::UInt64 => 7,
            VarType::Float32 => 8,
            VarType::Float64 => 9,
            VarType::String => 10,
            VarType::Blob => 11,
            VarType::TableBlob => 75,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(VarType::Int8),
            1 => Some(VarType::Int16),
            2 => Some(VarType::Int32),
            3 => Some(VarType::Int64),
            4 => Some(VarType::UInt8),
            5 => Some(VarType::UInt16),
            6 => Some(VarType::UInt32),
            7 => Some(VarType::UInt64),
            8 => Some(VarType::Float32),
            9 => Some(VarType::Float64),
            10 => Some(VarType::String),
            11 => Some(VarType::Blob),
            75 => Some(VarType::TableBlob),
            _ => None,
        }
    }

    /// Encoded width for numeric types, `None` for String, Blob and TableBlob.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            VarType::Int8 | VarType::UInt8 => Some(1),
            VarType::Int16 | VarType::UInt16 => Some(2),
            VarType::Int32 | VarType::UInt32 | VarType::Float32 => Some(4),
            VarType::Int64 | VarType::UInt64 | VarType::Float64 => Some(8),
            VarType::String | VarType::Blob | VarType::TableBlob => None,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VarType::Int8 => "E_JIP_VAR_TYPE_INT8",
            VarType::Int16 => "E_JIP_VAR_TYPE_INT16",
            VarType::Int32 => "E_JIP_VAR_TYPE_INT32",
            VarType::Int64 => "E_JIP_VAR_TYPE_INT64",
            VarType::UInt8 => "E_JIP_VAR_TYPE_UINT8",
            VarType::UInt16 => "E_JIP_VAR_TYPE_UINT16",
            VarType::UInt32 => "E_JIP_VAR_TYPE_UINT32",
            VarType::UInt64 => "E_JIP_VAR_TYPE_UINT64",
            VarType::Float32 => "E_JIP_VAR_TYPE_FLT",
            VarType::Float64 => "E_JIP_VAR_TYPE_DBL",
            VarType::String => "E_JIP_VAR_TYPE_STR",
            VarType::Blob => "E_JIP_VAR_TYPE_BLOB",
            VarType::TableBlob => "E_JIP_VAR_TYPE_TABLE_BLOB",
        };
        f.write_str(name)
    }
}

/// Variable access type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessType {
    Const,
    #[default]
    ReadOnly,
    ReadWrite,
}

impl AccessType {
    pub const fn as_raw(self) -> u8 {
        match self {
            AccessType::Const => 0,
            AccessType::ReadOnly => 1,
            AccessType::ReadWrite => 2,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(AccessType::Const),
            1 => Some(AccessType::ReadOnly),
            2 => Some(AccessType::ReadWrite),
            _ => None,
        }
    }

    pub const fn is_writable(self) -> bool {
        matches!(self, AccessType::ReadWrite)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessType::Const => "E_JIP_ACCESS_TYPE_CONST",
            AccessType::ReadOnly => "E_JIP_ACCESS_TYPE_READ_ONLY",
            AccessType::ReadWrite => "E_JIP_ACCESS_TYPE_READ_WRITE",
        })
    }
}

/// Variable security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Security {
    #[default]
    None,
}

impl Security {
    pub const fn as_raw(self) -> u8 {
        match self {
            Security::None => 0,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Security::None),
            _ => None,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Security::None => f.write_str("E_JIP_SECURITY_NONE"),
        }
    }
}

/// Whether a variable currently accepts access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Enabled {
    Disabled,
    #[default]
    Enabled,
}

impl Enabled {
    pub const fn as_raw(self) -> u8 {
        match self {
            Enabled::Disabled => 0,
            Enabled::Enabled => 1,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Enabled::Disabled),
            1 => Some(Enabled::Enabled),
            _ => None,
        }
    }

    pub const fn is_enabled(self) -> bool {
        matches!(self, Enabled::Enabled)
    }
}

impl fmt::Display for Enabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Enabled::Disabled => "E_JIP_VAR_DISABLED",
            Enabled::Enabled => "E_JIP_VAR_ENABLED",
        })
    }
}

/// Topology change reported to network monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeKind {
    Join,
    Leave,
    Move,
}

impl ChangeKind {
    pub const fn as_raw(self) -> u8 {
        match self {
            ChangeKind::Join => 0,
            ChangeKind::Leave => 1,
            ChangeKind::Move => 2,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(ChangeKind::Join),
            1 => Some(ChangeKind::Leave),
            2 => Some(ChangeKind::Move),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Join => "E_JIP_NODE_JOIN",
            ChangeKind::Leave => "E_JIP_NODE_LEAVE",
            ChangeKind::Move => "E_JIP_NODE_MOVE",
        })
    }
}

/// Role of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextKind {
    /// Talks to remote nodes through a border router.
    #[default]
    Client,
    /// Hosts local nodes and answers requests for them.
    Server,
}

impl ContextKind {
    pub const fn as_raw(self) -> u8 {
        match self {
            ContextKind::Client => 0,
            ContextKind::Server => 1,
        }
    }

    pub const fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(ContextKind::Client),
            1 => Some(ContextKind::Server),
            _ => None,
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContextKind::Client => "E_JIP_CONTEXT_CLIENT",
            ContextKind::Server => "E_JIP_CONTEXT_SERVER",
        })
    }
}

/// Transport used to reach an IPv4-encapsulated border router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ipv4Transport {
    #[default]
    Udp,
    Tcp,
}

/// Flags for a variable read.
///
/// The engine interprets these; this crate passes them through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GetFlags(u32);

impl GetFlags {
    pub const NONE: GetFlags = GetFlags(0);
    /// Ask the node to stay awake for follow-up requests.
    pub const STAY_AWAKE: GetFlags = GetFlags(1);
    /// Read from the node even when a cached value exists.
    pub const FORCE: GetFlags = GetFlags(2);

    pub const fn from_bits(bits: u32) -> Self {
        GetFlags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: GetFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for GetFlags {
    type Output = GetFlags;

    fn bitor(self, rhs: GetFlags) -> GetFlags {
        GetFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for GetFlags {
    fn bitor_assign(&mut self, rhs: GetFlags) {
        self.0 |= rhs.0;
    }
}

/// Device id filter for network snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceFilter {
    #[default]
    Any,
    Id(u32),
}

impl DeviceFilter {
    /// The raw filter value; [`DEVICE_ID_ALL`] for `Any`.
    pub const fn as_raw(self) -> u32 {
        match self {
            DeviceFilter::Any => DEVICE_ID_ALL,
            DeviceFilter::Id(id) => id,
        }
    }

    pub const fn matches(self, device_id: u32) -> bool {
        match self {
            DeviceFilter::Any => true,
            DeviceFilter::Id(id) => id == device_id,
        }
    }
}

impl From<u32> for DeviceFilter {
    fn from(id: u32) -> Self {
        if id == DEVICE_ID_ALL {
            DeviceFilter::Any
        } else {
            DeviceFilter::Id(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_type_raw_codes() {
        for ty in VarType::ALL {
            assert_eq!(VarType::from_raw(ty.as_raw()), Some(ty));
        }
        assert_eq!(VarType::TableBlob.as_raw(), 75);
        assert_eq!(VarType::from_raw(12), None);
        assert_eq!(VarType::from_raw(74), None);
    }

    #[test]
    fn test_var_type_display() {
        assert_eq!(VarType::Float32.to_string(), "E_JIP_VAR_TYPE_FLT");
        assert_eq!(VarType::TableBlob.to_string(), "E_JIP_VAR_TYPE_TABLE_BLOB");
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(VarType::Int16.fixed_width(), Some(2));
        assert_eq!(VarType::Float64.fixed_width(), Some(8));
        assert_eq!(VarType::Blob.fixed_width(), None);
    }

    #[test]
    fn test_get_flags_combine() {
        let flags = GetFlags::STAY_AWAKE | GetFlags::FORCE;
        assert_eq!(flags.bits(), 3);
        assert!(flags.contains(GetFlags::FORCE));
        assert!(!GetFlags::NONE.contains(GetFlags::STAY_AWAKE));
    }

    #[test]
    fn test_device_filter_wildcard() {
        assert_eq!(DeviceFilter::from(DEVICE_ID_ALL), DeviceFilter::Any);
        assert_eq!(DeviceFilter::from(0x8010_0001), DeviceFilter::Id(0x8010_0001));
        assert!(DeviceFilter::Any.matches(7));
        assert!(!DeviceFilter::Id(1).matches(2));
        assert_eq!(DeviceFilter::Any.as_raw(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_change_kind_roundtrip() {
        for kind in [ChangeKind::Join, ChangeKind::Leave, ChangeKind::Move] {
            assert_eq!(ChangeKind::from_raw(kind.as_raw()), Some(kind));
        }
        assert_eq!(ChangeKind::Leave.to_string(), "E_JIP_NODE_LEAVE");
    }
}
