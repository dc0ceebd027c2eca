//! Error types for jip-model.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

use std::net::{Ipv6Addr, SocketAddrV6};

use crate::context::ContextId;
use crate::network::{NodeKey, VarKey};
use crate::types::VarType;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Status code returned by the protocol engine.
///
/// Only the low byte identifies the code; engines are free to set higher bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Status {
    Ok,
    Timeout,
    BadMibIndex,
    BadVarIndex,
    NoAccess,
    BadBufferSize,
    WrongType,
    BadValue,
    Disabled,
    Failed,
    BadDeviceId,
    NetworkError,
    WouldBlock,
    NoMem,
    WrongContext,
    /// Unknown/future status code (full raw value).
    Unknown(i32),
}

impl Status {
    /// Create from raw status code.
    pub fn from_raw(value: i32) -> Self {
        match value & 0xFF {
            0x00 => Self::Ok,
            0x7f => Self::Timeout,
            0x8f => Self::BadMibIndex,
            0x9f => Self::BadVarIndex,
            0xaf => Self::NoAccess,
            0xbf => Self::BadBufferSize,
            0xcf => Self::WrongType,
            0xdf => Self::BadValue,
            0xef => Self::Disabled,
            0xff => Self::Failed,
            0x11 => Self::BadDeviceId,
            0x12 => Self::NetworkError,
            0x13 => Self::WouldBlock,
            0x14 => Self::NoMem,
            0x15 => Self::WrongContext,
            _ => Self::Unknown(value),
        }
    }

    /// Convert to raw status code.
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Ok => 0x00,
            Self::Timeout => 0x7f,
            Self::BadMibIndex => 0x8f,
            Self::BadVarIndex => 0x9f,
            Self::NoAccess => 0xaf,
            Self::BadBufferSize => 0xbf,
            Self::WrongType => 0xcf,
            Self::BadValue => 0xdf,
            Self::Disabled => 0xef,
            Self::Failed => 0xff,
            Self::BadDeviceId => 0x11,
            Self::NetworkError => 0x12,
            Self::WouldBlock => 0x13,
            Self::NoMem => 0x14,
            Self::WrongContext => 0x15,
            Self::Unknown(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// `Ok(())` for [`Status::Ok`], otherwise [`Error::Status`] for `op`.
    pub fn check(self, op: Operation) -> Result<()> {
        self.check_for(op, None)
    }

    pub(crate) fn check_for(self, op: Operation, target: Option<SocketAddrV6>) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::Status {
                op,
                target,
                status: self,
            })
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "E_JIP_OK"),
            Self::Timeout => write!(f, "E_JIP_ERROR_TIMEOUT"),
            Self::BadMibIndex => write!(f, "E_JIP_ERROR_BAD_MIB_INDEX"),
            Self::BadVarIndex => write!(f, "E_JIP_ERROR_BAD_VAR_INDEX"),
            Self::NoAccess => write!(f, "E_JIP_ERROR_NO_ACCESS"),
            Self::BadBufferSize => write!(f, "E_JIP_ERROR_BAD_BUFFER_SIZE"),
            Self::WrongType => write!(f, "E_JIP_ERROR_WRONG_TYPE"),
            Self::BadValue => write!(f, "E_JIP_ERROR_BAD_VALUE"),
            Self::Disabled => write!(f, "E_JIP_ERROR_DISABLED"),
            Self::Failed => write!(f, "E_JIP_ERROR_FAILED"),
            Self::BadDeviceId => write!(f, "E_JIP_ERROR_BAD_DEVICE_ID"),
            Self::NetworkError => write!(f, "E_JIP_ERROR_NETWORK"),
            Self::WouldBlock => write!(f, "E_JIP_ERROR_WOULD_BLOCK"),
            Self::NoMem => write!(f, "E_JIP_ERROR_NO_MEM"),
            Self::WrongContext => write!(f, "E_JIP_ERROR_WRONG_CONTEXT"),
            Self::Unknown(code) => write!(f, "Unknown Result ({})", code),
        }
    }
}

/// Engine request that produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operation {
    Init,
    Destroy,
    Connect,
    Connect4,
    GroupJoin,
    GroupLeave,
    Discover,
    Get,
    Set,
    MulticastSet,
    UpdateTableRow,
    SetValue,
    Trap,
    Untrap,
    Monitor,
    MonitorStop,
    Listen,
    NodeAdd,
    NodeRemove,
    NodeGroupJoin,
    NodeGroupLeave,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Destroy => "destroy",
            Self::Connect => "connect",
            Self::Connect4 => "connect4",
            Self::GroupJoin => "group join",
            Self::GroupLeave => "group leave",
            Self::Discover => "discover",
            Self::Get => "get",
            Self::Set => "set",
            Self::MulticastSet => "multicast set",
            Self::UpdateTableRow => "table row update",
            Self::SetValue => "local value set",
            Self::Trap => "trap",
            Self::Untrap => "untrap",
            Self::Monitor => "monitor",
            Self::MonitorStop => "monitor stop",
            Self::Listen => "listen",
            Self::NodeAdd => "node add",
            Self::NodeRemove => "node remove",
            Self::NodeGroupJoin => "node group join",
            Self::NodeGroupLeave => "node group leave",
        };
        f.write_str(name)
    }
}

/// Coordination step of a network traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockOp {
    LockContext,
    UnlockContext,
    Snapshot,
    LockNode,
    UnlockNode,
}

impl std::fmt::Display for LockOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockContext => write!(f, "context lock"),
            Self::UnlockContext => write!(f, "context unlock"),
            Self::Snapshot => write!(f, "node address snapshot"),
            Self::LockNode => write!(f, "node lock"),
            Self::UnlockNode => write!(f, "node unlock"),
        }
    }
}

/// Raw value decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Fixed-width value with the wrong number of bytes.
    BufferSize { expected: usize, actual: usize },
    /// Table buffer ended inside a header or row.
    InsufficientData { needed: usize, available: usize },
    /// Bytes left over after the last table row.
    TrailingData { remaining: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferSize { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::TrailingData { remaining } => {
                write!(f, "{} trailing bytes after last row", remaining)
            }
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Value variant does not match the variable's declared type.
    #[error("type mismatch: {expected} variable cannot hold a {actual} value")]
    TypeMismatch { expected: VarType, actual: VarType },

    /// Operation not available for this variable type.
    #[error("{op} is not supported for {ty} variables")]
    UnsupportedOperation { op: Operation, ty: VarType },

    /// Operation requires a variable of a different type.
    #[error("wrong variable type: expected {expected}, found {actual}")]
    WrongType { expected: VarType, actual: VarType },

    /// String or blob longer than the protocol's size field allows.
    #[error("value too long: {len} bytes exceeds maximum {max}")]
    ValueTooLong { len: usize, max: usize },

    /// Table row index past the largest supported table.
    #[error("table row {row} out of range (maximum {max} rows)")]
    RowOutOfRange { row: u32, max: u32 },

    /// Text could not be parsed as a value of the given type.
    #[error("cannot parse {ty} value from '{input}'")]
    Parse { ty: VarType, input: Box<str> },

    /// Raw buffer could not be decoded.
    #[error("decode error for {ty}: {kind}")]
    Decode { ty: VarType, kind: DecodeErrorKind },

    /// Multicast operation addressed to a unicast group.
    #[error("{addr} is not an IPv6 multicast address")]
    NotMulticast { addr: Ipv6Addr },

    /// Engine returned a non-OK status for a request.
    #[error("{op} failed{}: {status}", target.map(|t| format!(" for {}", t)).unwrap_or_default())]
    Status {
        op: Operation,
        target: Option<SocketAddrV6>,
        status: Status,
    },

    /// Lock, unlock or snapshot call failed during traversal.
    #[error("engine error during {op}: {status}")]
    Engine { op: LockOp, status: Status },

    /// Variable (or its owning mib/node) has been removed from the network.
    #[error("variable {var} is no longer part of the network")]
    StaleVariable { var: VarKey },

    /// Node has been removed from the network.
    #[error("node {node} is no longer part of the network")]
    StaleNode { node: NodeKey },

    /// Every 8-bit trap handle is held by this context.
    #[error("all 256 trap handles are in use")]
    TrapHandlesExhausted,

    /// Context has already been torn down.
    #[error("context {id} has been destroyed")]
    ContextDestroyed { id: ContextId },
}

impl Error {
    /// Create a decode error.
    pub fn decode(ty: VarType, kind: DecodeErrorKind) -> Self {
        Self::Decode { ty, kind }
    }

    /// Create a parse error with the input string that failed.
    pub fn parse(ty: VarType, input: impl Into<Box<str>>) -> Self {
        Self::Parse {
            ty,
            input: input.into(),
        }
    }

    /// Create a traversal coordination error.
    pub fn engine(op: LockOp, status: Status) -> Self {
        Self::Engine { op, status }
    }

    /// Get the engine status if this error carries one.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Engine { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddrV6> {
        match self {
            Self::Status { target, .. } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: [(i32, &str); 15] = [
        (0x00, "E_JIP_OK"),
        (0x7f, "E_JIP_ERROR_TIMEOUT"),
        (0x8f, "E_JIP_ERROR_BAD_MIB_INDEX"),
        (0x9f, "E_JIP_ERROR_BAD_VAR_INDEX"),
        (0xaf, "E_JIP_ERROR_NO_ACCESS"),
        (0xbf, "E_JIP_ERROR_BAD_BUFFER_SIZE"),
        (0xcf, "E_JIP_ERROR_WRONG_TYPE"),
        (0xdf, "E_JIP_ERROR_BAD_VALUE"),
        (0xef, "E_JIP_ERROR_DISABLED"),
        (0xff, "E_JIP_ERROR_FAILED"),
        (0x11, "E_JIP_ERROR_BAD_DEVICE_ID"),
        (0x12, "E_JIP_ERROR_NETWORK"),
        (0x13, "E_JIP_ERROR_WOULD_BLOCK"),
        (0x14, "E_JIP_ERROR_NO_MEM"),
        (0x15, "E_JIP_ERROR_WRONG_CONTEXT"),
    ];

    #[test]
    fn test_status_known_codes_display() {
        for (raw, name) in KNOWN {
            let status = Status::from_raw(raw);
            assert_eq!(status.to_string(), name);
            assert_eq!(status.as_raw(), raw);
        }
    }

    #[test]
    fn test_status_unknown_fallback() {
        let status = Status::from_raw(0x42);
        assert_eq!(status, Status::Unknown(0x42));
        assert_eq!(status.to_string(), "Unknown Result (66)");
        assert_eq!(status.as_raw(), 0x42);
    }

    #[test]
    fn test_status_masks_high_bits() {
        assert_eq!(Status::from_raw(0x17f), Status::Timeout);
        assert_eq!(Status::from_raw(0x100), Status::Ok);
    }

    #[test]
    fn test_status_check() {
        assert!(Status::Ok.check(Operation::Get).is_ok());
        let err = Status::NoAccess.check(Operation::Set).unwrap_err();
        assert_eq!(err.status(), Some(Status::NoAccess));
        assert_eq!(err.to_string(), "set failed: E_JIP_ERROR_NO_ACCESS");
    }

    #[test]
    fn test_status_error_display_with_target() {
        let target: SocketAddrV6 = "[fd04:bd3:80e8:2::1]:1873".parse().unwrap();
        let err = Status::Timeout
            .check_for(Operation::Get, Some(target))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "get failed for [fd04:bd3:80e8:2::1]:1873: E_JIP_ERROR_TIMEOUT"
        );
        assert_eq!(err.target(), Some(target));
    }

    #[test]
    fn test_decode_error_display() {
        let err = Error::decode(
            VarType::UInt16,
            DecodeErrorKind::BufferSize {
                expected: 2,
                actual: 3,
            },
        );
        assert_eq!(
            err.to_string(),
            "decode error for E_JIP_VAR_TYPE_UINT16: expected 2 bytes, got 3"
        );
        assert_eq!(err.status(), None);
    }
}
