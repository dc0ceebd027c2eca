//! Common test fixtures and constants.

use std::net::{Ipv6Addr, SocketAddrV6};

use jip_model::network::NodeSpec;
use jip_model::{AccessType, Enabled, VarType};

// =============================================================================
// Addresses
// =============================================================================

/// Mesh prefix used by every fixture node: fd04:bd3:80e8:2::/64
pub fn node_addr(last: u16) -> SocketAddrV6 {
    SocketAddrV6::new(
        Ipv6Addr::new(0xfd04, 0xbd3, 0x80e8, 2, 0, 0, 0, last),
        jip_model::DEFAULT_PORT,
        0,
        0,
    )
}

/// Border router address.
pub fn border_router() -> SocketAddrV6 {
    SocketAddrV6::new(
        Ipv6Addr::new(0xfd04, 0xbd3, 0x80e8, 1, 0, 0, 0, 1),
        jip_model::DEFAULT_PORT,
        0,
        0,
    )
}

/// Group all bulbs join.
pub fn all_bulbs_group() -> Ipv6Addr {
    "ff15::f00f".parse().unwrap()
}

// =============================================================================
// Device ids
// =============================================================================

pub const DIMMABLE_BULB: u32 = 0x8010_0001;
pub const COLOUR_BULB: u32 = 0x8010_0002;

// =============================================================================
// Mib ids
// =============================================================================

pub const MIB_NODE_STATUS: u32 = 0xfffffe01;
pub const MIB_BULB_CONTROL: u32 = 0xfffffe02;
pub const MIB_ROUTES: u32 = 0xfffffe88;

// =============================================================================
// Node definitions
// =============================================================================

/// A dimmable bulb with status, control and routing table mibs.
pub fn bulb(last: u16) -> NodeSpec {
    bulb_with_id(last, DIMMABLE_BULB)
}

pub fn bulb_with_id(last: u16, device_id: u32) -> NodeSpec {
    NodeSpec::new(node_addr(last), device_id)
        .mib(MIB_NODE_STATUS, "NodeStatus", |m| {
            m.var("SystemStatus", VarType::UInt16, |v| v.initial(1u16))
                .var("ColdStartCount", VarType::UInt16, |v| v.initial(0u16))
                .var("SoftwareVersion", VarType::String, |v| {
                    v.access(AccessType::Const).initial("1.0.0")
                })
        })
        .mib(MIB_BULB_CONTROL, "BulbControl", |m| {
            m.var("Mode", VarType::UInt8, |v| {
                v.access(AccessType::ReadWrite).initial(0u8)
            })
            .var("ScnId", VarType::UInt16, |v| v.access(AccessType::ReadWrite))
            .var("LumTarget", VarType::UInt8, |v| {
                v.access(AccessType::ReadWrite).initial(255u8)
            })
            .var("Hidden", VarType::UInt8, |v| {
                v.access(AccessType::ReadWrite).enabled(Enabled::Disabled)
            })
        })
        .mib(MIB_ROUTES, "Routes", |m| {
            m.var("Table", VarType::TableBlob, |v| v.access(AccessType::ReadWrite))
        })
}
