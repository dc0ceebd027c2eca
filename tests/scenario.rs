//! End-to-end flows over the in-memory engine.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use jip_model::network::NodeSnapshot;
use jip_model::{
    ChangeKind, DeviceFilter, Error, GetFlags, Ipv4Transport, Operation, Status, Value, VarType,
};
use parking_lot::Mutex;

use common::*;

#[test]
fn test_join_then_leave_monitor_counter() {
    let context = client();
    let seen: Arc<Mutex<Vec<(ChangeKind, NodeSnapshot)>>> = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let monitor = context
        .monitor_network(move |change, node| log.lock().push((change, node.clone())))
        .unwrap();

    let key = context.engine().join(&bulb(1)).unwrap();
    context.dispatch_pending();
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, ChangeKind::Join);
        assert_eq!(seen[0].1.device_id, DIMMABLE_BULB);
        assert_eq!(seen[0].1.address, node_addr(1));
    }
    assert_eq!(monitor.changes(), 1);

    context.engine().leave(key).unwrap();
    context.dispatch_pending();
    assert_eq!(monitor.changes(), 2);
    assert_eq!(seen.lock()[1].0, ChangeKind::Leave);

    assert!(context.nodes(DeviceFilter::Any).unwrap().is_empty());
}

#[test]
fn test_connect_discover_and_control_bulb() {
    let context = client();
    context.connect(border_router()).unwrap();
    context.discover().unwrap();
    context.engine().join(&bulb(1)).unwrap();
    context.engine().join(&bulb(2)).unwrap();

    let mut walk = context.walk(DIMMABLE_BULB);
    while let Some(node) = walk.next_node() {
        let node = node.unwrap();
        let control = node.lookup_mib("BulbControl").unwrap();

        let mode = control.lookup_var("Mode").unwrap();
        assert_eq!(mode.get().unwrap(), Some(Value::UInt8(0)));
        mode.set(&Value::UInt8(1)).unwrap();

        let level = control.lookup_var("LumTarget").unwrap();
        level.set_str("0x40").unwrap();
        assert_eq!(level.get().unwrap(), Some(Value::UInt8(0x40)));
    }
    drop(walk);

    for last in [1, 2] {
        let node = context.lookup_node(&node_addr(last)).unwrap();
        let mib = context.network().lookup_mib(node, "BulbControl").unwrap();
        let mode = context.network().lookup_var(mib, "Mode").unwrap();
        assert_eq!(context.engine().remote_value(mode), Some(Value::UInt8(1)));
    }
}

#[test]
fn test_access_rules_surface_protocol_statuses() {
    let context = client();
    let node = context.engine().join(&bulb(1)).unwrap();
    let network = context.network();
    let status_mib = network.lookup_mib(node, "NodeStatus").unwrap();
    let control = network.lookup_mib(node, "BulbControl").unwrap();

    let version = network.lookup_var(status_mib, "SoftwareVersion").unwrap();
    let err = context.set_var(version, &Value::from("2.0")).unwrap_err();
    assert_eq!(err.status(), Some(Status::NoAccess));

    let hidden = network.lookup_var(control, "Hidden").unwrap();
    let err = context.get_var(hidden, GetFlags::STAY_AWAKE).unwrap_err();
    assert!(matches!(
        err,
        Error::Status {
            op: Operation::Get,
            status: Status::Disabled,
            ..
        }
    ));

    context.engine().fail_next(Operation::Get, Status::Timeout);
    let mode = network.lookup_var(control, "Mode").unwrap();
    let err = context.get_var(mode, GetFlags::NONE).unwrap_err();
    assert_eq!(
        err.to_string(),
        "get failed for [fd04:bd3:80e8:2::1]:1873: E_JIP_ERROR_TIMEOUT"
    );
}

#[test]
fn test_multicast_reaches_group_members() {
    let context = client();
    context.connect4("192.168.10.1:1873".parse().unwrap(), border_router(), Ipv4Transport::Udp)
        .unwrap();
    let group = all_bulbs_group();
    context.group_join(group).unwrap();

    let members: Vec<_> = (1..=3)
        .map(|i| context.engine().join(&bulb(i)).unwrap())
        .collect();
    context.engine().join(&bulb(4)).unwrap();
    for node in &members {
        context.engine().join_group(*node, group);
    }

    let template = {
        let mib = context.network().lookup_mib(members[0], "BulbControl").unwrap();
        context.network().lookup_var(mib, "LumTarget").unwrap()
    };
    context
        .multicast_set_var(template, &Value::UInt8(10), group, Some(4))
        .unwrap();

    let log = context.engine().multicast_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].delivered, 3);
    assert_eq!(log[0].hops, 4);
    assert_eq!(*log[0].target.ip(), group);

    let lum = |last: u16| {
        let node = context.lookup_node(&node_addr(last)).unwrap();
        let mib = context.network().lookup_mib(node, "BulbControl").unwrap();
        let var = context.network().lookup_var(mib, "LumTarget").unwrap();
        context.engine().remote_value(var)
    };
    assert_eq!(lum(2), Some(Value::UInt8(10)));
    assert_eq!(lum(4), Some(Value::UInt8(255)));
}

#[test]
fn test_table_rows() {
    let context = client();
    let node = context.engine().join(&bulb(1)).unwrap();
    let mib = context.network().lookup_mib_id(node, MIB_ROUTES).unwrap();
    let table = context.network().lookup_var(mib, "Table").unwrap();

    context.update_table_row(table, 0, &[0xfd, 0x04]).unwrap();
    context.update_table_row(table, 2, &[0x01, 0x02, 0x03]).unwrap();

    let snapshot = context.get_var(table, GetFlags::NONE).unwrap();
    assert_eq!(snapshot.ty, VarType::TableBlob);
    let value = snapshot.value().unwrap().unwrap();
    let rows = value.as_table().unwrap();
    assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(
        value.to_string(),
        "  0 { 0xfd 0x04 }\n  2 { 0x01 0x02 0x03 }"
    );

    assert!(matches!(
        context.set_var(table, &value),
        Err(Error::UnsupportedOperation { .. })
    ));
}

#[test]
fn test_table_row_update_leaves_other_rows() {
    let context = client();
    let node = context.engine().join(&bulb(1)).unwrap();
    let mib = context.network().lookup_mib_id(node, MIB_ROUTES).unwrap();
    let table = context.network().lookup_var(mib, "Table").unwrap();

    let rows: BTreeMap<u32, Bytes> = [
        (0, Bytes::from_static(&[1])),
        (1, Bytes::from_static(&[2])),
        (3, Bytes::from_static(&[3, 3])),
    ]
    .into_iter()
    .collect();
    context
        .engine()
        .update_remote(table, &Value::Table(rows.clone()))
        .unwrap();

    // No Get first: the update must build on the node's table.
    context.update_table_row(table, 1, &[9]).unwrap();
    let mut expected = rows;
    expected.insert(1, Bytes::from_static(&[9]));
    assert_eq!(
        context.engine().remote_value(table),
        Some(Value::Table(expected.clone()))
    );
    assert_eq!(
        context.get_var(table, GetFlags::NONE).unwrap().value().unwrap(),
        Some(Value::Table(expected.clone()))
    );

    let err = context.update_table_row(table, u32::MAX, &[1]).unwrap_err();
    assert!(matches!(err, Error::RowOutOfRange { row: u32::MAX, .. }));
    assert_eq!(
        context.engine().remote_value(table),
        Some(Value::Table(expected))
    );
}

#[test]
fn test_server_hosts_nodes() {
    let context = server();
    context.listen(jip_model::DEFAULT_PORT).unwrap();

    let key = context.node_add(&bulb(1)).unwrap();
    let err = context.node_add(&bulb(1)).unwrap_err();
    assert_eq!(err.status(), Some(Status::BadDeviceId));
    assert_eq!(err.target(), Some(node_addr(1)));

    let mib = context.network().lookup_mib(key, "BulbControl").unwrap();
    let mode = context.network().lookup_var(mib, "Mode").unwrap();
    context.set_var_value(mode, &Value::UInt8(5)).unwrap();
    assert_eq!(
        context.get_var(mode, GetFlags::NONE).unwrap().value().unwrap(),
        Some(Value::UInt8(5))
    );

    context.node_group_join(key, all_bulbs_group()).unwrap();
    assert!(matches!(
        context.node_group_join(key, "fd04::1".parse().unwrap()),
        Err(Error::NotMulticast { .. })
    ));
    context.node_remove(key).unwrap();
    assert_eq!(context.node_remove(key).unwrap_err().status(), Some(Status::BadDeviceId));
    assert_eq!(
        context.connect(border_router()).unwrap_err().status(),
        Some(Status::WrongContext)
    );
}
