//! Benchmarks for value marshalling and network traversal.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use jip_model::codec::{self, Table};
use jip_model::engine::MemoryEngine;
use jip_model::network::NodeSpec;
use jip_model::{AccessType, Context, DeviceFilter, Value, VarType};

fn bench_scalar(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar");
    let cases = [
        ("u8", VarType::UInt8, Value::UInt8(200)),
        ("i32", VarType::Int32, Value::Int32(-123_456)),
        ("f64", VarType::Float64, Value::Float64(21.5)),
        ("string", VarType::String, Value::from("dimmable bulb")),
    ];
    for (name, ty, value) in cases {
        let raw = codec::encode(ty, &value).unwrap();
        group.bench_function(BenchmarkId::new("encode", name), |b| {
            b.iter(|| codec::encode(ty, black_box(&value)))
        });
        group.bench_function(BenchmarkId::new("decode", name), |b| {
            b.iter(|| codec::decode(ty, black_box(&raw)))
        });
    }
    group.finish();
}

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_decode");
    for rows in [8u32, 64, 256] {
        let table = Table::from_rows((0..rows).map(|i| vec![i as u8; 16]));
        let raw = table.to_raw();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &raw, |b, raw| {
            b.iter(|| codec::decode(VarType::TableBlob, black_box(raw)))
        });
    }
    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    for nodes in [16u16, 128] {
        let context = Context::client().build(MemoryEngine::new()).unwrap();
        for i in 1..=nodes {
            let address = format!("[fd04::{:x}]:1873", i).parse().unwrap();
            let spec = NodeSpec::new(address, 0x8010_0001).mib(0xfffffe02, "BulbControl", |m| {
                m.var("Mode", VarType::UInt8, |v| v.access(AccessType::ReadWrite).initial(0u8))
            });
            context.engine().join(&spec).unwrap();
        }
        group.throughput(Throughput::Elements(nodes.into()));
        group.bench_with_input(BenchmarkId::new("walk", nodes), &context, |b, context| {
            b.iter(|| {
                let mut walk = context.walk(DeviceFilter::Any);
                let mut visited = 0;
                while let Some(node) = walk.next_node() {
                    visited += node.map(|n| n.mibs().count()).unwrap_or(0);
                }
                visited
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scalar, bench_table, bench_traversal);
criterion_main!(benches);
