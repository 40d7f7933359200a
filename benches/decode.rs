extern crate parcelscope;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use parcelscope::{
    codec::{AndroidVersion, ParcelCodec},
    source::{AidlParser, SourceParser},
    Loader,
};

const SOURCE: &str = r#"
package bench;

parcelable Entry {
    int id;
    String label;
    long[] stamps;
    @nullable Entry next;
}

interface IStore {
    void put(in Entry entry, in List<String> tags, int flags);
}
"#;

fn string16(out: &mut Vec<u8>, value: &str) {
    let units: Vec<u16> = value.encode_utf16().collect();
    out.extend_from_slice(&(units.len() as i32).to_le_bytes());
    for unit in units.iter().chain(std::iter::once(&0)) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// A structured `Entry` whose `next` chain is `depth` entries long, size prefix included.
fn entry(depth: usize) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(depth as i32).to_le_bytes());
    string16(&mut body, "entry label");
    body.extend_from_slice(&4i32.to_le_bytes());
    for stamp in 0..4i64 {
        body.extend_from_slice(&stamp.to_le_bytes());
    }
    if depth > 1 {
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend(entry(depth - 1));
    } else {
        body.extend_from_slice(&0i32.to_le_bytes());
    }

    let mut out = ((body.len() + 4) as i32).to_le_bytes().to_vec();
    out.extend(body);
    out
}

/// A `put` request holding a chain of `depth` entries.
fn request(depth: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for word in [0u32, u32::MAX, 0x5359_5354] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    string16(&mut out, "bench.IStore");

    out.extend_from_slice(&1i32.to_le_bytes());
    out.extend(entry(depth));

    out.extend_from_slice(&2i32.to_le_bytes());
    string16(&mut out, "alpha");
    string16(&mut out, "beta");
    out.extend_from_slice(&7i32.to_le_bytes());
    out
}

fn bench_decode(c: &mut Criterion) {
    let loader = Loader::new();
    for unit in AidlParser
        .parse("bench/IStore.aidl".as_ref(), SOURCE)
        .expect("benchmark source parses")
    {
        loader.insert_unit(unit);
    }
    loader.get_or_compile("bench.IStore").expect("benchmark source compiles");

    let codec = ParcelCodec::new(&loader, AndroidVersion(12));
    let mut group = c.benchmark_group("decode_request");
    for depth in [1, 16, 256] {
        let data = request(depth);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(format!("chain_{depth}"), |b| {
            b.iter(|| black_box(codec.decode_request(black_box(&data), 1, None)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
