//! Performance benchmarks for xshm
//!
//! Run with: cargo bench --package xshm-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::SystemTime;
use xshm_core::{ElementType, ShmManager};

fn unique_name() -> String {
    let ts = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("/xshm_bench_{}", ts)
}

fn bench_keyed_create_destroy(c: &mut Criterion) {
    let shm = ShmManager::new();
    c.bench_function("keyed_create_destroy", |b| {
        b.iter(|| {
            let seg = shm.create(4096, ElementType::RawBytes).unwrap();
            let key = seg.key().unwrap();
            shm.destroy(black_box(key)).unwrap();
        });
    });
}

fn bench_named_create_destroy(c: &mut Criterion) {
    let shm = ShmManager::new();
    c.bench_function("named_create_destroy", |b| {
        b.iter(|| {
            let name = unique_name();
            shm.create_named(&name, 4096, ElementType::RawBytes)
                .unwrap()
                .unwrap();
            shm.destroy(black_box(name.as_str())).unwrap();
        });
    });
}

fn bench_get_attach(c: &mut Criterion) {
    let owner = ShmManager::new();
    let seg = owner.create(4096, ElementType::RawBytes).unwrap();
    let key = seg.key().unwrap();

    c.bench_function("get_attach_detach", |b| {
        b.iter(|| {
            let shm = ShmManager::new();
            let view = shm.get(key, ElementType::RawBytes).unwrap().unwrap();
            black_box(view.byte_len());
            shm.detach(key).unwrap();
        });
    });
}

fn bench_write_read(c: &mut Criterion) {
    let shm = ShmManager::new();
    let mut group = c.benchmark_group("write_read");

    for size in [1024usize, 4096, 65536].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut seg = shm.create(size, ElementType::RawBytes).unwrap();
            let data = vec![42u8; size];

            b.iter(|| {
                let slice = seg.bytes_mut().unwrap();
                slice.copy_from_slice(&data);

                let slice = seg.bytes().unwrap();
                let sum: u64 = slice.iter().map(|&x| x as u64).sum();
                black_box(sum);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_keyed_create_destroy,
    bench_named_create_destroy,
    bench_get_attach,
    bench_write_read
);
criterion_main!(benches);
