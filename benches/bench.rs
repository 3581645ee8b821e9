use async_ketama::{Continuum, Ketama, MemoryCache, ServerInfo};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tokio::runtime::Runtime;

const HASHES: usize = 500;

fn servers(count: usize) -> Vec<ServerInfo> {
    (0..count)
        .map(|i| ServerInfo::new(format!("10.0.1.{}:11211", i + 1), 100 + i as u32 * 50).unwrap())
        .collect()
}

fn bench_build(c: &mut Criterion) {
    for count in [3, 10, 50] {
        let servers = servers(count);
        c.bench_function(&format!("build_{}_servers", count), |b| {
            b.iter(|| Continuum::build(&servers, 0).unwrap())
        });
    }
}

fn bench_lookup(c: &mut Criterion) {
    let continuum = Continuum::build(&servers(10), 0).unwrap();
    let keys = (0..HASHES).map(|i| i.to_string()).collect::<Vec<_>>();

    c.bench_function("lookup_500_keys", |b| {
        b.iter(|| {
            for key in &keys {
                let _ = continuum.server_for(key);
            }
        })
    });
}

fn bench_deserialize(c: &mut Criterion) {
    let data = Continuum::build(&servers(10), 0).unwrap().serialize();

    c.bench_function("deserialize_10_servers", |b| {
        b.iter(|| Continuum::deserialize(&data).unwrap())
    });
}

// Mirrors the classic ketama benchmark: fetch the continuum, then hash 500 keys against it.
fn bench_cached_continuum(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let servers = servers(10);
    let keys = (0..HASHES).map(|i| i.to_string()).collect::<Vec<_>>();

    c.bench_function("cached_continuum_500_keys", |b| {
        b.iter_batched(
            || {
                let mut ketama = Ketama::new(MemoryCache::new());
                rt.block_on(ketama.continuum_from_servers(&servers, "bench", 1))
                    .unwrap();
                ketama
            },
            |mut ketama| {
                let continuum = rt
                    .block_on(ketama.continuum_from_servers(&servers, "bench", 1))
                    .unwrap();
                for key in &keys {
                    let _ = continuum.server_for(key);
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_lookup,
    bench_deserialize,
    bench_cached_continuum
);
criterion_main!(benches);
