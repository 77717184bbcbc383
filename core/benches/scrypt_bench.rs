// Scrypt benchmarks.
//
// Sweeps N at fixed r/p to show the linear time/memory trade-off, plus one
// run at the default wallet parameters.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use keystone_core::crypto::scrypt::{Scrypt, ScryptParams};

fn bench_cost_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("scrypt/log_n");
    group.sample_size(10);

    for log_n in [10u8, 12, 14] {
        let params = ScryptParams::from_log_n(log_n, 8, 1).unwrap();
        let kdf = Scrypt::new(params);

        group.throughput(Throughput::Bytes(params.memory_bytes()));
        group.bench_with_input(BenchmarkId::from_parameter(log_n), &kdf, |b, kdf| {
            b.iter(|| kdf.derive(b"correct horse battery staple", b"salt", 32).unwrap());
        });
    }

    group.finish();
}

fn bench_default_params(c: &mut Criterion) {
    let kdf = Scrypt::default();
    let mut group = c.benchmark_group("scrypt/default");
    group.sample_size(10);
    group.bench_function("N=2^14,r=8,p=8", |b| {
        b.iter(|| kdf.derive(b"correct horse battery staple", b"salt", 64).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_cost_sweep, bench_default_params);
criterion_main!(benches);
