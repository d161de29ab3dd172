//! Benchmarks for local and distributed sparse matrix multiplication

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use halo_csr::kernels::spgemm;
use halo_csr::matrix::split;
use halo_csr::{
    Communicator, EngineConfig, NativeBackend, SparseBackend, SparseMatrixCSR, SprsBackend, ThreadGroup,
    Worker,
};

/// 5-point Laplacian on a `k × k` grid
fn laplacian_2d(k: usize) -> SparseMatrixCSR<f64> {
    let mut triplets = Vec::with_capacity(5 * k * k);
    for r in 0..k {
        for c in 0..k {
            let i = r * k + c;
            triplets.push((i, i, 4.0));
            if r > 0 {
                triplets.push((i, i - k, -1.0));
            }
            if r + 1 < k {
                triplets.push((i, i + k, -1.0));
            }
            if c > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if c + 1 < k {
                triplets.push((i, i + 1, -1.0));
            }
        }
    }
    SparseMatrixCSR::from_triplets(k * k, k * k, &triplets).unwrap()
}

fn bench_backends(c: &mut Criterion) {
    let a = laplacian_2d(120);
    let mut group = c.benchmark_group("spgemm_backend");
    group.sample_size(20);

    let native = NativeBackend::default();
    group.bench_function("native", |bench| {
        bench.iter(|| SparseBackend::<f64>::spgemm(&native, black_box(&a), black_box(&a)).unwrap())
    });
    group.bench_function("sprs", |bench| {
        bench.iter(|| SparseBackend::<f64>::spgemm(&SprsBackend, black_box(&a), black_box(&a)).unwrap())
    });
    group.finish();
}

fn bench_distributed(c: &mut Criterion) {
    let whole = laplacian_2d(120);
    let mut group = c.benchmark_group("spgemm_distributed");
    group.sample_size(10);

    for procs in [1, 2, 4] {
        let parts = split(&whole, procs).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(procs), &procs, |bench, &procs| {
            bench.iter(|| {
                ThreadGroup::run(procs, |comm| {
                    let worker = Worker::new(comm, EngineConfig::default().with_threads(1)).unwrap();
                    let mut a = parts[comm.rank()].copy_to_device();
                    let b = a.clone();
                    // Second product reuses the cached rows-to-get plan
                    let first = spgemm(&worker, &mut a, &b, false, false).unwrap();
                    let second = spgemm(&worker, &mut a, &b, false, false).unwrap();
                    black_box((first.nnz(), second.nnz()))
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_backends, bench_distributed);
criterion_main!(benches);
