//! Distributed SpMV variants against the whole-matrix product

mod common;

use common::{assert_close, init_logging, laplacian_2d, scattered, tridiagonal};
use halo_csr::kernels::{prolongation_spmv, shifted_spmv, spmv, spmv_full, spmv_transposed};
use halo_csr::matrix::{split, split_with};
use halo_csr::{
    Communicator, DistributedCSR, EngineConfig, RowPartition, SelfComm, SparseMatrixCSR, ThreadGroup, Worker,
};
use proptest::prelude::*;

/// Runs `y = alpha·A·x + beta·y0` on `procs` workers and concatenates `y`
fn distributed_product(
    whole: &SparseMatrixCSR<f64>,
    procs: usize,
    x: &[f64],
    y0: &[f64],
    alpha: f64,
    beta: f64,
    config: EngineConfig,
) -> Vec<f64> {
    let parts = split(whole, procs).unwrap();
    ThreadGroup::run(procs, |comm| {
        let worker = Worker::new(comm, config.clone()).unwrap();
        let mut a = parts[comm.rank()].copy_to_device();
        let rows = a.global_rows();
        let mut y = y0[rows.clone()].to_vec();
        spmv(&worker, &mut a, &x[rows], &mut y, alpha, beta).unwrap();
        y
    })
    .concat()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_spmv_independent_of_worker_count(
        n in 4usize..48,
        per_row in 0usize..6,
        seed in any::<u64>(),
        procs in 1usize..5,
    ) {
        let procs = procs.min(n);
        let whole = scattered(n, n, per_row, seed);
        let x: Vec<f64> = (0..n).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        let y0: Vec<f64> = (0..n).map(|i| i as f64).collect();

        let mut expected = whole.mul_vec(&x);
        for (e, &y) in expected.iter_mut().zip(&y0) {
            *e = 0.5 * *e + 2.0 * y;
        }

        let config = EngineConfig::default().with_threads(1);
        let got = distributed_product(&whole, procs, &x, &y0, 0.5, 2.0, config.clone());
        assert_close(&got, &expected, 1e-12);

        let serial = distributed_product(&whole, procs, &x, &y0, 0.5, 2.0, config.with_overlap(false));
        assert_close(&serial, &expected, 1e-12);
    }
}

#[test]
fn test_repeated_products_are_reproducible() {
    init_logging();
    let whole = laplacian_2d(7);
    let x: Vec<f64> = (0..whole.n_rows).map(|i| 1.0 / (1.0 + i as f64)).collect();
    let y0 = vec![0.0; whole.n_rows];
    let config = EngineConfig::default().with_threads(3);

    let first = distributed_product(&whole, 4, &x, &y0, 1.0, 0.0, config.clone());
    for _ in 0..3 {
        let again = distributed_product(&whole, 4, &x, &y0, 1.0, 0.0, config.clone());
        assert_eq!(again, first);
    }
}

#[test]
fn test_beta_zero_ignores_garbage_in_y() {
    let whole = tridiagonal(8);
    let x = vec![1.0; 8];
    let y0 = vec![f64::NAN; 8];
    let got = distributed_product(&whole, 2, &x, &y0, 1.0, 0.0, EngineConfig::default().with_threads(1));
    assert_eq!(got, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_full_vector_needs_no_halo() {
    let whole = tridiagonal(6);
    let parts = split(&whole, 3).unwrap();
    let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
    let expected = whole.mul_vec(&x);

    let results = ThreadGroup::run(3, |comm| {
        let worker = Worker::new(comm, EngineConfig::default().with_threads(1)).unwrap();
        let a = parts[comm.rank()].copy_to_device();
        let mut y = vec![0.0; a.n];
        spmv_full(&worker, &a, &x, &mut y, 1.0, 0.0).unwrap();
        assert!(a.halo_info().is_none());
        y
    });
    assert_eq!(results.concat(), expected);
}

#[test]
fn test_worker_without_rows_takes_part_in_the_exchange() {
    init_logging();
    // Worker 0 owns no rows, worker 1 owns all four
    let whole = tridiagonal(4);
    let partition = RowPartition::from_offsets(vec![0, 0, 4]).unwrap();
    let parts = split_with(&whole, &partition).unwrap();
    let x = vec![1.0, 2.0, 3.0, 4.0];
    let expected = whole.mul_vec(&x);

    let results = ThreadGroup::run(2, |comm| {
        let worker = Worker::new(comm, EngineConfig::default().with_threads(1)).unwrap();
        let mut a = parts[comm.rank()].copy_to_device();
        let rows = a.global_rows();
        let mut y = vec![0.0; a.n];
        spmv(&worker, &mut a, &x[rows], &mut y, 1.0, 0.0).map(|_| y)
    });

    let y: Vec<f64> = results.into_iter().flat_map(|r| r.unwrap()).collect();
    assert_eq!(y, expected);
}

#[test]
fn test_transposed_product_matches_transpose() {
    let whole = scattered(10, 10, 3, 42);
    let x: Vec<f64> = (0..10).map(|i| (i as f64).sin()).collect();

    // Reference: explicit Aᵀ·x
    let mut expected = vec![0.0; 10];
    for i in 0..10 {
        for (j, &v) in whole.row_iter(i) {
            expected[j] += v * x[i];
        }
    }

    for procs in [1, 2, 3] {
        let parts = split(&whole, procs).unwrap();
        let got = ThreadGroup::run(procs, |comm| {
            let worker = Worker::new(comm, EngineConfig::default().with_threads(1)).unwrap();
            let a = parts[comm.rank()].copy_to_device();
            let rows = a.global_rows();
            let mut y = vec![0.0; a.n];
            spmv_transposed(&worker, &a, &x[rows], &mut y, 1.0, 0.0).unwrap();
            y
        })
        .concat();
        assert_close(&got, &expected, 1e-12);
    }
}

#[test]
fn test_shifted_and_prolongation_products() {
    let comm = SelfComm;
    let worker = Worker::new(&comm, EngineConfig::default().with_threads(2)).unwrap();

    // Columns 4..6 of a level that lives inside a larger vector
    let a = DistributedCSR::new(2, 6, 2, 0, vec![0, 2, 3], vec![4, 5, 5], vec![1.0, 2.0, 3.0])
        .unwrap()
        .into_device();
    let window = vec![10.0, 20.0];
    let mut y = vec![0.0; 2];
    shifted_spmv(&worker, &a, &window, &mut y, 4, 1.0, 0.0).unwrap();
    assert_eq!(y, vec![50.0, 60.0]);

    // Piecewise-constant prolongation from 2 aggregates to 4 fine rows
    let p = DistributedCSR::new(4, 2, 4, 0, vec![0, 1, 2, 3, 4], vec![0, 0, 1, 1], vec![1.0; 4])
        .unwrap()
        .into_device();
    let mut fine = vec![0.0; 4];
    prolongation_spmv(&worker, &p, &[3.0, -1.0], &mut fine).unwrap();
    assert_eq!(fine, vec![3.0, 3.0, -1.0, -1.0]);
}
