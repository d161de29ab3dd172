//! Shared fixtures for the integration tests

#![allow(dead_code)]

use halo_csr::SparseMatrixCSR;

/// Routes `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `tridiag(-1, 2, -1)` of order `n`
pub fn tridiagonal(n: usize) -> SparseMatrixCSR<f64> {
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        triplets.push((i, i, 2.0));
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    SparseMatrixCSR::from_triplets(n, n, &triplets).unwrap()
}

/// 5-point Laplacian on a `k × k` grid
pub fn laplacian_2d(k: usize) -> SparseMatrixCSR<f64> {
    let n = k * k;
    let mut triplets = Vec::with_capacity(5 * n);
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
    SparseMatrixCSR::from_triplets(n, n, &triplets).unwrap()
}

/// Deterministic pseudo-random pattern with a full diagonal
///
/// Row `i` gets the diagonal plus `per_row` columns from a linear
/// congruential sequence seeded by `seed`.
pub fn scattered(n: usize, m: usize, per_row: usize, seed: u64) -> SparseMatrixCSR<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };

    let mut triplets = Vec::new();
    for i in 0..n {
        if i < m {
            triplets.push((i, i, 10.0));
        }
        for _ in 0..per_row {
            let j = (next() as usize) % m;
            let v = ((next() % 19) as f64 - 9.0) / 4.0;
            triplets.push((i, j, v));
        }
    }
    SparseMatrixCSR::from_triplets(n, m, &triplets).unwrap()
}

/// Dense row-major copy of a whole matrix
pub fn dense(a: &SparseMatrixCSR<f64>) -> Vec<Vec<f64>> {
    let mut out = vec![vec![0.0; a.n_cols]; a.n_rows];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, &v) in a.row_iter(i) {
            row[j] += v;
        }
    }
    out
}

pub fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (k, (g, w)) in got.iter().zip(want).enumerate() {
        assert!(
            (g - w).abs() <= tol * (1.0 + w.abs()),
            "entry {}: got {}, expected {}",
            k,
            g,
            w
        );
    }
}
