//! Single-process sparse kernels behind an injectable capability
//!
//! The distributed layer assembles correctly laid-out CSR blocks and hands
//! the purely local step to a [`SparseBackend`]. Swapping the backend (for a
//! vendor library, or a mock in tests) does not touch the protocols.

use rayon::prelude::*;

use crate::accumulator::{create_accumulator, multiply_row};
use crate::error::{Error, Result};
use crate::matrix::{Scalar, SparseMatrixCSR};
use crate::utils::formats::{from_sprs_csr, to_sprs_csr};

/// Local sparse linear-algebra primitives
pub trait SparseBackend<T: Scalar>: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// `C = A·B` on whole local blocks; output rows sorted by column
    fn spgemm(&self, a: &SparseMatrixCSR<T>, b: &SparseMatrixCSR<T>) -> Result<SparseMatrixCSR<T>>;

    /// `Aᵀ` with sorted rows
    fn transpose(&self, a: &SparseMatrixCSR<T>) -> Result<SparseMatrixCSR<T>>;
}

fn check_product_dims<T: Scalar>(a: &SparseMatrixCSR<T>, b: &SparseMatrixCSR<T>) -> Result<()> {
    if a.n_cols != b.n_rows {
        return Err(Error::DimensionMismatch(format!(
            "cannot multiply {}x{} by {}x{}",
            a.n_rows, a.n_cols, b.n_rows, b.n_cols
        ))
        .logged());
    }
    Ok(())
}

/// Row-parallel products on the calling rayon pool
///
/// Each row goes through a dense or sort accumulator depending on the
/// output width, with one reusable accumulator per pool thread.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    /// Output column count up to which the dense accumulator is used
    pub dense_accum_threshold: usize,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self {
            dense_accum_threshold: 256,
        }
    }
}

impl<T: Scalar> SparseBackend<T> for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn spgemm(&self, a: &SparseMatrixCSR<T>, b: &SparseMatrixCSR<T>) -> Result<SparseMatrixCSR<T>> {
        check_product_dims(a, b)?;

        let threshold = self.dense_accum_threshold;
        let row_results: Vec<(Vec<usize>, Vec<T>)> = (0..a.n_rows)
            .into_par_iter()
            .map_init(
                || create_accumulator::<T>(b.n_cols, threshold),
                |acc, i| {
                    let mut cols = Vec::new();
                    let mut vals = Vec::new();
                    multiply_row(i, a, b, acc.as_mut(), &mut cols, &mut vals);
                    (cols, vals)
                },
            )
            .collect();

        let mut row_ptr = Vec::with_capacity(a.n_rows + 1);
        row_ptr.push(0);
        let mut running_nnz = 0;
        for (cols, _) in &row_results {
            running_nnz += cols.len();
            row_ptr.push(running_nnz);
        }

        let mut col_idx = Vec::with_capacity(running_nnz);
        let mut values = Vec::with_capacity(running_nnz);
        for (cols, vals) in row_results {
            col_idx.extend(cols);
            values.extend(vals);
        }

        SparseMatrixCSR::new(a.n_rows, b.n_cols, row_ptr, col_idx, values)
    }

    fn transpose(&self, a: &SparseMatrixCSR<T>) -> Result<SparseMatrixCSR<T>> {
        // Count non-zeros per column
        let mut counts = vec![0; a.n_cols];
        for &col in &a.col_idx {
            counts[col] += 1;
        }

        let row_ptr = crate::utils::exclusive_scan(&counts);
        let mut next = row_ptr.clone();
        let mut col_idx = vec![0; a.nnz()];
        let mut values = vec![T::zero(); a.nnz()];

        // Visiting rows in order keeps every output row sorted
        for i in 0..a.n_rows {
            for (col, &val) in a.row_iter(i) {
                let pos = next[col];
                col_idx[pos] = i;
                values[pos] = val;
                next[col] += 1;
            }
        }

        SparseMatrixCSR::new(a.n_cols, a.n_rows, row_ptr, col_idx, values)
    }
}

/// Delegates to the `sprs` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SprsBackend;

macro_rules! impl_sprs_backend {
    ($($t:ty),*) => {
        $(
            impl SparseBackend<$t> for SprsBackend {
                fn name(&self) -> &'static str {
                    "sprs"
                }

                fn spgemm(
                    &self,
                    a: &SparseMatrixCSR<$t>,
                    b: &SparseMatrixCSR<$t>,
                ) -> Result<SparseMatrixCSR<$t>> {
                    check_product_dims(a, b)?;
                    let product = &to_sprs_csr(a) * &to_sprs_csr(b);
                    from_sprs_csr(product)
                }

                fn transpose(&self, a: &SparseMatrixCSR<$t>) -> Result<SparseMatrixCSR<$t>> {
                    from_sprs_csr(to_sprs_csr(a).transpose_into())
                }
            }
        )*
    };
}

impl_sprs_backend!(f32, f64);
