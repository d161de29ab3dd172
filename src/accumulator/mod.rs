//! Row accumulators for sparse matrix-matrix products
//!
//! A product row `C[i, :] = Σ_k A[i, k] · B[k, :]` is built by feeding every
//! intermediate product into an accumulator, which merges duplicate columns
//! and hands back the row sorted by column.

pub mod dense;
pub mod sort;

pub use dense::DenseAccumulator;
pub use sort::SortAccumulator;

use crate::matrix::{Scalar, SparseMatrixCSR};

/// Trait for accumulators that handle intermediate products in SpGEMM
///
/// Accumulators are reusable: [`Accumulator::drain_into`] leaves them empty
/// and ready for the next row without releasing their storage.
pub trait Accumulator<T: Scalar>: Send {
    /// Accumulate a single entry (column and value)
    fn accumulate(&mut self, col: usize, val: T);

    /// Appends the merged entries, sorted by column, and resets
    fn drain_into(&mut self, cols: &mut Vec<usize>, vals: &mut Vec<T>);
}

/// Create an appropriate accumulator for the output width
///
/// Outputs with at most `dense_threshold` columns use a dense array,
/// wider ones collect and sort.
pub fn create_accumulator<T: Scalar>(n_cols: usize, dense_threshold: usize) -> Box<dyn Accumulator<T>> {
    if n_cols <= dense_threshold {
        Box::new(DenseAccumulator::new(n_cols))
    } else {
        let initial_capacity = std::cmp::min(n_cols / 10, 1024);
        Box::new(SortAccumulator::new(initial_capacity))
    }
}

/// Multiplies row `a_row` of `a` with `b` through `accumulator`
///
/// The merged row is appended to `cols`/`vals`.
pub fn multiply_row<T: Scalar>(
    a_row: usize,
    a: &SparseMatrixCSR<T>,
    b: &SparseMatrixCSR<T>,
    accumulator: &mut dyn Accumulator<T>,
    cols: &mut Vec<usize>,
    vals: &mut Vec<T>,
) {
    for (b_row, &a_val) in a.row_iter(a_row) {
        for (b_col, &b_val) in b.row_iter(b_row) {
            accumulator.accumulate(b_col, a_val * b_val);
        }
    }
    accumulator.drain_into(cols, vals);
}
