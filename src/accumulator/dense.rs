//! Dense accumulator implementation for SpGEMM
//!
//! Used when the output row is narrow enough that a full-width scratch array
//! stays in cache.

use crate::accumulator::Accumulator;
use crate::matrix::Scalar;

/// Dense accumulator for a single row of sparse matrix multiplication
pub struct DenseAccumulator<T> {
    /// The dense accumulation array
    values: Vec<T>,

    /// Flags to track which positions in the dense array are non-zero
    occupied: Vec<bool>,

    /// Temporary storage for the column indices of non-zero elements
    col_indices: Vec<usize>,
}

impl<T: Scalar> DenseAccumulator<T> {
    /// Create a new dense accumulator with specified column capacity
    ///
    /// # Arguments
    ///
    /// * `n_cols` - The number of columns in the output matrix (C)
    pub fn new(n_cols: usize) -> Self {
        Self {
            values: vec![T::zero(); n_cols],
            occupied: vec![false; n_cols],
            col_indices: Vec::new(),
        }
    }
}

impl<T: Scalar> Accumulator<T> for DenseAccumulator<T> {
    fn accumulate(&mut self, col: usize, val: T) {
        if !self.occupied[col] {
            // First time seeing this column, mark it and add to indices
            self.occupied[col] = true;
            self.col_indices.push(col);
            self.values[col] = val;
        } else {
            self.values[col] += val;
        }
    }

    fn drain_into(&mut self, cols: &mut Vec<usize>, vals: &mut Vec<T>) {
        self.col_indices.sort_unstable();

        for &col in &self.col_indices {
            cols.push(col);
            vals.push(self.values[col]);
            self.occupied[col] = false;
        }

        self.col_indices.clear();
    }
}
