//! Sort-based accumulator implementation for SpGEMM
//!
//! Collects intermediate products in an unsorted list, then sorts and merges
//! duplicate entries. Preferred when the output is wide and rows are short.

use crate::accumulator::Accumulator;
use crate::matrix::Scalar;

/// Sort-based accumulator for a single row of sparse matrix multiplication
pub struct SortAccumulator<T> {
    /// Temporary storage for intermediate products
    entries: Vec<(usize, T)>,
}

impl<T: Scalar> SortAccumulator<T> {
    /// Create a new sort-based accumulator
    ///
    /// # Arguments
    ///
    /// * `initial_capacity` - Initial capacity for the temporary storage
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(initial_capacity),
        }
    }
}

impl<T: Scalar> Accumulator<T> for SortAccumulator<T> {
    fn accumulate(&mut self, col: usize, val: T) {
        self.entries.push((col, val));
    }

    fn drain_into(&mut self, cols: &mut Vec<usize>, vals: &mut Vec<T>) {
        // Stable, so duplicates are summed in arrival order
        self.entries.sort_by_key(|&(col, _)| col);

        let mut iter = self.entries.drain(..);
        if let Some((mut current_col, mut current_val)) = iter.next() {
            for (col, val) in iter {
                if col == current_col {
                    current_val += val;
                } else {
                    cols.push(current_col);
                    vals.push(current_val);
                    current_col = col;
                    current_val = val;
                }
            }
            cols.push(current_col);
            vals.push(current_val);
        }
    }
}
