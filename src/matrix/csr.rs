//! Compressed Sparse Row (CSR) matrix held whole by a single process

use std::fmt;

use crate::error::{Error, Result};
use crate::matrix::Scalar;

/// A sparse matrix in Compressed Sparse Row (CSR) format
///
/// The CSR format stores a sparse matrix using three arrays:
/// - row_ptr: Array of size n_rows + 1 containing indices into col_idx and values arrays
/// - col_idx: Array of size nnz containing column indices of non-zero elements
/// - values: Array of size nnz containing the non-zero values
///
/// This is the input of the partitioner and the operand type of the local
/// sparse backend. Distributed row slices are [`DistributedCSR`](crate::DistributedCSR).
#[derive(Clone, PartialEq)]
pub struct SparseMatrixCSR<T> {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    /// Row pointers (size: n_rows + 1)
    /// row_ptr[i] is the index in col_idx and values where row i starts
    /// row_ptr[n_rows] is equal to nnz
    pub row_ptr: Vec<usize>,

    /// Column indices (size: nnz)
    pub col_idx: Vec<usize>,

    /// Non-zero values (size: nnz)
    pub values: Vec<T>,
}

impl<T: Scalar> SparseMatrixCSR<T> {
    /// Creates a new CSR matrix with the given dimensions and data
    ///
    /// # Arguments
    ///
    /// * `n_rows` - Number of rows
    /// * `n_cols` - Number of columns
    /// * `row_ptr` - Row pointers
    /// * `col_idx` - Column indices
    /// * `values` - Non-zero values
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shape`] if the input arrays are inconsistent:
    /// - row_ptr.len() must be n_rows + 1
    /// - col_idx.len() must equal values.len()
    /// - row_ptr[n_rows] must equal col_idx.len()
    ///
    /// and [`Error::ColumnOutOfRange`] if a column index is `>= n_cols`.
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        check_shape(n_rows, &row_ptr, &col_idx, values.len())?;

        for row in 0..n_rows {
            for &col in &col_idx[row_ptr[row]..row_ptr[row + 1]] {
                if col >= n_cols {
                    return Err(Error::ColumnOutOfRange {
                        row,
                        col,
                        limit: n_cols,
                    }
                    .logged());
                }
            }
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Builds a matrix from `(row, col, value)` triplets
    ///
    /// Entries are sorted by column within each row and duplicates are summed.
    pub fn from_triplets(
        n_rows: usize,
        n_cols: usize,
        triplets: &[(usize, usize, T)],
    ) -> Result<Self> {
        let mut sorted = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut row_ptr = vec![0; n_rows + 1];
        let mut col_idx = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in sorted {
            if row >= n_rows {
                return Err(Error::Shape(format!("triplet row {} >= {}", row, n_rows)).logged());
            }
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        for i in 0..n_rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        Self::new(n_rows, n_cols, row_ptr, col_idx, values)
    }

    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns an iterator over the non-zero elements in row i
    ///
    /// Each item is a tuple (col_idx, value) representing a non-zero element
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        assert!(i < self.n_rows, "Row index out of bounds");

        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];

        self.col_idx[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&col, val)| (col, val))
    }

    /// Creates an empty matrix with the given dimensions
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            row_ptr: vec![0; n_rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Self {
        Self {
            n_rows: n,
            n_cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![T::one(); n],
        }
    }

    /// Dense row-major product `y = A·x`, used as a correctness baseline
    pub fn mul_vec(&self, x: &[T]) -> Vec<T> {
        (0..self.n_rows)
            .map(|i| {
                self.row_iter(i)
                    .fold(T::zero(), |acc, (col, &val)| acc + val * x[col])
            })
            .collect()
    }

    /// Sorts the columns of every row ascending, summing duplicates
    pub fn sort_rows(&mut self) {
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        row_ptr.push(0);

        for i in 0..self.n_rows {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];
            let mut entries: Vec<(usize, T)> = self.col_idx[start..end]
                .iter()
                .copied()
                .zip(self.values[start..end].iter().copied())
                .collect();
            entries.sort_by_key(|&(col, _)| col);

            for (col, val) in entries {
                if col_idx.len() > row_ptr[i] && col_idx.last() == Some(&col) {
                    if let Some(v) = values.last_mut() {
                        *v += val;
                    }
                } else {
                    col_idx.push(col);
                    values.push(val);
                }
            }
            row_ptr.push(col_idx.len());
        }

        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.values = values;
    }
}

/// Checks the length invariants shared by every CSR container
pub(crate) fn check_shape(
    n_rows: usize,
    row_ptr: &[usize],
    col_idx: &[usize],
    n_values: usize,
) -> Result<()> {
    if row_ptr.len() != n_rows + 1 {
        return Err(Error::Shape(format!(
            "row_ptr.len() = {} but n_rows + 1 = {}",
            row_ptr.len(),
            n_rows + 1
        ))
        .logged());
    }
    if col_idx.len() != n_values {
        return Err(Error::Shape(format!(
            "col_idx.len() = {} but values.len() = {}",
            col_idx.len(),
            n_values
        ))
        .logged());
    }
    if row_ptr[n_rows] != col_idx.len() {
        return Err(Error::Shape(format!(
            "row_ptr[n_rows] = {} but nnz = {}",
            row_ptr[n_rows],
            col_idx.len()
        ))
        .logged());
    }
    if row_ptr.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::Shape("row_ptr is not monotone".to_string()).logged());
    }
    Ok(())
}

impl<T: fmt::Debug> fmt::Debug for SparseMatrixCSR<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseMatrixCSR {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.values.len())?;

        let max_rows_to_print = 5.min(self.n_rows);

        if max_rows_to_print > 0 {
            writeln!(f, "  content sample:")?;

            for i in 0..max_rows_to_print {
                write!(f, "    row {}: ", i)?;
                let start = self.row_ptr[i];
                let end = self.row_ptr[i + 1];

                if start == end {
                    writeln!(f, "(empty)")?;
                } else {
                    let max_elements = 5.min(end - start);

                    for j in start..(start + max_elements) {
                        write!(f, "({}, {:?}) ", self.col_idx[j], self.values[j])?;
                    }

                    if end - start > max_elements {
                        write!(f, "... ({} more)", end - start - max_elements)?;
                    }

                    writeln!(f)?;
                }
            }

            if self.n_rows > max_rows_to_print {
                writeln!(f, "    ... ({} more rows)", self.n_rows - max_rows_to_print)?;
            }
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matrix() {
        let matrix = SparseMatrixCSR::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        assert_eq!(matrix.n_rows, 3);
        assert_eq!(matrix.n_cols, 3);
        assert_eq!(matrix.nnz(), 5);
    }

    #[test]
    fn test_row_iter() {
        let matrix = SparseMatrixCSR::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        let row0: Vec<_> = matrix.row_iter(0).collect();
        assert_eq!(row0, vec![(0, &1.0), (1, &2.0)]);

        let row2: Vec<_> = matrix.row_iter(2).collect();
        assert_eq!(row2, vec![(0, &4.0), (2, &5.0)]);
    }

    #[test]
    fn test_identity() {
        let identity = SparseMatrixCSR::<f64>::identity(3);

        assert_eq!(identity.row_ptr, vec![0, 1, 2, 3]);
        assert_eq!(identity.col_idx, vec![0, 1, 2]);
        assert_eq!(identity.values, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_invalid_row_ptr() {
        let result = SparseMatrixCSR::new(
            3,
            3,
            vec![0, 2, 3], // Missing last element
            vec![0, 1, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        );
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn test_column_out_of_bounds() {
        let result = SparseMatrixCSR::new(2, 2, vec![0, 1, 2], vec![0, 2], vec![1.0, 1.0]);
        assert!(matches!(
            result,
            Err(Error::ColumnOutOfRange { row: 1, col: 2, limit: 2 })
        ));
    }

    #[test]
    fn test_from_triplets_merges_duplicates() {
        let m = SparseMatrixCSR::from_triplets(
            2,
            3,
            &[(1, 2, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 2, 4.0)],
        )
        .unwrap();

        assert_eq!(m.row_ptr, vec![0, 1, 3]);
        assert_eq!(m.col_idx, vec![1, 0, 2]);
        assert_eq!(m.values, vec![2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_sort_rows() {
        let mut m = SparseMatrixCSR {
            n_rows: 2,
            n_cols: 4,
            row_ptr: vec![0, 3, 4],
            col_idx: vec![3, 0, 3, 1],
            values: vec![1.0, 2.0, 3.0, 4.0],
        };
        m.sort_rows();

        assert_eq!(m.row_ptr, vec![0, 2, 3]);
        assert_eq!(m.col_idx, vec![0, 3, 1]);
        assert_eq!(m.values, vec![2.0, 4.0, 4.0]);
    }
}
