//! Utilities for converting between our matrix formats and external libraries

use sprs::CsMat;

use crate::error::Result;
use crate::matrix::{Scalar, SparseMatrixCSR};

/// Converts our CSR matrix format to sprs CsMat format
///
/// The matrix must have sorted columns; sprs rejects anything else.
pub fn to_sprs_csr<T: Scalar>(matrix: &SparseMatrixCSR<T>) -> CsMat<T> {
    CsMat::new(
        (matrix.n_rows, matrix.n_cols),
        matrix.row_ptr.clone(),
        matrix.col_idx.clone(),
        matrix.values.clone(),
    )
}

/// Converts sprs CsMat (either storage) to our SparseMatrixCSR format
pub fn from_sprs_csr<T: Scalar>(matrix: CsMat<T>) -> Result<SparseMatrixCSR<T>> {
    // Ensure matrix is in CSR format
    let matrix = if matrix.is_csr() {
        matrix
    } else {
        matrix.to_csr()
    };

    let shape = matrix.shape();
    let (indptr, indices, data) = matrix.into_raw_storage();

    SparseMatrixCSR::new(shape.0, shape.1, indptr, indices, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprs_roundtrip() {
        let m = SparseMatrixCSR::new(
            3,
            3,
            vec![0, 2, 3, 5],
            vec![0, 1, 1, 0, 2],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .unwrap();

        let s = to_sprs_csr(&m);
        assert_eq!(s.nnz(), 5);
        assert_eq!(s.get(2, 2), Some(&5.0));

        assert_eq!(from_sprs_csr(s).unwrap(), m);
    }
}
