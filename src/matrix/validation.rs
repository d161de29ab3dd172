//! Structural invariant checks
//!
//! Halo matching binary-searches column ranges, so every algorithm that
//! builds a communication plan calls these first when input checks are on.

use crate::error::{Error, Result};
use crate::matrix::{DistributedCSR, Scalar};

/// Fails on the first row whose columns are not strictly ascending
pub fn check_columns_order<T: Scalar>(a: &DistributedCSR<T>) -> Result<()> {
    for i in 0..a.n {
        let (cols, _) = a.row_slices(i);
        if let Some(pos) = cols.windows(2).position(|w| w[0] >= w[1]) {
            return Err(Error::UnsortedColumns {
                row: a.row_shift + i,
                position: pos + 1,
                prev: cols[pos],
                next: cols[pos + 1],
            }
            .logged());
        }
    }
    Ok(())
}

/// Full structural check: monotone row pointers, sorted in-range columns,
/// and optionally a diagonal entry in every row
///
/// The diagonal of local row `i` is global column `row_shift + i`.
pub fn check_matrix<T: Scalar>(a: &DistributedCSR<T>, check_diagonal: bool) -> Result<()> {
    let row = a.row_ptr();
    if row.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::Shape("row pointers are not monotone".to_string()).logged());
    }

    check_columns_order(a)?;

    for i in 0..a.n {
        let (cols, _) = a.row_slices(i);
        if let Some(&col) = cols.last() {
            if col >= a.m {
                return Err(Error::ColumnOutOfRange {
                    row: a.row_shift + i,
                    col,
                    limit: a.m,
                }
                .logged());
            }
        }
        if check_diagonal && cols.binary_search(&(a.row_shift + i)).is_err() {
            return Err(Error::MissingDiagonal {
                row: a.row_shift + i,
            }
            .logged());
        }
    }

    Ok(())
}

/// Checks that a matching is an involution: `v[v[i]] == i` for every `i`
///
/// `v[i] == i` marks an unmatched entry.
pub fn check_matching(v: &[usize]) -> Result<()> {
    for (i, &j) in v.iter().enumerate() {
        if j >= v.len() || v[j] != i {
            return Err(Error::Matching { index: i }.logged());
        }
    }
    Ok(())
}
