//! Row partitioning of a whole matrix across a worker group

use std::ops::Range;

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::{DistributedCSR, Scalar, SparseMatrixCSR};

/// Contiguous row ranges of every worker
///
/// `offsets[p]..offsets[p + 1]` are the global rows owned by worker `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPartition {
    offsets: Vec<usize>,
}

impl RowPartition {
    /// Splits `n` rows into `procs` near-equal ranges, the remainder going to
    /// the first ranges
    pub fn even(n: usize, procs: usize) -> Result<Self> {
        if procs == 0 || procs > n {
            return Err(Error::Partition { rows: n, procs }.logged());
        }

        let base = n / procs;
        let extra = n % procs;
        let mut offsets = Vec::with_capacity(procs + 1);
        offsets.push(0);
        for p in 0..procs {
            let len = base + usize::from(p < extra);
            offsets.push(offsets[p] + len);
        }

        Ok(Self { offsets })
    }

    /// Builds a partition from explicit offsets
    pub fn from_offsets(offsets: Vec<usize>) -> Result<Self> {
        if offsets.len() < 2 || offsets[0] != 0 || offsets.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::Shape(format!("invalid partition offsets {:?}", offsets)).logged());
        }
        Ok(Self { offsets })
    }

    /// Learns every worker's row range with one all-gather
    pub fn gather<C: Communicator>(comm: &C, row_shift: usize, n: usize) -> Result<Self> {
        let ranges = comm.all_gather((row_shift, n))?;
        let mut offsets = Vec::with_capacity(ranges.len() + 1);
        offsets.push(0);
        for (rank, &(shift, len)) in ranges.iter().enumerate() {
            if shift != offsets[rank] {
                return Err(Error::Shape(format!(
                    "worker {} starts at row {}, expected {}",
                    rank, shift, offsets[rank]
                ))
                .logged());
            }
            offsets.push(shift + len);
        }
        Ok(Self { offsets })
    }

    /// Number of workers
    pub fn procs(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of rows
    pub fn rows(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Global rows of worker `rank`
    pub fn range(&self, rank: usize) -> Range<usize> {
        self.offsets[rank]..self.offsets[rank + 1]
    }

    /// Worker owning global row `row`, if any
    pub fn owner_of(&self, row: usize) -> Option<usize> {
        if row >= self.rows() {
            return None;
        }
        // Last offset <= row; empty ranges are skipped by taking the last one
        Some(self.offsets.partition_point(|&o| o <= row) - 1)
    }

    /// The raw offsets table
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}

/// Splits a whole matrix into `procs` row-contiguous slices
///
/// The input is not modified. Slice `p` records its first global row in
/// `row_shift` and keeps global column indices.
///
/// # Errors
///
/// [`Error::Partition`] if `procs` is zero or exceeds the row count.
pub fn split<T: Scalar>(matrix: &SparseMatrixCSR<T>, procs: usize) -> Result<Vec<DistributedCSR<T>>> {
    let partition = RowPartition::even(matrix.n_rows, procs)?;
    split_with(matrix, &partition)
}

/// Splits a whole matrix along an explicit partition
pub fn split_with<T: Scalar>(
    matrix: &SparseMatrixCSR<T>,
    partition: &RowPartition,
) -> Result<Vec<DistributedCSR<T>>> {
    if partition.rows() != matrix.n_rows {
        return Err(Error::DimensionMismatch(format!(
            "partition covers {} rows, matrix has {}",
            partition.rows(),
            matrix.n_rows
        ))
        .logged());
    }

    (0..partition.procs())
        .map(|p| {
            let rows = partition.range(p);
            let start = matrix.row_ptr[rows.start];
            let end = matrix.row_ptr[rows.end];

            let row: Vec<usize> = matrix.row_ptr[rows.start..=rows.end]
                .iter()
                .map(|&r| r - start)
                .collect();

            DistributedCSR::new(
                rows.len(),
                matrix.n_cols,
                matrix.n_rows,
                rows.start,
                row,
                matrix.col_idx[start..end].to_vec(),
                matrix.values[start..end].to_vec(),
            )
        })
        .collect()
}

/// Concatenates row slices (in rank order) back into a whole matrix
pub fn gather_matrix<T: Scalar>(parts: &[DistributedCSR<T>]) -> Result<SparseMatrixCSR<T>> {
    let first = parts
        .first()
        .ok_or_else(|| Error::Shape("no parts to gather".to_string()).logged())?;

    let mut row_ptr = vec![0];
    let mut col_idx = Vec::new();
    let mut values = Vec::new();
    let mut next_row = 0;

    for part in parts {
        if part.row_shift != next_row || part.m != first.m {
            return Err(Error::Shape(format!(
                "part starting at row {} does not follow row {}",
                part.row_shift, next_row
            ))
            .logged());
        }
        let base = col_idx.len();
        row_ptr.extend(part.row_ptr()[1..].iter().map(|&r| r + base));
        col_idx.extend_from_slice(part.col());
        values.extend_from_slice(part.val());
        next_row += part.n;
    }

    SparseMatrixCSR::new(next_row, first.m, row_ptr, col_idx, values)
}
