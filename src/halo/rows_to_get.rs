//! Row-granular fetch plan for distributed matrix-matrix products
//!
//! For `C = A·B` with both operands row-distributed, local row `i` of `A`
//! needs every row `k` of `B` for which `A[i, k] != 0`. Rows of `B` owned by
//! other workers are fetched whole:
//!
//! 1. discovery: collect the distinct remote rows and group them by owner
//! 2. round one: send the row ids, receive each row's non-zero count
//! 3. round two (every product): receive the rows' columns and values
//!
//! Round two reuses the counts from round one, so the plan is only valid
//! while neither operand's pattern changes.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::validation::check_columns_order;
use crate::matrix::{DistributedCSR, RowPartition, Scalar};
use crate::utils::{exclusive_scan, split_by_counts};

/// Remote rows of the right operand, concatenated in `whichprow` order
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedRows<T> {
    /// Row pointers into `col`/`val` (length rows + 1)
    pub row_ptr: Vec<usize>,
    /// Global column indices
    pub col: Vec<usize>,
    /// Values
    pub val: Vec<T>,
}

/// Cached plan for fetching remote rows of a product's right operand
#[derive(Debug, Clone)]
pub struct RowsToGetInfo {
    /// Prefix sums of the non-zero counts of the received rows
    pub nnz_per_row_shift: Vec<usize>,
    /// Number of remote rows received
    pub rows2bereceived: usize,
    /// Total number of non-zeros received
    pub countall: usize,
    /// Requested global rows, grouped by owner, ascending
    pub whichprow: Vec<usize>,
    /// Rows requested from each worker
    pub rcounts: Vec<usize>,
    /// Offsets into `whichprow` per worker (length procs + 1)
    pub displr: Vec<usize>,
    /// Non-zeros received from each worker
    pub rcounts2: Vec<usize>,
    /// Offsets into the received non-zeros per worker (length procs + 1)
    pub displr2: Vec<usize>,
    /// Local rows of the right operand requested by each worker
    pub send_rows: Vec<Vec<usize>>,
    /// Non-zeros sent to each worker
    pub scounts2: Vec<usize>,
    /// For each fetched row, the ascending local rows of the left operand
    /// that reference it. The product renumbers those rows' columns into
    /// the fetched block through this map.
    pub requesters: Vec<Vec<usize>>,
    /// Row partition of the right operand
    pub partition: RowPartition,

    left_structure: u64,
    right_structure: u64,
}

impl RowsToGetInfo {
    /// Runs discovery and round one
    ///
    /// Collective. `a`'s columns index rows of `b`.
    pub fn build<T: Scalar, C: Communicator>(
        comm: &C,
        a: &DistributedCSR<T>,
        b: &DistributedCSR<T>,
        check_inputs: bool,
    ) -> Result<Self> {
        if check_inputs {
            check_columns_order(a)?;
        }

        let partition = RowPartition::gather(comm, b.row_shift, b.n)?;
        if a.m != partition.rows() {
            return Err(Error::DimensionMismatch(format!(
                "left operand has {} columns, right operand has {} rows",
                a.m,
                partition.rows()
            ))
            .logged());
        }
        let procs = comm.size();

        // (remote row, requesting local row)
        let mut pairs = Vec::new();
        for i in 0..a.n {
            let (cols, _) = a.row_slices(i);
            for &k in cols {
                if k >= a.m {
                    return Err(Error::ColumnOutOfRange {
                        row: a.row_shift + i,
                        col: k,
                        limit: a.m,
                    }
                    .logged());
                }
                if !b.is_local_col(k) {
                    pairs.push((k, i));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();

        let mut whichprow: Vec<usize> = Vec::new();
        let mut requesters: Vec<Vec<usize>> = Vec::new();
        for (k, i) in pairs {
            if whichprow.last() == Some(&k) {
                if let Some(list) = requesters.last_mut() {
                    list.push(i);
                }
            } else {
                whichprow.push(k);
                requesters.push(vec![i]);
            }
        }

        let mut rcounts = vec![0; procs];
        for &k in &whichprow {
            let owner = partition.owner_of(k).ok_or_else(|| {
                Error::ColumnOutOfRange {
                    row: a.row_shift,
                    col: k,
                    limit: partition.rows(),
                }
                .logged()
            })?;
            rcounts[owner] += 1;
        }
        let displr = exclusive_scan(&rcounts);

        // Round one: which rows, then how long each one is
        let wanted = comm.all_to_all_v(split_by_counts(&whichprow, &rcounts))?;

        let mut send_rows = Vec::with_capacity(procs);
        let mut replies = Vec::with_capacity(procs);
        let mut scounts2 = Vec::with_capacity(procs);
        for rows in wanted {
            let mut local = Vec::with_capacity(rows.len());
            let mut lens = Vec::with_capacity(rows.len());
            for row in rows {
                if !b.is_local_col(row) {
                    return Err(Error::ColumnOutOfRange {
                        row,
                        col: row,
                        limit: b.row_shift + b.n,
                    }
                    .logged());
                }
                let li = row - b.row_shift;
                lens.push(b.row_ptr()[li + 1] - b.row_ptr()[li]);
                local.push(li);
            }
            scounts2.push(lens.iter().sum());
            send_rows.push(local);
            replies.push(lens);
        }

        let lens_back = comm.all_to_all_v(replies)?;

        let mut nnz_per_row = Vec::with_capacity(whichprow.len());
        let mut rcounts2 = Vec::with_capacity(procs);
        for (peer, lens) in lens_back.into_iter().enumerate() {
            if lens.len() != rcounts[peer] {
                return Err(Error::Comm(format!(
                    "worker {} answered {} row lengths for {} rows",
                    peer,
                    lens.len(),
                    rcounts[peer]
                ))
                .logged());
            }
            rcounts2.push(lens.iter().sum());
            nnz_per_row.extend(lens);
        }
        let nnz_per_row_shift = exclusive_scan(&nnz_per_row);
        let displr2 = exclusive_scan(&rcounts2);
        let countall = nnz_per_row_shift[nnz_per_row.len()];

        log::debug!(
            "rows-to-get built on worker {}: {} rows ({} nnz) in, {} rows out",
            comm.rank(),
            whichprow.len(),
            countall,
            send_rows.iter().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            nnz_per_row_shift,
            rows2bereceived: whichprow.len(),
            countall,
            whichprow,
            rcounts,
            displr,
            rcounts2,
            displr2,
            send_rows,
            scounts2,
            requesters,
            partition,
            left_structure: a.structure_id(),
            right_structure: b.structure_id(),
        })
    }

    /// Whether the plan was built for these exact operand patterns
    pub fn matches<T: Scalar>(&self, a: &DistributedCSR<T>, b: &DistributedCSR<T>) -> bool {
        self.left_structure == a.structure_id() && self.right_structure == b.structure_id()
    }

    /// Round two: ships requested rows of `b` and receives the remote rows
    ///
    /// Collective. Fails with [`Error::StalePlan`] if a row's length no
    /// longer matches what round one announced.
    pub fn fetch<T: Scalar, C: Communicator>(
        &self,
        comm: &C,
        b: &DistributedCSR<T>,
    ) -> Result<FetchedRows<T>> {
        let mut outgoing = Vec::with_capacity(self.send_rows.len());
        for (peer, rows) in self.send_rows.iter().enumerate() {
            let mut payload = Vec::with_capacity(self.scounts2[peer]);
            for &li in rows {
                let (cols, vals) = b.row_slices(li);
                payload.extend(cols.iter().copied().zip(vals.iter().copied()));
            }
            if payload.len() != self.scounts2[peer] {
                return Err(Error::StalePlan(format!(
                    "rows for worker {} now hold {} non-zeros, plan says {}",
                    peer,
                    payload.len(),
                    self.scounts2[peer]
                ))
                .logged());
            }
            outgoing.push(payload);
        }

        let incoming = comm.all_to_all_v(outgoing)?;

        let mut col = Vec::with_capacity(self.countall);
        let mut val = Vec::with_capacity(self.countall);
        for (peer, payload) in incoming.into_iter().enumerate() {
            if payload.len() != self.rcounts2[peer] {
                return Err(Error::StalePlan(format!(
                    "expected {} non-zeros from worker {}, got {}",
                    self.rcounts2[peer],
                    peer,
                    payload.len()
                ))
                .logged());
            }
            for (c, v) in payload {
                col.push(c);
                val.push(v);
            }
        }

        log::trace!(
            "worker {} fetched {} rows ({} nnz)",
            comm.rank(),
            self.rows2bereceived,
            self.countall
        );

        Ok(FetchedRows {
            row_ptr: self.nnz_per_row_shift.clone(),
            col,
            val,
        })
    }
}
