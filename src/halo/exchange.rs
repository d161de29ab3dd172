//! Halo plan for vector products
//!
//! A worker owning rows `[row_shift, row_shift + n)` of a square matrix also
//! owns the same entries of every row-distributed vector. Columns outside
//! that range name entries owned by other workers; the plan records which
//! ones to fetch from whom and which owned entries to ship in return.

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::validation::check_columns_order;
use crate::matrix::{DistributedCSR, RowPartition, Scalar};
use crate::utils::{exclusive_scan, split_by_counts};

/// Cached send/receive plan for one matrix's remote vector entries
#[derive(Debug, Clone)]
pub struct HaloInfo<T> {
    /// Distinct remote global columns referenced locally, ascending
    pub to_receive: Vec<usize>,
    /// Entries of `to_receive` owned by each worker
    pub to_receive_counts: Vec<usize>,
    /// Offsets into `to_receive` per worker (length procs + 1)
    pub to_receive_spls: Vec<usize>,
    /// Received values, aligned with `to_receive`
    pub what_to_receive: Vec<T>,

    /// Local indices of owned entries requested by peers, grouped by peer
    pub to_send: Vec<usize>,
    /// Entries of `to_send` requested by each worker
    pub to_send_counts: Vec<usize>,
    /// Offsets into `to_send` per worker (length procs + 1)
    pub to_send_spls: Vec<usize>,
    /// Staging buffer for outgoing values, aligned with `to_send`
    pub what_to_send: Vec<T>,

    /// Local rows with at least one remote column
    pub rows_with_remote: Vec<usize>,

    /// Row partition of the vectors this plan serves
    pub partition: RowPartition,
}

impl<T: Scalar> HaloInfo<T> {
    /// Discovers remote columns and negotiates the send side
    ///
    /// Collective: one all-gather of row ranges and one all-to-all of
    /// requests. A column outside every worker's range is fatal.
    pub fn build<C: Communicator>(
        comm: &C,
        a: &DistributedCSR<T>,
        check_inputs: bool,
    ) -> Result<Self> {
        if a.m != a.full_n {
            return Err(Error::DimensionMismatch(format!(
                "halo needs a square matrix, got {} x {}",
                a.full_n, a.m
            ))
            .logged());
        }
        if check_inputs {
            check_columns_order(a)?;
        }

        let partition = RowPartition::gather(comm, a.row_shift, a.n)?;
        if partition.rows() != a.full_n {
            return Err(Error::DimensionMismatch(format!(
                "workers own {} rows, matrix declares {}",
                partition.rows(),
                a.full_n
            ))
            .logged());
        }
        let procs = comm.size();

        let mut remote = Vec::new();
        let mut rows_with_remote = Vec::new();
        for i in 0..a.n {
            let (cols, _) = a.row_slices(i);
            let before = remote.len();
            for &col in cols {
                if col >= a.m {
                    return Err(Error::ColumnOutOfRange {
                        row: a.row_shift + i,
                        col,
                        limit: a.m,
                    }
                    .logged());
                }
                if !a.is_local_col(col) {
                    remote.push(col);
                }
            }
            if remote.len() > before {
                rows_with_remote.push(i);
            }
        }

        // Repeated references to one remote entry are requested once
        remote.sort_unstable();
        remote.dedup();

        let mut to_receive_counts = vec![0; procs];
        for &col in &remote {
            let owner = partition.owner_of(col).ok_or_else(|| {
                Error::ColumnOutOfRange {
                    row: a.row_shift,
                    col,
                    limit: a.full_n,
                }
                .logged()
            })?;
            to_receive_counts[owner] += 1;
        }
        let to_receive_spls = exclusive_scan(&to_receive_counts);

        let requests = split_by_counts(&remote, &to_receive_counts);
        let wanted = comm.all_to_all_v(requests)?;

        let mut to_send = Vec::new();
        let mut to_send_counts = Vec::with_capacity(procs);
        for (peer, rows) in wanted.into_iter().enumerate() {
            to_send_counts.push(rows.len());
            for row in rows {
                if !a.is_local_col(row) {
                    return Err(Error::ColumnOutOfRange {
                        row,
                        col: row,
                        limit: a.row_shift + a.n,
                    }
                    .logged());
                }
                to_send.push(row - a.row_shift);
            }
            log::trace!("worker {} sends {} entries to {}", comm.rank(), to_send_counts[peer], peer);
        }
        let to_send_spls = exclusive_scan(&to_send_counts);

        log::debug!(
            "halo built on worker {}: receive {} entries, send {} entries, {} rows touch remote columns",
            comm.rank(),
            remote.len(),
            to_send.len(),
            rows_with_remote.len()
        );

        Ok(Self {
            what_to_receive: vec![T::zero(); remote.len()],
            to_receive: remote,
            to_receive_counts,
            to_receive_spls,
            what_to_send: vec![T::zero(); to_send.len()],
            to_send,
            to_send_counts,
            to_send_spls,
            rows_with_remote,
            partition,
        })
    }

    /// Number of remote entries this worker receives
    pub fn to_receive_n(&self) -> usize {
        self.to_receive.len()
    }

    /// Number of owned entries this worker sends
    pub fn to_send_n(&self) -> usize {
        self.to_send.len()
    }

    /// Ships requested owned entries of `x_local` and fills `what_to_receive`
    ///
    /// Collective. Only values travel; counts come from the cached plan.
    pub fn exchange<C: Communicator>(&mut self, comm: &C, x_local: &[T]) -> Result<()> {
        for (slot, &idx) in self.what_to_send.iter_mut().zip(&self.to_send) {
            *slot = x_local[idx];
        }

        let outgoing = split_by_counts(&self.what_to_send, &self.to_send_counts);
        let incoming = comm.all_to_all_v(outgoing)?;

        for (peer, values) in incoming.into_iter().enumerate() {
            if values.len() != self.to_receive_counts[peer] {
                return Err(Error::StalePlan(format!(
                    "expected {} halo values from worker {}, got {}",
                    self.to_receive_counts[peer],
                    peer,
                    values.len()
                ))
                .logged());
            }
            let start = self.to_receive_spls[peer];
            self.what_to_receive[start..start + values.len()].copy_from_slice(&values);
        }

        log::trace!("halo exchange on worker {}: {} values in", comm.rank(), self.to_receive_n());
        Ok(())
    }

    /// Received value for a remote global column
    #[inline]
    pub fn lookup(&self, col: usize) -> Option<T> {
        self.to_receive
            .binary_search(&col)
            .ok()
            .map(|k| self.what_to_receive[k])
    }
}
