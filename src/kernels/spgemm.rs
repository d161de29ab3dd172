//! Distributed sparse matrix-matrix product
//!
//! The engine owns the distributed assembly: fetching the remote rows of the
//! right operand, laying out an extended local right block (owned rows
//! first, fetched rows after) with a matching renumbering of the left
//! operand's columns, and re-sorting the product rows. The purely local
//! multiply goes to the worker's [`SparseBackend`](crate::backend::SparseBackend).

use crate::comm::Communicator;
use crate::error::{Error, Residency, Result};
use crate::halo::{FetchedRows, RowsToGetInfo};
use crate::kernels::transpose::transpose;
use crate::matrix::{DistributedCSR, Scalar, SparseMatrixCSR};
use crate::worker::Worker;

/// `C = op(A)·op(B)` where `op` optionally transposes
///
/// The rows-to-get plan is cached on `a` and reused while neither operand's
/// pattern changes on any worker. Collective.
pub fn spgemm<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &mut DistributedCSR<T>,
    b: &DistributedCSR<T>,
    trans_a: bool,
    trans_b: bool,
) -> Result<DistributedCSR<T>> {
    a.require(Residency::Device)?;
    b.require(Residency::Device)?;

    if trans_a || trans_b {
        let mut left = if trans_a { transpose(worker, a)? } else { a.clone() };
        let right = if trans_b { transpose(worker, b)? } else { b.clone() };
        return spgemm(worker, &mut left, &right, false, false);
    }

    if a.m != b.full_n {
        return Err(Error::DimensionMismatch(format!(
            "left operand has {} columns, right operand has {} rows",
            a.m, b.full_n
        ))
        .logged());
    }

    let comm = worker.comm();
    let stale = a
        .rows_to_get
        .as_ref()
        .map_or(true, |plan| !plan.matches(a, b));
    if comm.all_reduce_any(stale)? {
        log::debug!("worker {} (re)building rows-to-get plan", comm.rank());
        a.rows_to_get = None;
        let plan = RowsToGetInfo::build(comm, a, b, worker.config().check_inputs)?;
        a.rows_to_get = Some(plan);
    }

    let a: &DistributedCSR<T> = a;
    let plan = a
        .rows_to_get
        .as_ref()
        .ok_or_else(|| Error::StalePlan("rows-to-get plan missing".to_string()).logged())?;
    let fetched = plan.fetch(comm, b)?;

    let right = extended_right_block(b, &fetched);
    let left = renumbered_left_block(a, b, plan)?;

    let mut product = worker.install(|| worker.backend().spgemm(&left, &right))?;
    product.sort_rows();

    let c = DistributedCSR::new(
        a.n,
        b.m,
        a.full_n,
        a.row_shift,
        product.row_ptr,
        product.col_idx,
        product.values,
    )?;
    Ok(c.into_device())
}

/// Owned rows of `b` followed by the fetched ones
fn extended_right_block<T: Scalar>(b: &DistributedCSR<T>, fetched: &FetchedRows<T>) -> SparseMatrixCSR<T> {
    let n_fetched = fetched.row_ptr.len() - 1;
    let base = b.nnz();

    let mut row_ptr = Vec::with_capacity(b.n + n_fetched + 1);
    row_ptr.extend_from_slice(b.row_ptr());
    row_ptr.extend(fetched.row_ptr[1..].iter().map(|&r| r + base));

    let mut col_idx = Vec::with_capacity(base + fetched.col.len());
    col_idx.extend_from_slice(b.col());
    col_idx.extend_from_slice(&fetched.col);

    let mut values = Vec::with_capacity(base + fetched.val.len());
    values.extend_from_slice(b.val());
    values.extend_from_slice(&fetched.val);

    SparseMatrixCSR {
        n_rows: b.n + n_fetched,
        n_cols: b.m,
        row_ptr,
        col_idx,
        values,
    }
}

/// Local rows of `a` with columns renumbered into the extended right block
fn renumbered_left_block<T: Scalar>(
    a: &DistributedCSR<T>,
    b: &DistributedCSR<T>,
    plan: &RowsToGetInfo,
) -> Result<SparseMatrixCSR<T>> {
    let shift = b.row_shift;
    let mut mapped: Vec<Option<usize>> = a
        .col()
        .iter()
        .map(|&k| b.is_local_col(k).then(|| k - shift))
        .collect();

    // Remote columns are reached through the reverse map of each fetched row
    for (slot, (&k, rows)) in plan.whichprow.iter().zip(&plan.requesters).enumerate() {
        for &i in rows {
            let start = a.row_ptr()[i];
            let (cols, _) = a.row_slices(i);
            for (p, _) in cols.iter().enumerate().filter(|(_, &c)| c == k) {
                mapped[start + p] = Some(b.n + slot);
            }
        }
    }

    let col_idx = mapped
        .into_iter()
        .zip(a.col())
        .map(|(m, &k)| {
            m.ok_or_else(|| {
                Error::StalePlan(format!("row {} of the right operand was never fetched", k)).logged()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut left = SparseMatrixCSR {
        n_rows: a.n,
        n_cols: b.n + plan.rows2bereceived,
        row_ptr: a.row_ptr().to_vec(),
        col_idx,
        values: a.val().to_vec(),
    };
    // Renumbering moves fetched rows behind owned ones
    left.sort_rows();
    Ok(left)
}
