//! Adaptive mini-warp sparse matrix-vector products
//!
//! Every row is reduced by a group of `width` lanes: lane `l` accumulates
//! entries `l, l + width, l + 2·width, …` and the lanes are then folded
//! pairwise (`width/2`, `width/4`, …, 1). The fold order is fixed, so the
//! result never depends on when halo values arrived. The width is picked
//! from the matrix's average row density.

use rayon::prelude::*;

use crate::comm::Communicator;
use crate::error::{Error, Residency, Result};
use crate::halo::HaloInfo;
use crate::matrix::{DistributedCSR, MiniWarpThresholds, RowPartition, Scalar};
use crate::worker::Worker;

/// Widest lane group
pub const MAX_MINI_WARP: usize = 32;

/// Picks the lane-group width from the average non-zeros per row
pub fn choose_mini_warp_size<T: Scalar>(a: &DistributedCSR<T>, thresholds: &MiniWarpThresholds) -> usize {
    if a.n == 0 {
        log::warn!("mini-warp selection on a matrix without local rows");
        return 2;
    }
    thresholds.width_for(a.nnz() / a.n)
}

/// Lane-parallel dot product of one row against `x_of(column)`
#[inline]
fn mini_warp_dot<T, F>(width: usize, cols: &[usize], vals: &[T], x_of: F) -> T
where
    T: Scalar,
    F: Fn(usize) -> T,
{
    let mut lanes = [T::zero(); MAX_MINI_WARP];
    for (k, (&c, &v)) in cols.iter().zip(vals).enumerate() {
        lanes[k % width] += v * x_of(c);
    }

    let mut offset = width / 2;
    while offset > 0 {
        for l in 0..offset {
            let other = lanes[l + offset];
            lanes[l] += other;
        }
        offset /= 2;
    }
    lanes[0]
}

#[inline]
fn combine<T: Scalar>(sum: T, y: T, alpha: T, beta: T) -> T {
    if beta == T::zero() {
        alpha * sum
    } else {
        alpha * sum + beta * y
    }
}

fn check_len(what: &str, got: usize, want: usize) -> Result<()> {
    if got != want {
        return Err(Error::DimensionMismatch(format!(
            "{} has {} entries, expected {}",
            what, got, want
        ))
        .logged());
    }
    Ok(())
}

/// `y := alpha·A·x + beta·y` against a full-length `x`
///
/// `y` holds the local rows and `x` every column (length `m`), so no
/// values are exchanged. Not collective.
pub fn spmv_full<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
    alpha: T,
    beta: T,
) -> Result<()> {
    a.require(Residency::Device)?;
    check_len("y", y.len(), a.n)?;
    check_len("x", x.len(), a.m)?;

    let width = choose_mini_warp_size(a, &worker.config().mini_warp);
    worker.install(|| {
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = a.row_slices(i);
            let sum = mini_warp_dot(width, cols, vals, |c| x[c]);
            *yi = combine(sum, *yi, alpha, beta);
        })
    });
    Ok(())
}

/// `y := alpha·A·x + beta·y` over a row-distributed matrix
///
/// `x` and `y` are this worker's slices of row-distributed vectors (length
/// `n`); remote entries of `x` come through the matrix's halo plan.
///
/// Collective: every worker of the group must call it, including workers
/// that own no rows.
pub fn spmv<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &mut DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
    alpha: T,
    beta: T,
) -> Result<()> {
    a.require(Residency::Device)?;
    check_len("y", y.len(), a.n)?;

    let width = choose_mini_warp_size(a, &worker.config().mini_warp);

    check_len("x", x.len(), a.n)?;
    let comm = worker.comm();
    let check_inputs = worker.config().check_inputs;
    let mut halo = match a.halo.take() {
        Some(h) => h,
        None => HaloInfo::build(comm, a, check_inputs)?,
    };

    let result = if worker.config().overlap_halo {
        spmv_overlapped(worker, a, &mut halo, x, y, width, alpha, beta)
    } else {
        halo.exchange(comm, x).map(|_| {
            let a: &DistributedCSR<T> = a;
            let halo = &halo;
            let shift = a.row_shift;
            worker.install(|| {
                y.par_iter_mut().enumerate().for_each(|(i, yi)| {
                    let (cols, vals) = a.row_slices(i);
                    let sum = mini_warp_dot(width, cols, vals, |c| {
                        if a.is_local_col(c) {
                            x[c - shift]
                        } else {
                            halo.lookup(c).unwrap_or_else(T::zero)
                        }
                    });
                    *yi = combine(sum, *yi, alpha, beta);
                })
            })
        })
    };

    a.halo = Some(halo);
    result
}

/// Owned-column pass runs while the halo values are in flight; rows that
/// touch remote columns get a second pass once they land
#[allow(clippy::too_many_arguments)]
fn spmv_overlapped<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
    halo: &mut HaloInfo<T>,
    x: &[T],
    y: &mut [T],
    width: usize,
    alpha: T,
    beta: T,
) -> Result<()> {
    let comm = worker.comm();
    let shift = a.row_shift;

    let (mut partial, exchanged) = worker.install(|| {
        rayon::join(
            || {
                (0..a.n)
                    .into_par_iter()
                    .map(|i| {
                        let (cols, vals) = a.row_slices(i);
                        mini_warp_dot(width, cols, vals, |c| {
                            if a.is_local_col(c) {
                                x[c - shift]
                            } else {
                                T::zero()
                            }
                        })
                    })
                    .collect::<Vec<T>>()
            },
            || halo.exchange(comm, x),
        )
    });
    exchanged?;

    let halo: &HaloInfo<T> = halo;
    for &i in &halo.rows_with_remote {
        let (cols, vals) = a.row_slices(i);
        partial[i] += mini_warp_dot(width, cols, vals, |c| {
            if a.is_local_col(c) {
                T::zero()
            } else {
                halo.lookup(c).unwrap_or_else(T::zero)
            }
        });
    }

    worker.install(|| {
        y.par_iter_mut()
            .zip(partial.par_iter())
            .for_each(|(yi, &sum)| *yi = combine(sum, *yi, alpha, beta))
    });
    Ok(())
}

/// `y := alpha·A·x + beta·y` where `x` covers global columns
/// `[shift, shift + x.len())`
///
/// Used when a level's vector is a window of a larger one. Every column of
/// `a` must fall inside the window.
pub fn shifted_spmv<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
    shift: usize,
    alpha: T,
    beta: T,
) -> Result<()> {
    a.require(Residency::Device)?;
    check_len("y", y.len(), a.n)?;
    check_window(a, shift, x.len())?;

    let width = choose_mini_warp_size(a, &worker.config().mini_warp);
    worker.install(|| {
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = a.row_slices(i);
            let sum = mini_warp_dot(width, cols, vals, |c| x[c - shift]);
            *yi = combine(sum, *yi, alpha, beta);
        })
    });
    Ok(())
}

/// Like [`shifted_spmv`], but `y` is also a window starting at global row
/// `shift`: local row `i` lands in `y[row_shift + i - shift]`
#[allow(clippy::too_many_arguments)]
pub fn shifted_spmv_rows<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
    shift: usize,
    alpha: T,
    beta: T,
) -> Result<()> {
    if a.row_shift < shift || a.row_shift + a.n > shift + y.len() {
        return Err(Error::DimensionMismatch(format!(
            "rows [{}, {}) do not fit the output window [{}, {})",
            a.row_shift,
            a.row_shift + a.n,
            shift,
            shift + y.len()
        ))
        .logged());
    }
    let start = a.row_shift - shift;
    shifted_spmv(worker, a, x, &mut y[start..start + a.n], shift, alpha, beta)
}

fn check_window<T: Scalar>(a: &DistributedCSR<T>, shift: usize, len: usize) -> Result<()> {
    for i in 0..a.n {
        let (cols, _) = a.row_slices(i);
        for &c in cols {
            if c < shift || c >= shift + len {
                return Err(Error::ColumnOutOfRange {
                    row: a.row_shift + i,
                    col: c,
                    limit: shift + len,
                }
                .logged());
            }
        }
    }
    Ok(())
}

/// `y := P·x` for a prolongation-like matrix whose rows hold very few
/// entries; `x` is the full coarse vector (length `m`)
///
/// One lane per row, no halo.
pub fn prolongation_spmv<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    p: &DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
) -> Result<()> {
    p.require(Residency::Device)?;
    check_len("x", x.len(), p.m)?;
    check_len("y", y.len(), p.n)?;

    worker.install(|| {
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            *yi = p
                .row_iter(i)
                .fold(T::zero(), |acc, (c, &v)| acc + v * x[c]);
        })
    });
    Ok(())
}

/// `y := alpha·Aᵀ·x + beta·y`
///
/// On a group of one, `x` has length `n` and `y` length `m`. On larger
/// groups the matrix must be square; `x` and `y` are local slices and each
/// worker's partial products are routed to the owners of the output rows
/// and summed there in rank order. Collective.
pub fn spmv_transposed<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
    x: &[T],
    y: &mut [T],
    alpha: T,
    beta: T,
) -> Result<()> {
    a.require(Residency::Device)?;
    check_len("x", x.len(), a.n)?;

    let mut partial = vec![T::zero(); a.m];
    for i in 0..a.n {
        for (c, &v) in a.row_iter(i) {
            partial[c] += v * x[i];
        }
    }

    let comm = worker.comm();
    let sums = if comm.size() == 1 {
        partial
    } else {
        if a.m != a.full_n {
            return Err(Error::DimensionMismatch(
                "distributed transposed product needs a square matrix".to_string(),
            )
            .logged());
        }
        let partition = RowPartition::gather(comm, a.row_shift, a.n)?;
        let outgoing = (0..comm.size())
            .map(|p| partial[partition.range(p)].to_vec())
            .collect();
        let incoming = comm.all_to_all_v(outgoing)?;
        let mut local = vec![T::zero(); a.n];
        for contribution in incoming {
            for (acc, v) in local.iter_mut().zip(contribution) {
                *acc += v;
            }
        }
        local
    };

    check_len("y", y.len(), sums.len())?;
    for (yi, s) in y.iter_mut().zip(sums) {
        *yi = combine(s, *yi, alpha, beta);
    }
    Ok(())
}
