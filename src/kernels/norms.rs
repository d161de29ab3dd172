//! Norms: a parallel local reduction followed by one group-wide reduction

use num_traits::{NumCast, ToPrimitive};
use rayon::prelude::*;

use crate::comm::Communicator;
use crate::error::{Error, Residency, Result};
use crate::kernels::spmv::spmv;
use crate::matrix::{absolute_row_sum, DistributedCSR, Scalar};
use crate::worker::Worker;

fn to_f64<T: Scalar>(v: T) -> Result<f64> {
    v.to_f64()
        .ok_or_else(|| Error::Backend("value not representable as f64".to_string()).logged())
}

fn from_f64<T: Scalar>(v: f64) -> Result<T> {
    <T as NumCast>::from(v)
        .ok_or_else(|| Error::Backend(format!("{} not representable in the value type", v)).logged())
}

/// `‖A‖∞`: the largest absolute row sum over the whole group
pub fn infinity_norm<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
) -> Result<T> {
    let sums = worker.install(|| absolute_row_sum(a))?;
    let local = sums.into_iter().fold(T::zero(), T::max);
    let global = worker.comm().all_reduce_max(to_f64(local)?)?;
    from_f64(global)
}

/// Energy norm `sqrt(xᵀ·A·x)` of a row-distributed vector
///
/// `x` is this worker's slice. Collective.
pub fn vector_a_norm<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &mut DistributedCSR<T>,
    x: &[T],
) -> Result<T> {
    a.require(Residency::Device)?;
    let mut ax = vec![T::zero(); a.n];
    spmv(worker, a, x, &mut ax, T::one(), T::zero())?;

    let local = worker.install(|| {
        x.par_iter()
            .zip(ax.par_iter())
            .map(|(&xi, &yi)| xi * yi)
            .reduce(T::zero, |p, q| p + q)
    });
    let global = worker.comm().all_reduce_sum(to_f64(local)?)?;
    from_f64::<T>(global).map(|v| v.sqrt())
}
