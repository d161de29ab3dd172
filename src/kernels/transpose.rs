//! Distributed and local transpose

use crate::comm::Communicator;
use crate::error::{Error, Residency, Result};
use crate::matrix::{DistributedCSR, RowPartition, Scalar};
use crate::worker::Worker;

/// `Aᵀ` redistributed by rows
///
/// Every non-zero `(i, j, v)` travels as `(j, i, v)` to the owner of row
/// `j` of the result. The result uses `a`'s row partition when `a` is
/// square, an even split of its columns otherwise. Collective.
pub fn transpose<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
) -> Result<DistributedCSR<T>> {
    a.require(Residency::Device)?;
    let comm = worker.comm();

    let partition = if a.m == a.full_n {
        RowPartition::gather(comm, a.row_shift, a.n)?
    } else {
        RowPartition::even(a.m, comm.size())?
    };

    let mut outgoing: Vec<Vec<(usize, usize, T)>> = (0..comm.size()).map(|_| Vec::new()).collect();
    for i in 0..a.n {
        let g = a.row_shift + i;
        for (j, &v) in a.row_iter(i) {
            let owner = partition.owner_of(j).ok_or_else(|| {
                Error::ColumnOutOfRange {
                    row: g,
                    col: j,
                    limit: a.m,
                }
                .logged()
            })?;
            outgoing[owner].push((j, g, v));
        }
    }

    let mut triples: Vec<(usize, usize, T)> = comm.all_to_all_v(outgoing)?.into_iter().flatten().collect();
    triples.sort_unstable_by_key(|&(r, c, _)| (r, c));

    let rows = partition.range(comm.rank());
    let mut row = vec![0; rows.len() + 1];
    let mut col = Vec::with_capacity(triples.len());
    let mut val = Vec::with_capacity(triples.len());
    for (r, c, v) in triples {
        row[r - rows.start + 1] += 1;
        col.push(c);
        val.push(v);
    }
    for i in 0..rows.len() {
        row[i + 1] += row[i];
    }

    log::debug!(
        "worker {} transposed {} local non-zeros into rows [{}, {})",
        comm.rank(),
        a.nnz(),
        rows.start,
        rows.end
    );

    let t = DistributedCSR::new(rows.len(), a.full_n, a.m, rows.start, row, col, val)?
        .with_symmetric(a.is_symmetric);
    Ok(t.into_device())
}

/// `Aᵀ` of a matrix held whole by one worker, through the backend
pub fn transpose_local<C: Communicator, T: Scalar>(
    worker: &Worker<'_, C, T>,
    a: &DistributedCSR<T>,
) -> Result<DistributedCSR<T>> {
    a.require(Residency::Device)?;
    if a.row_shift != 0 || a.n != a.full_n {
        return Err(Error::DimensionMismatch(format!(
            "local transpose needs the whole matrix, got rows [{}, {}) of {}",
            a.row_shift,
            a.row_shift + a.n,
            a.full_n
        ))
        .logged());
    }

    let t = worker.install(|| worker.backend().transpose(&a.to_block()))?;
    Ok(DistributedCSR::from_global(t)
        .with_symmetric(a.is_symmetric)
        .into_device())
}
