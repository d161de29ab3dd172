//! Local structural transforms and reductions
//!
//! Everything here works on one worker's rows only. The diagonal of local
//! row `i` is global column `row_shift + i`. Kernels that need the group
//! (norms, transpose) live in [`crate::kernels`].

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{Error, Residency, Result};
use crate::matrix::{DistributedCSR, Scalar};

/// Strictly-lower part, strictly-upper part and diagonal of a matrix
#[derive(Debug, Clone)]
pub struct Dismembered<T: Scalar> {
    pub lower: DistributedCSR<T>,
    pub upper: DistributedCSR<T>,
    pub diag: Vec<T>,
}

impl<T: Scalar> Dismembered<T> {
    /// Recombines the three parts into one matrix
    pub fn merge(&self) -> Result<DistributedCSR<T>> {
        let l = &self.lower;
        let u = &self.upper;
        if l.n != u.n || l.row_shift != u.row_shift {
            return Err(Error::DimensionMismatch(format!(
                "lower has {} rows from {}, upper has {} rows from {}",
                l.n, l.row_shift, u.n, u.row_shift
            ))
            .logged());
        }

        let mut row = Vec::with_capacity(l.n + 1);
        let mut col = Vec::with_capacity(l.nnz() + u.nnz());
        let mut val = Vec::with_capacity(l.nnz() + u.nnz());
        row.push(0);
        for i in 0..l.n {
            // Lower columns all precede upper columns
            for part in [l, u] {
                let (c, v) = part.row_slices(i);
                col.extend_from_slice(c);
                val.extend_from_slice(v);
            }
            row.push(col.len());
        }

        let strict = DistributedCSR::new(l.n, l.m, l.full_n, l.row_shift, row, col, val)?
            .with_symmetric(l.is_symmetric);
        merge_diagonal(&strict.into_device(), &self.diag)
    }
}

/// Diagonal entries of the local rows (zero where absent)
pub fn diag<T: Scalar>(a: &DistributedCSR<T>) -> Result<Vec<T>> {
    a.require(Residency::Device)?;
    Ok((0..a.n)
        .into_par_iter()
        .map(|i| {
            let (cols, vals) = a.row_slices(i);
            cols.binary_search(&(a.row_shift + i))
                .map(|p| vals[p])
                .unwrap_or_else(|_| T::zero())
        })
        .collect())
}

/// Splits a matrix into strictly-lower, strictly-upper and diagonal parts
pub fn dismember<T: Scalar>(a: &DistributedCSR<T>) -> Result<Dismembered<T>> {
    a.require(Residency::Device)?;

    let mut l = (vec![0], Vec::new(), Vec::new());
    let mut u = (vec![0], Vec::new(), Vec::new());
    let mut d = vec![T::zero(); a.n];

    for i in 0..a.n {
        let g = a.row_shift + i;
        for (col, &val) in a.row_iter(i) {
            if col < g {
                l.1.push(col);
                l.2.push(val);
            } else if col > g {
                u.1.push(col);
                u.2.push(val);
            } else {
                d[i] = val;
            }
        }
        l.0.push(l.1.len());
        u.0.push(u.1.len());
    }

    let lower = DistributedCSR::new(a.n, a.m, a.full_n, a.row_shift, l.0, l.1, l.2)?;
    let upper = DistributedCSR::new(a.n, a.m, a.full_n, a.row_shift, u.0, u.1, u.2)?;

    Ok(Dismembered {
        lower: lower.with_symmetric(a.is_symmetric).into_device(),
        upper: upper.with_symmetric(a.is_symmetric).into_device(),
        diag: d,
    })
}

/// Returns a copy of `a` whose diagonal is `d`, inserting missing entries
pub fn merge_diagonal<T: Scalar>(a: &DistributedCSR<T>, d: &[T]) -> Result<DistributedCSR<T>> {
    a.require(Residency::Device)?;
    if d.len() != a.n {
        return Err(Error::DimensionMismatch(format!(
            "diagonal has {} entries for {} rows",
            d.len(),
            a.n
        ))
        .logged());
    }

    let mut row = Vec::with_capacity(a.n + 1);
    let mut col = Vec::with_capacity(a.nnz() + a.n);
    let mut val = Vec::with_capacity(a.nnz() + a.n);
    row.push(0);

    for i in 0..a.n {
        let g = a.row_shift + i;
        let mut placed = false;
        for (c, &v) in a.row_iter(i) {
            if !placed && c >= g {
                col.push(g);
                val.push(d[i]);
                placed = true;
                if c == g {
                    continue;
                }
            }
            col.push(c);
            val.push(v);
        }
        if !placed {
            col.push(g);
            val.push(d[i]);
        }
        row.push(col.len());
    }

    Ok(DistributedCSR::new(a.n, a.m, a.full_n, a.row_shift, row, col, val)?
        .with_symmetric(a.is_symmetric)
        .into_device())
}

/// In-place ILU(0) restricted to the local diagonal block
///
/// Entries whose column falls outside `[row_shift, row_shift + n)` are left
/// untouched; coupling to other workers is the smoother's concern. On return
/// the strictly-lower part holds `L` (unit diagonal implied) and the rest
/// holds `U`.
pub fn ilu0<T: Scalar>(a: &mut DistributedCSR<T>) -> Result<()> {
    a.require(Residency::Device)?;
    let shift = a.row_shift;
    let n = a.n;
    let (row, col, val) = a.arrays_mut();

    let mut diag_pos = Vec::with_capacity(n);
    for i in 0..n {
        let cols = &col[row[i]..row[i + 1]];
        match cols.binary_search(&(shift + i)) {
            Ok(p) => diag_pos.push(row[i] + p),
            Err(_) => return Err(Error::MissingDiagonal { row: shift + i }.logged()),
        }
    }

    for i in 0..n {
        let start = row[i];
        let end = row[i + 1];
        for p in start..diag_pos[i] {
            let k = col[p];
            if k < shift {
                continue;
            }
            let kk = k - shift;
            let pivot = val[diag_pos[kk]];
            if pivot == T::zero() {
                return Err(Error::ZeroPivot { row: k }.logged());
            }
            val[p] /= pivot;
            let lik = val[p];

            let k_cols = &col[diag_pos[kk] + 1..row[kk + 1]];
            for q in p + 1..end {
                let j = col[q];
                if j >= shift + n {
                    break;
                }
                if let Ok(r) = k_cols.binary_search(&j) {
                    let ukj = val[diag_pos[kk] + 1 + r];
                    val[q] -= lik * ukj;
                }
            }
        }
        if val[diag_pos[i]] == T::zero() {
            return Err(Error::ZeroPivot { row: shift + i }.logged());
        }
    }

    Ok(())
}

/// ILU(0) of the transposed local diagonal block, stored back in place
///
/// With `B` the local diagonal block, `a` afterwards holds `(ilu0(Bᵀ))ᵀ`
/// on the block's positions. Off-block entries are left untouched.
pub fn ilu0_transposed<T: Scalar>(a: &mut DistributedCSR<T>) -> Result<()> {
    a.require(Residency::Device)?;
    let shift = a.row_shift;
    let n = a.n;

    // (row of the transposed block, its global column, position in `a`)
    let mut entries = Vec::new();
    for i in 0..n {
        let start = a.row_ptr()[i];
        let (cols, _) = a.row_slices(i);
        for (p, &c) in cols.iter().enumerate() {
            if c >= shift && c < shift + n {
                entries.push((c - shift, shift + i, start + p));
            }
        }
    }
    entries.sort_unstable();

    let mut row = vec![0; n + 1];
    for &(r, _, _) in &entries {
        row[r + 1] += 1;
    }
    for r in 0..n {
        row[r + 1] += row[r];
    }
    let col = entries.iter().map(|e| e.1).collect();
    let val = entries.iter().map(|e| a.val()[e.2]).collect();

    let mut block = DistributedCSR::new(n, a.m, a.full_n, shift, row, col, val)?.into_device();
    ilu0(&mut block)?;

    let val = a.val_mut();
    for (&(_, _, pos), &v) in entries.iter().zip(block.val()) {
        val[pos] = v;
    }
    Ok(())
}

/// Scales row `i` by `v[i]`
pub fn matrix_vector_scaling<T: Scalar>(a: &mut DistributedCSR<T>, v: &[T]) -> Result<()> {
    a.require(Residency::Device)?;
    if v.len() != a.n {
        return Err(Error::DimensionMismatch(format!(
            "scaling vector has {} entries for {} rows",
            v.len(),
            a.n
        ))
        .logged());
    }

    let (row, _, val) = a.arrays_mut();
    let mut rows: Vec<&mut [T]> = Vec::with_capacity(v.len());
    let mut rest = val;
    for i in 0..v.len() {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(row[i + 1] - row[i]);
        rows.push(head);
        rest = tail;
    }
    rows.into_par_iter()
        .zip(v.par_iter())
        .for_each(|(r, &s)| r.iter_mut().for_each(|x| *x *= s));
    Ok(())
}

/// Sum of absolute values of each local row
pub fn absolute_row_sum<T: Scalar>(a: &DistributedCSR<T>) -> Result<Vec<T>> {
    a.require(Residency::Device)?;
    Ok((0..a.n)
        .into_par_iter()
        .map(|i| {
            let (_, vals) = a.row_slices(i);
            vals.iter().fold(T::zero(), |acc, v| acc + v.abs())
        })
        .collect())
}

/// Adds `shift` to every column index
///
/// Changes the sparsity pattern, so communication plans are dropped.
pub fn shift_cols<T: Scalar>(a: &mut DistributedCSR<T>, shift: isize) -> Result<()> {
    let m = a.m;
    let mut shifted = Vec::with_capacity(a.nnz());
    for i in 0..a.n {
        for (c, _) in a.row_iter(i) {
            let moved = c as isize + shift;
            if moved < 0 || moved as usize >= m {
                return Err(Error::ColumnOutOfRange {
                    row: a.row_shift + i,
                    col: c,
                    limit: m,
                }
                .logged());
            }
            shifted.push(moved as usize);
        }
    }

    let row = a.row_ptr().to_vec();
    let val = a.val().to_vec();
    a.replace_arrays(row, shifted, val)
}

/// Local rows as a dense `n × m` array
pub fn to_dense<T: Scalar>(a: &DistributedCSR<T>) -> Array2<T> {
    let mut dense = Array2::zeros((a.n, a.m));
    for i in 0..a.n {
        for (c, &v) in a.row_iter(i) {
            dense[[i, c]] = v;
        }
    }
    dense
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rows 1..3 of the 4x4 matrix
    /// [ 4 -1  0  0 ]
    /// [-1  4 -1  0 ]
    /// [ 0 -1  4 -1 ]
    /// [ 0  0 -1  4 ]
    fn middle_rows() -> DistributedCSR<f64> {
        DistributedCSR::new(
            2,
            4,
            4,
            1,
            vec![0, 3, 6],
            vec![0, 1, 2, 1, 2, 3],
            vec![-1.0, 4.0, -1.0, -1.0, 4.0, -1.0],
        )
        .unwrap()
        .into_device()
    }

    #[test]
    fn test_ilu0_transposed_factors_the_transposed_block() {
        // Rows 1..3 of
        // [ 4  1  0  0 ]
        // [-2  4  2  0 ]
        // [ 0  1  6  2 ]
        // [ 0  0  1  7 ]
        let mut a = DistributedCSR::new(
            2,
            4,
            4,
            1,
            vec![0, 3, 6],
            vec![0, 1, 2, 1, 2, 3],
            vec![-2.0, 4.0, 2.0, 1.0, 6.0, 2.0],
        )
        .unwrap()
        .into_device();
        // Transposed local block [[4, 1], [2, 6]]
        let mut t = DistributedCSR::new(
            2,
            4,
            4,
            1,
            vec![0, 2, 4],
            vec![1, 2, 1, 2],
            vec![4.0, 1.0, 2.0, 6.0],
        )
        .unwrap()
        .into_device();

        ilu0_transposed(&mut a).unwrap();
        ilu0(&mut t).unwrap();

        // l = 2/4, u22 = 6 - l·1
        assert_eq!(t.val(), &[4.0, 1.0, 0.5, 5.5]);
        assert_eq!(a.val(), &[-2.0, 4.0, 0.5, 1.0, 5.5, 2.0]);
    }

    #[test]
    fn test_diag_uses_global_diagonal() {
        assert_eq!(diag(&middle_rows()).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_host_matrix_is_rejected() {
        let a = middle_rows().into_host();
        assert!(matches!(diag(&a), Err(Error::Residency { .. })));
    }

    #[test]
    fn test_dismember_and_merge() {
        let a = middle_rows();
        let parts = dismember(&a).unwrap();

        assert_eq!(parts.lower.col(), &[0, 1]);
        assert_eq!(parts.upper.col(), &[2, 3]);
        assert_eq!(parts.diag, vec![4.0, 4.0]);

        assert!(parts.merge().unwrap().equals(&a));
    }

    #[test]
    fn test_merge_diagonal_inserts_missing() {
        let a = DistributedCSR::new(2, 2, 2, 0, vec![0, 1, 1], vec![1], vec![5.0])
            .unwrap()
            .into_device();
        let merged = merge_diagonal(&a, &[1.0, 2.0]).unwrap();

        assert_eq!(merged.row_ptr(), &[0, 2, 3]);
        assert_eq!(merged.col(), &[0, 1, 1]);
        assert_eq!(merged.val(), &[1.0, 5.0, 2.0]);
    }

    #[test]
    fn test_ilu0_on_tridiagonal_is_exact_lu() {
        // [ 2 -1 ] = [ 1    0 ] [ 2  -1  ]
        // [-1  2 ]   [-0.5  1 ] [ 0  1.5 ]
        let mut a = DistributedCSR::new(
            2,
            2,
            2,
            0,
            vec![0, 2, 4],
            vec![0, 1, 0, 1],
            vec![2.0, -1.0, -1.0, 2.0],
        )
        .unwrap()
        .into_device();

        ilu0(&mut a).unwrap();
        assert_eq!(a.val(), &[2.0, -1.0, -0.5, 1.5]);
    }

    #[test]
    fn test_ilu0_ignores_off_block_columns() {
        let mut a = middle_rows();
        ilu0(&mut a).unwrap();
        // Column 0 and 3 are owned elsewhere
        assert_eq!(a.val()[0], -1.0);
        assert_eq!(a.val()[5], -1.0);
        // Row 2: l = -1/4, u22 = 4 - 1/4
        assert_eq!(a.val()[3], -0.25);
        assert_eq!(a.val()[4], 3.75);
    }

    #[test]
    fn test_ilu0_zero_pivot() {
        let mut a = DistributedCSR::new(1, 1, 1, 0, vec![0, 1], vec![0], vec![0.0])
            .unwrap()
            .into_device();
        assert!(matches!(ilu0(&mut a), Err(Error::ZeroPivot { row: 0 })));
    }

    #[test]
    fn test_scaling_and_row_sums() {
        let mut a = middle_rows();
        assert_eq!(absolute_row_sum(&a).unwrap(), vec![6.0, 6.0]);

        matrix_vector_scaling(&mut a, &[0.5, 2.0]).unwrap();
        assert_eq!(a.val(), &[-0.5, 2.0, -0.5, -2.0, 8.0, -2.0]);
        assert_eq!(absolute_row_sum(&a).unwrap(), vec![3.0, 12.0]);
    }

    #[test]
    fn test_shift_cols() {
        let mut a = middle_rows();
        let before = a.structure_id();
        assert!(shift_cols(&mut a, -1).is_err());

        let mut b = DistributedCSR::new(1, 4, 4, 0, vec![0, 2], vec![1, 2], vec![1.0, 1.0]).unwrap();
        shift_cols(&mut b, 1).unwrap();
        assert_eq!(b.col(), &[2, 3]);
        assert_eq!(a.structure_id(), before);
    }

    #[test]
    fn test_to_dense() {
        let dense = to_dense(&middle_rows());
        assert_eq!(dense.shape(), &[2, 4]);
        assert_eq!(dense[[0, 0]], -1.0);
        assert_eq!(dense[[1, 2]], 4.0);
        assert_eq!(dense[[1, 0]], 0.0);
    }
}
