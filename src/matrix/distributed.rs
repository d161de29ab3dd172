//! Process-local row slice of a globally distributed CSR matrix

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Residency, Result};
use crate::halo::{HaloInfo, RowsToGetInfo};
use crate::matrix::csr::{check_shape, SparseMatrixCSR};
use crate::matrix::Scalar;

static NEXT_STRUCTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out a new sparsity-pattern id
pub(crate) fn fresh_structure_id() -> u64 {
    NEXT_STRUCTURE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Which array [`DistributedCSR::print`] renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintPart {
    RowPointers,
    Columns,
    Values,
}

/// A contiguous block of rows of a global sparse matrix owned by one worker
///
/// Local row `i` is global row `row_shift + i`. Column indices are global and
/// strictly ascending within each row. The matrix owns its arrays and the
/// communication plans built for it; plans are dropped whenever the sparsity
/// pattern is replaced.
pub struct DistributedCSR<T> {
    /// Number of local rows
    pub n: usize,

    /// Number of (global) columns
    pub m: usize,

    /// Number of rows of the whole matrix
    pub full_n: usize,

    /// First global row owned by this worker
    pub row_shift: usize,

    /// Whether the global matrix is symmetric
    pub is_symmetric: bool,

    residency: Residency,
    row: Vec<usize>,
    col: Vec<usize>,
    val: Vec<T>,
    structure_id: u64,

    pub(crate) halo: Option<HaloInfo<T>>,
    pub(crate) rows_to_get: Option<RowsToGetInfo>,
}

impl<T: Scalar> DistributedCSR<T> {
    /// Creates a host-resident row slice from raw CSR arrays
    ///
    /// # Arguments
    ///
    /// * `n` - Number of local rows
    /// * `m` - Number of global columns
    /// * `full_n` - Number of global rows
    /// * `row_shift` - First global row owned locally
    /// * `row` - Row pointers (size: n + 1)
    /// * `col` - Global column indices
    /// * `val` - Non-zero values
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n: usize,
        m: usize,
        full_n: usize,
        row_shift: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        val: Vec<T>,
    ) -> Result<Self> {
        check_shape(n, &row, &col, val.len())?;
        if row_shift + n > full_n {
            return Err(Error::Shape(format!(
                "rows [{}, {}) exceed full_n = {}",
                row_shift,
                row_shift + n,
                full_n
            ))
            .logged());
        }

        Ok(Self {
            n,
            m,
            full_n,
            row_shift,
            is_symmetric: false,
            residency: Residency::Host,
            row,
            col,
            val,
            structure_id: fresh_structure_id(),
            halo: None,
            rows_to_get: None,
        })
    }

    /// Allocates a zero-filled matrix with room for `nnz` entries
    ///
    /// All rows are empty until the caller installs arrays through
    /// [`DistributedCSR::replace_arrays`].
    pub fn init(
        n: usize,
        m: usize,
        nnz: usize,
        residency: Residency,
        full_n: usize,
        row_shift: usize,
    ) -> Self {
        Self {
            n,
            m,
            full_n,
            row_shift,
            is_symmetric: false,
            residency,
            row: vec![0; n + 1],
            col: Vec::with_capacity(nnz),
            val: Vec::with_capacity(nnz),
            structure_id: fresh_structure_id(),
            halo: None,
            rows_to_get: None,
        }
    }

    /// Wraps a whole matrix as the single slice of a group of one
    pub fn from_global(matrix: SparseMatrixCSR<T>) -> Self {
        Self {
            n: matrix.n_rows,
            m: matrix.n_cols,
            full_n: matrix.n_rows,
            row_shift: 0,
            is_symmetric: false,
            residency: Residency::Host,
            row: matrix.row_ptr,
            col: matrix.col_idx,
            val: matrix.values,
            structure_id: fresh_structure_id(),
            halo: None,
            rows_to_get: None,
        }
    }

    /// Marks the global matrix as symmetric
    pub fn with_symmetric(mut self, is_symmetric: bool) -> Self {
        self.is_symmetric = is_symmetric;
        self
    }

    /// Returns the number of local non-zero elements
    pub fn nnz(&self) -> usize {
        self.val.len()
    }

    /// Row pointers
    pub fn row_ptr(&self) -> &[usize] {
        &self.row
    }

    /// Global column indices
    pub fn col(&self) -> &[usize] {
        &self.col
    }

    /// Non-zero values
    pub fn val(&self) -> &[T] {
        &self.val
    }

    /// Mutable access to the values; the sparsity pattern stays fixed
    pub fn val_mut(&mut self) -> &mut [T] {
        &mut self.val
    }

    /// Row pointers and columns alongside mutable values
    pub fn arrays_mut(&mut self) -> (&[usize], &[usize], &mut [T]) {
        (&self.row, &self.col, &mut self.val)
    }

    /// Replaces the three arrays, invalidating every communication plan
    pub fn replace_arrays(&mut self, row: Vec<usize>, col: Vec<usize>, val: Vec<T>) -> Result<()> {
        check_shape(self.n, &row, &col, val.len())?;
        self.row = row;
        self.col = col;
        self.val = val;
        self.touch_structure();
        Ok(())
    }

    /// Records a structural change: new pattern id, plans released
    pub(crate) fn touch_structure(&mut self) {
        self.structure_id = fresh_structure_id();
        self.free_halo();
        self.free_rows_to_get();
    }

    /// Id of the current sparsity pattern
    pub fn structure_id(&self) -> u64 {
        self.structure_id
    }

    /// Global rows owned by this worker
    pub fn global_rows(&self) -> Range<usize> {
        self.row_shift..self.row_shift + self.n
    }

    /// Whether a global column index refers to a locally owned row
    #[inline]
    pub fn is_local_col(&self, col: usize) -> bool {
        col >= self.row_shift && col < self.row_shift + self.n
    }

    /// Returns an iterator over `(global column, value)` of local row `i`
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row[i];
        let end = self.row[i + 1];
        self.col[start..end]
            .iter()
            .zip(&self.val[start..end])
            .map(|(&col, val)| (col, val))
    }

    /// Columns and values of local row `i`
    #[inline]
    pub fn row_slices(&self, i: usize) -> (&[usize], &[T]) {
        let range = self.row[i]..self.row[i + 1];
        (&self.col[range.clone()], &self.val[range])
    }

    /// Current residency
    pub fn residency(&self) -> Residency {
        self.residency
    }

    /// Fails unless the matrix is resident where a kernel needs it
    pub fn require(&self, expected: Residency) -> Result<()> {
        if self.residency != expected {
            return Err(Error::Residency {
                expected,
                found: self.residency,
            }
            .logged());
        }
        Ok(())
    }

    /// Independent copy resident on the device
    pub fn copy_to_device(&self) -> Self {
        let mut copy = self.clone();
        copy.residency = Residency::Device;
        copy
    }

    /// Independent copy resident on the host
    pub fn copy_to_host(&self) -> Self {
        let mut copy = self.clone();
        copy.residency = Residency::Host;
        copy
    }

    /// Moves the matrix to the device without copying
    pub fn into_device(mut self) -> Self {
        self.residency = Residency::Device;
        self
    }

    /// Moves the matrix to the host without copying
    pub fn into_host(mut self) -> Self {
        self.residency = Residency::Host;
        self
    }

    /// Drops the halo plan
    pub fn free_halo(&mut self) {
        self.halo = None;
    }

    /// Drops the rows-to-get plan
    pub fn free_rows_to_get(&mut self) {
        self.rows_to_get = None;
    }

    /// Cached halo plan, if one has been built
    pub fn halo_info(&self) -> Option<&HaloInfo<T>> {
        self.halo.as_ref()
    }

    /// Cached rows-to-get plan, if one has been built
    pub fn rows_to_get_info(&self) -> Option<&RowsToGetInfo> {
        self.rows_to_get.as_ref()
    }

    /// Local rows as a standalone CSR block with global columns
    pub fn to_block(&self) -> SparseMatrixCSR<T> {
        SparseMatrixCSR {
            n_rows: self.n,
            n_cols: self.m,
            row_ptr: self.row.clone(),
            col_idx: self.col.clone(),
            values: self.val.clone(),
        }
    }

    /// Exact structural and numerical equality of the local slices
    pub fn equals(&self, other: &Self) -> bool {
        self.n == other.n
            && self.m == other.m
            && self.full_n == other.full_n
            && self.row_shift == other.row_shift
            && self.row == other.row
            && self.col == other.col
            && self.val == other.val
    }

    /// Renders up to `limit` entries of one array (all when `limit == 0`)
    pub fn print(&self, part: PrintPart, limit: usize) -> String {
        fn join<I: fmt::Debug>(items: &[I], limit: usize) -> String {
            let take = if limit == 0 { items.len() } else { limit.min(items.len()) };
            let mut out: Vec<String> = items[..take].iter().map(|x| format!("{:?}", x)).collect();
            if take < items.len() {
                out.push(format!("... ({} more)", items.len() - take));
            }
            out.join(" ")
        }

        match part {
            PrintPart::RowPointers => format!("ROW: {}", join(&self.row, limit)),
            PrintPart::Columns => format!("COL: {}", join(&self.col, limit)),
            PrintPart::Values => format!("VAL: {}", join(&self.val, limit)),
        }
    }

    /// Logs the matrix header at `info` level
    pub fn print_info(&self) {
        log::info!(
            "CSR n={} m={} nnz={} full_n={} row_shift={} residency={} symmetric={} halo={} rows_to_get={}",
            self.n,
            self.m,
            self.nnz(),
            self.full_n,
            self.row_shift,
            self.residency,
            self.is_symmetric,
            self.halo.is_some(),
            self.rows_to_get.is_some()
        );
    }
}

impl<T: Scalar> Clone for DistributedCSR<T> {
    /// Copies the arrays; communication plans are not carried over
    fn clone(&self) -> Self {
        Self {
            n: self.n,
            m: self.m,
            full_n: self.full_n,
            row_shift: self.row_shift,
            is_symmetric: self.is_symmetric,
            residency: self.residency,
            row: self.row.clone(),
            col: self.col.clone(),
            val: self.val.clone(),
            structure_id: fresh_structure_id(),
            halo: None,
            rows_to_get: None,
        }
    }
}

impl<T: Scalar> fmt::Debug for DistributedCSR<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DistributedCSR {{")?;
        writeln!(
            f,
            "  rows: [{}, {}) of {}, columns: {}",
            self.row_shift,
            self.row_shift + self.n,
            self.full_n,
            self.m
        )?;
        writeln!(f, "  nnz: {}, residency: {}", self.nnz(), self.residency)?;

        let max_rows_to_print = 5.min(self.n);
        for i in 0..max_rows_to_print {
            write!(f, "    row {}: ", self.row_shift + i)?;
            let (cols, vals) = self.row_slices(i);
            if cols.is_empty() {
                writeln!(f, "(empty)")?;
                continue;
            }
            for (col, val) in cols.iter().zip(vals).take(5) {
                write!(f, "({}, {:?}) ", col, val)?;
            }
            if cols.len() > 5 {
                write!(f, "... ({} more)", cols.len() - 5)?;
            }
            writeln!(f)?;
        }
        if self.n > max_rows_to_print {
            writeln!(f, "    ... ({} more rows)", self.n - max_rows_to_print)?;
        }

        write!(f, "}}")
    }
}
