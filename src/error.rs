//! Error types for the distributed CSR engine
//!
//! Every variant is fatal for the solve that raised it: a corrupted sparsity
//! pattern invalidates cached communication plans, and partial distributed
//! state cannot be rolled back across the worker group.

use std::fmt;

use thiserror::Error;

/// Where a matrix's arrays currently live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Host memory, readable by validation and printing routines
    Host,
    /// Accelerator memory, required by product and transform kernels
    Device,
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residency::Host => write!(f, "host"),
            Residency::Device => write!(f, "device"),
        }
    }
}

/// Errors raised by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// CSR arrays disagree with the declared dimensions
    #[error("inconsistent CSR shape: {0}")]
    Shape(String),

    /// Column indices of a row are not ascending
    #[error("columns of row {row} are not sorted at position {position} ({prev} >= {next})")]
    UnsortedColumns {
        row: usize,
        position: usize,
        prev: usize,
        next: usize,
    },

    /// A column index references a row that no worker owns
    #[error("column {col} in row {row} is outside [0, {limit})")]
    ColumnOutOfRange { row: usize, col: usize, limit: usize },

    /// A row has no diagonal entry where one is required
    #[error("row {row} has no diagonal entry")]
    MissingDiagonal { row: usize },

    /// Operand dimensions do not line up
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The requested split is impossible
    #[error("cannot split {rows} rows across {procs} processes")]
    Partition { rows: usize, procs: usize },

    /// A kernel received a matrix with the wrong residency
    #[error("matrix is resident on the {found}, operation requires the {expected}")]
    Residency { expected: Residency, found: Residency },

    /// A communication plan no longer matches the matrices it serves
    #[error("stale communication plan: {0}")]
    StalePlan(String),

    /// Incomplete factorization hit a zero pivot
    #[error("zero pivot in row {row}")]
    ZeroPivot { row: usize },

    /// A matching vector is not an involution
    #[error("matching is inconsistent at index {index}")]
    Matching { index: usize },

    /// The message-passing layer failed
    #[error("communication failure: {0}")]
    Comm(String),

    /// The local sparse backend failed
    #[error("sparse backend failure: {0}")]
    Backend(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Logs this error at `error` level and returns it
    pub(crate) fn logged(self) -> Self {
        log::error!("{}", self);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::ColumnOutOfRange {
            row: 2,
            col: 9,
            limit: 6,
        };
        assert_eq!(err.to_string(), "column 9 in row 2 is outside [0, 6)");

        let err = Error::Residency {
            expected: Residency::Device,
            found: Residency::Host,
        };
        assert_eq!(
            err.to_string(),
            "matrix is resident on the host, operation requires the device"
        );
    }
}
