//! # halo-csr: distributed sparse matrices with halo exchange
//!
//! Row-partitioned CSR matrices spread over a group of workers, with the
//! communication plans and kernels an algebraic multigrid setup needs.
//!
//! ## Overview
//!
//! Every worker owns a contiguous range of global rows and stores them with
//! global column indices. The library provides:
//!
//! - Partitioning of a whole matrix into row slices and back
//! - **Halo exchange**: the cached plan that brings the remote entries of a
//!   row-distributed vector to the workers that reference them
//! - **Rows-to-get**: the cached plan that fetches remote rows of the right
//!   operand of a distributed matrix product
//! - Adaptive mini-warp SpMV (plain, shifted, prolongation and transposed)
//! - Distributed SpGEMM and transpose
//! - Structural helpers: diagonal split and merge, ILU(0), row scaling
//! - Norms and validation
//!
//! ## Usage
//!
//! ```
//! use halo_csr::comm::{Communicator, ThreadGroup};
//! use halo_csr::kernels::spmv;
//! use halo_csr::matrix::{split, EngineConfig, SparseMatrixCSR};
//! use halo_csr::Worker;
//!
//! let a = SparseMatrixCSR::<f64>::identity(4);
//! let parts = split(&a, 2).unwrap();
//!
//! let results = ThreadGroup::run(2, |comm| {
//!     let worker = Worker::new(comm, EngineConfig::default().with_threads(1)).unwrap();
//!     let mut local = parts[comm.rank()].copy_to_device();
//!     let x = vec![1.0; local.n];
//!     let mut y = vec![0.0; local.n];
//!     spmv(&worker, &mut local, &x, &mut y, 1.0, 0.0).unwrap();
//!     y
//! });
//! assert_eq!(results.concat(), vec![1.0; 4]);
//! ```

pub mod accumulator;
pub mod backend;
pub mod comm;
pub mod error;
pub mod halo;
pub mod kernels;
pub mod matrix;
pub mod utils;
pub mod worker;

// Re-export primary components
pub use backend::{NativeBackend, SparseBackend, SprsBackend};
pub use comm::{Communicator, SelfComm, ThreadComm, ThreadGroup};
pub use error::{Error, Residency, Result};
pub use halo::{FetchedRows, HaloInfo, RowsToGetInfo};
pub use matrix::config::{EngineConfig, MiniWarpThresholds, SystemParameters};
pub use matrix::{DistributedCSR, PrintPart, RowPartition, Scalar, SparseMatrixCSR};
pub use utils::formats::{from_sprs_csr, to_sprs_csr};
pub use worker::Worker;

/// Version information for the halo-csr library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
