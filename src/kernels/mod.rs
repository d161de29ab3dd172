//! Distributed kernels
//!
//! Every kernel takes the [`Worker`](crate::worker::Worker) of the calling
//! rank and requires its matrix operands on the device side. Kernels that
//! touch remote rows or columns are collective.

pub mod norms;
pub mod spgemm;
pub mod spmv;
pub mod transpose;

pub use norms::{infinity_norm, vector_a_norm};
pub use spgemm::spgemm;
pub use spmv::{
    choose_mini_warp_size, prolongation_spmv, shifted_spmv, shifted_spmv_rows, spmv,
    spmv_full, spmv_transposed, MAX_MINI_WARP,
};
pub use transpose::{transpose, transpose_local};
