//! Communication plans for distributed products
//!
//! Both plans follow the same two-phase shape: a discovery round that
//! negotiates counts (receive buffers cannot be sized before it), then data
//! rounds that reuse the cached counts on every product.
//!
//! - [`HaloInfo`]: scalar entries of a row-distributed vector (SpMV)
//! - [`RowsToGetInfo`]: whole rows of a row-distributed matrix (SpGEMM)

pub mod exchange;
pub mod rows_to_get;

pub use exchange::HaloInfo;
pub use rows_to_get::{FetchedRows, RowsToGetInfo};

use crate::comm::Communicator;
use crate::error::Result;
use crate::matrix::{DistributedCSR, Scalar};

impl<T: Scalar> DistributedCSR<T> {
    /// Halo plan for this matrix, built on first use
    ///
    /// Collective when it builds: every worker must call it for its slice of
    /// the same matrix. Structural changes drop the plan, so the next call
    /// rebuilds it.
    pub fn halo<C: Communicator>(&mut self, comm: &C, check_inputs: bool) -> Result<&mut HaloInfo<T>> {
        let info = match self.halo.take() {
            Some(info) => info,
            None => HaloInfo::build(comm, self, check_inputs)?,
        };
        Ok(self.halo.insert(info))
    }
}
