//! Message-passing abstraction for the worker group
//!
//! The engine needs three things from the transport: a variable-size
//! all-to-all (negotiation and payload rounds of the halo and rows-to-get
//! protocols), an all-gather (row-range discovery) and scalar reductions
//! (norms). Delivery is assumed reliable and ordered per pair of workers.

pub mod thread;

pub use thread::{ThreadComm, ThreadGroup};

use crate::error::Result;

/// Collective operations over a fixed group of workers
///
/// Every worker must issue the same sequence of collective calls.
pub trait Communicator: Sync {
    /// Index of this worker in the group
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn size(&self) -> usize;

    /// Variable all-to-all: `send[p]` goes to worker `p`, the result holds
    /// what every worker sent to this one, indexed by source.
    fn all_to_all_v<D: Send + 'static>(&self, send: Vec<Vec<D>>) -> Result<Vec<Vec<D>>>;

    /// Blocks until every worker has reached the barrier
    fn barrier(&self) -> Result<()> {
        let empty = (0..self.size()).map(|_| Vec::<()>::new()).collect();
        self.all_to_all_v(empty).map(|_| ())
    }

    /// One value to every worker, one value from every worker
    fn all_to_all<D: Send + 'static>(&self, send: Vec<D>) -> Result<Vec<D>> {
        let wrapped = send.into_iter().map(|d| vec![d]).collect();
        Ok(self
            .all_to_all_v(wrapped)?
            .into_iter()
            .flat_map(|v| v.into_iter())
            .collect())
    }

    /// Every worker's value, indexed by rank
    fn all_gather<D: Clone + Send + 'static>(&self, value: D) -> Result<Vec<D>> {
        self.all_to_all(vec![value; self.size()])
    }

    /// Sum over the group, combined in rank order on every worker
    fn all_reduce_sum(&self, value: f64) -> Result<f64> {
        Ok(self.all_gather(value)?.into_iter().sum())
    }

    /// Maximum over the group
    fn all_reduce_max(&self, value: f64) -> Result<f64> {
        Ok(self
            .all_gather(value)?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// Logical OR over the group
    fn all_reduce_any(&self, flag: bool) -> Result<bool> {
        Ok(self.all_gather(flag)?.into_iter().any(|f| f))
    }
}

/// Group of one: every collective is a local copy
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all_v<D: Send + 'static>(&self, send: Vec<Vec<D>>) -> Result<Vec<Vec<D>>> {
        if send.len() != 1 {
            return Err(crate::error::Error::Comm(format!(
                "all_to_all_v expects 1 buffer, got {}",
                send.len()
            ))
            .logged());
        }
        Ok(send)
    }
}
