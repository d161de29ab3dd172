//! Per-worker execution context
//!
//! A [`Worker`] brackets one solve on one rank: it borrows the communicator,
//! owns the kernel thread pool (the worker's "device") and the injected
//! sparse backend, and carries the configuration. Kernels take it by
//! reference instead of reaching for process-wide state.

use crate::backend::{NativeBackend, SparseBackend};
use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::{EngineConfig, Scalar};

/// Context for the kernels running on one rank
pub struct Worker<'c, C: Communicator, T: Scalar> {
    comm: &'c C,
    backend: Box<dyn SparseBackend<T>>,
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl<'c, C: Communicator, T: Scalar> Worker<'c, C, T> {
    /// Creates a worker using the native backend
    pub fn new(comm: &'c C, config: EngineConfig) -> Result<Self> {
        let backend = NativeBackend {
            dense_accum_threshold: config.dense_accum_threshold,
        };
        Self::with_backend(comm, config, Box::new(backend))
    }

    /// Creates a worker with an explicit backend
    pub fn with_backend(
        comm: &'c C,
        config: EngineConfig,
        backend: Box<dyn SparseBackend<T>>,
    ) -> Result<Self> {
        let threads = config.system_params.n_threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("csr-kernel-{}", i))
            .build()
            .map_err(|e| Error::Backend(format!("cannot start kernel pool: {}", e)).logged())?;

        log::debug!(
            "worker {}/{} ready: {} kernel threads, {} backend",
            comm.rank(),
            comm.size(),
            threads,
            backend.name()
        );

        Ok(Self {
            comm,
            backend,
            config,
            pool,
        })
    }

    /// The group communicator
    pub fn comm(&self) -> &'c C {
        self.comm
    }

    /// The local sparse backend
    pub fn backend(&self) -> &dyn SparseBackend<T> {
        self.backend.as_ref()
    }

    /// Kernel configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `f` inside the worker's kernel pool
    pub fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(f)
    }
}
