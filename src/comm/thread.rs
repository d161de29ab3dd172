//! In-process worker group on OS threads
//!
//! Each ordered pair of workers is connected by its own channel, which gives
//! the per-channel FIFO delivery the protocols rely on. Payloads travel as
//! type-erased boxes and are checked on arrival.

use std::any::Any;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use crate::comm::Communicator;
use crate::error::{Error, Result};

type Payload = Box<dyn Any + Send>;

/// One worker's endpoint of a [`ThreadGroup`]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// `outbox[p]` sends to worker `p`
    outbox: Vec<Sender<Payload>>,
    /// `inbox[p]` receives from worker `p`
    inbox: Vec<Mutex<Receiver<Payload>>>,
}

impl ThreadComm {
    /// Creates fully connected endpoints for `size` workers
    pub fn group(size: usize) -> Vec<ThreadComm> {
        // senders[src][dst], receivers[dst][src]
        let mut senders: Vec<Vec<Sender<Payload>>> = (0..size).map(|_| Vec::new()).collect();
        let mut receivers: Vec<Vec<Mutex<Receiver<Payload>>>> =
            (0..size).map(|_| Vec::new()).collect();

        for src_senders in senders.iter_mut() {
            for dst_receivers in receivers.iter_mut() {
                let (tx, rx) = channel();
                src_senders.push(tx);
                dst_receivers.push(Mutex::new(rx));
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outbox, inbox))| ThreadComm {
                rank,
                size,
                outbox,
                inbox,
            })
            .collect()
    }

    fn recv_from(&self, src: usize) -> Result<Payload> {
        let rx = self.inbox[src]
            .lock()
            .map_err(|_| Error::Comm(format!("inbox from {} poisoned", src)).logged())?;
        rx.recv().map_err(|_| {
            Error::Comm(format!("worker {} hung up on worker {}", src, self.rank)).logged()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_to_all_v<D: Send + 'static>(&self, send: Vec<Vec<D>>) -> Result<Vec<Vec<D>>> {
        if send.len() != self.size {
            return Err(Error::Comm(format!(
                "all_to_all_v expects {} buffers, got {}",
                self.size,
                send.len()
            ))
            .logged());
        }

        for (dst, buffer) in send.into_iter().enumerate() {
            self.outbox[dst].send(Box::new(buffer)).map_err(|_| {
                Error::Comm(format!("worker {} hung up on worker {}", dst, self.rank)).logged()
            })?;
        }

        (0..self.size)
            .map(|src| {
                self.recv_from(src)?
                    .downcast::<Vec<D>>()
                    .map(|b| *b)
                    .map_err(|_| {
                        Error::Comm(format!(
                            "worker {} received a mistyped payload from worker {}",
                            self.rank, src
                        ))
                        .logged()
                    })
            })
            .collect()
    }
}

/// Runs a closure once per worker, each on its own thread
pub struct ThreadGroup;

impl ThreadGroup {
    /// Spawns `size` workers and returns their results in rank order
    ///
    /// A panic on any worker is re-raised on the caller. Each endpoint
    /// is dropped when its worker returns, so peers still waiting on it
    /// fail with [`Error::Comm`] instead of blocking.
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&ThreadComm) -> R + Sync,
    {
        let comms = ThreadComm::group(size);
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || f(&comm)))
                .collect();

            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
