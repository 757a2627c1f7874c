//! Fixed-size worker pool draining one shared task channel.

use crossbeam_channel::{Sender, bounded};
use log::warn;
use std::thread::{self, JoinHandle};

use crate::utils::Logger;

/// A unit of work. Errors are the task's own business; the pool never sees them.
pub trait Task: Send {
    fn run(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Returned by [`WorkerPool::submit`] when every worker has exited.
#[derive(Debug, thiserror::Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

/// `size` threads receiving from a rendezvous channel, so [`submit`](WorkerPool::submit) blocks
/// until a worker is free. Bounded concurrency, not fire-and-forget.
pub struct WorkerPool {
    work_tx: Option<Sender<Box<dyn Task>>>,
    handles: Vec<JoinHandle<()>>,
    log: Logger,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (work_tx, work_rx) = bounded::<Box<dyn Task>>(0);
        let handles = (0..size.max(1))
            .map(|_| {
                let work_rx = work_rx.clone();
                thread::spawn(move || {
                    while let Ok(task) = work_rx.recv() {
                        task.run();
                    }
                })
            })
            .collect();
        Self {
            work_tx: Some(work_tx),
            handles,
            log: Logger::default(),
        }
    }

    pub fn logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Hand `task` to a free worker, blocking until one takes it.
    pub fn submit<T>(&self, task: T) -> Result<(), PoolClosed>
    where
        T: Task + 'static,
    {
        let tx = self.work_tx.as_ref().ok_or(PoolClosed)?;
        tx.send(Box::new(task)).map_err(|_| PoolClosed)
    }

    /// Close the task channel and wait for in-flight tasks to finish.
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        drop(self.work_tx.take());
        for h in self.handles.drain(..) {
            if h.join().is_err() {
                warn!(target: self.log.target(), "pool worker panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close_and_join();
    }
}
