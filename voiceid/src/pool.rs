//! Bounded pool of OS worker threads with a shared job queue.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::TaskError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of OS worker threads.
///
/// Jobs are closures pulled from a shared MPMC queue; the queue is unbounded
/// but the workers are not, so at most `workers()` jobs run at once. The
/// pool outlives any single verification attempt: dropping it closes the
/// queue and joins the workers after queued jobs finish.
pub struct WorkerPool {
    jobs_tx: Option<Sender<Job>>,
    jobs_rx: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool with `min(available_parallelism, desired)` workers,
    /// at least one. Hosts with fewer cores than desired serialize the work
    /// instead of oversubscribing.
    pub fn new(desired: usize) -> Self {
        let hardware = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(desired.min(hardware))
    }

    /// Creates a pool with exactly `workers` threads (minimum 1), bypassing
    /// the hardware cap. Tests use this to simulate small hosts.
    pub fn with_workers(workers: usize) -> Self {
        let (jobs_tx, jobs_rx) = unbounded::<Job>();
        let workers = (0..workers.max(1))
            .map(|_| {
                let rx = jobs_rx.clone();
                thread::spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
            })
            .collect();
        Self {
            jobs_tx: Some(jobs_tx),
            jobs_rx,
            workers,
        }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues a job. Fails once the pool has been shut down.
    pub fn submit<F>(&self, job: F) -> Result<(), TaskError>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.jobs_tx.as_ref().ok_or(TaskError::PoolClosed)?;
        tx.send(Box::new(job)).map_err(|_| TaskError::PoolClosed)
    }

    /// Returns a cheap cloneable submitter usable from inside jobs.
    ///
    /// An outstanding handle keeps the workers alive: shutdown completes
    /// only after every handle is dropped, so a job holding one can always
    /// finish the work it fans out.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            jobs_tx: self.jobs_tx.clone(),
            jobs_rx: self.jobs_rx.clone(),
        }
    }

    /// Closes the queue and joins the workers. Queued jobs still run.
    /// Further [`submit`](Self::submit) calls fail with `PoolClosed`.
    pub fn shutdown(&mut self) {
        self.jobs_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Cloneable submitter for a [`WorkerPool`], held by jobs that fan out
/// further work and join on it from inside the pool.
#[derive(Clone)]
pub struct PoolHandle {
    jobs_tx: Option<Sender<Job>>,
    jobs_rx: Receiver<Job>,
}

impl PoolHandle {
    /// Enqueues a job. Fails once the pool has been shut down.
    pub fn submit<F>(&self, job: F) -> Result<(), TaskError>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.jobs_tx.as_ref().ok_or(TaskError::PoolClosed)?;
        tx.send(Box::new(job)).map_err(|_| TaskError::PoolClosed)
    }

    /// Blocks until `done` yields a value, running queued jobs while
    /// waiting.
    ///
    /// A job that joins on other jobs in the same pool must wait this way:
    /// on a single-worker pool a plain `recv()` would leave the queue
    /// starved and deadlock, whereas here the joiner executes the queued
    /// work itself and the attempt serializes.
    pub fn help_recv<T>(&self, done: &Receiver<T>) -> Result<T, TaskError> {
        loop {
            crossbeam_channel::select! {
                recv(done) -> msg => return msg.map_err(|_| TaskError::PoolClosed),
                recv(self.jobs_rx) -> job => match job {
                    Ok(job) => job(),
                    // Queue closed; nothing left to help with.
                    Err(_) => break,
                },
            }
        }
        done.recv().map_err(|_| TaskError::PoolClosed)
    }
}
