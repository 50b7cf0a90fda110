//! A fixed-size pool of worker threads fed through a channel.
//!
//! Jobs go into an unbounded multi-consumer channel and every worker holds
//! its own receiver. Shutting the pool down drops the sender, which lets
//! every worker finish the jobs already queued and exit.
use crate::executor::{Executor, Job, DEFAULT_THREAD_NAME};
use crate::Error;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// An [`Executor`] backed by a fixed set of threads.
///
/// # Examples
///
/// ```
/// use callback_promise::{WorkerPool, Wrapper};
/// use futures::executor::block_on;
///
/// let pool = WorkerPool::builder().workers(2).name("reader").build().unwrap();
/// let wrapper = Wrapper::new(pool);
/// let sum = wrapper.wrap(|| (1..=10).sum::<u32>());
/// assert_eq!(*block_on(sum.waiter()).unwrap(), 55);
/// ```
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::new()
    }

    pub fn size(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Stops accepting jobs, lets the workers drain the queue and joins
    /// them. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        tracing::debug!(workers = workers.len(), "shutting down worker pool");
        let current = thread::current().id();
        for worker in workers {
            // A job that drops the last handle to its own pool cannot join
            // the thread it runs on.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::warn!("worker thread exited with a panic");
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) -> Result<(), Error> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| Error::PoolClosed),
            None => Err(Error::PoolClosed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(name: &str, jobs: Receiver<Job>) {
    for job in jobs {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!(worker = name, "job panicked; worker keeps running");
        }
    }
    tracing::debug!(worker = name, "worker exiting");
}

/// Fluent configuration for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolBuilder {
    workers: usize,
    name: String,
    stack_size: Option<usize>,
}

impl Default for WorkerPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPoolBuilder {
    /// Defaults to one worker per available core.
    pub fn new() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(1, |n| n.get()),
            name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
        }
    }

    /// Number of worker threads, at least one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Prefix of the worker thread names; workers are suffixed `-0`, `-1`, ...
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Spawns the workers.
    pub fn build(self) -> Result<WorkerPool, Error> {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let pool = WorkerPool {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(Vec::with_capacity(self.workers)),
        };
        for index in 0..self.workers {
            let name = format!("{}-{index}", self.name);
            let mut builder = thread::Builder::new().name(name.clone());
            if let Some(size) = self.stack_size {
                builder = builder.stack_size(size);
            }
            let jobs = rx.clone();
            // On error `pool` drops here and joins the workers spawned so far.
            let worker = builder.spawn(move || work(&name, jobs))?;
            pool.workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(worker);
        }
        tracing::debug!(workers = self.workers, name = %self.name, "worker pool started");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerPool;
    use crate::{Error, Executor};
    use std::collections::HashSet;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_pool_runs_jobs_on_named_workers() {
        let pool = WorkerPool::builder().workers(3).name("io").build().unwrap();
        assert_eq!(pool.size(), 3);
        let (tx, rx) = channel();
        for _ in 0..12 {
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                tx.send(thread::current().name().map(str::to_owned)).unwrap();
            }))
            .unwrap();
        }
        drop(tx);
        let names: HashSet<_> = rx.iter().map(Option::unwrap).collect();
        assert!(!names.is_empty());
        assert!(names.iter().all(|name| name.starts_with("io-")));
    }

    #[test]
    fn test_shutdown_drains_queue_then_rejects() {
        let pool = WorkerPool::builder().workers(1).build().unwrap();
        let (tx, rx) = channel();
        for index in 0..5 {
            let tx = tx.clone();
            pool.execute(Box::new(move || tx.send(index).unwrap())).unwrap();
        }
        pool.shutdown();
        drop(tx);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(matches!(
            pool.execute(Box::new(|| {})),
            Err(Error::PoolClosed)
        ));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::builder().workers(1).build().unwrap();
        pool.execute(Box::new(|| panic!("job failed"))).unwrap();
        let (tx, rx) = channel();
        pool.execute(Box::new(move || tx.send("still here").unwrap()))
            .unwrap();
        assert_eq!(rx.recv().unwrap(), "still here");
    }

    #[test]
    fn test_workers_take_jobs_concurrently() {
        let pool = WorkerPool::builder().workers(2).build().unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let (tx, rx) = channel();
        for index in 0..2 {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            pool.execute(Box::new(move || {
                barrier.wait();
                tx.send(index).unwrap();
            }))
            .unwrap();
        }
        drop(tx);
        let mut done: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        done.sort();
        assert_eq!(done, vec![0, 1]);
    }

    #[test]
    fn test_zero_workers_rounds_up() {
        let pool = WorkerPool::builder().workers(0).build().unwrap();
        assert_eq!(pool.size(), 1);
    }
}
