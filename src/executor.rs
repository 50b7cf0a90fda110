//! Where wrapped functions run.
//!
//! [`Executor`] is the seam between [`Wrapper`](crate::Wrapper) and the
//! threads that do the work. [`ThreadExecutor`] spawns one thread per job,
//! [`WorkerPool`](crate::WorkerPool) reuses a fixed set of threads and
//! [`InlineExecutor`] runs the job on the caller, which keeps tests
//! deterministic.
use crate::Error;
use std::sync::Arc;
use std::thread;

/// A unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) const DEFAULT_THREAD_NAME: &str = "promise-worker";

pub trait Executor: Send + Sync {
    /// Schedules `job` to run exactly once. An `Err` means the job was
    /// dropped without running.
    fn execute(&self, job: Job) -> Result<(), Error>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) -> Result<(), Error> {
        (**self).execute(job)
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, job: Job) -> Result<(), Error> {
        (**self).execute(job)
    }
}

/// Runs every job on the calling thread before `execute` returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) -> Result<(), Error> {
        job();
        Ok(())
    }
}

/// Spawns a detached OS thread for every job.
///
/// # Examples
///
/// ```
/// use callback_promise::{ThreadExecutor, Wrapper};
///
/// let executor = ThreadExecutor::builder()
///     .name("page-fetch")
///     .stack_size(256 * 1024)
///     .build();
/// let promise = Wrapper::new(executor).wrap(|| std::thread::current().name().map(str::to_owned));
/// ```
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    name: String,
    stack_size: Option<usize>,
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ThreadExecutor {
    pub fn builder() -> ThreadExecutorBuilder {
        ThreadExecutorBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) -> Result<(), Error> {
        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        tracing::debug!(thread = %self.name, "spawning thread for job");
        builder.spawn(job)?;
        Ok(())
    }
}

/// Fluent configuration for a [`ThreadExecutor`].
#[derive(Debug, Clone)]
pub struct ThreadExecutorBuilder {
    name: String,
    stack_size: Option<usize>,
}

impl Default for ThreadExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadExecutorBuilder {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
        }
    }

    /// Name given to every spawned thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stack size in bytes; the platform default when unset.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn build(self) -> ThreadExecutor {
        ThreadExecutor {
            name: self.name,
            stack_size: self.stack_size,
        }
    }
}
