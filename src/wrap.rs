//! Turning blocking functions into promises.
//!
//! The function runs on an [`Executor`]; the caller gets a pending
//! [`Promise`] back immediately. This is the one place where failures of the
//! wrapped code are converted: an `Err` or a panic becomes a rejection, a
//! returned value becomes the fulfilled value.
use crate::{Completer, Error, Executor, Job, Promise, PromiseError, ThreadExecutor};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

impl<T: Send + Sync + 'static> Promise<T> {
    /// Runs `function` on `executor` and fulfills the returned promise with
    /// its result. A panic in `function` rejects it with [`Error::Panicked`].
    pub fn wrap<E, F>(executor: &E, function: F) -> Self
    where
        E: Executor + ?Sized,
        F: FnOnce() -> T + Send + 'static,
    {
        Self::try_wrap(executor, move || Ok::<T, PromiseError>(function()))
    }

    /// Like [`wrap`](Self::wrap) for fallible functions; an `Err` rejects the
    /// returned promise.
    pub fn try_wrap<E, Err, F>(executor: &E, function: F) -> Self
    where
        E: Executor + ?Sized,
        Err: Into<PromiseError>,
        F: FnOnce() -> Result<T, Err> + Send + 'static,
    {
        Self::new(|completer: Completer<T>| {
            let worker = completer.clone();
            let job: Job = Box::new(move || {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(function)) {
                    Ok(result) => result.map_err(Into::into),
                    Err(panic) => {
                        let message = describe_panic(&*panic);
                        tracing::warn!(%message, "wrapped function panicked");
                        Err(Error::Panicked(message).into())
                    }
                };
                worker.complete(outcome);
            });
            if let Err(err) = executor.execute(job) {
                tracing::warn!(error = %err, "executor refused wrapped function");
                completer.reject(err);
            }
        })
    }
}

// See https://github.com/rust-lang/rfcs/issues/1389
pub(crate) fn describe_panic(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Adapts synchronous functions into promises using an owned executor.
///
/// # Examples
///
/// ```
/// use callback_promise::Wrapper;
/// use futures::executor::block_on;
/// use std::{thread, time::Duration};
///
/// let slow = |x: u64, y: u64| {
///     thread::sleep(Duration::from_millis(x));
///     format!("bla {}", x + y)
/// };
/// let promise = Wrapper::default().wrap(move || slow(40, 2));
/// assert!(promise.is_pending());
/// assert_eq!(block_on(promise.waiter()).unwrap().as_str(), "bla 42");
/// ```
#[derive(Debug, Clone)]
pub struct Wrapper<E = ThreadExecutor> {
    executor: E,
}

impl Default for Wrapper {
    fn default() -> Self {
        Self::new(ThreadExecutor::default())
    }
}

impl<E: Executor> Wrapper<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn wrap<T, F>(&self, function: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        Promise::wrap(&self.executor, function)
    }

    pub fn try_wrap<T, Err, F>(&self, function: F) -> Promise<T>
    where
        T: Send + Sync + 'static,
        Err: Into<PromiseError>,
        F: FnOnce() -> Result<T, Err> + Send + 'static,
    {
        Promise::try_wrap(&self.executor, function)
    }
}
