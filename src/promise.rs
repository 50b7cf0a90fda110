//! The one-shot completion state machine.
//!
//! A [`Promise`] starts out pending and is settled exactly once, through its
//! [`Completer`]. Reactions registered with [`Promise::success`] and
//! [`Promise::fail`] run once the matching outcome is known: on the calling
//! thread if the promise is already settled, otherwise on whichever thread
//! settles it.
use crate::wrap::describe_panic;
use crate::{Error, PromiseError};
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Reaction<A> = Box<dyn FnOnce(&A) + Send>;
type OnSuccess<T> = Reaction<Arc<T>>;
type OnFailure = Reaction<PromiseError>;

/// Where a [`Promise`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

enum State<T> {
    Pending,
    Fulfilled(Arc<T>),
    Rejected(PromiseError),
}

struct Inner<T> {
    state: State<T>,
    // Only ever non-empty while pending.
    on_success: Vec<OnSuccess<T>>,
    on_failure: Vec<OnFailure>,
}

impl<T> Inner<T> {
    fn status(&self) -> Status {
        match self.state {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

/// Runs every reaction of a settled batch, even when an earlier one panics.
/// The first panic is re-raised once the whole batch has run.
fn run_reactions<A>(reactions: Vec<Reaction<A>>, argument: &A) {
    let mut first_panic = None;
    for reaction in reactions {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| reaction(argument))) {
            let message = describe_panic(&*panic);
            tracing::warn!(%message, "promise reaction panicked");
            first_panic.get_or_insert(panic);
        }
    }
    if let Some(panic) = first_panic {
        panic::resume_unwind(panic);
    }
}

/// A value of type `T` that becomes available later, or the error that
/// prevented it.
///
/// `Promise` is a shared handle: clones observe the same outcome. The value
/// is kept behind an [`Arc`] so every reaction sees it by reference.
///
/// # Examples
///
/// ```
/// use callback_promise::Promise;
/// use std::thread;
///
/// let (promise, completer) = Promise::<u32>::pending();
/// promise.success(|value| assert_eq!(*value, 7));
/// thread::spawn(move || completer.resolve(7)).join().unwrap();
/// assert_eq!(*promise.value().unwrap(), 7);
/// ```
pub struct Promise<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Promise<T> {
    pub fn status(&self) -> Status {
        self.lock().status()
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status() == Status::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.status() == Status::Rejected
    }

    /// The stored value, if the promise has been fulfilled.
    pub fn value(&self) -> Option<Arc<T>> {
        match &self.lock().state {
            State::Fulfilled(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// The stored error, if the promise has been rejected.
    pub fn error(&self) -> Option<PromiseError> {
        match &self.lock().state {
            State::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }

    // No reaction runs while this lock is held, so a poisoned lock still
    // guards a consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The one transition out of `Pending`.
    ///
    /// Reactions registered while pending run here, on the settling thread.
    /// Anything registered once the state has flipped runs on its
    /// registering thread instead.
    pub(crate) fn settle(&self, outcome: Result<Arc<T>, PromiseError>) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.status() != Status::Pending {
            return Err(Error::AlreadyCompleted);
        }
        let on_success = mem::take(&mut inner.on_success);
        let on_failure = mem::take(&mut inner.on_failure);
        match outcome {
            Ok(value) => {
                inner.state = State::Fulfilled(Arc::clone(&value));
                drop(inner);
                tracing::trace!(reactions = on_success.len(), "promise fulfilled");
                // Failure reactions can never run; they may own completers of
                // other promises, so release them outside the lock.
                drop(on_failure);
                run_reactions(on_success, &value);
            }
            Err(error) => {
                inner.state = State::Rejected(error.clone());
                drop(inner);
                tracing::trace!(reactions = on_failure.len(), "promise rejected");
                drop(on_success);
                run_reactions(on_failure, &error);
            }
        }
        Ok(())
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    /// Creates a promise and hands its completer to `resolver`, which is
    /// invoked before `new` returns. The resolver may complete right away or
    /// move the completer to another thread and complete later.
    ///
    /// A panic inside `resolver` is not caught.
    pub fn new<R>(resolver: R) -> Self
    where
        R: FnOnce(Completer<T>),
    {
        let (promise, completer) = Self::pending();
        resolver(completer);
        promise
    }

    /// A pending promise together with the handle that settles it.
    pub fn pending() -> (Self, Completer<T>) {
        let promise = Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                on_success: Vec::new(),
                on_failure: Vec::new(),
            })),
        };
        let completer = Completer {
            slot: Arc::new(Slot {
                promise: promise.clone(),
            }),
        };
        (promise, completer)
    }

    pub fn fulfilled(value: T) -> Self {
        Self::new(|completer| completer.resolve(value))
    }

    pub fn rejected(error: impl Into<PromiseError>) -> Self {
        Self::new(|completer| completer.reject(error))
    }

    /// Registers a reaction to the fulfilled value.
    ///
    /// Runs before `success` returns if the promise is already fulfilled,
    /// never if it was rejected. Returns `self` so registrations can be
    /// chained.
    pub fn success<F>(&self, reaction: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
    {
        self.when_fulfilled(move |value| reaction(&**value))
    }

    /// Registers a reaction to the rejection error.
    ///
    /// Runs before `fail` returns if the promise is already rejected, never
    /// if it was fulfilled.
    pub fn fail<F>(&self, reaction: F) -> &Self
    where
        F: FnOnce(&PromiseError) + Send + 'static,
    {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &inner.state {
            State::Pending => inner.on_failure.push(Box::new(reaction)),
            State::Rejected(error) => {
                let error = error.clone();
                drop(guard);
                reaction(&error);
            }
            State::Fulfilled(_) => {
                drop(guard);
                drop(reaction);
            }
        }
        self
    }

    /// Like [`success`](Self::success), but hands out the shared value so it
    /// can be forwarded without cloning `T`.
    pub(crate) fn when_fulfilled<F>(&self, reaction: F) -> &Self
    where
        F: FnOnce(&Arc<T>) + Send + 'static,
    {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match &inner.state {
            State::Pending => inner.on_success.push(Box::new(reaction)),
            State::Fulfilled(value) => {
                let value = Arc::clone(value);
                drop(guard);
                reaction(&value);
            }
            State::Rejected(_) => {
                drop(guard);
                drop(reaction);
            }
        }
        self
    }
}

/// The completion callback handed to a promise's resolver.
///
/// Exactly one completion is allowed per promise. Clones share that single
/// completion: completing through one of them settles the promise for all.
/// If every clone is dropped while the promise is still pending, the promise
/// is rejected with [`Error::Abandoned`].
pub struct Completer<T> {
    slot: Arc<Slot<T>>,
}

struct Slot<T> {
    promise: Promise<T>,
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if self.promise.is_pending() {
            tracing::warn!("completer dropped without completing its promise");
            let _ = self.promise.settle(Err(Error::Abandoned.into()));
        }
    }
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("status", &self.slot.promise.status())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Completer<T> {
    /// Settles the promise with `outcome`.
    ///
    /// # Panics
    ///
    /// Panics if the promise was already completed. A second completion
    /// means the resolver is broken; use [`try_complete`](Self::try_complete)
    /// where racing completions are expected.
    pub fn complete(self, outcome: Result<T, PromiseError>) {
        self.settle(outcome.map(Arc::new));
    }

    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn reject(self, error: impl Into<PromiseError>) {
        self.complete(Err(error.into()));
    }

    /// Settles the promise unless it was already completed, in which case
    /// `outcome` is discarded and [`Error::AlreadyCompleted`] is returned.
    pub fn try_complete(self, outcome: Result<T, PromiseError>) -> Result<(), Error> {
        self.slot.promise.settle(outcome.map(Arc::new))
    }

    pub fn is_completed(&self) -> bool {
        !self.slot.promise.is_pending()
    }

    pub(crate) fn settle(self, outcome: Result<Arc<T>, PromiseError>) {
        if let Err(err) = self.slot.promise.settle(outcome) {
            tracing::error!("promise completed twice");
            panic!("{err}");
        }
    }
}
