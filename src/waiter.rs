use crate::{Promise, PromiseError};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

/// Future that resolves with the outcome of a [`Promise`].
///
/// Obtained from [`Promise::waiter`] or by awaiting a promise directly. The
/// waiter subscribes through ordinary reactions, so it neither blocks nor
/// changes how other reactions are delivered.
///
/// # Examples
///
/// ```
/// use callback_promise::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let (promise, completer) = Promise::<String>::pending();
/// let task = thread::spawn(move || block_on(async {
///     promise.await.map(|value| value.len())
/// }));
/// completer.resolve("🍓".into());
/// assert_eq!(task.join().expect("The task thread has panicked").unwrap(), 4);
/// ```
#[derive(Debug)]
pub struct Waiter<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

#[derive(Debug)]
struct Slot<T> {
    outcome: Option<Result<Arc<T>, PromiseError>>,
    waker: Option<Waker>,
}

fn fill<T>(slot: &Mutex<Slot<T>>, outcome: Result<Arc<T>, PromiseError>) {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    slot.outcome = Some(outcome);
    if let Some(waker) = slot.waker.take() {
        drop(slot);
        waker.wake();
    }
}

impl<T: Send + Sync + 'static> Promise<T> {
    pub fn waiter(&self) -> Waiter<T> {
        let slot = Arc::new(Mutex::new(Slot {
            outcome: None,
            waker: None,
        }));
        let on_success = Arc::clone(&slot);
        let on_failure = Arc::clone(&slot);
        self.when_fulfilled(move |value| fill(&on_success, Ok(Arc::clone(value))))
            .fail(move |error| fill(&on_failure, Err(error.clone())));
        Waiter { slot }
    }
}

impl<T: Send + Sync + 'static> IntoFuture for Promise<T> {
    type Output = Result<Arc<T>, PromiseError>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.waiter()
    }
}

impl<T> Future for Waiter<T> {
    type Output = Result<Arc<T>, PromiseError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.outcome {
            Some(ref outcome) => Poll::Ready(outcome.clone()),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
