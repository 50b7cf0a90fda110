//! Promises derived from other promises.
//!
//! Every combinator returns a fresh [`Promise`] whose resolver subscribes to
//! the source. A rejected source short-circuits: the transform is skipped and
//! the source error is forwarded as-is.
use crate::{Completer, Promise, PromiseError};
use std::sync::Arc;

impl<T: Send + Sync + 'static> Promise<T> {
    /// Transforms the fulfilled value.
    ///
    /// # Examples
    ///
    /// ```
    /// use callback_promise::Promise;
    ///
    /// let doubled = Promise::fulfilled(21).map(|value| value * 2);
    /// assert_eq!(*doubled.value().unwrap(), 42);
    /// ```
    pub fn map<U, F>(&self, transform: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        self.try_map(move |value| Ok::<U, PromiseError>(transform(value)))
    }

    /// Transforms the fulfilled value with a step that may fail; an `Err`
    /// rejects the derived promise.
    pub fn try_map<U, E, F>(&self, transform: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        E: Into<PromiseError>,
        F: FnOnce(&T) -> Result<U, E> + Send + 'static,
    {
        Promise::new(|completer: Completer<U>| {
            let on_failure = completer.clone();
            self.success(move |value| completer.complete(transform(value).map_err(Into::into)))
                .fail(move |error| on_failure.reject(error.clone()));
        })
    }

    /// Chains a dependent asynchronous step.
    ///
    /// Once this promise is fulfilled, `transform` produces an inner promise
    /// whose outcome becomes the outcome of the returned promise. If this
    /// promise is rejected, `transform` is never called.
    ///
    /// # Examples
    ///
    /// ```
    /// use callback_promise::Promise;
    ///
    /// let page = Promise::fulfilled(String::from("<html>\nlast line"));
    /// let last_line = page.flat_map(|body| {
    ///     let body = body.clone();
    ///     Promise::new(move |completer| match body.lines().last() {
    ///         Some(line) => completer.resolve(line.to_owned()),
    ///         None => completer.reject("empty page"),
    ///     })
    /// });
    /// assert_eq!(last_line.value().unwrap().as_str(), "last line");
    /// ```
    pub fn flat_map<U, F>(&self, transform: F) -> Promise<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Promise<U> + Send + 'static,
    {
        Promise::new(|completer: Completer<U>| {
            let on_failure = completer.clone();
            self.when_fulfilled(move |value| {
                let inner = transform(value);
                let on_inner_failure = completer.clone();
                inner
                    .when_fulfilled(move |value| completer.settle(Ok(Arc::clone(value))))
                    .fail(move |error| on_inner_failure.reject(error.clone()));
            })
            .fail(move |error| on_failure.reject(error.clone()));
        })
    }

    /// Rewrites the rejection error; a fulfilled value passes through.
    pub fn map_err<F>(&self, transform: F) -> Promise<T>
    where
        F: FnOnce(&PromiseError) -> PromiseError + Send + 'static,
    {
        Promise::new(|completer: Completer<T>| {
            let on_failure = completer.clone();
            self.when_fulfilled(move |value| completer.settle(Ok(Arc::clone(value))))
                .fail(move |error| on_failure.reject(transform(error)));
        })
    }
}
