//! One-shot promises driven by callbacks.
//!
//! A [`Promise`] holds a value that becomes available later, or the error
//! that prevented it. The producer settles it through a [`Completer`]; any
//! number of consumers react to the outcome with [`Promise::success`] and
//! [`Promise::fail`], or derive new promises with [`Promise::map`] and
//! [`Promise::flat_map`]. Blocking functions become promises through
//! [`Wrapper`], which runs them on an injectable [`Executor`].
//!
//! # Examples
//!
//! ```
//! use callback_promise::{Promise, Wrapper};
//! use futures::executor::block_on;
//! use std::{thread, time::Duration};
//!
//! let hello = Promise::new(|completer| completer.resolve(String::from("Hello World")));
//! hello.success(|message| println!("{message}"));
//!
//! let slow = |x: u64, y: u64| {
//!     thread::sleep(Duration::from_millis(x));
//!     format!("bla {}", x + y)
//! };
//! let wrapped = Wrapper::default().wrap(move || slow(40, 2));
//! let length = wrapped.map(|text| text.len());
//! assert_eq!(*block_on(length.waiter()).unwrap(), 6);
//! ```

mod combinators;
mod error;
pub mod executor;
pub mod pool;
mod promise;
mod waiter;
mod wrap;

pub use error::PromiseError;
pub use executor::{Executor, InlineExecutor, Job, ThreadExecutor};
pub use pool::WorkerPool;
pub use promise::{Completer, Promise, Status};
pub use waiter::Waiter;
pub use wrap::Wrapper;

use thiserror::Error;

/// Failures raised by the promise machinery itself, as opposed to the
/// causes carried by a rejected [`Promise`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("promise was already completed")]
    AlreadyCompleted,
    #[error("every completer was dropped before the promise was completed")]
    Abandoned,
    #[error("wrapped function panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
    #[error("worker pool has been shut down")]
    PoolClosed,
}
