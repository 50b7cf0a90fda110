use crate::Error;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

type Cause = dyn StdError + Send + Sync + 'static;

/// The reason a [`Promise`](crate::Promise) was rejected.
///
/// Wraps the underlying cause without adding meaning of its own. Cloning is
/// cheap and every clone refers to the same cause, so a rejection forwarded
/// through a chain of promises arrives unchanged at the end of it.
///
/// # Examples
///
/// ```
/// use callback_promise::PromiseError;
/// use std::io;
///
/// let error = PromiseError::new(io::Error::new(io::ErrorKind::NotFound, "no such page"));
/// let forwarded = error.clone();
/// assert!(forwarded.is_same(&error));
/// assert_eq!(forwarded.downcast_ref::<io::Error>().unwrap().kind(), io::ErrorKind::NotFound);
/// ```
#[derive(Clone)]
pub struct PromiseError {
    cause: Arc<Cause>,
}

impl PromiseError {
    pub fn new<E>(cause: E) -> Self
    where
        E: Into<Box<Cause>>,
    {
        Self {
            cause: Arc::from(cause.into()),
        }
    }

    pub fn cause(&self) -> &Cause {
        &*self.cause
    }

    /// Returns the cause as `E` if that is its concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.cause.downcast_ref::<E>()
    }

    /// True when both errors share one cause, i.e. one is a forwarded copy
    /// of the other.
    pub fn is_same(&self, other: &PromiseError) -> bool {
        Arc::as_ptr(&self.cause) as *const () == Arc::as_ptr(&other.cause) as *const ()
    }
}

impl fmt::Display for PromiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cause, f)
    }
}

impl fmt::Debug for PromiseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PromiseError").field(&self.cause).finish()
    }
}

impl StdError for PromiseError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.cause)
    }
}

impl From<Error> for PromiseError {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}

impl From<std::io::Error> for PromiseError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

impl From<Box<Cause>> for PromiseError {
    fn from(cause: Box<Cause>) -> Self {
        Self {
            cause: Arc::from(cause),
        }
    }
}

impl From<String> for PromiseError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for PromiseError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::PromiseError;
    use crate::Error;

    #[test]
    fn test_display_delegates_to_cause() {
        let error = PromiseError::from("connection refused");
        assert_eq!(error.to_string(), "connection refused");
    }

    #[test]
    fn test_downcast_recovers_crate_error() {
        let error = PromiseError::from(Error::Panicked("boom".into()));
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Panicked(message)) if message == "boom"
        ));
        assert!(error.downcast_ref::<std::io::Error>().is_none());
    }

    #[test]
    fn test_clones_share_cause() {
        let error = PromiseError::from("e");
        let other = PromiseError::from("e");
        assert!(error.clone().is_same(&error));
        assert!(!error.is_same(&other));
    }
}
