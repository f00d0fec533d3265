use std::fmt::{self, Debug, Display};

use crate::BoxError;

#[repr(transparent)]
/// The error returned by every fallible jwx operation.
///
/// It hides the concrete error, which is usually a classified error of the
/// engine wrapped in one or more contexts. Use [`OpaqueError::find`] to look
/// it up again.
pub struct OpaqueError(BoxError);

impl OpaqueError {
    /// Wrap any std error.
    pub fn from_std(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(error))
    }

    /// Error with only a message.
    pub fn from_display(msg: impl Display + Debug + Send + Sync + 'static) -> Self {
        Self::from_std(MessageError(msg))
    }

    /// Wrap an already boxed error, e.g. one returned by a user supplied fetcher.
    pub fn from_boxed(inner: BoxError) -> Self {
        Self(inner)
    }

    /// First error of type `T` in the source chain, contexts are skipped.
    pub fn find<T>(&self) -> Option<&T>
    where
        T: std::error::Error + 'static,
    {
        let mut next: Option<&(dyn std::error::Error + 'static)> = Some(self.0.as_ref());
        while let Some(error) = next {
            if let Some(found) = error.downcast_ref::<T>() {
                return Some(found);
            }
            next = error.source();
        }
        None
    }
}

impl Debug for OpaqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for OpaqueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for OpaqueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl From<BoxError> for OpaqueError {
    fn from(error: BoxError) -> Self {
        Self(error)
    }
}

/// Plain message used as an error.
pub(super) struct MessageError<M>(pub(super) M);

impl<M: Debug> Debug for MessageError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageError").field(&self.0).finish()
    }
}

impl<M: Display> Display for MessageError<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<M> std::error::Error for MessageError<M> where M: Display + Debug + 'static {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorExt;

    #[derive(Debug)]
    struct InvalidKey {
        kid: &'static str,
    }

    impl Display for InvalidKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "invalid key {}", self.kid)
        }
    }

    impl std::error::Error for InvalidKey {}

    #[test]
    fn find_through_contexts() {
        let error = InvalidKey { kid: "k1" }
            .context("parse jwk")
            .context("verify jws");
        assert_eq!("k1", error.find::<InvalidKey>().unwrap().kid);
        assert_eq!("verify jws: parse jwk: invalid key k1", error.to_string());
    }

    #[test]
    fn message_has_no_typed_cause() {
        let error = OpaqueError::from_display("no key");
        assert!(error.find::<InvalidKey>().is_none());
        assert_eq!("no key", error.to_string());
    }

    #[test]
    fn boxed_error_keeps_its_type() {
        let boxed: BoxError = Box::new(InvalidKey { kid: "remote" });
        let error = OpaqueError::from_boxed(boxed);
        assert_eq!("remote", error.find::<InvalidKey>().unwrap().kid);
    }
}
