use std::fmt;

use jwx_error::OpaqueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Class of a [`JoseError`].
pub enum JoseErrorKind {
    /// Malformed input or protocol misuse.
    ///
    /// Bad compact segment counts, unparseable JSON or PEM,
    /// a compact JWE with more than one recipient, ...
    Argument,
    /// Cryptographic verification failed.
    ///
    /// Bad signature, bad authentication tag, bad DER encoding.
    Verification,
    /// The algorithm or curve has no implementation.
    Unsupported,
    /// Required data is absent.
    Missing,
}

#[derive(Debug, Clone)]
/// Error raised by the JOSE engine.
///
/// Usually returned wrapped in an [`OpaqueError`], use
/// [`JoseErrorKind::of`] to find the class of such an error.
pub struct JoseError {
    kind: JoseErrorKind,
    message: String,
}

impl JoseError {
    /// Create a new [`JoseError`].
    pub fn new(kind: JoseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(JoseErrorKind::Argument, message)
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(JoseErrorKind::Verification, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(JoseErrorKind::Unsupported, message)
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self::new(JoseErrorKind::Missing, message)
    }

    /// Class of this error.
    pub fn kind(&self) -> JoseErrorKind {
        self.kind
    }

    /// Human readable message of this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JoseError {}

impl From<JoseError> for OpaqueError {
    fn from(value: JoseError) -> Self {
        Self::from_std(value)
    }
}

impl JoseErrorKind {
    /// Find the class of the first [`JoseError`] in the source chain of `error`.
    pub fn of(error: &(dyn std::error::Error + 'static)) -> Option<Self> {
        std::iter::successors(Some(error), |err| err.source())
            .find_map(|err| err.downcast_ref::<JoseError>())
            .map(JoseError::kind)
    }
}

/// Shortcut to get the [`JoseErrorKind`] of an [`OpaqueError`].
pub fn error_kind(error: &OpaqueError) -> Option<JoseErrorKind> {
    error.find::<JoseError>().map(JoseError::kind)
}
