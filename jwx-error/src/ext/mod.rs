use std::fmt::Display;

mod context;

mod opaque;
pub use opaque::OpaqueError;

/// Describe what was being done when a `Result` or `Option` failed.
///
/// The described error becomes an [`OpaqueError`], its display is the context
/// followed by the original error.
///
/// # Examples
///
/// ```
/// use jwx_error::ErrorContext;
///
/// let result = "twelve".parse::<u32>().context("parse p2c");
/// assert_eq!("parse p2c: invalid digit found in string", result.unwrap_err().to_string());
///
/// let kid: Option<&str> = None;
/// assert_eq!("select key: Option is None", kid.context("select key").unwrap_err().to_string());
/// ```
pub trait ErrorContext: private::SealedErrorContext {
    /// Result type carrying the described error.
    type Context;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static;

    /// Like [`ErrorContext::context`], the context is only built on failure.
    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.map_err(|error| error.context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|error| error.context(context()))
    }
}

impl<T> ErrorContext for Option<T> {
    type Context = Result<T, OpaqueError>;

    fn context<M>(self, context: M) -> Self::Context
    where
        M: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| opaque::MessageError("Option is None").context(context))
    }

    fn with_context<C, F>(self, context: F) -> Self::Context
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| opaque::MessageError("Option is None").context(context()))
    }
}

/// Wrap an error in a context.
///
/// # Examples
///
/// ```
/// use jwx_error::ErrorExt;
///
/// let error = std::fmt::Error.context("render header").context("sign");
/// assert_eq!("sign: render header: an error occurred when formatting an argument", error.to_string());
/// assert!(error.find::<std::fmt::Error>().is_some());
/// ```
pub trait ErrorExt: private::SealedErrorExt {
    fn context<M>(self, context: M) -> OpaqueError
    where
        M: Display + Send + Sync + 'static;

    fn with_context<C, F>(self, context: F) -> OpaqueError
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<Error: std::error::Error + Send + Sync + 'static> ErrorExt for Error {
    fn context<M>(self, context: M) -> OpaqueError
    where
        M: Display + Send + Sync + 'static,
    {
        OpaqueError::from_std(context::ContextError {
            context,
            error: self,
        })
    }

    fn with_context<C, F>(self, context: F) -> OpaqueError
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.context(context())
    }
}

mod private {
    pub trait SealedErrorContext {}

    impl<T, E> SealedErrorContext for Result<T, E> where E: std::error::Error + Send + Sync + 'static {}
    impl<T> SealedErrorContext for Option<T> {}

    pub trait SealedErrorExt {}

    impl<Error: std::error::Error + Send + Sync + 'static> SealedErrorExt for Error {}
}
