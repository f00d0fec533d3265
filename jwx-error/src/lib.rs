//! Error types and utilities for jwx.
//!
//! Every fallible jwx operation returns an [`OpaqueError`]. Callers that care
//! about the cause look it up with [`OpaqueError::find`], while [`ErrorContext`]
//! and [`ErrorExt`] describe what was being done when something failed.
//!
//! Crate used by the end-user `jwx` crate and the other `jwx` crates alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

/// Boxed error, as returned by user supplied callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

mod ext;
pub use ext::{ErrorContext, ErrorExt, OpaqueError};
