//! utilities crate for jwx
//!
//! `jwx-utils` contains utilities used by the `jwx` crates,
//! not really being part of one of the other crates.
//!
//! # jwx
//!
//! Crate used by the end-user `jwx` crate and the other `jwx` crates alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

#[doc(hidden)]
#[macro_use]
pub mod macros;
