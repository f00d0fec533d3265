//! 🔐 jwx: JSON Object Signing and Encryption for Rust.
//!
//! jwx builds, parses, signs, verifies, encrypts and decrypts:
//!
//! - JSON Web Keys ([`JWK`](jose::JWK), [`JWKSet`](jose::JWKSet)), including
//!   PEM and X.509 certificate chains;
//! - JSON Web Signatures ([`JWSSignedPayload`](jose::JWSSignedPayload)), compact
//!   and JSON serialized, with one or more signatures;
//! - JSON Web Encryption ([`JWE`](jose::JWE)), compact and JSON serialized,
//!   with one or more recipients;
//! - JSON Web Tokens ([`JWT`](jose::JWT)), signed and optionally encrypted.
//!
//! All cryptography is delegated to [`aws-lc-rs`].
//!
//! Header parameters outside of the registered JOSE parameters are handled by
//! an [`Extension`](jose::Extension) registered under their name.
//!
//! # Example
//!
//! ```
//! use jwx::jose::{JWA, JWK, JWSSignedPayload, KeyType, sign_compact};
//!
//! let key = JWK::generate(KeyType::EcP256)?;
//! let jws = sign_compact(JWA::ES256, &key, b"hello")?;
//!
//! let parsed = JWSSignedPayload::parse(&jws)?;
//! parsed.verify(&key.well_known())?;
//! assert_eq!(b"hello", parsed.payload());
//! # Ok::<(), jwx::error::OpaqueError>(())
//! ```
//!
//! [`aws-lc-rs`]: https://docs.rs/aws-lc-rs

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    nonstandard_style,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

pub mod error {
    //! Error types of jwx.
    //!
    //! Every fallible operation returns an [`OpaqueError`], use
    //! [`crate::jose::error_kind`] to find out what kind of failure it was.

    #[doc(inline)]
    pub use jwx_error::*;
}

#[doc(inline)]
pub use jwx_crypto::jose;

pub mod dep {
    //! Dependencies of jwx.
    //!
    //! Exported for your convenience

    #[doc(inline)]
    pub use jwx_crypto::dep::*;
}

pub mod utils {
    //! Utilities shared by the jwx crates.

    #[doc(inline)]
    pub use jwx_utils::macros;
}
