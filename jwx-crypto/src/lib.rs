//! Crypto primitives and dependencies used by jwx.
//!
//! This includes but is not limited to:
//! - JSON Object Signing and Encryption (JOSE): JWK, JWS, JWE and JWT
//! - Public and private keys, PEM and X.509 certificate chains
//! - Signing and encryption, delegated to [`aws-lc-rs`]
//!
//! # jwx
//!
//! Crate used by the end-user `jwx` crate.
//!
//! [`aws-lc-rs`]: https://docs.rs/aws-lc-rs

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod jose;

pub mod dep {
    //! Dependencies for jwx crypto modules.
    //!
    //! Exported for your convenience

    pub mod aws_lc_rs {
        //! Re-export of the [`aws-lc-rs`] crate.
        //!
        //! [`aws-lc-rs`]: https://docs.rs/aws-lc-rs

        #[doc(inline)]
        pub use aws_lc_rs::*;
    }

    pub mod jiff {
        //! Re-export of the [`jiff`] crate.
        //!
        //! [`jiff`]: https://docs.rs/jiff

        #[doc(inline)]
        pub use jiff::*;
    }

    pub mod pki_types {
        //! Re-export of the [`rustls-pki-types`] crate.
        //!
        //! [`rustls-pki-types`]: https://docs.rs/rustls-pki-types

        #[doc(inline)]
        pub use rustls_pki_types::*;
    }

    pub mod x509_parser {
        //! Re-export of the [`x509_parser`] crate.
        //!
        //! [`x509_parser`]: https://docs.rs/x509_parser

        #[doc(inline)]
        pub use x509_parser::*;
    }
}
