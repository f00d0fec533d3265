//! # JOSE: JSON Object Signing and Encryption
//!
//! JOSE is an IETF standard for securely transferring data between parties using JSON.
//! It provides a general framework for signing and encrypting any kind of data, and it's
//! the foundation for technologies like JSON Web Tokens (JWTs).
//!
//! The JOSE framework is made up of several key components:
//!
//! * JWS (JSON Web Signature): This specification defines how to create a digital signature for
//!   any data. A JWS proves data integrity and authenticity. It consists of a Header, a
//!   Payload (the data), and a Signature, all encoded in Base64Url and joined by dots.
//!   See [`rfc7515`] for more details.
//!
//! * JWE (JSON Web Encryption): This defines a standard way to encrypt data. A JWE ensures
//!   the confidentiality of the information, making sure only authorized parties can read it.
//!   A single message can be encrypted for many recipients, each with their own key.
//!   See [`rfc7516`] for more details.
//!
//! * JWK (JSON Web Key): This specifies a JSON format for representing cryptographic keys.
//!   This makes it simple to share the public keys required to verify signatures or encrypt data.
//!   See [`rfc7517`] for more details.
//!
//! * JWA (JSON Web Algorithm): This is essentially a list of the specific cryptographic
//!   algorithms that are used for signing and encryption within the JOSE framework. The alg
//!   parameter in the JOSE header identifies which algorithm was used.
//!   See [`rfc7518`] for more details.
//!
//! * JWT (JSON Web Token): A set of claims, signed as a JWS and optionally encrypted as a JWE.
//!   See [`rfc7519`] for more details.
//!
//! Header parameters that are not registered by these standards are only accepted when an
//! [`Extension`] is registered for them in the [`ExtensionRegistry`] of the [`JoseConfig`].
//!
//! [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515
//! [`rfc7516`]: https://datatracker.ietf.org/doc/html/rfc7516
//! [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517
//! [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518
//! [`rfc7519`]: https://datatracker.ietf.org/doc/html/rfc7519

mod constants;
mod jwk_utils;

mod error;
pub use error::{JoseError, JoseErrorKind, error_kind};

mod encoding;
pub use encoding::{
    Base64Url, b64url_decode, b64url_encode, okp_decode_coordinate, okp_encode_coordinate,
};

pub mod adapter;
pub mod ecdsa;

mod jwa;
pub use jwa::{JWA, JWEEncryption, JWKOperation, KeyType};

mod cert;
pub use cert::{CertificateCache, CertificateReference, RemoteFetcher};

mod config;
pub use config::JoseConfig;

mod jwk;
pub use jwk::{JWK, JWKEllipticCurves, JWKSet, JWKType, JWKUse, OKPCurve};

mod jwk_builder;
pub use jwk_builder::JWKBuilder;

mod header;
pub use header::{Extension, ExtensionRegistry, Jose, JoseBuilder, register_extension};

mod jws;
pub use jws::{
    JWKSigner, JWSBuilder, JWSSignature, JWSSignedPayload, Signer, Verifier, sign_compact,
};

mod jwe;
pub use jwe::{JWE, JWEBuilder, JWERecipient, JWERecipientBuilder};

mod jwt;
pub use jwt::{JWT, JWTBuilder};
