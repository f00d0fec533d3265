use std::fmt;

use aws_lc_rs::signature::{
    ECDSA_P256_SHA256_ASN1_SIGNING, ECDSA_P384_SHA384_ASN1_SIGNING,
    ECDSA_P521_SHA512_ASN1_SIGNING, EcdsaSigningAlgorithm, EcdsaVerificationAlgorithm,
};
use jwx_error::OpaqueError;
use serde::{Deserialize, Serialize};

use crate::jose::{JWKEllipticCurves, JWKUse, JoseError};

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
/// [`JWA`] or JSON Web Algorithms as defined in [`rfc7518`]
///
/// Covers the algorithms of the `alg` parameter, both for signatures
/// (section 3) and key management (section 4). Some of them are recognised
/// but have no implementation in the crypto provider, using those fails
/// with an unsupported error: `RSA1_5`, the 192 bit AES key wrap variants
/// and anything on the Ed448 / X448 curves.
///
/// [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518
pub enum JWA {
    /// HMAC using SHA-256 (Required)
    HS256,
    /// HMAC using SHA-384 (Optional)
    HS384,
    /// HMAC using SHA-512 (Optional)
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256 (Recommended)
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384 (Optional)
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512 (Optional)
    RS512,
    /// ECDSA using P-256 and SHA-256 (Recommended+)
    ES256,
    /// ECDSA using P-384 and SHA-384 (Optional)
    ES384,
    /// ECDSA using P-521 and SHA-512 (Optional)
    ES512,
    /// Edwards curve digital signatures, see [`rfc8037`](https://datatracker.ietf.org/doc/html/rfc8037)
    EdDSA,
    /// RSASSA-PSS using SHA-256 and MGF1 with SHA-256 (Optional)
    PS256,
    /// RSASSA-PSS using SHA-384 and MGF1 with SHA-384 (Optional)
    PS384,
    /// RSASSA-PSS using SHA-512 and MGF1 with SHA-512 (Optional)
    PS512,
    /// RSAES-PKCS1-v1_5 (Recommended-)
    RSA1_5,
    /// RSAES OAEP using default parameters (Recommended+)
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    /// RSAES OAEP using SHA-256 and MGF1 with SHA-256 (Optional)
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
    /// Key wrapping with AES GCM using 128-bit key (Optional)
    A128GCMKW,
    /// Key wrapping with AES GCM using 192-bit key (Optional)
    A192GCMKW,
    /// Key wrapping with AES GCM using 256-bit key (Optional)
    A256GCMKW,
    /// AES Key Wrap with default initial value using 128-bit key (Recommended)
    A128KW,
    /// AES Key Wrap with default initial value using 192-bit key (Optional)
    A192KW,
    /// AES Key Wrap with default initial value using 256-bit key (Recommended)
    A256KW,
    /// Direct use of a shared symmetric key as the CEK (Recommended)
    #[serde(rename = "dir")]
    Dir,
    /// Elliptic Curve Diffie-Hellman Ephemeral Static key agreement using Concat KDF (Recommended+)
    #[serde(rename = "ECDH-ES")]
    EcdhEs,
    /// ECDH-ES using Concat KDF and CEK wrapped with "A128KW" (Recommended)
    #[serde(rename = "ECDH-ES+A128KW")]
    EcdhEsA128KW,
    /// ECDH-ES using Concat KDF and CEK wrapped with "A192KW" (Optional)
    #[serde(rename = "ECDH-ES+A192KW")]
    EcdhEsA192KW,
    /// ECDH-ES using Concat KDF and CEK wrapped with "A256KW" (Recommended)
    #[serde(rename = "ECDH-ES+A256KW")]
    EcdhEsA256KW,
    /// PBES2 with HMAC SHA-256 and "A128KW" wrapping (Optional)
    #[serde(rename = "PBES2-HS256+A128KW")]
    Pbes2Hs256A128KW,
    /// PBES2 with HMAC SHA-384 and "A192KW" wrapping (Optional)
    #[serde(rename = "PBES2-HS384+A192KW")]
    Pbes2Hs384A192KW,
    /// PBES2 with HMAC SHA-512 and "A256KW" wrapping (Optional)
    #[serde(rename = "PBES2-HS512+A256KW")]
    Pbes2Hs512A256KW,
}

const EC_CURVES: &[KeyType] = &[KeyType::EcP256, KeyType::EcP384, KeyType::EcP521];
const AGREEMENT_CURVES: &[KeyType] = &[
    KeyType::EcP256,
    KeyType::EcP384,
    KeyType::EcP521,
    KeyType::X25519,
    KeyType::X448,
];
const SIGN_OPS: &[JWKOperation] = &[JWKOperation::Sign, JWKOperation::Verify];
const WRAP_OPS: &[JWKOperation] = &[JWKOperation::WrapKey, JWKOperation::UnwrapKey];

impl JWA {
    /// Every algorithm, in registration order.
    pub const ALL: [Self; 30] = [
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::ES256,
        Self::ES384,
        Self::ES512,
        Self::EdDSA,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::RSA1_5,
        Self::RsaOaep,
        Self::RsaOaep256,
        Self::A128GCMKW,
        Self::A192GCMKW,
        Self::A256GCMKW,
        Self::A128KW,
        Self::A192KW,
        Self::A256KW,
        Self::Dir,
        Self::EcdhEs,
        Self::EcdhEsA128KW,
        Self::EcdhEsA192KW,
        Self::EcdhEsA256KW,
        Self::Pbes2Hs256A128KW,
        Self::Pbes2Hs384A192KW,
        Self::Pbes2Hs512A256KW,
    ];

    /// Value of the `alg` parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::EdDSA => "EdDSA",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::RSA1_5 => "RSA1_5",
            Self::RsaOaep => "RSA-OAEP",
            Self::RsaOaep256 => "RSA-OAEP-256",
            Self::A128GCMKW => "A128GCMKW",
            Self::A192GCMKW => "A192GCMKW",
            Self::A256GCMKW => "A256GCMKW",
            Self::A128KW => "A128KW",
            Self::A192KW => "A192KW",
            Self::A256KW => "A256KW",
            Self::Dir => "dir",
            Self::EcdhEs => "ECDH-ES",
            Self::EcdhEsA128KW => "ECDH-ES+A128KW",
            Self::EcdhEsA192KW => "ECDH-ES+A192KW",
            Self::EcdhEsA256KW => "ECDH-ES+A256KW",
            Self::Pbes2Hs256A128KW => "PBES2-HS256+A128KW",
            Self::Pbes2Hs384A192KW => "PBES2-HS384+A192KW",
            Self::Pbes2Hs512A256KW => "PBES2-HS512+A256KW",
        }
    }

    /// Find an algorithm by its `alg` value.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.name() == name)
    }

    /// Whether this algorithm signs or protects a content encryption key.
    pub fn key_use(&self) -> JWKUse {
        match self {
            Self::HS256
            | Self::HS384
            | Self::HS512
            | Self::RS256
            | Self::RS384
            | Self::RS512
            | Self::ES256
            | Self::ES384
            | Self::ES512
            | Self::EdDSA
            | Self::PS256
            | Self::PS384
            | Self::PS512 => JWKUse::Signature,
            _ => JWKUse::Encryption,
        }
    }

    /// Size in bits: digest size for signatures, key size for key management.
    ///
    /// `0` for algorithms where the size is determined by the key (EdDSA)
    /// or by the content encryption (ECDH-ES).
    pub fn size(&self) -> usize {
        match self {
            Self::HS384 | Self::RS384 | Self::ES384 | Self::PS384 => 384,
            Self::HS512 | Self::RS512 | Self::ES512 | Self::PS512 => 512,
            Self::EdDSA | Self::EcdhEs => 0,
            Self::RSA1_5 | Self::RsaOaep | Self::RsaOaep256 => 2048,
            Self::A128GCMKW | Self::A128KW | Self::EcdhEsA128KW | Self::Pbes2Hs256A128KW => 128,
            Self::A192GCMKW | Self::A192KW | Self::EcdhEsA192KW | Self::Pbes2Hs384A192KW => 192,
            Self::HS256
            | Self::RS256
            | Self::ES256
            | Self::PS256
            | Self::A256GCMKW
            | Self::A256KW
            | Self::EcdhEsA256KW
            | Self::Pbes2Hs512A256KW
            | Self::Dir => 256,
        }
    }

    /// Key types this algorithm can be used with, the first one is the default.
    pub fn key_types(&self) -> &'static [KeyType] {
        match self {
            Self::RS256
            | Self::RS384
            | Self::RS512
            | Self::PS256
            | Self::PS384
            | Self::PS512
            | Self::RSA1_5
            | Self::RsaOaep
            | Self::RsaOaep256 => &[KeyType::Rsa],
            Self::ES256 => &EC_CURVES[0..1],
            Self::ES384 => &EC_CURVES[1..2],
            Self::ES512 => &EC_CURVES[2..3],
            Self::EdDSA => &[KeyType::Ed25519, KeyType::Ed448],
            Self::EcdhEs | Self::EcdhEsA128KW | Self::EcdhEsA192KW | Self::EcdhEsA256KW => {
                AGREEMENT_CURVES
            }
            _ => &[KeyType::Oct],
        }
    }

    /// Key operations permitted for keys used with this algorithm.
    pub fn key_ops(&self) -> &'static [JWKOperation] {
        match self.key_use() {
            JWKUse::Signature => SIGN_OPS,
            JWKUse::Encryption => match self {
                Self::Dir => &[JWKOperation::Encrypt, JWKOperation::Decrypt],
                Self::EcdhEs | Self::EcdhEsA128KW | Self::EcdhEsA192KW | Self::EcdhEsA256KW => {
                    &[JWKOperation::DeriveKey]
                }
                _ => WRAP_OPS,
            },
        }
    }

    /// Header parameters this key management algorithm relies on, on top of `enc` and `zip`.
    ///
    /// All of them except `apu` and `apv` are required.
    pub fn encryption_params(&self) -> &'static [&'static str] {
        match self {
            Self::A128GCMKW | Self::A192GCMKW | Self::A256GCMKW => &["iv", "tag"],
            Self::EcdhEs | Self::EcdhEsA128KW | Self::EcdhEsA192KW | Self::EcdhEsA256KW => {
                &["epk", "apu", "apv"]
            }
            Self::Pbes2Hs256A128KW | Self::Pbes2Hs384A192KW | Self::Pbes2Hs512A256KW => {
                &["p2s", "p2c"]
            }
            _ => &[],
        }
    }

    /// HMAC based signature algorithm
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }
}

impl fmt::Display for JWA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<JWKEllipticCurves> for JWA {
    fn from(value: JWKEllipticCurves) -> Self {
        match value {
            JWKEllipticCurves::P256 => Self::ES256,
            JWKEllipticCurves::P384 => Self::ES384,
            JWKEllipticCurves::P521 => Self::ES512,
        }
    }
}

impl TryFrom<JWA> for JWKEllipticCurves {
    type Error = OpaqueError;

    fn try_from(value: JWA) -> Result<Self, Self::Error> {
        match value {
            JWA::ES256 => Ok(Self::P256),
            JWA::ES384 => Ok(Self::P384),
            JWA::ES512 => Ok(Self::P521),
            other => Err(JoseError::argument(format!(
                "{other} cannot be converted to elliptic curve"
            ))
            .into()),
        }
    }
}

impl TryFrom<JWA> for &'static EcdsaSigningAlgorithm {
    type Error = OpaqueError;

    fn try_from(value: JWA) -> Result<Self, Self::Error> {
        match JWKEllipticCurves::try_from(value)? {
            JWKEllipticCurves::P256 => Ok(&ECDSA_P256_SHA256_ASN1_SIGNING),
            JWKEllipticCurves::P384 => Ok(&ECDSA_P384_SHA384_ASN1_SIGNING),
            JWKEllipticCurves::P521 => Ok(&ECDSA_P521_SHA512_ASN1_SIGNING),
        }
    }
}

impl TryFrom<JWA> for &'static EcdsaVerificationAlgorithm {
    type Error = OpaqueError;

    fn try_from(value: JWA) -> Result<Self, Self::Error> {
        let signing_algo: &'static EcdsaSigningAlgorithm = value.try_into()?;
        Ok(&**signing_algo)
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
/// Content encryption algorithm, the `enc` parameter, as defined in section 5 of [`rfc7518`]
///
/// [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518#section-5
pub enum JWEEncryption {
    /// AES_128_CBC_HMAC_SHA_256 authenticated encryption
    #[serde(rename = "A128CBC-HS256")]
    A128CbcHs256,
    /// AES_192_CBC_HMAC_SHA_384 authenticated encryption
    #[serde(rename = "A192CBC-HS384")]
    A192CbcHs384,
    /// AES_256_CBC_HMAC_SHA_512 authenticated encryption
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,
    /// AES GCM using 128-bit key
    A128GCM,
    /// AES GCM using 192-bit key
    A192GCM,
    /// AES GCM using 256-bit key
    A256GCM,
}

impl JWEEncryption {
    pub const ALL: [Self; 6] = [
        Self::A128CbcHs256,
        Self::A192CbcHs384,
        Self::A256CbcHs512,
        Self::A128GCM,
        Self::A192GCM,
        Self::A256GCM,
    ];

    /// Value of the `enc` parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::A128CbcHs256 => "A128CBC-HS256",
            Self::A192CbcHs384 => "A192CBC-HS384",
            Self::A256CbcHs512 => "A256CBC-HS512",
            Self::A128GCM => "A128GCM",
            Self::A192GCM => "A192GCM",
            Self::A256GCM => "A256GCM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|enc| enc.name() == name)
    }

    /// Size of the content encryption key in bits.
    pub fn size(&self) -> usize {
        match self {
            Self::A128GCM => 128,
            Self::A192GCM => 192,
            Self::A128CbcHs256 | Self::A256GCM => 256,
            Self::A192CbcHs384 => 384,
            Self::A256CbcHs512 => 512,
        }
    }

    /// Composite AES-CBC with HMAC construction, as opposed to AES-GCM.
    pub fn is_cbc_hmac(&self) -> bool {
        matches!(
            self,
            Self::A128CbcHs256 | Self::A192CbcHs384 | Self::A256CbcHs512
        )
    }
}

impl fmt::Display for JWEEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Key type and curve of a [`JWK`](super::JWK)
pub enum KeyType {
    /// `EC` on `P-256`
    EcP256,
    /// `EC` on `P-384`
    EcP384,
    /// `EC` on `P-521`
    EcP521,
    /// `OKP` on `Ed25519`
    Ed25519,
    /// `OKP` on `Ed448`
    Ed448,
    /// `OKP` on `X25519`
    X25519,
    /// `OKP` on `X448`
    X448,
    /// `RSA`
    Rsa,
    /// `oct`, a symmetric key
    Oct,
}

impl KeyType {
    /// Value of the `kty` parameter.
    pub fn kty(&self) -> &'static str {
        match self {
            Self::EcP256 | Self::EcP384 | Self::EcP521 => "EC",
            Self::Ed25519 | Self::Ed448 | Self::X25519 | Self::X448 => "OKP",
            Self::Rsa => "RSA",
            Self::Oct => "oct",
        }
    }

    /// Value of the `crv` parameter, if any.
    pub fn crv(&self) -> Option<&'static str> {
        match self {
            Self::EcP256 => Some("P-256"),
            Self::EcP384 => Some("P-384"),
            Self::EcP521 => Some("P-521"),
            Self::Ed25519 => Some("Ed25519"),
            Self::Ed448 => Some("Ed448"),
            Self::X25519 => Some("X25519"),
            Self::X448 => Some("X448"),
            Self::Rsa | Self::Oct => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.crv() {
            Some(crv) => write!(f, "{} {crv}", self.kty()),
            None => f.write_str(self.kty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, Hash)]
/// Values of the `key_ops` parameter, see section 4.3 of [`rfc7517`]
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517#section-4.3
pub enum JWKOperation {
    #[serde(rename = "sign")]
    Sign,
    #[serde(rename = "verify")]
    Verify,
    #[serde(rename = "encrypt")]
    Encrypt,
    #[serde(rename = "decrypt")]
    Decrypt,
    #[serde(rename = "wrapKey")]
    WrapKey,
    #[serde(rename = "unwrapKey")]
    UnwrapKey,
    #[serde(rename = "deriveKey")]
    DeriveKey,
    #[serde(rename = "deriveBits")]
    DeriveBits,
}

impl JWKOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
        }
    }
}

impl fmt::Display for JWKOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
