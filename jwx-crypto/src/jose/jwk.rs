use std::fmt;

use aws_lc_rs::{
    agreement,
    digest::{Digest, SHA256, digest},
    signature::{Ed25519KeyPair, KeyPair as _},
};
use base64::{Engine as _, prelude::BASE64_STANDARD};
use jwx_error::{ErrorContext as _, OpaqueError};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

use crate::jose::{
    Base64Url, CertificateReference, JWA, JWKOperation, JoseConfig, JoseError, KeyType,
    cert::certificate_public_key,
    constants::{EC_POINT_UNCOMPRESSED, P256_COMPONENT_LEN, P384_COMPONENT_LEN, P521_COMPONENT_LEN},
    encoding::unsigned_fixed_width,
    jwk_utils::{
        ParsedPrivateKey, ParsedPublicKey, RsaComponents, create_ec_pkcs8,
        create_ec_subject_public_key_info, create_okp_pkcs8, create_okp_subject_public_key_info,
        create_rsa_pkcs8, create_rsa_public_key, create_subject_public_key_info,
    },
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
/// [`JWK`] or JSON Web Key as defined in [`rfc7517`]
///
/// A [`JWK`] is immutable once built, see [`JWKBuilder`](super::JWKBuilder)
/// and [`JWK::parse`] to create one.
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517
pub struct JWK {
    #[serde(flatten)]
    pub(crate) key_type: JWKType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    key_use: Option<JWKUse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_ops: Option<Vec<JWKOperation>>,
    /// Intended algorithm to be used with this key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<JWA>,
    #[serde(flatten)]
    certificate: CertificateReference,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kty")]
/// The "kty" (key type) parameter identifies the cryptographic algorithm family used with the key, such as "RSA", "EC", "OKP" or "oct"
///
/// Private members are optional, a key without them is a public (well known) key.
pub enum JWKType {
    RSA {
        n: Base64Url,
        e: Base64Url,
        #[serde(default)]
        d: Option<Base64Url>,
        #[serde(default)]
        p: Option<Base64Url>,
        #[serde(default)]
        q: Option<Base64Url>,
        #[serde(default)]
        dp: Option<Base64Url>,
        #[serde(default)]
        dq: Option<Base64Url>,
        #[serde(default)]
        qi: Option<Base64Url>,
    },
    /// Elleptic curve
    EC {
        crv: JWKEllipticCurves,
        x: Base64Url,
        y: Base64Url,
        #[serde(default)]
        d: Option<Base64Url>,
    },
    /// Octet key pair: Edwards and Montgomery curves, see [`rfc8037`](https://datatracker.ietf.org/doc/html/rfc8037)
    OKP {
        crv: OKPCurve,
        x: Base64Url,
        #[serde(default)]
        d: Option<Base64Url>,
    },
    /// an octet sequence key, which represents a symmetric key
    #[serde(rename = "oct")]
    OCT {
        #[serde(default)]
        k: Option<Base64Url>,
    },
}

impl Serialize for JWKType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Required members first, in lexicographic order, as this output is
        // also used to compute the jwk thumbprint. Private members follow.
        fn optional<S: SerializeStruct>(
            state: &mut S,
            name: &'static str,
            value: Option<&Base64Url>,
        ) -> Result<(), S::Error> {
            match value {
                Some(value) => state.serialize_field(name, value),
                None => state.skip_field(name),
            }
        }

        match &self {
            Self::EC { crv, x, y, d } => {
                let mut state = serializer.serialize_struct("JWKType", 5)?;
                state.serialize_field("crv", crv)?;
                state.serialize_field("kty", "EC")?;
                state.serialize_field("x", x)?;
                state.serialize_field("y", y)?;
                optional(&mut state, "d", d.as_ref())?;
                state.end()
            }
            Self::RSA {
                n,
                e,
                d,
                p,
                q,
                dp,
                dq,
                qi,
            } => {
                let mut state = serializer.serialize_struct("JWKType", 9)?;
                state.serialize_field("e", e)?;
                state.serialize_field("kty", "RSA")?;
                state.serialize_field("n", n)?;
                optional(&mut state, "d", d.as_ref())?;
                optional(&mut state, "p", p.as_ref())?;
                optional(&mut state, "q", q.as_ref())?;
                optional(&mut state, "dp", dp.as_ref())?;
                optional(&mut state, "dq", dq.as_ref())?;
                optional(&mut state, "qi", qi.as_ref())?;
                state.end()
            }
            Self::OKP { crv, x, d } => {
                let mut state = serializer.serialize_struct("JWKType", 4)?;
                state.serialize_field("crv", crv)?;
                state.serialize_field("kty", "OKP")?;
                state.serialize_field("x", x)?;
                optional(&mut state, "d", d.as_ref())?;
                state.end()
            }
            Self::OCT { k } => {
                let mut state = serializer.serialize_struct("JWKType", 2)?;
                optional(&mut state, "k", k.as_ref())?;
                state.serialize_field("kty", "oct")?;
                state.end()
            }
        }
    }
}

impl JWKType {
    /// Key type and curve.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::RSA { .. } => KeyType::Rsa,
            Self::EC { crv, .. } => crv.key_type(),
            Self::OKP { crv, .. } => crv.key_type(),
            Self::OCT { .. } => KeyType::Oct,
        }
    }

    /// Holds private (or secret) key material.
    pub fn is_private(&self) -> bool {
        match self {
            Self::RSA { d, .. } | Self::EC { d, .. } | Self::OKP { d, .. } => d.is_some(),
            Self::OCT { k } => k.is_some(),
        }
    }

    /// Same key without private members.
    pub fn public(&self) -> Self {
        match self {
            Self::RSA { n, e, .. } => Self::RSA {
                n: n.clone(),
                e: e.clone(),
                d: None,
                p: None,
                q: None,
                dp: None,
                dq: None,
                qi: None,
            },
            Self::EC { crv, x, y, .. } => Self::EC {
                crv: *crv,
                x: x.clone(),
                y: y.clone(),
                d: None,
            },
            Self::OKP { crv, x, .. } => Self::OKP {
                crv: *crv,
                x: x.clone(),
                d: None,
            },
            Self::OCT { .. } => Self::OCT { k: None },
        }
    }

    pub(crate) fn from_public(parsed: ParsedPublicKey) -> Result<Self, OpaqueError> {
        Ok(match parsed {
            ParsedPublicKey::Rsa { n, e } => Self::RSA {
                n: n.into(),
                e: e.into(),
                d: None,
                p: None,
                q: None,
                dp: None,
                dq: None,
                qi: None,
            },
            ParsedPublicKey::Ec { curve, point } => {
                let crv = JWKEllipticCurves::try_from(curve)?;
                let (x, y) = crv.split_point(&point)?;
                Self::EC {
                    crv,
                    x: x.into(),
                    y: y.into(),
                    d: None,
                }
            }
            ParsedPublicKey::Okp { curve, x } => Self::OKP {
                crv: OKPCurve::try_from(curve)?,
                x: x.into(),
                d: None,
            },
        })
    }

    /// Key pair from a parsed private key, the public part is derived when the
    /// private key encoding does not carry it.
    pub(crate) fn from_private(parsed: ParsedPrivateKey) -> Result<Self, OpaqueError> {
        Ok(match parsed {
            ParsedPrivateKey::Rsa(rsa) => Self::RSA {
                n: rsa.n.into(),
                e: rsa.e.into(),
                d: Some(rsa.d.into()),
                p: Some(rsa.p.into()),
                q: Some(rsa.q.into()),
                dp: Some(rsa.dp.into()),
                dq: Some(rsa.dq.into()),
                qi: Some(rsa.qi.into()),
            },
            ParsedPrivateKey::Ec { curve, d, point } => {
                let crv = JWKEllipticCurves::try_from(curve)?;
                let d = unsigned_fixed_width(&d, crv.component_len())?;
                let point = match point {
                    Some(point) => point,
                    None => {
                        let private_key =
                            agreement::PrivateKey::from_private_key(crv.agreement_algorithm(), &d)
                                .context("load elliptic curve private key")?;
                        private_key
                            .compute_public_key()
                            .context("compute elliptic curve public key")?
                            .as_ref()
                            .to_vec()
                    }
                };
                let (x, y) = crv.split_point(&point)?;
                Self::EC {
                    crv,
                    x: x.into(),
                    y: y.into(),
                    d: Some(d.into()),
                }
            }
            ParsedPrivateKey::Okp { curve, d } => {
                let crv = OKPCurve::try_from(curve)?;
                let x = crv.public_from_private(&d)?;
                Self::OKP {
                    crv,
                    x: x.into(),
                    d: Some(d.into()),
                }
            }
        })
    }

    fn parsed_public(&self) -> Result<Option<ParsedPublicKey>, OpaqueError> {
        Ok(match self {
            Self::RSA { n, e, .. } => Some(ParsedPublicKey::Rsa {
                n: n.to_vec(),
                e: e.to_vec(),
            }),
            Self::EC { crv, x, y, .. } => Some(ParsedPublicKey::Ec {
                curve: crv.key_type(),
                point: crv.point(x, y)?,
            }),
            Self::OKP { crv, x, .. } => Some(ParsedPublicKey::Okp {
                curve: crv.key_type(),
                x: x.to_vec(),
            }),
            Self::OCT { .. } => None,
        })
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JWKEllipticCurves {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl JWKEllipticCurves {
    pub fn key_type(self) -> KeyType {
        match self {
            Self::P256 => KeyType::EcP256,
            Self::P384 => KeyType::EcP384,
            Self::P521 => KeyType::EcP521,
        }
    }

    /// Octets of a coordinate, a private scalar or one half of a JWA signature.
    pub fn component_len(self) -> usize {
        match self {
            Self::P256 => P256_COMPONENT_LEN,
            Self::P384 => P384_COMPONENT_LEN,
            Self::P521 => P521_COMPONENT_LEN,
        }
    }

    pub(crate) fn agreement_algorithm(self) -> &'static agreement::Algorithm {
        match self {
            Self::P256 => &agreement::ECDH_P256,
            Self::P384 => &agreement::ECDH_P384,
            Self::P521 => &agreement::ECDH_P521,
        }
    }

    /// Uncompressed point `0x04 ‖ x ‖ y`.
    pub(crate) fn point(self, x: &[u8], y: &[u8]) -> Result<Vec<u8>, OpaqueError> {
        let len = self.component_len();
        let mut point = Vec::with_capacity(1 + 2 * len);
        point.push(EC_POINT_UNCOMPRESSED);
        point.extend_from_slice(&unsigned_fixed_width(x, len)?);
        point.extend_from_slice(&unsigned_fixed_width(y, len)?);
        Ok(point)
    }

    pub(crate) fn split_point(self, point: &[u8]) -> Result<(Vec<u8>, Vec<u8>), OpaqueError> {
        let len = self.component_len();
        match point.split_first() {
            Some((&EC_POINT_UNCOMPRESSED, coordinates)) if coordinates.len() == 2 * len => {
                let (x, y) = coordinates.split_at(len);
                Ok((x.to_vec(), y.to_vec()))
            }
            _ => Err(JoseError::argument(format!(
                "expected uncompressed {} point",
                self.key_type()
            ))
            .into()),
        }
    }
}

impl TryFrom<KeyType> for JWKEllipticCurves {
    type Error = OpaqueError;

    fn try_from(value: KeyType) -> Result<Self, Self::Error> {
        match value {
            KeyType::EcP256 => Ok(Self::P256),
            KeyType::EcP384 => Ok(Self::P384),
            KeyType::EcP521 => Ok(Self::P521),
            other => Err(JoseError::argument(format!("{other} is not an elliptic curve")).into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Curves of an `OKP` key
pub enum OKPCurve {
    Ed25519,
    Ed448,
    X25519,
    X448,
}

impl OKPCurve {
    pub fn key_type(self) -> KeyType {
        match self {
            Self::Ed25519 => KeyType::Ed25519,
            Self::Ed448 => KeyType::Ed448,
            Self::X25519 => KeyType::X25519,
            Self::X448 => KeyType::X448,
        }
    }

    pub(crate) fn public_from_private(self, d: &[u8]) -> Result<Vec<u8>, OpaqueError> {
        match self {
            Self::Ed25519 => {
                let key_pair = Ed25519KeyPair::from_seed_unchecked(d)
                    .context("load Ed25519 private key")?;
                Ok(key_pair.public_key().as_ref().to_vec())
            }
            Self::X25519 => {
                let private_key = agreement::PrivateKey::from_private_key(&agreement::X25519, d)
                    .context("load X25519 private key")?;
                Ok(private_key
                    .compute_public_key()
                    .context("compute X25519 public key")?
                    .as_ref()
                    .to_vec())
            }
            Self::Ed448 | Self::X448 => Err(JoseError::unsupported(format!(
                "{} is not supported by the crypto provider",
                self.key_type()
            ))
            .into()),
        }
    }
}

impl TryFrom<KeyType> for OKPCurve {
    type Error = OpaqueError;

    fn try_from(value: KeyType) -> Result<Self, Self::Error> {
        match value {
            KeyType::Ed25519 => Ok(Self::Ed25519),
            KeyType::Ed448 => Ok(Self::Ed448),
            KeyType::X25519 => Ok(Self::X25519),
            KeyType::X448 => Ok(Self::X448),
            other => Err(JoseError::argument(format!("{other} is not an OKP curve")).into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// [`JWKUse`] identifies the intended use of the public key
pub enum JWKUse {
    #[serde(rename = "sig")]
    Signature,
    #[serde(rename = "enc")]
    Encryption,
}

impl fmt::Display for JWKUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signature => f.write_str("sig"),
            Self::Encryption => f.write_str("enc"),
        }
    }
}

/// `[sign, verify]`
fn fmt_ops(ops: &[JWKOperation]) -> String {
    let names: Vec<&str> = ops.iter().map(JWKOperation::name).collect();
    format!("[{}]", names.join(", "))
}

impl JWK {
    pub(crate) fn from_parts(
        key_type: JWKType,
        kid: Option<String>,
        key_use: Option<JWKUse>,
        key_ops: Option<Vec<JWKOperation>>,
        alg: Option<JWA>,
        certificate: CertificateReference,
    ) -> Self {
        Self {
            key_type,
            kid,
            key_use,
            key_ops,
            alg,
            certificate,
        }
    }

    /// Create a bare [`JWK`] for the given key material.
    pub fn new(key_type: JWKType) -> Self {
        Self::from_parts(
            key_type,
            None,
            None,
            None,
            None,
            CertificateReference::default(),
        )
    }

    /// Parse and [verify](Self::verify) a JSON encoded key.
    pub fn parse(json: &str) -> Result<Self, OpaqueError> {
        Self::parse_with_config(json, &JoseConfig::default())
    }

    pub fn parse_with_config(json: &str, config: &JoseConfig) -> Result<Self, OpaqueError> {
        let key: Self = serde_json::from_str(json)
            .map_err(|err| JoseError::argument(format!("invalid JWK: {err}")))?;
        key.verify(config)?;
        Ok(key)
    }

    /// JSON encoding of this key, private members included.
    pub fn to_json(&self) -> Result<String, OpaqueError> {
        serde_json::to_string(self).context("serialize JWK")
    }

    pub fn key_type(&self) -> &JWKType {
        &self.key_type
    }

    /// Key type and curve, see [`JWKType::key_type`].
    pub fn kind(&self) -> KeyType {
        self.key_type.key_type()
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn key_use(&self) -> Option<JWKUse> {
        self.key_use
    }

    pub fn key_ops(&self) -> Option<&[JWKOperation]> {
        self.key_ops.as_deref()
    }

    pub fn alg(&self) -> Option<JWA> {
        self.alg
    }

    pub fn certificate(&self) -> &CertificateReference {
        &self.certificate
    }

    pub fn is_private(&self) -> bool {
        self.key_type.is_private()
    }

    /// Public projection of this key, safe to publish.
    ///
    /// Equal to this key except that private (and secret) members are dropped.
    #[must_use]
    pub fn well_known(&self) -> Self {
        if !self.is_private() {
            return self.clone();
        }
        Self {
            key_type: self.key_type.public(),
            ..self.clone()
        }
    }

    /// Whether this key describes `other`.
    ///
    /// Each member is compared only when set on both keys, so a key with fewer
    /// members represents a fuller version of itself, e.g. a well known key
    /// represents its private counterpart.
    pub fn represents(&self, other: &Self) -> bool {
        fn either_none_or_equal<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        let material = match (&self.key_type, &other.key_type) {
            (JWKType::OCT { k: a }, JWKType::OCT { k: b }) => {
                either_none_or_equal(a.as_ref(), b.as_ref())
            }
            (a, b) => {
                a.public() == b.public()
                    && match (a, b) {
                        (JWKType::RSA { d: a, .. }, JWKType::RSA { d: b, .. })
                        | (JWKType::EC { d: a, .. }, JWKType::EC { d: b, .. })
                        | (JWKType::OKP { d: a, .. }, JWKType::OKP { d: b, .. }) => {
                            either_none_or_equal(a.as_ref(), b.as_ref())
                        }
                        _ => false,
                    }
            }
        };

        material
            && either_none_or_equal(self.kid.as_ref(), other.kid.as_ref())
            && either_none_or_equal(self.key_use.as_ref(), other.key_use.as_ref())
            && either_none_or_equal(self.key_ops.as_ref(), other.key_ops.as_ref())
            && either_none_or_equal(self.alg.as_ref(), other.alg.as_ref())
            && self.certificate.represents(&other.certificate)
            && self
                .alg
                .is_none_or(|alg| alg.key_types().contains(&other.kind()))
            && self
                .alg
                .zip(other.key_use)
                .is_none_or(|(alg, key_use)| alg.key_use() == key_use)
    }

    /// Verify this key is consistent.
    ///
    /// - the key type must be allowed by `alg`, and `use` must match its use,
    /// - `key_ops` holds at most one pair of related operations, allowed by `alg` and `use`,
    /// - operations needing the private key require it,
    /// - symmetric keys carry no certificate, other keys match the first certificate of their chain.
    pub fn verify(&self, config: &JoseConfig) -> Result<(), OpaqueError> {
        let kind = self.kind();

        if let Some(alg) = self.alg
            && !alg.key_types().contains(&kind)
        {
            return Err(
                JoseError::argument(format!("Illegal type {kind} for algorithm {alg}")).into(),
            );
        }

        if let (Some(key_use), Some(alg)) = (self.key_use, self.alg)
            && key_use != alg.key_use()
        {
            return Err(
                JoseError::argument(format!("Illegal use {key_use} for algorithm {alg}")).into(),
            );
        }

        if let Some(ops) = &self.key_ops {
            verify_ops(ops, self.alg, self.key_use)?;
        }

        let chain = self.certificate.verify(config)?;

        if kind == KeyType::Oct {
            if chain.is_some() {
                return Err(JoseError::argument("Unexpected certificate").into());
            }
            return Ok(());
        }

        if let Some(first) = chain.as_ref().and_then(|chain| chain.first()) {
            let certified = certificate_public_key(first)?;
            if self.key_type.parsed_public()?.as_ref() != Some(&certified) {
                return Err(
                    JoseError::argument("public key doesn't match X.509 certificate").into(),
                );
            }
        }

        if let Some(ops) = &self.key_ops {
            if ops
                .iter()
                .any(|op| matches!(op, JWKOperation::Encrypt | JWKOperation::Decrypt))
            {
                return Err(JoseError::argument(format!(
                    "Secret key required by ops {}",
                    fmt_ops(ops)
                ))
                .into());
            }
            if !self.is_private()
                && ops
                    .iter()
                    .any(|op| matches!(op, JWKOperation::UnwrapKey | JWKOperation::Sign))
            {
                return Err(JoseError::argument(format!(
                    "Private key required by ops {}",
                    fmt_ops(ops)
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Thumbprint as defined in [`rfc7638`], a url safe identifier for a [`JWK`]
    ///
    /// Only the required members take part, private members never do.
    ///
    /// [`rfc7638`]: https://datatracker.ietf.org/doc/html/rfc7638
    pub fn thumb_sha256(&self) -> Result<Digest, OpaqueError> {
        let required = match &self.key_type {
            JWKType::OCT { k: None } => {
                return Err(JoseError::missing("Secret key is required").into());
            }
            oct @ JWKType::OCT { .. } => oct.clone(),
            other => other.public(),
        };
        Ok(digest(
            &SHA256,
            &serde_json::to_vec(&required).context("failed to serialise JWK")?,
        ))
    }

    /// DER encoded SubjectPublicKeyInfo of this key.
    pub fn public_key_der(&self) -> Result<Vec<u8>, OpaqueError> {
        match &self.key_type {
            JWKType::RSA { n, e, .. } => Ok(create_subject_public_key_info(n, e)),
            JWKType::EC { crv, x, y, .. } => Ok(create_ec_subject_public_key_info(
                crv.key_type(),
                &crv.point(x, y)?,
            )),
            JWKType::OKP { crv, x, .. } => {
                Ok(create_okp_subject_public_key_info(crv.key_type(), x))
            }
            JWKType::OCT { .. } => Err(JoseError::unsupported(
                "Symmetric key cannot be converted to public key",
            )
            .into()),
        }
    }

    /// DER encoded PKCS#8 PrivateKeyInfo of this key.
    pub fn private_key_der(&self) -> Result<Vec<u8>, OpaqueError> {
        match &self.key_type {
            JWKType::RSA { .. } => Ok(create_rsa_pkcs8(&self.rsa_components()?)),
            JWKType::EC { crv, .. } => Ok(create_ec_pkcs8(
                crv.key_type(),
                &self.ec_private_scalar()?,
                &self.ec_point()?,
            )),
            JWKType::OKP { crv, .. } => Ok(create_okp_pkcs8(crv.key_type(), self.okp_private()?)),
            JWKType::OCT { .. } => Err(JoseError::unsupported(
                "Symmetric key cannot be converted to private key",
            )
            .into()),
        }
    }

    /// PEM encoding: the private key (PKCS#8) when present, else the public key,
    /// followed by the certificate chain.
    pub fn to_pem(&self) -> Result<String, OpaqueError> {
        let mut pem = if self.is_private() {
            pem_block("PRIVATE KEY", &self.private_key_der()?)
        } else {
            pem_block("PUBLIC KEY", &self.public_key_der()?)
        };
        for cert in self.certificate.certificate_chain().unwrap_or_default() {
            pem.push_str(&pem_block("CERTIFICATE", cert));
        }
        Ok(pem)
    }

    /// Key from a PEM document holding a private key together with its
    /// certificate chain, or a public key, or a certificate chain.
    ///
    /// A lone private key is rejected, use [`JWKBuilder::try_with_pem`](super::JWKBuilder)
    /// for that.
    pub fn from_pem(pem: &str) -> Result<Self, OpaqueError> {
        let builder = super::JWKBuilder::new().try_with_pem(pem)?;
        if builder.has_private_key_only() {
            return Err(JoseError::missing(
                "Certificate or public key is required with a private key",
            )
            .into());
        }
        builder.build()
    }

    /// [`JWK::from_pem`] for a PEM document read from `reader`.
    pub fn from_pem_reader(reader: impl std::io::Read) -> Result<Self, OpaqueError> {
        Self::from_pem(&super::jwk_builder::read_pem(reader)?)
    }

    pub(crate) fn oct_key(&self) -> Result<&[u8], OpaqueError> {
        match &self.key_type {
            JWKType::OCT { k: Some(k) } => Ok(k),
            JWKType::OCT { k: None } => Err(JoseError::missing("Secret key is required").into()),
            _ => Err(JoseError::argument(format!("Illegal type {} for secret key", self.kind()))
                .into()),
        }
    }

    pub(crate) fn rsa_components(&self) -> Result<RsaComponents, OpaqueError> {
        let JWKType::RSA {
            n,
            e,
            d,
            p,
            q,
            dp,
            dq,
            qi,
        } = &self.key_type
        else {
            return Err(JoseError::argument(format!("{} is not an RSA key", self.kind())).into());
        };
        let d = d
            .as_ref()
            .ok_or_else(|| JoseError::missing("RSA private key is required"))?;
        match (p, q, dp, dq, qi) {
            (Some(p), Some(q), Some(dp), Some(dq), Some(qi)) => Ok(RsaComponents {
                n: n.to_vec(),
                e: e.to_vec(),
                d: d.to_vec(),
                p: p.to_vec(),
                q: q.to_vec(),
                dp: dp.to_vec(),
                dq: dq.to_vec(),
                qi: qi.to_vec(),
            }),
            _ => Err(JoseError::unsupported("RSA private key without CRT parameters").into()),
        }
    }

    /// PKCS#1 RSAPublicKey
    pub(crate) fn rsa_public_key(&self) -> Result<Vec<u8>, OpaqueError> {
        match &self.key_type {
            JWKType::RSA { n, e, .. } => Ok(create_rsa_public_key(n, e)),
            _ => Err(JoseError::argument(format!("{} is not an RSA key", self.kind())).into()),
        }
    }

    pub(crate) fn ec_curve(&self) -> Result<JWKEllipticCurves, OpaqueError> {
        match &self.key_type {
            JWKType::EC { crv, .. } => Ok(*crv),
            _ => Err(JoseError::argument(format!("{} is not an EC key", self.kind())).into()),
        }
    }

    pub(crate) fn ec_point(&self) -> Result<Vec<u8>, OpaqueError> {
        match &self.key_type {
            JWKType::EC { crv, x, y, .. } => crv.point(x, y),
            _ => Err(JoseError::argument(format!("{} is not an EC key", self.kind())).into()),
        }
    }

    pub(crate) fn ec_private_scalar(&self) -> Result<Vec<u8>, OpaqueError> {
        match &self.key_type {
            JWKType::EC { crv, d: Some(d), .. } => unsigned_fixed_width(d, crv.component_len()),
            JWKType::EC { d: None, .. } => {
                Err(JoseError::missing("EC private key is required").into())
            }
            _ => Err(JoseError::argument(format!("{} is not an EC key", self.kind())).into()),
        }
    }

    pub(crate) fn okp_curve(&self) -> Result<OKPCurve, OpaqueError> {
        match &self.key_type {
            JWKType::OKP { crv, .. } => Ok(*crv),
            _ => Err(JoseError::argument(format!("{} is not an OKP key", self.kind())).into()),
        }
    }

    pub(crate) fn okp_public(&self) -> Result<&[u8], OpaqueError> {
        match &self.key_type {
            JWKType::OKP { x, .. } => Ok(x),
            _ => Err(JoseError::argument(format!("{} is not an OKP key", self.kind())).into()),
        }
    }

    pub(crate) fn okp_private(&self) -> Result<&[u8], OpaqueError> {
        match &self.key_type {
            JWKType::OKP { d: Some(d), .. } => Ok(d),
            JWKType::OKP { d: None, .. } => {
                Err(JoseError::missing("OKP private key is required").into())
            }
            _ => Err(JoseError::argument(format!("{} is not an OKP key", self.kind())).into()),
        }
    }
}

fn verify_ops(
    ops: &[JWKOperation],
    alg: Option<JWA>,
    key_use: Option<JWKUse>,
) -> Result<(), OpaqueError> {
    let illegal = |suffix: String| -> OpaqueError {
        JoseError::argument(format!("Illegal ops {}{suffix}", fmt_ops(ops))).into()
    };

    if ops.len() > 2 {
        return Err(illegal(String::new()));
    }
    if ops.len() == 2 {
        let pairs = [
            (JWKOperation::Sign, Some(JWKOperation::Verify)),
            (JWKOperation::Encrypt, Some(JWKOperation::Decrypt)),
            (JWKOperation::WrapKey, Some(JWKOperation::UnwrapKey)),
            (JWKOperation::DeriveBits, None),
            (JWKOperation::DeriveKey, None),
        ];
        for (a, b) in pairs {
            if ops.contains(&a) != b.is_some_and(|b| ops.contains(&b)) {
                return Err(illegal(String::new()));
            }
        }
    }

    if let Some(alg) = alg
        && !ops.iter().all(|op| alg.key_ops().contains(op))
    {
        return Err(illegal(format!(" for algorithm {alg}")));
    }

    if let Some(key_use) = key_use {
        let signs = ops
            .iter()
            .any(|op| matches!(op, JWKOperation::Sign | JWKOperation::Verify));
        if signs != (key_use == JWKUse::Signature) {
            return Err(illegal(format!(" for use {key_use}")));
        }
    }

    Ok(())
}

/// PEM block with the base64 body wrapped at 64 columns.
pub(crate) fn pem_block(label: &str, der: &[u8]) -> String {
    let encoded = BASE64_STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
/// [`JWKSet`] as defined in section 5 of [`rfc7517`]
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517#section-5
pub struct JWKSet {
    keys: Vec<JWK>,
}

impl JWKSet {
    pub fn new(keys: Vec<JWK>) -> Self {
        Self { keys }
    }

    /// Parse a JSON encoded key set.
    pub fn parse(json: &[u8]) -> Result<Self, OpaqueError> {
        serde_json::from_slice(json)
            .map_err(|err| JoseError::argument(format!("invalid JWK set: {err}")).into())
    }

    pub fn to_json(&self) -> Result<String, OpaqueError> {
        serde_json::to_string(self).context("serialize JWK set")
    }

    pub fn keys(&self) -> &[JWK] {
        &self.keys
    }

    /// First key with the given `kid`.
    pub fn find(&self, kid: &str) -> Option<&JWK> {
        self.keys.iter().find(|key| key.kid() == Some(kid))
    }

    /// Set holding the [well known](JWK::well_known) projection of every key.
    #[must_use]
    pub fn well_known(&self) -> Self {
        Self::new(self.keys.iter().map(JWK::well_known).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jose::{JWKBuilder, b64url_encode};

    #[test]
    fn jwk_thumb_order_is_correct() {
        let jwk_type = JWKType::EC {
            crv: JWKEllipticCurves::P256,
            x: Base64Url::new(b"x".to_vec()),
            y: Base64Url::new(b"y".to_vec()),
            d: None,
        };
        let output = serde_json::to_string(&jwk_type).unwrap();
        let expected_output = r##"{"crv":"P-256","kty":"EC","x":"eA","y":"eQ"}"##;
        assert_eq!(&output, expected_output);

        let jwk_type = JWKType::OCT {
            k: Some(Base64Url::new(b"k".to_vec())),
        };
        let output = serde_json::to_string(&jwk_type).unwrap();
        let expected_output = r##"{"k":"aw","kty":"oct"}"##;
        assert_eq!(&output, expected_output);
    }

    // RFC 7638, section 3.1
    #[test]
    fn rfc7638_thumbprint() {
        let key = JWK::parse(
            r#"{
                "kty": "RSA",
                "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
                "e": "AQAB",
                "alg": "RS256",
                "kid": "2011-04-29"
            }"#,
        )
        .unwrap();
        assert_eq!(
            "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs",
            b64url_encode(key.thumb_sha256().unwrap())
        );
        assert_eq!(Some("2011-04-29"), key.kid());
    }

    #[test]
    fn well_known_drops_private_members() {
        for kind in [KeyType::EcP384, KeyType::Ed25519, KeyType::X25519, KeyType::Rsa] {
            let key = JWK::generate(kind).unwrap();
            let public = key.well_known();
            assert!(key.is_private());
            assert!(!public.is_private());
            assert_eq!(key.kind(), public.kind());
            assert!(public.represents(&key));
            assert_eq!(
                key.thumb_sha256().unwrap().as_ref(),
                public.thumb_sha256().unwrap().as_ref()
            );

            let json = public.to_json().unwrap();
            assert!(!json.contains("\"d\""));
            assert_eq!(public, JWK::parse(&json).unwrap());
            assert_eq!(key, JWK::parse(&key.to_json().unwrap()).unwrap());
        }
    }

    #[test]
    fn different_keys_do_not_represent_each_other() {
        let a = JWK::generate(KeyType::EcP256).unwrap();
        let b = JWK::generate(KeyType::EcP256).unwrap();
        assert!(!a.well_known().represents(&b));
    }

    #[test]
    fn illegal_type_for_algorithm() {
        let err = JWKBuilder::new()
            .with_algorithm(JWA::A128GCMKW)
            .with_key_type(JWK::generate(KeyType::Rsa).unwrap().key_type().clone())
            .build()
            .unwrap_err();
        assert_eq!("Illegal type RSA for algorithm A128GCMKW", err.to_string());
    }

    #[test]
    fn illegal_use_for_algorithm() {
        let err = JWKBuilder::new()
            .with_algorithm(JWA::ES256)
            .with_key_use(JWKUse::Encryption)
            .with_key_type(JWK::generate(KeyType::EcP256).unwrap().key_type().clone())
            .build()
            .unwrap_err();
        assert_eq!("Illegal use enc for algorithm ES256", err.to_string());
    }

    #[test]
    fn illegal_ops() {
        let key_type = JWK::generate(KeyType::EcP256).unwrap().key_type().clone();
        let build = |ops: Vec<JWKOperation>, key_use: Option<JWKUse>| {
            JWKBuilder::new()
                .with_key_type(key_type.clone())
                .with_key_ops(ops)
                .maybe_with_key_use(key_use)
                .build()
                .unwrap_err()
                .to_string()
        };

        assert_eq!(
            "Illegal ops [sign, verify, deriveKey]",
            build(
                vec![
                    JWKOperation::Sign,
                    JWKOperation::Verify,
                    JWKOperation::DeriveKey
                ],
                None
            )
        );
        assert_eq!(
            "Illegal ops [sign, decrypt]",
            build(vec![JWKOperation::Sign, JWKOperation::Decrypt], None)
        );
        assert_eq!(
            "Illegal ops [deriveKey] for use sig",
            build(vec![JWKOperation::DeriveKey], Some(JWKUse::Signature))
        );

        let err = JWKBuilder::new()
            .with_key_type(key_type.clone())
            .with_algorithm(JWA::ES256)
            .with_key_ops(vec![JWKOperation::DeriveKey])
            .build()
            .unwrap_err();
        assert_eq!("Illegal ops [deriveKey] for algorithm ES256", err.to_string());
    }

    #[test]
    fn signing_requires_private_key() {
        let key = JWK::generate(KeyType::EcP256).unwrap().well_known();
        let err = JWKBuilder::new()
            .with_key_type(key.key_type().clone())
            .with_key_ops(vec![JWKOperation::Sign, JWKOperation::Verify])
            .build()
            .unwrap_err();
        assert_eq!("Private key required by ops [sign, verify]", err.to_string());
    }

    #[test]
    fn symmetric_key_has_no_certificate() {
        let cert = rcgen::CertificateParams::new(vec!["jwx.test".to_owned()])
            .unwrap()
            .self_signed(&rcgen::KeyPair::generate().unwrap())
            .unwrap();
        let err = JWKBuilder::new()
            .try_with_raw(vec![7; 32])
            .unwrap()
            .with_certificate_chain(vec![cert.der().clone()])
            .build()
            .unwrap_err();
        assert_eq!("Unexpected certificate", err.to_string());
    }

    #[test]
    fn key_set_lookup() {
        let a = JWKBuilder::new()
            .with_key_type(JWK::generate(KeyType::EcP256).unwrap().key_type().public())
            .with_kid("a".to_owned())
            .build()
            .unwrap();
        let b = JWKBuilder::new()
            .try_with_raw(vec![1; 16])
            .unwrap()
            .with_kid("b".to_owned())
            .build()
            .unwrap();
        let set = JWKSet::new(vec![a.clone(), b]);
        let parsed = JWKSet::parse(set.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(Some(&a), parsed.find("a"));
        assert!(parsed.find("c").is_none());
        assert!(!parsed.well_known().find("b").unwrap().is_private());
    }
}
