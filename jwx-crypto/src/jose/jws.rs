use aws_lc_rs::{
    hmac,
    rand::SystemRandom,
    signature::{
        ED25519, Ed25519KeyPair, EcdsaKeyPair, EcdsaSigningAlgorithm,
        EcdsaVerificationAlgorithm, RSA_PKCS1_2048_8192_SHA256,
        RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512, RSA_PKCS1_SHA256,
        RSA_PKCS1_SHA384, RSA_PKCS1_SHA512, RSA_PSS_2048_8192_SHA256, RSA_PSS_2048_8192_SHA384,
        RSA_PSS_2048_8192_SHA512, RSA_PSS_SHA256, RSA_PSS_SHA384, RSA_PSS_SHA512, RsaEncoding,
        RsaKeyPair, RsaParameters, UnparsedPublicKey,
    },
};
use jwx_error::{BoxError, ErrorContext as _, OpaqueError};
use jwx_utils::macros::generate_set_and_with;
use serde_json::{Map, Value};
use tracing::trace;

use crate::jose::{
    JWA, JWK, JWKEllipticCurves, JWKUse, Jose, JoseBuilder, JoseConfig, JoseError, OKPCurve,
    b64url_decode, b64url_encode,
    ecdsa::{der_to_jwa, jwa_to_der},
    encoding::{decode_json_segment, split_compact},
    header::{check_disjoint, merge_headers},
};

/// [`Signer`] implements all methods which are needed to sign a JWS,
/// and adds the parameters needed to verify it to the JOSE header
pub trait Signer {
    type Signature: AsRef<[u8]>;
    type Error: Into<BoxError>;

    /// Set the header parameters needed to verify the final `Signature`
    ///
    /// `alg` at the very least.
    fn set_headers(&self, header: &mut JoseBuilder) -> Result<(), Self::Error>;

    /// Sign the JWS signing input, `protected "." payload`
    fn sign(&self, data: &str) -> Result<Self::Signature, Self::Error>;
}

/// [`Verifier`] will be called to confirm if the received data is valid
///
/// For some protocols all signatures need to be valid, for others only one
/// of them. The [`JWK`] implementation accepts as soon as one signature
/// verifies with the key.
pub trait Verifier {
    type Error: Into<BoxError>;

    /// Verify if data is valid
    fn verify(&self, payload: &[u8], signatures: &[JWSSignature]) -> Result<(), Self::Error>;
}

impl Verifier for JWK {
    type Error = OpaqueError;

    fn verify(&self, payload: &[u8], signatures: &[JWSSignature]) -> Result<(), Self::Error> {
        let mut last_err = None;
        for signature in signatures {
            match signature.verify(payload, self) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| JoseError::missing("No signature to verify").into()))
    }
}

#[derive(Debug, Clone)]
/// [`Signer`] using a private [`JWK`] with one of the JWS algorithms
pub struct JWKSigner {
    alg: JWA,
    key: JWK,
}

impl JWKSigner {
    /// Create a signer for `alg`, `key` must hold the private material.
    pub fn new(alg: JWA, key: JWK) -> Result<Self, OpaqueError> {
        if alg.key_use() != JWKUse::Signature {
            return Err(JoseError::argument(format!("Not a signature algorithm {alg}")).into());
        }
        if !alg.key_types().contains(&key.kind()) {
            return Err(JoseError::argument(format!(
                "Illegal type {} for algorithm {alg}",
                key.kind()
            ))
            .into());
        }
        if !alg.is_hmac() && !key.is_private() {
            return Err(JoseError::missing(format!("Private key required by {alg}")).into());
        }
        Ok(Self { alg, key })
    }

    pub fn alg(&self) -> JWA {
        self.alg
    }

    pub fn key(&self) -> &JWK {
        &self.key
    }
}

impl Signer for JWKSigner {
    type Signature = Vec<u8>;
    type Error = OpaqueError;

    fn set_headers(&self, header: &mut JoseBuilder) -> Result<(), Self::Error> {
        header.set_algorithm(self.alg);
        if header.get("kid").is_none()
            && let Some(kid) = self.key.kid()
        {
            header.set_kid(kid.to_owned());
        }
        Ok(())
    }

    fn sign(&self, data: &str) -> Result<Self::Signature, Self::Error> {
        sign_bytes(self.alg, &self.key, data.as_bytes())
    }
}

fn hmac_algorithm(alg: JWA) -> Result<hmac::Algorithm, OpaqueError> {
    match alg {
        JWA::HS256 => Ok(hmac::HMAC_SHA256),
        JWA::HS384 => Ok(hmac::HMAC_SHA384),
        JWA::HS512 => Ok(hmac::HMAC_SHA512),
        other => Err(JoseError::argument(format!("{other} is not an HMAC algorithm")).into()),
    }
}

fn rsa_encoding(alg: JWA) -> Result<&'static dyn RsaEncoding, OpaqueError> {
    Ok(match alg {
        JWA::RS256 => &RSA_PKCS1_SHA256,
        JWA::RS384 => &RSA_PKCS1_SHA384,
        JWA::RS512 => &RSA_PKCS1_SHA512,
        // salt length matches the digest size
        JWA::PS256 => &RSA_PSS_SHA256,
        JWA::PS384 => &RSA_PSS_SHA384,
        JWA::PS512 => &RSA_PSS_SHA512,
        other => {
            return Err(JoseError::argument(format!("{other} is not an RSA algorithm")).into());
        }
    })
}

fn rsa_parameters(alg: JWA) -> Result<&'static RsaParameters, OpaqueError> {
    Ok(match alg {
        JWA::RS256 => &RSA_PKCS1_2048_8192_SHA256,
        JWA::RS384 => &RSA_PKCS1_2048_8192_SHA384,
        JWA::RS512 => &RSA_PKCS1_2048_8192_SHA512,
        JWA::PS256 => &RSA_PSS_2048_8192_SHA256,
        JWA::PS384 => &RSA_PSS_2048_8192_SHA384,
        JWA::PS512 => &RSA_PSS_2048_8192_SHA512,
        other => {
            return Err(JoseError::argument(format!("{other} is not an RSA algorithm")).into());
        }
    })
}

fn ed25519_only(key: &JWK) -> Result<(), OpaqueError> {
    match key.okp_curve()? {
        OKPCurve::Ed25519 => Ok(()),
        OKPCurve::Ed448 => Err(JoseError::unsupported("Ed448 signatures are not supported").into()),
        other => Err(JoseError::argument(format!(
            "Illegal type {} for algorithm EdDSA",
            other.key_type()
        ))
        .into()),
    }
}

/// Sign `data` with `key`, producing a signature in JWA format.
pub(crate) fn sign_bytes(alg: JWA, key: &JWK, data: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    trace!(%alg, "create signature");
    let rng = SystemRandom::new();
    match alg {
        JWA::HS256 | JWA::HS384 | JWA::HS512 => {
            let key = hmac::Key::new(hmac_algorithm(alg)?, key.oct_key()?);
            Ok(hmac::sign(&key, data).as_ref().to_vec())
        }
        JWA::RS256 | JWA::RS384 | JWA::RS512 | JWA::PS256 | JWA::PS384 | JWA::PS512 => {
            let key_pair = RsaKeyPair::from_pkcs8(&key.private_key_der()?)
                .context("load RSA private key")?;
            let mut signature = vec![0; key_pair.public_modulus_len()];
            key_pair
                .sign(rsa_encoding(alg)?, &rng, data, &mut signature)
                .context("create RSA signature")?;
            Ok(signature)
        }
        JWA::ES256 | JWA::ES384 | JWA::ES512 => {
            let signing_algorithm: &'static EcdsaSigningAlgorithm = alg.try_into()?;
            let key_pair = EcdsaKeyPair::from_private_key_and_public_key(
                signing_algorithm,
                &key.ec_private_scalar()?,
                &key.ec_point()?,
            )
            .context("load elliptic curve private key")?;
            let signature = key_pair
                .sign(&rng, data)
                .context("create ECDSA signature")?;
            der_to_jwa(alg, signature.as_ref())
        }
        JWA::EdDSA => {
            ed25519_only(key)?;
            let key_pair = Ed25519KeyPair::from_seed_unchecked(key.okp_private()?)
                .context("load Ed25519 private key")?;
            Ok(key_pair.sign(data).as_ref().to_vec())
        }
        other => Err(JoseError::argument(format!("Not a signature algorithm {other}")).into()),
    }
}

/// Verify a JWA format `signature` of `data` with `key`.
pub(crate) fn verify_bytes(
    alg: JWA,
    key: &JWK,
    data: &[u8],
    signature: &[u8],
) -> Result<(), OpaqueError> {
    trace!(%alg, "verify signature");
    let failed =
        || -> OpaqueError { JoseError::verification(format!("{alg} verification failed")).into() };
    match alg {
        JWA::HS256 | JWA::HS384 | JWA::HS512 => {
            let key = hmac::Key::new(hmac_algorithm(alg)?, key.oct_key()?);
            hmac::verify(&key, data, signature).ok().ok_or_else(failed)
        }
        JWA::RS256 | JWA::RS384 | JWA::RS512 | JWA::PS256 | JWA::PS384 | JWA::PS512 => {
            UnparsedPublicKey::new(rsa_parameters(alg)?, key.rsa_public_key()?)
                .verify(data, signature)
                .ok()
                .ok_or_else(failed)
        }
        JWA::ES256 | JWA::ES384 | JWA::ES512 => {
            let verification_algorithm: &'static EcdsaVerificationAlgorithm = alg.try_into()?;
            if key.ec_curve()? != JWKEllipticCurves::try_from(alg)? {
                return Err(JoseError::argument(format!(
                    "Illegal type {} for algorithm {alg}",
                    key.kind()
                ))
                .into());
            }
            let der = jwa_to_der(alg, signature).ok().ok_or_else(failed)?;
            UnparsedPublicKey::new(verification_algorithm, key.ec_point()?)
                .verify(data, &der)
                .ok()
                .ok_or_else(failed)
        }
        JWA::EdDSA => {
            ed25519_only(key)?;
            UnparsedPublicKey::new(&ED25519, key.okp_public()?)
                .verify(data, signature)
                .ok()
                .ok_or_else(failed)
        }
        other => Err(JoseError::argument(format!("Not a signature algorithm {other}")).into()),
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One signature of a JWS, see section 7.2.1 of [`rfc7515`]
///
/// A [`JWSSignature`] is verified on construction: the header carries a
/// signature algorithm, every protected parameter matches the resolved header
/// and the registered extensions accepted it. Checking the signature itself
/// needs the payload, see [`JWSSignature::verify`].
///
/// [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-7.2.1
pub struct JWSSignature {
    protected: Option<Map<String, Value>>,
    protected_encoded: String,
    header: Jose,
    signature: Vec<u8>,
}

impl JWSSignature {
    fn new(
        protected: Option<Map<String, Value>>,
        protected_encoded: String,
        header: Jose,
        signature: Vec<u8>,
        config: &JoseConfig,
    ) -> Result<Self, OpaqueError> {
        if header.alg().key_use() != JWKUse::Signature {
            return Err(JoseError::argument("Signature algorithm is required").into());
        }

        for (name, value) in protected.iter().flatten() {
            if header.value(name).as_ref() != Some(value) {
                return Err(JoseError::argument(format!("{name} must match protected header")).into());
            }
        }

        let signature = Self {
            protected,
            protected_encoded,
            header,
            signature,
        };
        config.registry().verify_signature(&signature)?;
        Ok(signature)
    }

    fn parse(json: &Map<String, Value>, config: &JoseConfig) -> Result<Self, OpaqueError> {
        let protected_encoded = match json.get("protected") {
            Some(Value::String(encoded)) => encoded.clone(),
            Some(_) => return Err(JoseError::argument("protected must be a string").into()),
            None => String::new(),
        };
        let protected = if protected_encoded.is_empty() {
            None
        } else {
            Some(decode_json_segment(&protected_encoded).context("decode protected header")?)
        };
        let unprotected = match json.get("header") {
            Some(Value::Object(header)) => Some(header),
            Some(_) => return Err(JoseError::argument("header must be an object").into()),
            None => None,
        };
        let signature = match json.get("signature") {
            Some(Value::String(signature)) => b64url_decode(signature)?,
            _ => return Err(JoseError::missing("signature is required").into()),
        };

        check_disjoint(protected.as_ref(), unprotected)?;
        let header = Jose::from_json_with_config(
            &merge_headers([protected.as_ref(), unprotected]),
            config,
        )?;
        Self::new(protected, protected_encoded, header, signature, config)
    }

    /// Parameters integrity protected by the signature.
    pub fn protected(&self) -> Option<&Map<String, Value>> {
        self.protected.as_ref()
    }

    /// Resolved header: protected and unprotected parameters.
    pub fn header(&self) -> &Jose {
        &self.header
    }

    /// Parameters not covered by the signature.
    pub fn unprotected(&self) -> Map<String, Value> {
        self.header.to_json_filtered(|name| {
            self.protected
                .as_ref()
                .is_none_or(|protected| !protected.contains_key(name))
        })
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// JWS signing input for `payload`: `base64url(protected) "." base64url(payload)`
    pub fn signing_input(&self, payload: &[u8]) -> String {
        format!("{}.{}", self.protected_encoded, b64url_encode(payload))
    }

    /// Verify this signature of `payload` with `key`.
    pub fn verify(&self, payload: &[u8], key: &JWK) -> Result<(), OpaqueError> {
        verify_bytes(
            self.header.alg(),
            key,
            self.signing_input(payload).as_bytes(),
            &self.signature,
        )
    }

    fn to_json(&self) -> Map<String, Value> {
        let mut json = Map::new();
        if !self.protected_encoded.is_empty() {
            json.insert(
                "protected".to_owned(),
                Value::from(self.protected_encoded.as_str()),
            );
        }
        let unprotected = self.unprotected();
        if !unprotected.is_empty() {
            json.insert("header".to_owned(), Value::Object(unprotected));
        }
        json.insert(
            "signature".to_owned(),
            Value::from(b64url_encode(&self.signature)),
        );
        json
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A payload with one or more [`JWSSignature`]s
///
/// Serializes to the compact form (exactly one signature without unprotected
/// parameters), the flattened JSON form (one signature) or the general JSON
/// form, see section 7 of [`rfc7515`].
///
/// [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-7
pub struct JWSSignedPayload {
    payload: Vec<u8>,
    signatures: Vec<JWSSignature>,
}

impl JWSSignedPayload {
    /// Parse any JWS serialization with the default config.
    pub fn parse(jws: &str) -> Result<Self, OpaqueError> {
        Self::parse_with_config(jws, &JoseConfig::default())
    }

    pub fn parse_with_config(jws: &str, config: &JoseConfig) -> Result<Self, OpaqueError> {
        let jws = jws.trim();
        if jws.starts_with('{') {
            let json: Map<String, Value> = serde_json::from_str(jws)
                .map_err(|err| JoseError::argument(format!("invalid JWS JSON: {err}")))?;
            let payload = match json.get("payload") {
                Some(Value::String(payload)) => b64url_decode(payload).context("decode payload")?,
                _ => return Err(JoseError::missing("payload is required").into()),
            };
            let signatures = match json.get("signatures") {
                Some(Value::Array(signatures)) if !signatures.is_empty() => signatures
                    .iter()
                    .map(|signature| match signature {
                        Value::Object(signature) => JWSSignature::parse(signature, config),
                        _ => Err(JoseError::argument("signature must be an object").into()),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => {
                    return Err(JoseError::argument("signatures must be a non empty array").into());
                }
                None => vec![JWSSignature::parse(&json, config)?],
            };
            Ok(Self {
                payload,
                signatures,
            })
        } else {
            let [protected_encoded, payload, signature] = split_compact::<3>(jws)?;
            let protected = decode_json_segment(protected_encoded).context("decode protected header")?;
            let header = Jose::from_json_with_config(&protected, config)?;
            let signature = JWSSignature::new(
                Some(protected),
                protected_encoded.to_owned(),
                header,
                b64url_decode(signature).context("decode signature")?,
                config,
            )?;
            Ok(Self {
                payload: b64url_decode(payload).context("decode payload")?,
                signatures: vec![signature],
            })
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn signatures(&self) -> &[JWSSignature] {
        &self.signatures
    }

    /// Verify the signatures with `verifier`, a [`JWK`] for instance.
    pub fn verify(&self, verifier: &impl Verifier) -> Result<(), OpaqueError> {
        verifier
            .verify(&self.payload, &self.signatures)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
    }

    /// Compact serialization `protected "." payload "." signature`
    pub fn compact(&self) -> Result<String, OpaqueError> {
        let [signature] = self.signatures.as_slice() else {
            return Err(JoseError::argument(
                "Compact serialization requires exactly one signature",
            )
            .into());
        };
        if !signature.unprotected().is_empty() {
            return Err(JoseError::argument(
                "Compact serialization does not support unprotected header parameters",
            )
            .into());
        }
        Ok(format!(
            "{}.{}",
            signature.signing_input(&self.payload),
            b64url_encode(&signature.signature)
        ))
    }

    /// JSON serialization, flattened when there is exactly one signature.
    pub fn to_json(&self) -> String {
        let mut json = match self.signatures.as_slice() {
            [signature] => signature.to_json(),
            signatures => {
                let mut json = Map::new();
                json.insert(
                    "signatures".to_owned(),
                    signatures
                        .iter()
                        .map(|signature| Value::Object(signature.to_json()))
                        .collect(),
                );
                json
            }
        };
        json.insert("payload".to_owned(), Value::from(b64url_encode(&self.payload)));
        Value::Object(json).to_string()
    }
}

#[derive(Debug, Clone)]
/// [`JWSBuilder`] should be used when creating a [`JWSSignedPayload`]
///
/// Every signature gets its own header, set through [`JWSBuilder::header_mut`]
/// before calling [`JWSBuilder::add_signature`] or [`JWSBuilder::build`].
/// Parameters listed with [`JWSBuilder::with_protect`] (`alg` by default) are
/// integrity protected, in compact mode all of them are.
pub struct JWSBuilder {
    config: JoseConfig,
    payload: Vec<u8>,
    compact: bool,
    protect: Vec<String>,
    header: JoseBuilder,
    signatures: Vec<JWSSignature>,
}

impl Default for JWSBuilder {
    fn default() -> Self {
        Self {
            config: JoseConfig::default(),
            payload: Vec::new(),
            compact: false,
            protect: vec!["alg".to_owned()],
            header: JoseBuilder::new(),
            signatures: Vec::new(),
        }
    }
}

impl JWSBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        /// Config used for the headers of all following signatures.
        pub fn config(mut self, config: JoseConfig) -> Self {
            self.header.set_config(config.clone());
            self.config = config;
            self
        }
    }

    generate_set_and_with! {
        /// Add the provided payload to this [`JWSBuilder`]
        pub fn payload(mut self, payload: Vec<u8>) -> Self {
            self.payload = payload;
            self
        }
    }

    generate_set_and_with! {
        /// Protect every header parameter, required for compact serialization.
        pub fn compact(mut self) -> Self {
            self.compact = true;
            self
        }
    }

    generate_set_and_with! {
        /// Add header parameter names to protect, on top of `alg`.
        pub fn protect(mut self, names: Vec<String>) -> Self {
            for name in names {
                if !self.protect.contains(&name) {
                    self.protect.push(name);
                }
            }
            self
        }
    }

    generate_set_and_with! {
        /// Header of the next signature.
        pub fn header(mut self, header: JoseBuilder) -> Self {
            self.header = header.with_config(self.config.clone());
            self
        }
    }

    /// Get mutable reference to the header of the next signature
    pub fn header_mut(&mut self) -> &mut JoseBuilder {
        &mut self.header
    }

    fn protected_params(&self) -> Result<Option<Map<String, Value>>, OpaqueError> {
        if self.compact {
            return Ok(Some(self.header.to_json().clone()));
        }
        if self.protect.is_empty() {
            return Ok(None);
        }
        let mut protected = Map::new();
        for name in &self.protect {
            let value = self.header.get(name).ok_or_else(|| {
                JoseError::argument(format!("protected parameter {name} is not set"))
            })?;
            protected.insert(name.clone(), value.clone());
        }
        Ok(Some(protected))
    }

    /// Sign the payload with `signer` and the current header, then start a
    /// new header for the next signature.
    pub fn add_signature(mut self, signer: &impl Signer) -> Result<Self, OpaqueError> {
        if self.compact && !self.signatures.is_empty() {
            return Err(JoseError::argument(
                "Compact serialization requires exactly one signature",
            )
            .into());
        }

        signer
            .set_headers(&mut self.header)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
            .context("signer set headers")?;
        let header = self.header.build()?;

        let protected = self.protected_params()?;
        let protected_encoded = match &protected {
            Some(protected) => {
                b64url_encode(serde_json::to_vec(protected).context("serialize protected header")?)
            }
            None => String::new(),
        };
        let signing_input = format!("{protected_encoded}.{}", b64url_encode(&self.payload));

        let signature = signer
            .sign(&signing_input)
            .map_err(|err| OpaqueError::from_boxed(err.into()))
            .context("signer sign protected data")?;

        self.signatures.push(JWSSignature::new(
            protected,
            protected_encoded,
            header,
            signature.as_ref().to_vec(),
            &self.config,
        )?);
        self.header = JoseBuilder::new().with_config(self.config.clone());
        Ok(self)
    }

    /// Add the final signature and build the [`JWSSignedPayload`]
    pub fn build(self, signer: &impl Signer) -> Result<JWSSignedPayload, OpaqueError> {
        let builder = self.add_signature(signer)?;
        Ok(JWSSignedPayload {
            payload: builder.payload,
            signatures: builder.signatures,
        })
    }
}

/// Sign `payload` with `key` and return the compact serialization.
pub fn sign_compact(alg: JWA, key: &JWK, payload: &[u8]) -> Result<String, OpaqueError> {
    JWSBuilder::new()
        .with_payload(payload.to_vec())
        .with_compact()
        .build(&JWKSigner::new(alg, key.clone())?)?
        .compact()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::assert_err;

    use super::*;
    use crate::jose::{JWKBuilder, JWKType, KeyType, jwk_builder::random_bytes};

    struct DummyKey;

    impl Signer for DummyKey {
        type Signature = Vec<u8>;
        type Error = OpaqueError;

        fn sign(&self, data: &str) -> Result<Self::Signature, OpaqueError> {
            let mut out = data.as_bytes().to_vec();
            out.push(33);
            Ok(out)
        }

        fn set_headers(&self, header: &mut JoseBuilder) -> Result<(), OpaqueError> {
            header.set_algorithm(JWA::HS256);
            Ok(())
        }
    }

    impl Verifier for DummyKey {
        type Error = OpaqueError;

        fn verify(&self, payload: &[u8], signatures: &[JWSSignature]) -> Result<(), OpaqueError> {
            for to_verify in signatures {
                let original = to_verify.signing_input(payload);
                let original = original.as_bytes();
                let signature = to_verify.signature();

                if original.len() + 1 != signature.len() {
                    return Err(OpaqueError::from_display(
                        "signature should add single u8 to original slice",
                    ));
                } else if original[..] != signature[..original.len()] {
                    return Err(OpaqueError::from_display("original data should be equal"));
                } else if signature[signature.len() - 1] != 33 {
                    return Err(OpaqueError::from_display(
                        "last element in signature should be 33",
                    ));
                }
            }
            Ok(())
        }
    }

    fn hmac_key() -> JWK {
        JWKBuilder::new()
            .try_with_raw(random_bytes(32).unwrap())
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn can_serialize_and_deserialize() {
        let mut builder = JWSBuilder::new().with_payload(b"something".to_vec());
        builder.header_mut().set_typ("acme".to_owned());
        let jws = builder.build(&DummyKey).unwrap();

        let serialized = jws.to_json();
        let received = JWSSignedPayload::parse(&serialized).unwrap();
        assert_eq!(jws, received);
        received.verify(&DummyKey).unwrap();

        let signature = &received.signatures()[0];
        assert_eq!(Some("acme"), signature.header().typ());
        assert_eq!(json!({"alg": "HS256"}), Value::Object(signature.protected().unwrap().clone()));
        assert_eq!(json!({"typ": "acme"}), Value::Object(signature.unprotected()));
        assert_eq!(b"something", received.payload());

        // flattened form
        let value: Value = serde_json::from_str(&serialized).unwrap();
        assert!(value.get("signatures").is_none());
        assert_eq!(json!({"typ": "acme"}), value["header"]);
    }

    #[test]
    fn empty_payload() {
        let jws = JWSBuilder::new().with_compact().build(&DummyKey).unwrap();
        let compact = jws.compact().unwrap();
        let [_, payload, _] = split_compact::<3>(&compact).unwrap();
        assert_eq!("", payload);
        assert!(JWSSignedPayload::parse(&compact).unwrap().payload().is_empty());
    }

    #[test]
    fn tampering_should_be_detected() {
        let key = hmac_key();
        let jws = JWSBuilder::new()
            .with_payload(b"something".to_vec())
            .with_compact()
            .build(&JWKSigner::new(JWA::HS256, key.clone()).unwrap())
            .unwrap();
        let serialized = jws.compact().unwrap();

        let server = |serialized: String| {
            let received = JWSSignedPayload::parse(&serialized).context("decode jws")?;
            received.verify(&key)?;
            Ok::<_, OpaqueError>(())
        };
        server(serialized.clone()).unwrap();

        for i in 0..serialized.len() - 1 {
            let mut serialized: String = serialized.clone();
            serialized.insert(i, 't');
            assert_err!(server(serialized), "failed at {i}");
        }
    }

    #[test]
    fn can_create_multi_signature_jws() {
        let first = hmac_key();
        let second = JWK::generate(KeyType::EcP256).unwrap();

        let mut builder = JWSBuilder::new()
            .with_payload(b"something".to_vec())
            .with_protect(vec!["kid".to_owned()]);
        builder.header_mut().set_kid("first".to_owned());
        let mut builder = builder
            .add_signature(&JWKSigner::new(JWA::HS512, first.clone()).unwrap())
            .unwrap();
        builder.header_mut().set_kid("second".to_owned());
        let jws = builder
            .build(&JWKSigner::new(JWA::ES256, second.clone()).unwrap())
            .unwrap();

        let received = JWSSignedPayload::parse(&jws.to_json()).unwrap();
        assert_eq!(2, received.signatures().len());
        assert_eq!(Some("second"), received.signatures()[1].header().kid());
        received.verify(&first).unwrap();
        received.verify(&second.well_known()).unwrap();
        received.verify(&hmac_key()).unwrap_err();

        jws.compact().unwrap_err();
    }

    #[test]
    fn compact_allows_a_single_signature() {
        let builder = JWSBuilder::new()
            .with_compact()
            .add_signature(&DummyKey)
            .unwrap();
        let err = builder.build(&DummyKey).unwrap_err();
        assert_eq!("Compact serialization requires exactly one signature", err.to_string());
    }

    #[test]
    fn protected_parameter_must_be_set() {
        let err = JWSBuilder::new()
            .with_protect(vec!["typ".to_owned()])
            .build(&DummyKey)
            .unwrap_err();
        assert_eq!("protected parameter typ is not set", err.to_string());
    }

    #[test]
    fn protected_and_unprotected_headers_are_disjoint() {
        let key = hmac_key();
        let jws = JWSBuilder::new()
            .with_payload(b"payload".to_vec())
            .build(&JWKSigner::new(JWA::HS256, key.clone()).unwrap())
            .unwrap();

        for alg in ["HS384", "HS256"] {
            let mut json: Map<String, Value> = serde_json::from_str(&jws.to_json()).unwrap();
            json.insert("header".to_owned(), json!({"alg": alg}));
            let err = JWSSignedPayload::parse(&Value::Object(json).to_string()).unwrap_err();
            assert_eq!(
                "Header parameter alg must not appear in more than one header",
                err.to_string()
            );
            assert_eq!(
                Some(crate::jose::JoseErrorKind::Argument),
                crate::jose::error_kind(&err)
            );
        }

        let mut json: Map<String, Value> = serde_json::from_str(&jws.to_json()).unwrap();
        json.insert("header".to_owned(), json!({"kid": "k1"}));
        let received = JWSSignedPayload::parse(&Value::Object(json).to_string()).unwrap();
        assert_eq!(Some("k1"), received.signatures()[0].header().kid());
        received.verify(&key).unwrap();
    }

    #[test]
    fn encryption_algorithm_is_not_a_signature() {
        let protected = b64url_encode(br#"{"alg":"dir","enc":"A128GCM"}"#);
        let err = JWSSignedPayload::parse(&format!("{protected}.cGF5bG9hZA.c2ln")).unwrap_err();
        assert_eq!("Signature algorithm is required", err.to_string());

        JWKSigner::new(JWA::Dir, hmac_key()).unwrap_err();
    }

    #[test]
    fn rfc7515_a1_hs256() {
        let compact = "eyJ0eXAiOiJKV1QiLA0KICJhbGciOiJIUzI1NiJ9.\
            eyJpc3MiOiJqb2UiLA0KICJleHAiOjEzMDA4MTkzODAsDQogImh0dHA6Ly9leGFtcGxlLmNvbS9pc19yb290Ijp0cnVlfQ.\
            dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let key = JWKBuilder::new()
            .try_with_raw(
                b64url_decode(
                    "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow",
                )
                .unwrap(),
            )
            .unwrap()
            .build()
            .unwrap();

        let jws = JWSSignedPayload::parse(compact).unwrap();
        assert_eq!(Some("JWT"), jws.signatures()[0].header().typ());
        jws.verify(&key).unwrap();
        // the original protected encoding is kept as is
        assert_eq!(compact, jws.compact().unwrap());
    }

    #[test]
    fn all_signature_algorithms() {
        let rsa = JWK::generate(KeyType::Rsa).unwrap();
        let cases = [
            (JWA::HS256, hmac_key()),
            (JWA::HS384, hmac_key()),
            (JWA::RS256, rsa.clone()),
            (JWA::RS512, rsa.clone()),
            (JWA::PS256, rsa.clone()),
            (JWA::PS384, rsa),
            (JWA::ES384, JWK::generate(KeyType::EcP384).unwrap()),
            (JWA::ES512, JWK::generate(KeyType::EcP521).unwrap()),
            (JWA::EdDSA, JWK::generate(KeyType::Ed25519).unwrap()),
        ];
        for (alg, key) in cases {
            let compact = sign_compact(alg, &key, b"hello").unwrap();
            let jws = JWSSignedPayload::parse(&compact).unwrap();
            let verify_key = if alg.is_hmac() { key.clone() } else { key.well_known() };
            jws.verify(&verify_key).unwrap();

            let mut tampered = jws.signatures()[0].signature().to_vec();
            tampered[0] ^= 1;
            verify_bytes(
                alg,
                &verify_key,
                jws.signatures()[0].signing_input(b"hello").as_bytes(),
                &tampered,
            )
            .unwrap_err();
            jws.signatures()[0].verify(b"hellO", &verify_key).unwrap_err();
        }
    }

    #[test]
    fn signer_rejects_unusable_keys() {
        let ec = JWK::generate(KeyType::EcP256).unwrap();
        let err = JWKSigner::new(JWA::ES256, ec.well_known()).unwrap_err();
        assert_eq!("Private key required by ES256", err.to_string());
        let err = JWKSigner::new(JWA::RS256, ec).unwrap_err();
        assert_eq!("Illegal type EC P-256 for algorithm RS256", err.to_string());

        let ed448 = JWK::new(JWKType::OKP {
            crv: OKPCurve::Ed448,
            x: vec![1; 57].into(),
            d: Some(vec![1; 57].into()),
        });
        let err = sign_bytes(JWA::EdDSA, &ed448, b"hello").unwrap_err();
        assert_eq!(
            Some(crate::jose::JoseErrorKind::Unsupported),
            crate::jose::error_kind(&err)
        );
    }
}
