use std::num::NonZeroU32;

use aws_lc_rs::{
    agreement, key_wrap,
    key_wrap::KeyWrap as _,
    pbkdf2,
    rsa::{
        OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256, OaepAlgorithm, OaepPrivateDecryptingKey,
        OaepPublicEncryptingKey, PrivateDecryptingKey, PublicEncryptingKey,
    },
};
use jwx_error::{ErrorContext as _, OpaqueError};
use jwx_utils::macros::generate_set_and_with;
use serde_json::{Map, Value};
use tracing::trace;

use crate::jose::{
    JWA, JWEEncryption, JWK, JWKUse, Jose, JoseBuilder, JoseConfig, JoseError, KeyType,
    adapter::ParamValue,
    b64url_decode, b64url_encode,
    constants::{GCM_IV_LEN, GCM_TAG_LEN},
    encoding::concat_kdf,
    jwe::content::{gcm_open, gcm_seal},
    jwk_builder::random_bytes,
};

#[derive(Debug, Clone, PartialEq)]
/// One recipient of a [`JWE`](super::JWE)
///
/// Holds the resolved header (protected, shared and per-recipient parameters
/// merged) and the content encryption key as protected for this recipient.
pub struct JWERecipient {
    header: Jose,
    encrypted_key: Vec<u8>,
}

impl JWERecipient {
    pub(crate) fn new(header: Jose, encrypted_key: Vec<u8>) -> Self {
        Self {
            header,
            encrypted_key,
        }
    }

    /// Resolved header of this recipient.
    pub fn header(&self) -> &Jose {
        &self.header
    }

    /// Encrypted content encryption key, empty for `dir` and `ECDH-ES`.
    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    /// Recover the content encryption key with the private (or secret) `key`.
    pub(crate) fn decrypt_cek(&self, enc: JWEEncryption, key: &JWK) -> Result<Vec<u8>, OpaqueError> {
        if let Some(well_known) = self.header.well_known()
            && !well_known.represents(key)
        {
            return Err(JoseError::argument("Key is not valid for recipient").into());
        }

        let alg = self.header.alg();
        trace!(%alg, %enc, "JWE: decrypt CEK");
        let direct = matches!(alg, JWA::Dir | JWA::EcdhEs);
        if direct && !self.encrypted_key.is_empty() {
            return Err(JoseError::argument(format!("encrypted key must be empty for {alg}")).into());
        }
        if !direct && self.encrypted_key.is_empty() {
            return Err(JoseError::missing(format!("encrypted key required for {alg}")).into());
        }

        let cek = match alg {
            JWA::Dir => key.oct_key()?.to_vec(),
            JWA::EcdhEs => self.agreed_key(enc, key)?,
            JWA::A128KW | JWA::A192KW | JWA::A256KW => {
                aes_unwrap(alg, key.oct_key()?, &self.encrypted_key)?
            }
            JWA::A128GCMKW | JWA::A192GCMKW | JWA::A256GCMKW => {
                let kek = kek(alg, key.oct_key()?)?;
                let iv = self.required_binary("iv")?;
                if iv.len() != GCM_IV_LEN {
                    return Err(JoseError::argument("iv must be 96 bits").into());
                }
                let tag = self.required_binary("tag")?;
                if tag.len() != GCM_TAG_LEN {
                    return Err(JoseError::argument("tag must be 128 bits").into());
                }
                gcm_open(kek, &iv, &[], &self.encrypted_key, &tag)?
            }
            JWA::RSA1_5 | JWA::RsaOaep | JWA::RsaOaep256 => {
                oaep_decrypt(alg, key, &self.encrypted_key)?
            }
            JWA::EcdhEsA128KW | JWA::EcdhEsA192KW | JWA::EcdhEsA256KW => {
                let kek = self.agreed_key(enc, key)?;
                aes_unwrap(alg, &kek, &self.encrypted_key)?
            }
            JWA::Pbes2Hs256A128KW | JWA::Pbes2Hs384A192KW | JWA::Pbes2Hs512A256KW => {
                let p2s = self.required_binary("p2s")?;
                let p2c = match self.header.param("p2c")? {
                    Some(ParamValue::Count(p2c)) => u32::try_from(p2c)
                        .ok()
                        .ok_or_else(|| JoseError::argument("p2c is too large"))?,
                    _ => return Err(JoseError::missing(format!("p2c required for {alg}")).into()),
                };
                let kek = pbes2_key(alg, key.oct_key()?, &p2s, p2c)?;
                aes_unwrap(alg, &kek, &self.encrypted_key)?
            }
            other => {
                return Err(JoseError::argument(format!("Not an encryption algorithm {other}")).into());
            }
        };

        if cek.len() * 8 != enc.size() {
            return Err(JoseError::argument(format!("Invalid key size for {enc}")).into());
        }
        Ok(cek)
    }

    fn required_binary(&self, name: &str) -> Result<Vec<u8>, OpaqueError> {
        self.header.binary(name)?.ok_or_else(|| {
            JoseError::missing(format!("{name} required for {}", self.header.alg())).into()
        })
    }

    fn agreed_key(&self, enc: JWEEncryption, key: &JWK) -> Result<Vec<u8>, OpaqueError> {
        let alg = self.header.alg();
        let epk = match self.header.param("epk")? {
            Some(ParamValue::Key(epk)) => epk,
            _ => return Err(JoseError::missing(format!("epk required for {alg}")).into()),
        };
        let z = agree(key, &epk)?;
        Ok(derive_agreed_key(
            alg,
            enc,
            &z,
            &self.header.binary("apu")?.unwrap_or_default(),
            &self.header.binary("apv")?.unwrap_or_default(),
        ))
    }
}

#[derive(Debug, Clone)]
/// Builder for one recipient of a [`JWEBuilder`](super::JWEBuilder)
///
/// Holds the key management algorithm, the recipient key (public for RSA and
/// ECDH, the shared secret or passphrase otherwise) and the recipient header.
/// `enc` and `zip` are set by the [`JWEBuilder`](super::JWEBuilder).
pub struct JWERecipientBuilder {
    alg: JWA,
    key: JWK,
    header: JoseBuilder,
}

impl JWERecipientBuilder {
    /// Create a recipient protecting the content encryption key with `alg` and `key`.
    pub fn new(alg: JWA, key: JWK) -> Result<Self, OpaqueError> {
        if alg.key_use() != JWKUse::Encryption {
            return Err(JoseError::argument(format!("Not an encryption algorithm {alg}")).into());
        }
        if !alg.key_types().contains(&key.kind()) {
            return Err(JoseError::argument(format!(
                "Illegal type {} for algorithm {alg}",
                key.kind()
            ))
            .into());
        }

        let mut header = JoseBuilder::new().with_algorithm(alg);
        if let Some(kid) = key.kid() {
            header.set_kid(kid.to_owned());
        }
        Ok(Self { alg, key, header })
    }

    pub fn alg(&self) -> JWA {
        self.alg
    }

    pub fn key(&self) -> &JWK {
        &self.key
    }

    generate_set_and_with! {
        /// Recipient header, `alg` is always overwritten by the recipient algorithm.
        pub fn header(mut self, header: JoseBuilder) -> Self {
            self.header = header.with_algorithm(self.alg);
            self
        }
    }

    /// Get mutable reference to the recipient header
    pub fn header_mut(&mut self) -> &mut JoseBuilder {
        &mut self.header
    }

    pub(crate) fn prepare(&mut self, config: &JoseConfig, enc: JWEEncryption, deflate: bool) {
        self.header.set_config(config.clone());
        self.header.set_algorithm(self.alg);
        self.header.set_value("enc", Value::from(enc.name()));
        if deflate {
            self.header.set_value("zip", Value::from("DEF"));
        }
    }

    /// Content encryption key imposed by this recipient: the shared key for
    /// `dir`, the agreed upon key for `ECDH-ES`.
    pub(crate) fn direct_key(&mut self, enc: JWEEncryption) -> Result<Option<Vec<u8>>, OpaqueError> {
        match self.alg {
            JWA::Dir => {
                let cek = self.key.oct_key()?;
                if cek.len() * 8 != enc.size() {
                    return Err(JoseError::argument(format!(
                        "Invalid key size for {enc} {}",
                        cek.len()
                    ))
                    .into());
                }
                Ok(Some(cek.to_vec()))
            }
            JWA::EcdhEs => Ok(Some(self.agree(enc)?)),
            _ => Ok(None),
        }
    }

    /// Protect `cek` for this recipient and build its header.
    ///
    /// Must follow [`JWERecipientBuilder::direct_key`] for `ECDH-ES`,
    /// which generated the ephemeral key.
    pub(crate) fn build(mut self, enc: JWEEncryption, cek: &[u8]) -> Result<JWERecipient, OpaqueError> {
        let alg = self.alg;
        trace!(%alg, %enc, "JWE: protect CEK");
        let encrypted_key = match alg {
            JWA::Dir | JWA::EcdhEs => Vec::new(),
            JWA::A128KW | JWA::A192KW | JWA::A256KW => aes_wrap(alg, self.key.oct_key()?, cek)?,
            JWA::A128GCMKW | JWA::A192GCMKW | JWA::A256GCMKW => {
                let kek = kek(alg, self.key.oct_key()?)?;
                let iv = random_bytes(GCM_IV_LEN)?;
                let (encrypted_key, tag) = gcm_seal(kek, &iv, &[], cek)?;
                self.set_binary("iv", &iv);
                self.set_binary("tag", &tag);
                encrypted_key
            }
            JWA::RSA1_5 | JWA::RsaOaep | JWA::RsaOaep256 => oaep_encrypt(alg, &self.key, cek)?,
            JWA::EcdhEsA128KW | JWA::EcdhEsA192KW | JWA::EcdhEsA256KW => {
                let kek = self.agree(enc)?;
                aes_wrap(alg, &kek, cek)?
            }
            JWA::Pbes2Hs256A128KW | JWA::Pbes2Hs384A192KW | JWA::Pbes2Hs512A256KW => {
                let p2s = random_bytes(alg.size() / 8)?;
                // 2048, 3072 or 4096 iterations
                let p2c = alg.size() as u32 * 16;
                self.set_binary("p2s", &p2s);
                self.header.set_value("p2c", Value::from(p2c));
                let kek = pbes2_key(alg, self.key.oct_key()?, &p2s, p2c)?;
                aes_wrap(alg, &kek, cek)?
            }
            other => {
                return Err(JoseError::argument(format!("Not an encryption algorithm {other}")).into());
            }
        };

        Ok(JWERecipient::new(self.header.build()?, encrypted_key))
    }

    fn set_binary(&mut self, name: &str, value: &[u8]) {
        self.header.set_value(name, Value::from(b64url_encode(value)));
    }

    fn binary(&self, name: &str) -> Result<Vec<u8>, OpaqueError> {
        match self.header.get(name) {
            Some(Value::String(value)) => b64url_decode(value),
            Some(_) => Err(JoseError::argument(format!("{name} must be a string")).into()),
            None => Ok(Vec::new()),
        }
    }

    /// Generate the ephemeral key (`epk`) and derive the agreed upon key.
    fn agree(&mut self, enc: JWEEncryption) -> Result<Vec<u8>, OpaqueError> {
        let epk = JWK::generate(self.key.kind())?;
        let epk_json = serde_json::to_value(epk.well_known()).context("serialize epk")?;
        self.header.set_value("epk", epk_json);

        let z = agree(&epk, &self.key)?;
        Ok(derive_agreed_key(
            self.alg,
            enc,
            &z,
            &self.binary("apu")?,
            &self.binary("apv")?,
        ))
    }
}

/// Key derivation of section 4.6.2 of rfc7518: `ECDH-ES` derives a key for
/// `enc`, the key wrapping variants a key for the wrapping algorithm.
fn derive_agreed_key(alg: JWA, enc: JWEEncryption, z: &[u8], apu: &[u8], apv: &[u8]) -> Vec<u8> {
    let (algorithm_id, key_data_len) = match alg {
        JWA::EcdhEs => (enc.name(), enc.size()),
        _ => (alg.name(), alg.size()),
    };
    concat_kdf(z, algorithm_id.as_bytes(), apu, apv, key_data_len)
}

fn agreement_algorithm(kind: KeyType) -> Result<&'static agreement::Algorithm, OpaqueError> {
    match kind {
        KeyType::EcP256 => Ok(&agreement::ECDH_P256),
        KeyType::EcP384 => Ok(&agreement::ECDH_P384),
        KeyType::EcP521 => Ok(&agreement::ECDH_P521),
        KeyType::X25519 => Ok(&agreement::X25519),
        other => Err(JoseError::unsupported(format!(
            "Key agreement is not supported for {other}"
        ))
        .into()),
    }
}

/// Shared secret `Z` of the private key `private` and the public key `public`.
fn agree(private: &JWK, public: &JWK) -> Result<Vec<u8>, OpaqueError> {
    let kind = private.kind();
    if public.kind() != kind {
        return Err(JoseError::argument(format!(
            "{} key cannot agree with {kind} key",
            public.kind()
        ))
        .into());
    }
    let algorithm = agreement_algorithm(kind)?;
    let (private_key, public_key) = match kind {
        KeyType::X25519 => (private.okp_private()?.to_vec(), public.okp_public()?.to_vec()),
        _ => (private.ec_private_scalar()?, public.ec_point()?),
    };

    let private_key = agreement::PrivateKey::from_private_key(algorithm, &private_key)
        .context("load agreement private key")?;
    let public_key = agreement::UnparsedPublicKey::new(algorithm, public_key);
    agreement::agree(
        &private_key,
        &public_key,
        JoseError::verification("Key agreement failed"),
        |z| Ok(z.to_vec()),
    )
    .map_err(Into::into)
}

/// Key encryption key of an AES algorithm, sized as the algorithm requires.
fn kek(alg: JWA, key: &[u8]) -> Result<&[u8], OpaqueError> {
    if key.len() * 8 != alg.size() {
        return Err(JoseError::argument(format!("Invalid key size for {alg}")).into());
    }
    Ok(key)
}

fn aes_kek(alg: JWA, key: &[u8]) -> Result<key_wrap::AesKek, OpaqueError> {
    let cipher = match kek(alg, key)?.len() {
        16 => &key_wrap::AES_128,
        32 => &key_wrap::AES_256,
        _ => {
            return Err(JoseError::unsupported(format!(
                "{alg} is not supported by the crypto provider"
            ))
            .into());
        }
    };
    key_wrap::AesKek::new(cipher, key).context("load AES key encryption key")
}

/// AES key wrap of [RFC 3394](https://datatracker.ietf.org/doc/html/rfc3394).
fn aes_wrap(alg: JWA, key: &[u8], cek: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let mut wrapped = vec![0; cek.len() + 8];
    let len = aes_kek(alg, key)?
        .wrap(cek, &mut wrapped)
        .context("AES key wrap")?
        .len();
    wrapped.truncate(len);
    Ok(wrapped)
}

fn aes_unwrap(alg: JWA, key: &[u8], wrapped: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let mut cek = vec![0; wrapped.len()];
    let len = aes_kek(alg, key)?
        .unwrap(wrapped, &mut cek)
        .ok()
        .ok_or_else(|| JoseError::verification("AES key unwrap failed"))?
        .len();
    cek.truncate(len);
    Ok(cek)
}

fn oaep_algorithm(alg: JWA) -> Result<&'static OaepAlgorithm, OpaqueError> {
    match alg {
        JWA::RsaOaep => Ok(&OAEP_SHA1_MGF1SHA1),
        JWA::RsaOaep256 => Ok(&OAEP_SHA256_MGF1SHA256),
        other => Err(JoseError::unsupported(format!(
            "{other} is not supported by the crypto provider"
        ))
        .into()),
    }
}

fn oaep_encrypt(alg: JWA, key: &JWK, cek: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let oaep = oaep_algorithm(alg)?;
    let public_key =
        PublicEncryptingKey::from_der(&key.public_key_der()?).context("load RSA public key")?;
    let public_key = OaepPublicEncryptingKey::new(public_key).context("create RSA-OAEP key")?;
    let mut encrypted = vec![0; public_key.ciphertext_size()];
    let len = public_key
        .encrypt(oaep, cek, &mut encrypted, None)
        .context("RSA-OAEP encrypt")?
        .len();
    encrypted.truncate(len);
    Ok(encrypted)
}

fn oaep_decrypt(alg: JWA, key: &JWK, encrypted: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let oaep = oaep_algorithm(alg)?;
    let private_key =
        PrivateDecryptingKey::from_pkcs8(&key.private_key_der()?).context("load RSA private key")?;
    let private_key = OaepPrivateDecryptingKey::new(private_key).context("create RSA-OAEP key")?;
    let mut cek = vec![0; private_key.min_output_size()];
    let len = private_key
        .decrypt(oaep, encrypted, &mut cek, None)
        .ok()
        .ok_or_else(|| JoseError::verification("RSA-OAEP decryption failed"))?
        .len();
    cek.truncate(len);
    Ok(cek)
}

/// PBKDF2 key of section 4.8 of rfc7518, salted with `alg || 0x00 || p2s`.
fn pbes2_key(alg: JWA, passphrase: &[u8], p2s: &[u8], p2c: u32) -> Result<Vec<u8>, OpaqueError> {
    let prf = match alg {
        JWA::Pbes2Hs256A128KW => pbkdf2::PBKDF2_HMAC_SHA256,
        JWA::Pbes2Hs384A192KW => pbkdf2::PBKDF2_HMAC_SHA384,
        JWA::Pbes2Hs512A256KW => pbkdf2::PBKDF2_HMAC_SHA512,
        other => return Err(JoseError::argument(format!("{other} is not PBES2")).into()),
    };
    let iterations = NonZeroU32::new(p2c).ok_or_else(|| JoseError::argument("p2c must be positive"))?;

    let mut salt = Vec::with_capacity(alg.name().len() + 1 + p2s.len());
    salt.extend_from_slice(alg.name().as_bytes());
    salt.push(0);
    salt.extend_from_slice(p2s);

    let mut key = vec![0; alg.size() / 8];
    pbkdf2::derive(prf, iterations, &salt, passphrase, &mut key);
    Ok(key)
}

/// Parse the per-recipient part of a JSON serialized JWE.
pub(crate) fn parse_recipient_json(
    json: &Map<String, Value>,
) -> Result<(Option<&Map<String, Value>>, Vec<u8>), OpaqueError> {
    let header = match json.get("header") {
        Some(Value::Object(header)) => Some(header),
        Some(_) => return Err(JoseError::argument("header must be an object").into()),
        None => None,
    };
    let encrypted_key = match json.get("encrypted_key") {
        Some(Value::String(encrypted_key)) => {
            b64url_decode(encrypted_key).context("decode encrypted key")?
        }
        Some(_) => return Err(JoseError::argument("encrypted_key must be a string").into()),
        None => Vec::new(),
    };
    Ok((header, encrypted_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jose::{JoseErrorKind, error_kind};

    fn round_trip(alg: JWA, key: &JWK, enc: JWEEncryption) -> (JWERecipient, Vec<u8>) {
        let mut builder = JWERecipientBuilder::new(alg, key.clone()).unwrap();
        builder.prepare(&JoseConfig::default(), enc, false);
        let cek = builder
            .direct_key(enc)
            .unwrap()
            .unwrap_or_else(|| random_bytes(enc.size() / 8).unwrap());
        let recipient = builder.build(enc, &cek).unwrap();
        assert_eq!(cek, recipient.decrypt_cek(enc, key).unwrap());
        (recipient, cek)
    }

    #[test]
    fn key_management_round_trip() {
        let enc = JWEEncryption::A128CbcHs256;
        for alg in [
            JWA::Dir,
            JWA::A128KW,
            JWA::A256KW,
            JWA::A128GCMKW,
            JWA::A192GCMKW,
            JWA::A256GCMKW,
            JWA::RsaOaep,
            JWA::RsaOaep256,
            JWA::EcdhEs,
            JWA::EcdhEsA128KW,
            JWA::EcdhEsA256KW,
            JWA::Pbes2Hs256A128KW,
            JWA::Pbes2Hs512A256KW,
        ] {
            let key = match alg {
                JWA::Dir => JWK::ephemeral_content_key(enc).unwrap(),
                _ => JWK::ephemeral(alg).unwrap(),
            };
            let (recipient, _) = round_trip(alg, &key, enc);
            let direct = matches!(alg, JWA::Dir | JWA::EcdhEs);
            assert_eq!(direct, recipient.encrypted_key().is_empty(), "{alg}");
        }
    }

    #[test]
    fn ecdh_es_with_x25519_and_p521() {
        for kind in [KeyType::X25519, KeyType::EcP521] {
            let key = JWK::generate(kind).unwrap();
            let (recipient, cek) = round_trip(JWA::EcdhEs, &key, JWEEncryption::A256GCM);
            assert_eq!(32, cek.len());
            let Some(ParamValue::Key(epk)) = recipient.header().param("epk").unwrap() else {
                panic!("epk expected");
            };
            assert_eq!(kind, epk.kind());
            assert!(!epk.is_private());
        }
    }

    #[test]
    fn header_parameters_are_populated() {
        let key = JWK::ephemeral(JWA::Pbes2Hs256A128KW).unwrap();
        let (recipient, _) = round_trip(JWA::Pbes2Hs256A128KW, &key, JWEEncryption::A128GCM);
        assert_eq!(16, recipient.header().binary("p2s").unwrap().unwrap().len());
        assert_eq!(
            Some(ParamValue::Count(2048)),
            recipient.header().param("p2c").unwrap()
        );

        let key = JWK::ephemeral(JWA::A256GCMKW).unwrap();
        let (recipient, _) = round_trip(JWA::A256GCMKW, &key, JWEEncryption::A128GCM);
        assert_eq!(12, recipient.header().binary("iv").unwrap().unwrap().len());
        assert_eq!(16, recipient.header().binary("tag").unwrap().unwrap().len());
        assert_eq!(
            Some(JWEEncryption::A128GCM),
            recipient.header().enc().unwrap()
        );
    }

    #[test]
    fn wrong_key_is_rejected() {
        let enc = JWEEncryption::A128GCM;
        let key = JWK::ephemeral(JWA::A128KW).unwrap();
        let (recipient, _) = round_trip(JWA::A128KW, &key, enc);
        let other = JWK::ephemeral(JWA::A128KW).unwrap();
        let err = recipient.decrypt_cek(enc, &other).unwrap_err();
        assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));

        let key = JWK::ephemeral(JWA::RsaOaep).unwrap();
        let (recipient, _) = round_trip(JWA::RsaOaep, &key, enc);
        let other = JWK::ephemeral(JWA::RsaOaep).unwrap();
        recipient.decrypt_cek(enc, &other).unwrap_err();
    }

    #[test]
    fn key_must_match_well_known_key() {
        let enc = JWEEncryption::A128GCM;
        let key = JWK::ephemeral(JWA::RsaOaep256).unwrap();
        let mut builder = JWERecipientBuilder::new(JWA::RsaOaep256, key.well_known()).unwrap();
        builder.header_mut().set_key(key.well_known());
        builder.prepare(&JoseConfig::default(), enc, false);
        let recipient = builder.build(enc, &random_bytes(16).unwrap()).unwrap();

        let other = JWK::ephemeral(JWA::RsaOaep256).unwrap();
        let err = recipient.decrypt_cek(enc, &other).unwrap_err();
        assert_eq!("Key is not valid for recipient", err.to_string());
        assert_eq!(16, recipient.decrypt_cek(enc, &key).unwrap().len());
    }

    #[test]
    fn direct_key_size_must_match() {
        let key = JWK::ephemeral_content_key(JWEEncryption::A128GCM).unwrap();
        let mut builder = JWERecipientBuilder::new(JWA::Dir, key).unwrap();
        let err = builder.direct_key(JWEEncryption::A256GCM).unwrap_err();
        assert_eq!("Invalid key size for A256GCM 16", err.to_string());
    }

    #[test]
    fn direct_encrypted_key_must_be_empty() {
        let enc = JWEEncryption::A128GCM;
        let key = JWK::ephemeral_content_key(enc).unwrap();
        let (recipient, _) = round_trip(JWA::Dir, &key, enc);
        let tampered = JWERecipient::new(recipient.header().clone(), vec![1, 2, 3]);
        let err = tampered.decrypt_cek(enc, &key).unwrap_err();
        assert_eq!("encrypted key must be empty for dir", err.to_string());
    }

    #[test]
    fn unusable_algorithms() {
        let key = JWK::ephemeral(JWA::ES256).unwrap();
        let err = JWERecipientBuilder::new(JWA::ES256, key.clone()).unwrap_err();
        assert_eq!("Not an encryption algorithm ES256", err.to_string());

        let err = JWERecipientBuilder::new(JWA::A128KW, key).unwrap_err();
        assert_eq!("Illegal type EC P-256 for algorithm A128KW", err.to_string());

        let enc = JWEEncryption::A128GCM;
        for alg in [JWA::A192KW, JWA::RSA1_5] {
            let mut builder = JWERecipientBuilder::new(alg, JWK::ephemeral(alg).unwrap()).unwrap();
            builder.prepare(&JoseConfig::default(), enc, false);
            let err = builder.build(enc, &[0; 16]).unwrap_err();
            assert_eq!(Some(JoseErrorKind::Unsupported), error_kind(&err), "{alg}");
        }
    }

    #[test]
    fn pbes2_derivation_depends_on_salt_and_count() {
        let alg = JWA::Pbes2Hs256A128KW;
        let a = pbes2_key(alg, b"Thus from my lips", &[1; 16], 2048).unwrap();
        assert_eq!(16, a.len());
        assert_ne!(a, pbes2_key(alg, b"Thus from my lips", &[2; 16], 2048).unwrap());
        assert_ne!(a, pbes2_key(alg, b"Thus from my lips", &[1; 16], 2049).unwrap());
        pbes2_key(alg, b"", &[], 0).unwrap_err();
    }

    #[test]
    fn recipient_json() {
        let json = serde_json::json!({"header": {"alg": "A128KW"}, "encrypted_key": "AQID"});
        let (header, encrypted_key) = parse_recipient_json(json.as_object().unwrap()).unwrap();
        assert_eq!(Some("A128KW"), header.unwrap()["alg"].as_str());
        assert_eq!(vec![1, 2, 3], encrypted_key);

        let json = serde_json::json!({"header": "A128KW"});
        parse_recipient_json(json.as_object().unwrap()).unwrap_err();
    }
}
