//! JSON Web Encryption, see [`rfc7516`].
//!
//! A [`JWE`] is created with a [`JWEBuilder`], one [`JWERecipientBuilder`]
//! per recipient, or parsed from its compact or JSON serialization. All
//! recipients share the content encryption key and the encrypted content,
//! each recipient protects the key with its own key management algorithm.
//!
//! Decryption tries the recipients in order with the given key. When none of
//! them yields a key the content is still processed, with a random key, so a
//! wrong key and tampered content fail the same way (section 11.5 of [`rfc7516`]).
//!
//! [`rfc7516`]: https://datatracker.ietf.org/doc/html/rfc7516

use jwx_error::{ErrorContext as _, OpaqueError};
use serde_json::{Map, Value};
use tracing::debug;

use crate::jose::{
    JWEEncryption, JWK, JWKUse, Jose, JoseConfig, JoseError, b64url_decode, b64url_encode,
    adapter::ParamValue,
    encoding::{decode_json_segment, split_compact},
    header::{check_disjoint, merge_headers},
    jwk_builder::random_bytes,
};

mod builder;
#[doc(inline)]
pub use builder::JWEBuilder;

mod content;
use content::Sealed;

mod recipient;
#[doc(inline)]
pub use recipient::{JWERecipient, JWERecipientBuilder};

#[derive(Debug, Clone, PartialEq)]
/// An encrypted message with one or more [`JWERecipient`]s
///
/// A [`JWE`] is verified on construction: every recipient uses a key
/// management algorithm, all of them agree on `enc` and `zip`, and the
/// registered extensions accepted them. The content itself is only
/// authenticated by [`JWE::decrypt`].
pub struct JWE {
    enc: JWEEncryption,
    deflate: bool,
    protected: Option<Map<String, Value>>,
    protected_encoded: String,
    unprotected: Option<Map<String, Value>>,
    recipients: Vec<JWERecipient>,
    sealed: Sealed,
    aad: Option<Vec<u8>>,
}

/// Additional authenticated data of the content encryption:
/// `base64url(protected)`, followed by `"." base64url(aad)` when set.
fn aad_input(protected_encoded: &str, aad: Option<&[u8]>) -> Vec<u8> {
    let mut input = protected_encoded.as_bytes().to_vec();
    if let Some(aad) = aad {
        input.push(b'.');
        input.extend_from_slice(b64url_encode(aad).as_bytes());
    }
    input
}

fn object_member<'a>(
    json: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a Map<String, Value>>, OpaqueError> {
    match json.get(name) {
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(JoseError::argument(format!("{name} must be an object")).into()),
        None => Ok(None),
    }
}

fn binary_member(json: &Map<String, Value>, name: &str) -> Result<Option<Vec<u8>>, OpaqueError> {
    match json.get(name) {
        Some(Value::String(value)) => Ok(Some(
            b64url_decode(value).with_context(|| format!("decode {name}"))?,
        )),
        Some(_) => Err(JoseError::argument(format!("{name} must be a string")).into()),
        None => Ok(None),
    }
}

fn required_binary_member(json: &Map<String, Value>, name: &str) -> Result<Vec<u8>, OpaqueError> {
    binary_member(json, name)?
        .ok_or_else(|| JoseError::missing(format!("{name} is required")).into())
}

impl JWE {
    fn new(
        protected: Option<Map<String, Value>>,
        protected_encoded: String,
        unprotected: Option<Map<String, Value>>,
        recipients: Vec<JWERecipient>,
        sealed: Sealed,
        aad: Option<Vec<u8>>,
        config: &JoseConfig,
    ) -> Result<Self, OpaqueError> {
        let Some(first) = recipients.first() else {
            return Err(JoseError::missing("At least one recipient is required").into());
        };
        let enc = first
            .header()
            .enc()?
            .ok_or_else(|| JoseError::missing("Missing enc header parameter"))?;
        let deflate = first.header().deflate();

        for recipient in &recipients {
            let header = recipient.header();
            if header.enc()?.is_none() {
                return Err(JoseError::missing("Missing enc header parameter").into());
            }
            if header.alg().key_use() != JWKUse::Encryption {
                return Err(JoseError::argument(format!(
                    "Not an encryption algorithm {}",
                    header.alg()
                ))
                .into());
            }
            if let Some(ParamValue::Count(p2c)) = header.param("p2c")?
                && p2c > u64::from(config.max_pbes2_count())
            {
                return Err(JoseError::argument(format!(
                    "p2c must be at most {}, found {p2c}",
                    config.max_pbes2_count()
                ))
                .into());
            }
            if header.enc()? != Some(enc) || header.deflate() != deflate {
                return Err(JoseError::argument(
                    "enc and zip must be the same for all recipients",
                )
                .into());
            }
        }

        let jwe = Self {
            enc,
            deflate,
            protected,
            protected_encoded,
            unprotected,
            recipients,
            sealed,
            aad,
        };
        for recipient in &jwe.recipients {
            config.registry().verify_recipient(&jwe, recipient)?;
        }
        Ok(jwe)
    }

    /// Parse any JWE serialization with the default config.
    pub fn parse(jwe: &str) -> Result<Self, OpaqueError> {
        Self::parse_with_config(jwe, &JoseConfig::default())
    }

    pub fn parse_with_config(jwe: &str, config: &JoseConfig) -> Result<Self, OpaqueError> {
        let jwe = jwe.trim();
        if jwe.starts_with('{') {
            let json: Map<String, Value> = serde_json::from_str(jwe)
                .map_err(|err| JoseError::argument(format!("invalid JWE JSON: {err}")))?;
            Self::parse_json(&json, config)
        } else {
            Self::parse_compact(jwe, config)
        }
    }

    fn parse_compact(jwe: &str, config: &JoseConfig) -> Result<Self, OpaqueError> {
        let [protected_encoded, encrypted_key, iv, ciphertext, tag] = split_compact::<5>(jwe)?;
        let protected =
            decode_json_segment(protected_encoded).context("decode protected header")?;
        let header = Jose::from_json_with_config(&protected, config)?;
        let recipient = JWERecipient::new(
            header,
            b64url_decode(encrypted_key).context("decode encrypted key")?,
        );
        let sealed = Sealed {
            iv: b64url_decode(iv).context("decode iv")?,
            ciphertext: b64url_decode(ciphertext).context("decode ciphertext")?,
            tag: b64url_decode(tag).context("decode tag")?,
        };
        Self::new(
            Some(protected),
            protected_encoded.to_owned(),
            None,
            vec![recipient],
            sealed,
            None,
            config,
        )
    }

    fn parse_json(json: &Map<String, Value>, config: &JoseConfig) -> Result<Self, OpaqueError> {
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
        let unprotected = object_member(json, "unprotected")?;
        check_disjoint(protected.as_ref(), unprotected)?;

        let parsed = match json.get("recipients") {
            Some(_) if json.contains_key("header") || json.contains_key("encrypted_key") => {
                return Err(
                    JoseError::argument("Must not contain both header and recipients").into(),
                );
            }
            Some(Value::Array(recipients)) if !recipients.is_empty() => recipients
                .iter()
                .map(|entry| match entry {
                    Value::Object(entry) => recipient::parse_recipient_json(entry),
                    _ => Err(JoseError::argument("recipient must be an object").into()),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(JoseError::argument("recipients must be a non empty array").into());
            }
            None => vec![recipient::parse_recipient_json(json)?],
        };

        let mut recipients = Vec::with_capacity(parsed.len());
        for (header, encrypted_key) in parsed {
            check_disjoint(protected.as_ref(), header)?;
            check_disjoint(unprotected, header)?;
            let header = Jose::from_json_with_config(
                &merge_headers([protected.as_ref(), unprotected, header]),
                config,
            )?;
            recipients.push(JWERecipient::new(header, encrypted_key));
        }

        let ciphertext = match binary_member(json, "ciphertext")? {
            Some(ciphertext) => ciphertext,
            None => required_binary_member(json, "cipher_text")
                .context("ciphertext is required")?,
        };
        let sealed = Sealed {
            iv: required_binary_member(json, "iv")?,
            ciphertext,
            tag: required_binary_member(json, "tag")?,
        };

        Self::new(
            protected,
            protected_encoded,
            unprotected.cloned(),
            recipients,
            sealed,
            binary_member(json, "aad")?,
            config,
        )
    }

    /// Content encryption (`enc`).
    pub fn enc(&self) -> JWEEncryption {
        self.enc
    }

    /// Content is compressed before encryption (`zip` is `DEF`).
    pub fn deflate(&self) -> bool {
        self.deflate
    }

    /// Header parameters integrity protected by the content encryption.
    pub fn protected(&self) -> Option<&Map<String, Value>> {
        self.protected.as_ref()
    }

    /// Shared unprotected header parameters.
    pub fn unprotected(&self) -> Option<&Map<String, Value>> {
        self.unprotected.as_ref()
    }

    pub fn recipients(&self) -> &[JWERecipient] {
        &self.recipients
    }

    pub fn iv(&self) -> &[u8] {
        &self.sealed.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.sealed.ciphertext
    }

    pub fn tag(&self) -> &[u8] {
        &self.sealed.tag
    }

    /// Additional authenticated data, JSON serialization only.
    pub fn aad(&self) -> Option<&[u8]> {
        self.aad.as_deref()
    }

    /// Per-recipient header parameters of `recipient`: those neither
    /// protected nor shared.
    pub fn recipient_header(&self, recipient: &JWERecipient) -> Map<String, Value> {
        recipient.header().to_json_filtered(|name| {
            self.protected
                .as_ref()
                .is_none_or(|protected| !protected.contains_key(name))
                && self
                    .unprotected
                    .as_ref()
                    .is_none_or(|unprotected| !unprotected.contains_key(name))
        })
    }

    /// Decrypt the content with the private or secret `key` of one of the recipients.
    ///
    /// Fails with a verification error when the key belongs to no recipient,
    /// just like it does for tampered content.
    pub fn decrypt(&self, key: &JWK) -> Result<Vec<u8>, OpaqueError> {
        let cek = self
            .recipients
            .iter()
            .enumerate()
            .find_map(
                |(index, recipient)| match recipient.decrypt_cek(self.enc, key) {
                    Ok(cek) => {
                        debug!(index, kid = ?recipient.header().kid(), "CEK decryption successful");
                        Some(cek)
                    }
                    Err(err) => {
                        debug!(index, %err, "CEK decryption failed");
                        None
                    }
                },
            );

        let cek = match cek {
            Some(cek) => cek,
            // continue with a key that will not work
            None => random_bytes(self.enc.size() / 8)?,
        };

        let aad = aad_input(&self.protected_encoded, self.aad.as_deref());
        let content = content::decrypt(self.enc, &cek, &aad, &self.sealed)?;
        if self.deflate {
            content::inflate(&content)
        } else {
            Ok(content)
        }
    }

    /// Compact serialization `protected "." encrypted_key "." iv "." ciphertext "." tag`
    pub fn compact(&self) -> Result<String, OpaqueError> {
        let [recipient] = self.recipients.as_slice() else {
            return Err(JoseError::argument(
                "Must have exactly one recipient with no additional authentication data to use JWE compact serialization",
            )
            .into());
        };
        if self.aad.is_some() {
            return Err(JoseError::argument(
                "Must have exactly one recipient with no additional authentication data to use JWE compact serialization",
            )
            .into());
        }
        if self.unprotected.is_some() || !self.recipient_header(recipient).is_empty() {
            return Err(JoseError::argument(
                "Compact serialization does not support unprotected header parameters",
            )
            .into());
        }
        Ok(format!(
            "{}.{}.{}.{}.{}",
            self.protected_encoded,
            b64url_encode(recipient.encrypted_key()),
            b64url_encode(&self.sealed.iv),
            b64url_encode(&self.sealed.ciphertext),
            b64url_encode(&self.sealed.tag),
        ))
    }

    fn recipient_json(&self, recipient: &JWERecipient) -> Map<String, Value> {
        let mut json = Map::new();
        let header = self.recipient_header(recipient);
        if !header.is_empty() {
            json.insert("header".to_owned(), Value::Object(header));
        }
        if !recipient.encrypted_key().is_empty() {
            json.insert(
                "encrypted_key".to_owned(),
                Value::from(b64url_encode(recipient.encrypted_key())),
            );
        }
        json
    }

    /// JSON serialization, flattened when there is exactly one recipient.
    pub fn to_json(&self) -> String {
        let mut json = match self.recipients.as_slice() {
            [recipient] => self.recipient_json(recipient),
            recipients => {
                let mut json = Map::new();
                json.insert(
                    "recipients".to_owned(),
                    recipients
                        .iter()
                        .map(|recipient| Value::Object(self.recipient_json(recipient)))
                        .collect(),
                );
                json
            }
        };
        if !self.protected_encoded.is_empty() {
            json.insert(
                "protected".to_owned(),
                Value::from(self.protected_encoded.as_str()),
            );
        }
        if let Some(unprotected) = &self.unprotected {
            json.insert("unprotected".to_owned(), Value::Object(unprotected.clone()));
        }
        json.insert("iv".to_owned(), Value::from(b64url_encode(&self.sealed.iv)));
        json.insert(
            "ciphertext".to_owned(),
            Value::from(b64url_encode(&self.sealed.ciphertext)),
        );
        json.insert("tag".to_owned(), Value::from(b64url_encode(&self.sealed.tag)));
        if let Some(aad) = &self.aad {
            json.insert("aad".to_owned(), Value::from(b64url_encode(aad)));
        }
        Value::Object(json).to_string()
    }
}
