use jwx_error::OpaqueError;
use jwx_utils::macros::generate_set_and_with;
use serde_json::{Map, Value};
use tracing::trace;

use crate::jose::{
    JWA, JWEEncryption, JWK, JoseConfig, JoseError, b64url_encode,
    jwe::{JWE, JWERecipient, JWERecipientBuilder, aad_input, content},
    jwk_builder::random_bytes,
};

#[derive(Debug, Clone)]
/// Builder of a [`JWE`]
///
/// Content is compressed by default, disable with [`JWEBuilder::with_deflate`].
/// `enc`, and `zip` when compressing, are always integrity protected. More
/// parameters can be protected when all recipients share the same value.
pub struct JWEBuilder {
    config: JoseConfig,
    enc: JWEEncryption,
    deflate: bool,
    compact: bool,
    protect: Vec<String>,
    recipients: Vec<JWERecipientBuilder>,
    aad: Option<Vec<u8>>,
}

impl JWEBuilder {
    pub fn new(enc: JWEEncryption) -> Self {
        Self {
            config: JoseConfig::default(),
            enc,
            deflate: true,
            compact: false,
            protect: Vec::new(),
            recipients: Vec::new(),
            aad: None,
        }
    }

    generate_set_and_with! {
        pub fn config(mut self, config: JoseConfig) -> Self {
            self.config = config;
            self
        }
    }

    generate_set_and_with! {
        /// Compress the content with DEFLATE before encrypting it.
        pub fn deflate(mut self, deflate: bool) -> Self {
            self.deflate = deflate;
            self
        }
    }

    generate_set_and_with! {
        /// Protect every header parameter so the result has a compact serialization.
        ///
        /// Requires exactly one recipient and no additional authenticated data.
        pub fn compact(mut self) -> Self {
            self.compact = true;
            self
        }
    }

    generate_set_and_with! {
        /// Names of additional header parameters to integrity protect.
        pub fn protect(mut self, names: Vec<String>) -> Self {
            self.protect = names;
            self
        }
    }

    generate_set_and_with! {
        /// Additional authenticated data, JSON serialization only.
        pub fn aad(mut self, aad: Vec<u8>) -> Result<Self, OpaqueError> {
            if self.aad.is_some() {
                return Err(JoseError::argument("aad already set").into());
            }
            self.aad = Some(aad);
            Ok(self)
        }
    }

    generate_set_and_with! {
        pub fn recipient(mut self, recipient: JWERecipientBuilder) -> Self {
            self.recipients.push(recipient);
            self
        }
    }

    generate_set_and_with! {
        /// Add a recipient using `alg` with the public or secret `key`.
        pub fn recipient_key(mut self, alg: JWA, key: JWK) -> Result<Self, OpaqueError> {
            self.recipients.push(JWERecipientBuilder::new(alg, key)?);
            Ok(self)
        }
    }

    pub fn enc(&self) -> JWEEncryption {
        self.enc
    }

    pub fn recipients(&self) -> &[JWERecipientBuilder] {
        &self.recipients
    }

    fn check_layout(&self) -> Result<(), OpaqueError> {
        if self.recipients.is_empty() {
            return Err(JoseError::missing("At least one recipient is required").into());
        }
        if self.compact {
            if self.recipients.len() > 1 {
                return Err(JoseError::argument(
                    "cannot specify compact for more than one recipient",
                )
                .into());
            }
            if self.aad.is_some() {
                return Err(JoseError::argument(
                    "cannot specify compact with additional authenticated data",
                )
                .into());
            }
        }
        Ok(())
    }

    /// Content encryption key: from the one recipient agreeing on it directly, random otherwise.
    fn content_key(&mut self) -> Result<Vec<u8>, OpaqueError> {
        let mut cek = None;
        for recipient in &mut self.recipients {
            recipient.prepare(&self.config, self.enc, self.deflate);
            if let Some(direct) = recipient.direct_key(self.enc)? {
                if cek.is_some() {
                    return Err(JoseError::argument("cek already set").into());
                }
                cek = Some(direct);
            }
        }
        match cek {
            Some(cek) => Ok(cek),
            None => random_bytes(self.enc.size() / 8),
        }
    }

    /// Split the parameters shared by all recipients in protected and unprotected.
    fn split_headers(
        &self,
        recipients: &[JWERecipient],
    ) -> Result<(Map<String, Value>, Option<Map<String, Value>>), OpaqueError> {
        let mut shared = shared_header(recipients);
        let missing = |name: &str| {
            recipients
                .iter()
                .any(|recipient| recipient.header().value(name).is_none())
        };

        if self.compact {
            let absent: Vec<&str> = self
                .protect
                .iter()
                .map(String::as_str)
                .filter(|name| missing(name))
                .collect();
            if !absent.is_empty() {
                return Err(JoseError::argument(format!(
                    "protected parameters {absent:?} are required"
                ))
                .into());
            }
            return Ok((shared, None));
        }

        let mut names = vec!["enc"];
        if self.deflate {
            names.push("zip");
        }
        names.extend(self.protect.iter().map(String::as_str));

        let mut protected = Map::new();
        for name in names {
            if protected.contains_key(name) {
                continue;
            }
            let Some(value) = shared.remove(name) else {
                let message = if missing(name) {
                    format!("protected parameter {name} is required")
                } else {
                    format!("protected parameter {name} must be the same for all recipients")
                };
                return Err(JoseError::argument(message).into());
            };
            protected.insert(name.to_owned(), value);
        }
        Ok((protected, (!shared.is_empty()).then_some(shared)))
    }

    /// Encrypt `plaintext` for all recipients.
    pub fn encrypt(mut self, plaintext: &[u8]) -> Result<JWE, OpaqueError> {
        self.check_layout()?;

        let cek = self.content_key()?;
        let enc = self.enc;
        let recipients = std::mem::take(&mut self.recipients)
            .into_iter()
            .map(|recipient| recipient.build(enc, &cek))
            .collect::<Result<Vec<_>, _>>()?;

        let (protected, unprotected) = self.split_headers(&recipients)?;
        let protected_encoded = if protected.is_empty() {
            String::new()
        } else {
            let json = serde_json::to_vec(&protected).map_err(|err| {
                JoseError::argument(format!("serialize protected header: {err}"))
            })?;
            b64url_encode(json)
        };

        let content = if self.deflate {
            content::deflate(plaintext)?
        } else {
            plaintext.to_vec()
        };
        let sealed = content::encrypt(
            enc,
            &cek,
            &aad_input(&protected_encoded, self.aad.as_deref()),
            &content,
        )?;
        trace!(
            %enc,
            recipients = recipients.len(),
            deflate = self.deflate,
            "encrypted content"
        );

        JWE::new(
            (!protected.is_empty()).then_some(protected),
            protected_encoded,
            unprotected,
            recipients,
            sealed,
            self.aad,
            &self.config,
        )
    }
}

/// Header parameters present with the same value in every recipient header.
fn shared_header(recipients: &[JWERecipient]) -> Map<String, Value> {
    let mut headers = recipients.iter().map(|recipient| recipient.header().to_json());
    let Some(mut shared) = headers.next() else {
        return Map::new();
    };
    for header in headers {
        shared.retain(|name, value| header.get(name) == Some(value));
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jose::{JoseErrorKind, KeyType, error_kind};

    fn oct(len: usize) -> JWK {
        match len {
            16 => JWK::ephemeral(JWA::A128KW).unwrap(),
            _ => JWK::ephemeral(JWA::A256KW).unwrap(),
        }
    }

    #[test]
    fn compact_layout_is_checked_before_encryption() {
        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_compact()
            .encrypt(b"nobody")
            .unwrap_err();
        assert_eq!(Some(JoseErrorKind::Missing), error_kind(&err));

        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_compact()
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .try_with_recipient_key(JWA::A256KW, oct(32))
            .unwrap()
            .encrypt(b"two")
            .unwrap_err();
        assert_eq!(
            "cannot specify compact for more than one recipient",
            err.to_string()
        );

        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_compact()
            .try_with_aad(b"extra".to_vec())
            .unwrap()
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .encrypt(b"aad")
            .unwrap_err();
        assert_eq!(
            "cannot specify compact with additional authenticated data",
            err.to_string()
        );
    }

    #[test]
    fn aad_can_only_be_set_once() {
        let mut builder = JWEBuilder::new(JWEEncryption::A128GCM);
        builder.try_set_aad(b"one".to_vec()).unwrap();
        let err = builder.try_set_aad(b"two".to_vec()).unwrap_err();
        assert_eq!("aad already set", err.to_string());
    }

    #[test]
    fn enc_and_zip_are_protected_by_default() {
        let jwe = JWEBuilder::new(JWEEncryption::A256GCM)
            .try_with_recipient_key(JWA::A256KW, oct(32))
            .unwrap()
            .encrypt(b"protected")
            .unwrap();
        let protected = jwe.protected().unwrap();
        assert_eq!(Some(&Value::from("A256GCM")), protected.get("enc"));
        assert_eq!(Some(&Value::from("DEF")), protected.get("zip"));
        assert!(!protected.contains_key("alg"));
        assert_eq!(
            Some(&Value::from("A256KW")),
            jwe.unprotected().unwrap().get("alg")
        );
    }

    #[test]
    fn protect_requires_shared_parameters() {
        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_protect(vec!["alg".to_owned()])
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .try_with_recipient_key(JWA::A256KW, oct(32))
            .unwrap()
            .encrypt(b"differs")
            .unwrap_err();
        assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));

        let jwe = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_protect(vec!["alg".to_owned()])
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .encrypt(b"same")
            .unwrap();
        assert!(jwe.protected().unwrap().contains_key("alg"));
        assert_eq!(None, jwe.unprotected());
    }

    #[test]
    fn compact_requires_listed_parameters() {
        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .with_compact()
            .with_protect(vec!["typ".to_owned()])
            .try_with_recipient_key(JWA::A128KW, oct(16))
            .unwrap()
            .encrypt(b"typ")
            .unwrap_err();
        assert_eq!(
            "protected parameters [\"typ\"] are required",
            err.to_string()
        );
    }

    #[test]
    fn only_one_recipient_may_choose_the_content_key() {
        let err = JWEBuilder::new(JWEEncryption::A128GCM)
            .try_with_recipient_key(JWA::Dir, oct(16))
            .unwrap()
            .try_with_recipient_key(JWA::Dir, oct(16))
            .unwrap()
            .encrypt(b"cek")
            .unwrap_err();
        assert_eq!("cek already set", err.to_string());
    }

    #[test]
    fn direct_key_is_used_for_every_recipient() {
        let direct = JWK::ephemeral_content_key(JWEEncryption::A128CbcHs256).unwrap();
        let wrapping = oct(16);
        // wrapping recipient first, the content key does not depend on the order
        let jwe = JWEBuilder::new(JWEEncryption::A128CbcHs256)
            .try_with_recipient_key(JWA::A128KW, wrapping.clone())
            .unwrap()
            .try_with_recipient_key(JWA::Dir, direct.clone())
            .unwrap()
            .encrypt(b"shared cek")
            .unwrap();
        assert_eq!(b"shared cek".to_vec(), jwe.decrypt(&wrapping).unwrap());
        assert_eq!(b"shared cek".to_vec(), jwe.decrypt(&direct).unwrap());
    }

    #[test]
    fn ecdh_es_and_key_wrapping_recipients() {
        let ec = JWK::generate(KeyType::EcP256).unwrap();
        let okp = JWK::generate(KeyType::X25519).unwrap();
        let jwe = JWEBuilder::new(JWEEncryption::A192GCM)
            .with_deflate(false)
            .try_with_recipient_key(JWA::EcdhEs, ec.well_known())
            .unwrap()
            .try_with_recipient_key(JWA::EcdhEsA128KW, okp.well_known())
            .unwrap()
            .encrypt(b"agreed")
            .unwrap();
        assert!(!jwe.deflate());
        assert!(jwe.recipients()[0].encrypted_key().is_empty());
        assert_eq!(b"agreed".to_vec(), jwe.decrypt(&ec).unwrap());
        assert_eq!(b"agreed".to_vec(), jwe.decrypt(&okp).unwrap());
    }
}
