//! Typed encoding of the registered JOSE header parameters.
//!
//! Every parameter name of [`rfc7515`] and [`rfc7516`] is listed in [`PARAMS`],
//! together with the [`ParamAdapter`] that converts between its JSON value and
//! a typed [`ParamValue`]. Header parsing, header builders and the JWE engine
//! all go through this table.
//!
//! [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-4.1
//! [`rfc7516`]: https://datatracker.ietf.org/doc/html/rfc7516#section-4.1

use iri_string::types::UriStr;
use jwx_error::OpaqueError;
use rustls_pki_types::CertificateDer;
use serde_json::Value;

use crate::jose::{JWA, JWEEncryption, JWK, JoseError, b64url_decode, b64url_encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Encode / decode function of a header parameter
pub enum ParamAdapter {
    /// `alg`
    Algorithm,
    /// `enc`
    Encryption,
    /// `zip`, only `DEF` is understood
    Compression,
    /// plain string
    Text,
    /// absolute URI
    Uri,
    /// embedded [`JWK`]
    Key,
    /// standard base64 encoded DER certificates
    CertificateChain,
    /// base64url encoded bytes
    Binary,
    /// non empty list of parameter names
    Names,
    /// positive integer
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Decoded value of a header parameter.
pub enum ParamValue {
    Algorithm(JWA),
    Encryption(JWEEncryption),
    Deflate,
    Text(String),
    Uri(String),
    Key(Box<JWK>),
    CertificateChain(Vec<CertificateDer<'static>>),
    Binary(Vec<u8>),
    Names(Vec<String>),
    Count(u64),
}

fn expected(name: &str, what: &str) -> OpaqueError {
    JoseError::argument(format!("{name} must be {what}")).into()
}

/// Absolute URI (optionally with a fragment) as of section 3 of rfc3986.
pub(crate) fn is_uri(value: &str) -> bool {
    UriStr::new(value).is_ok()
}

impl ParamAdapter {
    /// Decode the JSON value of parameter `name`.
    pub fn decode(self, name: &str, value: &Value) -> Result<ParamValue, OpaqueError> {
        let text = || value.as_str().ok_or_else(|| expected(name, "a string"));
        Ok(match self {
            Self::Algorithm => {
                let text = text()?;
                ParamValue::Algorithm(JWA::from_name(text).ok_or_else(|| {
                    JoseError::unsupported(format!("Unsupported algorithm {text}"))
                })?)
            }
            Self::Encryption => {
                let text = text()?;
                ParamValue::Encryption(JWEEncryption::from_name(text).ok_or_else(|| {
                    JoseError::unsupported(format!("Unsupported content encryption {text}"))
                })?)
            }
            Self::Compression => match text()? {
                "DEF" => ParamValue::Deflate,
                other => {
                    return Err(
                        JoseError::unsupported(format!("Unsupported compression {other}")).into(),
                    );
                }
            },
            Self::Text => ParamValue::Text(text()?.to_owned()),
            Self::Uri => {
                let text = text()?;
                if !is_uri(text) {
                    return Err(expected(name, "an absolute URI"));
                }
                ParamValue::Uri(text.to_owned())
            }
            Self::Key => {
                let key: JWK = serde_json::from_value(value.clone())
                    .map_err(|err| JoseError::argument(format!("invalid {name}: {err}")))?;
                ParamValue::Key(Box::new(key))
            }
            Self::CertificateChain => {
                let chain = crate::jose::cert::x5c::deserialize(value)
                    .map_err(|err| JoseError::argument(format!("invalid {name}: {err}")))?;
                ParamValue::CertificateChain(chain.unwrap_or_default())
            }
            Self::Binary => ParamValue::Binary(b64url_decode(text()?)?),
            Self::Names => {
                let names = value
                    .as_array()
                    .filter(|names| !names.is_empty())
                    .ok_or_else(|| expected(name, "a non empty array"))?;
                ParamValue::Names(
                    names
                        .iter()
                        .map(|name| name.as_str().map(str::to_owned))
                        .collect::<Option<_>>()
                        .ok_or_else(|| expected(name, "an array of strings"))?,
                )
            }
            Self::Count => ParamValue::Count(
                value
                    .as_u64()
                    .filter(|count| *count > 0)
                    .ok_or_else(|| expected(name, "a positive integer"))?,
            ),
        })
    }

    /// Encode a value of parameter `name`, the value must match this adapter.
    pub fn encode(self, name: &str, value: &ParamValue) -> Result<Value, OpaqueError> {
        Ok(match (self, value) {
            (Self::Algorithm, ParamValue::Algorithm(alg)) => Value::from(alg.name()),
            (Self::Encryption, ParamValue::Encryption(enc)) => Value::from(enc.name()),
            (Self::Compression, ParamValue::Deflate) => Value::from("DEF"),
            (Self::Text, ParamValue::Text(text)) => Value::from(text.as_str()),
            (Self::Uri, ParamValue::Uri(uri)) => {
                if !is_uri(uri) {
                    return Err(expected(name, "an absolute URI"));
                }
                Value::from(uri.as_str())
            }
            (Self::Key, ParamValue::Key(key)) => serde_json::to_value(key.well_known())
                .map_err(|err| JoseError::argument(format!("invalid {name}: {err}")))?,
            (Self::CertificateChain, ParamValue::CertificateChain(chain)) => {
                crate::jose::cert::x5c::to_value(chain)
            }
            (Self::Binary, ParamValue::Binary(bytes)) => Value::from(b64url_encode(bytes)),
            (Self::Names, ParamValue::Names(names)) if !names.is_empty() => {
                Value::from(names.clone())
            }
            (Self::Count, ParamValue::Count(count)) if *count > 0 => Value::from(*count),
            _ => return Err(JoseError::argument(format!("Invalid value for {name}")).into()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Header kinds a parameter may appear in
pub enum ParamUsage {
    /// JWS and JWE headers
    SignAndEncrypt,
    /// JWE headers only
    Encrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A registered header parameter
pub struct Param {
    pub name: &'static str,
    pub usage: ParamUsage,
    /// Required wherever the algorithm makes use of it.
    pub required: bool,
    pub adapter: ParamAdapter,
}

const fn param(
    name: &'static str,
    usage: ParamUsage,
    required: bool,
    adapter: ParamAdapter,
) -> Param {
    Param {
        name,
        usage,
        required,
        adapter,
    }
}

/// Every registered header parameter.
pub const PARAMS: &[Param] = &[
    param("alg", ParamUsage::SignAndEncrypt, true, ParamAdapter::Algorithm),
    param("kid", ParamUsage::SignAndEncrypt, false, ParamAdapter::Text),
    param("jku", ParamUsage::SignAndEncrypt, false, ParamAdapter::Uri),
    param("jwk", ParamUsage::SignAndEncrypt, false, ParamAdapter::Key),
    param("x5u", ParamUsage::SignAndEncrypt, false, ParamAdapter::Uri),
    param("x5c", ParamUsage::SignAndEncrypt, false, ParamAdapter::CertificateChain),
    param("x5t", ParamUsage::SignAndEncrypt, false, ParamAdapter::Binary),
    param("x5t#S256", ParamUsage::SignAndEncrypt, false, ParamAdapter::Binary),
    param("typ", ParamUsage::SignAndEncrypt, false, ParamAdapter::Text),
    param("cty", ParamUsage::SignAndEncrypt, false, ParamAdapter::Text),
    param("crit", ParamUsage::SignAndEncrypt, false, ParamAdapter::Names),
    param("enc", ParamUsage::Encrypt, true, ParamAdapter::Encryption),
    param("zip", ParamUsage::Encrypt, false, ParamAdapter::Compression),
    param("epk", ParamUsage::Encrypt, true, ParamAdapter::Key),
    param("apu", ParamUsage::Encrypt, false, ParamAdapter::Binary),
    param("apv", ParamUsage::Encrypt, false, ParamAdapter::Binary),
    param("iv", ParamUsage::Encrypt, true, ParamAdapter::Binary),
    param("tag", ParamUsage::Encrypt, true, ParamAdapter::Binary),
    param("p2s", ParamUsage::Encrypt, true, ParamAdapter::Binary),
    param("p2c", ParamUsage::Encrypt, true, ParamAdapter::Count),
];

/// Look up a registered parameter by name.
pub fn param_by_name(name: &str) -> Option<&'static Param> {
    PARAMS.iter().find(|param| param.name == name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, param) in PARAMS.iter().enumerate() {
            assert!(
                PARAMS[i + 1..].iter().all(|other| other.name != param.name),
                "duplicate {}",
                param.name
            );
        }
        assert_eq!(
            ParamUsage::Encrypt,
            param_by_name("p2c").unwrap().usage
        );
        assert!(param_by_name("nonce").is_none());
    }

    #[test]
    fn decode_typed_values() {
        assert_eq!(
            ParamValue::Algorithm(JWA::EcdhEsA128KW),
            ParamAdapter::Algorithm
                .decode("alg", &json!("ECDH-ES+A128KW"))
                .unwrap()
        );
        assert_eq!(
            ParamValue::Encryption(JWEEncryption::A128CbcHs256),
            ParamAdapter::Encryption
                .decode("enc", &json!("A128CBC-HS256"))
                .unwrap()
        );
        assert_eq!(
            ParamValue::Binary(vec![0xfb, 0xff]),
            ParamAdapter::Binary.decode("iv", &json!("-_8")).unwrap()
        );
        assert_eq!(
            ParamValue::Count(4096),
            ParamAdapter::Count.decode("p2c", &json!(4096)).unwrap()
        );
    }

    #[test]
    fn decode_rejects_invalid_values() {
        ParamAdapter::Compression
            .decode("zip", &json!("GZIP"))
            .unwrap_err();
        ParamAdapter::Count.decode("p2c", &json!(0)).unwrap_err();
        ParamAdapter::Names.decode("crit", &json!([])).unwrap_err();
        for uri in ["not a uri", "https://exa mple.com/keys", "/relative/keys"] {
            ParamAdapter::Uri.decode("jku", &json!(uri)).unwrap_err();
        }
        assert_eq!(
            ParamValue::Uri("urn:example:keys".to_owned()),
            ParamAdapter::Uri
                .decode("jku", &json!("urn:example:keys"))
                .unwrap()
        );
        let err = ParamAdapter::Text.decode("typ", &json!(1)).unwrap_err();
        assert_eq!("typ must be a string", err.to_string());
    }

    #[test]
    fn encode_matches_adapter() {
        assert_eq!(
            json!("DEF"),
            ParamAdapter::Compression
                .encode("zip", &ParamValue::Deflate)
                .unwrap()
        );
        assert_eq!(
            json!(["exp"]),
            ParamAdapter::Names
                .encode("crit", &ParamValue::Names(vec!["exp".to_owned()]))
                .unwrap()
        );
        ParamAdapter::Text
            .encode("typ", &ParamValue::Count(1))
            .unwrap_err();
    }
}
