//! Minimal DER reading and writing for the key formats a [`JWK`](super::JWK)
//! converts from and to: SubjectPublicKeyInfo, PKCS#8 PrivateKeyInfo,
//! RSAPublicKey, RSAPrivateKey and ECPrivateKey.
//!
//! This is not a general ASN.1 toolkit, only the structures listed above are understood.

use jwx_error::OpaqueError;

use crate::jose::{
    JoseError, KeyType,
    constants::{
        BIT_STRING_NO_UNUSED_BITS, DER_LENGTH_SHORT_FORM_MAX, DER_TAG_BIT_STRING, DER_TAG_INTEGER,
        DER_TAG_OBJECT_IDENTIFIER, DER_TAG_OCTET_STRING, DER_TAG_SEQUENCE, INTEGER_SIGN_BIT_MASK,
        OID_EC_PUBLIC_KEY, OID_ED448, OID_ED25519, OID_P256, OID_P384, OID_P521,
        OID_RSA_ENCRYPTION, OID_X448, OID_X25519, RSA_ALGORITHM_IDENTIFIER,
    },
};

/// Context specific, constructed tag `[0]`
const DER_TAG_CONTEXT_0: u8 = 0xa0;
/// Context specific, constructed tag `[1]`
const DER_TAG_CONTEXT_1: u8 = 0xa1;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Unsigned big-endian RSA key components, as found in an RSAPrivateKey.
pub(crate) struct RsaComponents {
    pub(crate) n: Vec<u8>,
    pub(crate) e: Vec<u8>,
    pub(crate) d: Vec<u8>,
    pub(crate) p: Vec<u8>,
    pub(crate) q: Vec<u8>,
    pub(crate) dp: Vec<u8>,
    pub(crate) dq: Vec<u8>,
    pub(crate) qi: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedPublicKey {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { curve: KeyType, point: Vec<u8> },
    Okp { curve: KeyType, x: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedPrivateKey {
    Rsa(RsaComponents),
    Ec {
        curve: KeyType,
        d: Vec<u8>,
        point: Option<Vec<u8>>,
    },
    Okp {
        curve: KeyType,
        d: Vec<u8>,
    },
}

/// In section 4.1 of [RFC 5280](https://datatracker.ietf.org/doc/rfc5280/) the standard DER
/// encoded public key format is defined as
///```rust,ignore
/// SubjectPublicKeyInfo = SEQUENCE {
///     algorithm AlgorithmIdentifier,
///     subjectPublicKey BIT STRING
/// }
///```
/// For RSA the bit string contains a DER encoded RSA public key sequence in the format
///```rust,ignore
/// RSAPublicKey = SEQUENCE {
///     modulus INTEGER,
///     exponent INTEGER,
/// }
/// ```
/// defined in section 2.3.1 of [RFC 3279](https://datatracker.ietf.org/doc/rfc3279/)
pub(crate) fn create_subject_public_key_info(n_bytes: &[u8], e_bytes: &[u8]) -> Vec<u8> {
    let rsa_public_key = create_rsa_public_key(n_bytes, e_bytes);
    encode_sequence(&[&RSA_ALGORITHM_IDENTIFIER, &encode_bit_string(&rsa_public_key)])
}

/// Bare RSAPublicKey, the form expected by the RSA signature verification algorithms.
pub(crate) fn create_rsa_public_key(n_bytes: &[u8], e_bytes: &[u8]) -> Vec<u8> {
    encode_sequence(&[&encode_integer(n_bytes), &encode_integer(e_bytes)])
}

/// SubjectPublicKeyInfo of an elliptic curve key, see section 2 of
/// [RFC 5480](https://datatracker.ietf.org/doc/html/rfc5480).
pub(crate) fn create_ec_subject_public_key_info(curve: KeyType, point: &[u8]) -> Vec<u8> {
    encode_sequence(&[&ec_algorithm_identifier(curve), &encode_bit_string(point)])
}

/// SubjectPublicKeyInfo of an Edwards or Montgomery curve key, see section 4 of
/// [RFC 8410](https://datatracker.ietf.org/doc/html/rfc8410).
pub(crate) fn create_okp_subject_public_key_info(curve: KeyType, x: &[u8]) -> Vec<u8> {
    encode_sequence(&[&okp_algorithm_identifier(curve), &encode_bit_string(x)])
}

/// RSAPrivateKey as defined in appendix A.1.2 of [RFC 8017](https://datatracker.ietf.org/doc/rfc8017/)
pub(crate) fn create_rsa_private_key(rsa: &RsaComponents) -> Vec<u8> {
    encode_sequence(&[
        &encode_integer(&[0]),
        &encode_integer(&rsa.n),
        &encode_integer(&rsa.e),
        &encode_integer(&rsa.d),
        &encode_integer(&rsa.p),
        &encode_integer(&rsa.q),
        &encode_integer(&rsa.dp),
        &encode_integer(&rsa.dq),
        &encode_integer(&rsa.qi),
    ])
}

/// PKCS#8 PrivateKeyInfo wrapping an RSAPrivateKey, see section 5 of
/// [RFC 5208](https://datatracker.ietf.org/doc/html/rfc5208).
pub(crate) fn create_rsa_pkcs8(rsa: &RsaComponents) -> Vec<u8> {
    wrap_pkcs8(&RSA_ALGORITHM_IDENTIFIER, &create_rsa_private_key(rsa))
}

/// PKCS#8 PrivateKeyInfo wrapping an ECPrivateKey, see section 3 of
/// [RFC 5915](https://datatracker.ietf.org/doc/html/rfc5915).
pub(crate) fn create_ec_pkcs8(curve: KeyType, d: &[u8], point: &[u8]) -> Vec<u8> {
    let ec_private_key = encode_sequence(&[
        &encode_integer(&[1]),
        &encode_tlv(DER_TAG_OCTET_STRING, d),
        &encode_tlv(DER_TAG_CONTEXT_1, &encode_bit_string(point)),
    ]);
    wrap_pkcs8(&ec_algorithm_identifier(curve), &ec_private_key)
}

/// PKCS#8 PrivateKeyInfo of an Edwards or Montgomery curve key, see section 7 of
/// [RFC 8410](https://datatracker.ietf.org/doc/html/rfc8410).
pub(crate) fn create_okp_pkcs8(curve: KeyType, d: &[u8]) -> Vec<u8> {
    wrap_pkcs8(
        &okp_algorithm_identifier(curve),
        &encode_tlv(DER_TAG_OCTET_STRING, d),
    )
}

fn wrap_pkcs8(algorithm_identifier: &[u8], private_key: &[u8]) -> Vec<u8> {
    encode_sequence(&[
        &encode_integer(&[0]),
        algorithm_identifier,
        &encode_tlv(DER_TAG_OCTET_STRING, private_key),
    ])
}

fn ec_algorithm_identifier(curve: KeyType) -> Vec<u8> {
    let curve_oid = match curve {
        KeyType::EcP384 => OID_P384,
        KeyType::EcP521 => OID_P521,
        _ => OID_P256,
    };
    encode_sequence(&[
        &encode_tlv(DER_TAG_OBJECT_IDENTIFIER, OID_EC_PUBLIC_KEY),
        &encode_tlv(DER_TAG_OBJECT_IDENTIFIER, curve_oid),
    ])
}

fn okp_algorithm_identifier(curve: KeyType) -> Vec<u8> {
    let oid = match curve {
        KeyType::Ed448 => OID_ED448,
        KeyType::X25519 => OID_X25519,
        KeyType::X448 => OID_X448,
        _ => OID_ED25519,
    };
    encode_sequence(&[&encode_tlv(DER_TAG_OBJECT_IDENTIFIER, oid)])
}

/// Parse a DER encoded SubjectPublicKeyInfo.
pub(crate) fn parse_subject_public_key_info(der: &[u8]) -> Result<ParsedPublicKey, OpaqueError> {
    let mut outer = DerReader::new(der);
    let mut spki = DerReader::new(outer.read(DER_TAG_SEQUENCE)?);
    outer.finish()?;

    let mut algorithm = DerReader::new(spki.read(DER_TAG_SEQUENCE)?);
    let oid = algorithm.read(DER_TAG_OBJECT_IDENTIFIER)?;
    let key = read_bit_string(&mut spki)?;
    spki.finish()?;

    if oid == OID_RSA_ENCRYPTION {
        let mut rsa = DerReader::new(key);
        let mut rsa = DerReader::new(rsa.read(DER_TAG_SEQUENCE)?);
        let n = rsa.read_unsigned_integer()?.to_vec();
        let e = rsa.read_unsigned_integer()?.to_vec();
        rsa.finish()?;
        Ok(ParsedPublicKey::Rsa { n, e })
    } else if oid == OID_EC_PUBLIC_KEY {
        let curve = ec_curve(algorithm.read(DER_TAG_OBJECT_IDENTIFIER)?)?;
        Ok(ParsedPublicKey::Ec {
            curve,
            point: key.to_vec(),
        })
    } else {
        Ok(ParsedPublicKey::Okp {
            curve: okp_curve(oid)?,
            x: key.to_vec(),
        })
    }
}

/// Parse a DER encoded PKCS#8 PrivateKeyInfo.
pub(crate) fn parse_pkcs8(der: &[u8]) -> Result<ParsedPrivateKey, OpaqueError> {
    let mut outer = DerReader::new(der);
    let mut info = DerReader::new(outer.read(DER_TAG_SEQUENCE)?);
    outer.finish()?;

    let _version = info.read(DER_TAG_INTEGER)?;
    let mut algorithm = DerReader::new(info.read(DER_TAG_SEQUENCE)?);
    let oid = algorithm.read(DER_TAG_OBJECT_IDENTIFIER)?;
    let private_key = info.read(DER_TAG_OCTET_STRING)?;
    // optional attributes and public key (PKCS#8 v2) are ignored

    if oid == OID_RSA_ENCRYPTION {
        parse_rsa_private_key(private_key).map(ParsedPrivateKey::Rsa)
    } else if oid == OID_EC_PUBLIC_KEY {
        let curve = ec_curve(algorithm.read(DER_TAG_OBJECT_IDENTIFIER)?)?;
        let mut outer = DerReader::new(private_key);
        let mut ec = DerReader::new(outer.read(DER_TAG_SEQUENCE)?);
        let _version = ec.read(DER_TAG_INTEGER)?;
        let d = ec.read(DER_TAG_OCTET_STRING)?.to_vec();
        if ec.peek_tag() == Some(DER_TAG_CONTEXT_0) {
            let _parameters = ec.read(DER_TAG_CONTEXT_0)?;
        }
        let point = if ec.peek_tag() == Some(DER_TAG_CONTEXT_1) {
            let mut public_key = DerReader::new(ec.read(DER_TAG_CONTEXT_1)?);
            Some(read_bit_string(&mut public_key)?.to_vec())
        } else {
            None
        };
        Ok(ParsedPrivateKey::Ec { curve, d, point })
    } else {
        let curve = okp_curve(oid)?;
        let mut seed = DerReader::new(private_key);
        let d = seed.read(DER_TAG_OCTET_STRING)?.to_vec();
        seed.finish()?;
        Ok(ParsedPrivateKey::Okp { curve, d })
    }
}

/// Parse a DER encoded RSAPrivateKey, multi-prime keys are not supported.
pub(crate) fn parse_rsa_private_key(der: &[u8]) -> Result<RsaComponents, OpaqueError> {
    let mut outer = DerReader::new(der);
    let mut rsa = DerReader::new(outer.read(DER_TAG_SEQUENCE)?);
    outer.finish()?;

    let version = rsa.read_unsigned_integer()?;
    if !version.is_empty() && version != [0] {
        return Err(JoseError::unsupported("multi-prime RSA private key").into());
    }
    let components = RsaComponents {
        n: rsa.read_unsigned_integer()?.to_vec(),
        e: rsa.read_unsigned_integer()?.to_vec(),
        d: rsa.read_unsigned_integer()?.to_vec(),
        p: rsa.read_unsigned_integer()?.to_vec(),
        q: rsa.read_unsigned_integer()?.to_vec(),
        dp: rsa.read_unsigned_integer()?.to_vec(),
        dq: rsa.read_unsigned_integer()?.to_vec(),
        qi: rsa.read_unsigned_integer()?.to_vec(),
    };
    rsa.finish()?;
    Ok(components)
}

fn ec_curve(oid: &[u8]) -> Result<KeyType, OpaqueError> {
    if oid == OID_P256 {
        Ok(KeyType::EcP256)
    } else if oid == OID_P384 {
        Ok(KeyType::EcP384)
    } else if oid == OID_P521 {
        Ok(KeyType::EcP521)
    } else {
        Err(JoseError::unsupported("unsupported elliptic curve").into())
    }
}

fn okp_curve(oid: &[u8]) -> Result<KeyType, OpaqueError> {
    if oid == OID_ED25519 {
        Ok(KeyType::Ed25519)
    } else if oid == OID_ED448 {
        Ok(KeyType::Ed448)
    } else if oid == OID_X25519 {
        Ok(KeyType::X25519)
    } else if oid == OID_X448 {
        Ok(KeyType::X448)
    } else {
        Err(JoseError::unsupported("unsupported key algorithm").into())
    }
}

fn read_bit_string<'a>(reader: &mut DerReader<'a>) -> Result<&'a [u8], OpaqueError> {
    match reader.read(DER_TAG_BIT_STRING)?.split_first() {
        Some((&BIT_STRING_NO_UNUSED_BITS, bits)) => Ok(bits),
        _ => Err(JoseError::argument("invalid DER bit string").into()),
    }
}

/// Tag, length, value
pub(crate) fn encode_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = encode_der_length(content.len());
    let mut result = Vec::with_capacity(1 + len.len() + content.len());
    result.push(tag);
    result.extend_from_slice(&len);
    result.extend_from_slice(content);
    result
}

fn encode_sequence(parts: &[&[u8]]) -> Vec<u8> {
    encode_tlv(DER_TAG_SEQUENCE, &parts.concat())
}

/// Create the content bytes for the construction of a BIT STRING type
/// defined in section 8.6 of [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf).
fn encode_bit_string(bits: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(1 + bits.len());
    content.push(BIT_STRING_NO_UNUSED_BITS);
    content.extend_from_slice(bits);
    encode_tlv(DER_TAG_BIT_STRING, &content)
}

/// This function is an implementation of length encoding as defined in section 8.1.3
/// [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf) specification.
pub(crate) fn encode_der_length(len: usize) -> Vec<u8> {
    if len <= DER_LENGTH_SHORT_FORM_MAX {
        vec![len as u8]
    } else {
        let len_bytes = len.to_be_bytes();
        let skip = len_bytes.iter().take_while(|b| **b == 0).count();
        let mut result = Vec::with_capacity(1 + len_bytes.len() - skip);
        result.push(INTEGER_SIGN_BIT_MASK | (len_bytes.len() - skip) as u8);
        result.extend_from_slice(&len_bytes[skip..]);
        result
    }
}

/// This function is a minimal implementation of DER encoded integers as defined in the
/// [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf) specification.
///
/// The value is read as an unsigned big-endian integer, leading zeros are stripped
/// and a single zero is prepended when the sign bit would otherwise be set.
pub(crate) fn encode_integer(value: &[u8]) -> Vec<u8> {
    let skip = value.iter().take_while(|b| **b == 0).count();
    let value = match &value[skip..] {
        [] => &[0u8][..],
        minimal => minimal,
    };
    let needs_leading_zero = value[0] & INTEGER_SIGN_BIT_MASK != 0;
    let mut content = Vec::with_capacity(value.len() + needs_leading_zero as usize);
    if needs_leading_zero {
        content.push(0);
    }
    content.extend_from_slice(value);
    encode_tlv(DER_TAG_INTEGER, &content)
}

/// Sequential reader over DER encoded values.
pub(crate) struct DerReader<'a> {
    input: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub(crate) fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    pub(crate) fn peek_tag(&self) -> Option<u8> {
        self.input.first().copied()
    }

    /// Read the next value, which must carry the given tag, and return its content octets.
    pub(crate) fn read(&mut self, tag: u8) -> Result<&'a [u8], OpaqueError> {
        let (&found, rest) = self
            .input
            .split_first()
            .ok_or_else(|| JoseError::argument("unexpected end of DER input"))?;
        if found != tag {
            return Err(JoseError::argument(format!(
                "expected DER tag {tag:#04x}, found {found:#04x}"
            ))
            .into());
        }

        let (&first, mut rest) = rest
            .split_first()
            .ok_or_else(|| JoseError::argument("missing DER length"))?;
        let len = if first as usize <= DER_LENGTH_SHORT_FORM_MAX {
            first as usize
        } else {
            let octets = (first & !INTEGER_SIGN_BIT_MASK) as usize;
            if octets == 0 || octets > 4 || rest.len() < octets {
                return Err(JoseError::argument("invalid DER length").into());
            }
            let (len_bytes, after) = rest.split_at(octets);
            rest = after;
            len_bytes
                .iter()
                .fold(0usize, |len, b| (len << 8) | *b as usize)
        };

        if rest.len() < len {
            return Err(JoseError::argument("DER length exceeds input").into());
        }
        let (content, rest) = rest.split_at(len);
        self.input = rest;
        Ok(content)
    }

    /// Read an INTEGER as unsigned big-endian bytes, without sign padding.
    pub(crate) fn read_unsigned_integer(&mut self) -> Result<&'a [u8], OpaqueError> {
        let value = self.read(DER_TAG_INTEGER)?;
        match value {
            [0, rest @ ..] if !rest.is_empty() => Ok(rest),
            [first, ..] if first & INTEGER_SIGN_BIT_MASK != 0 => {
                Err(JoseError::argument("negative DER integer").into())
            }
            _ => Ok(value),
        }
    }

    /// Assert all input was consumed.
    pub(crate) fn finish(self) -> Result<(), OpaqueError> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(JoseError::argument("trailing bytes after DER value").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_lengths() {
        assert_eq!(vec![0x7f], encode_der_length(127));
        assert_eq!(vec![0x81, 0x80], encode_der_length(128));
        assert_eq!(vec![0x82, 0x01, 0x00], encode_der_length(256));
    }

    #[test]
    fn integers_are_sign_padded() {
        assert_eq!(vec![0x02, 0x01, 0x7f], encode_integer(&[0x7f]));
        assert_eq!(vec![0x02, 0x02, 0x00, 0x80], encode_integer(&[0x80]));
        assert_eq!(vec![0x02, 0x01, 0x01], encode_integer(&[0x00, 0x00, 0x01]));
        assert_eq!(vec![0x02, 0x01, 0x00], encode_integer(&[]));
    }

    #[test]
    fn rsa_spki_round_trips() {
        let n = vec![0xc3; 256];
        let e = vec![0x01, 0x00, 0x01];
        let spki = create_subject_public_key_info(&n, &e);
        assert_eq!(
            ParsedPublicKey::Rsa { n, e },
            parse_subject_public_key_info(&spki).unwrap()
        );
    }

    #[test]
    fn ec_spki_keeps_curve() {
        let mut point = vec![0x04];
        point.extend_from_slice(&[0x11; 96]);
        let spki = create_ec_subject_public_key_info(KeyType::EcP384, &point);
        assert_eq!(
            ParsedPublicKey::Ec {
                curve: KeyType::EcP384,
                point
            },
            parse_subject_public_key_info(&spki).unwrap()
        );
    }

    #[test]
    fn pkcs8_round_trips() {
        let rsa = RsaComponents {
            n: vec![0xa1; 64],
            e: vec![0x01, 0x00, 0x01],
            d: vec![0x22; 64],
            p: vec![0x93; 32],
            q: vec![0x44; 32],
            dp: vec![0x05; 32],
            dq: vec![0x86; 32],
            qi: vec![0x07; 32],
        };
        assert_eq!(
            ParsedPrivateKey::Rsa(rsa.clone()),
            parse_pkcs8(&create_rsa_pkcs8(&rsa)).unwrap()
        );

        let d = vec![0x42; 32];
        assert_eq!(
            ParsedPrivateKey::Okp {
                curve: KeyType::X25519,
                d: d.clone()
            },
            parse_pkcs8(&create_okp_pkcs8(KeyType::X25519, &d)).unwrap()
        );

        let mut point = vec![0x04];
        point.extend_from_slice(&[0x33; 64]);
        assert_eq!(
            ParsedPrivateKey::Ec {
                curve: KeyType::EcP256,
                d: d.clone(),
                point: Some(point.clone())
            },
            parse_pkcs8(&create_ec_pkcs8(KeyType::EcP256, &d, &point)).unwrap()
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut spki = create_okp_subject_public_key_info(KeyType::Ed25519, &[1; 32]);
        spki.push(0);
        parse_subject_public_key_info(&spki).unwrap_err();
    }
}
