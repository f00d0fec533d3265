//! Conversion between the two ECDSA signature formats.
//!
//! JWS carries ECDSA signatures as the fixed width concatenation `R || S`
//! ([`rfc7518, section 3.4`]), while the crypto provider produces and expects
//! the ASN.1 DER encoding `SEQUENCE { INTEGER r, INTEGER s }`.
//!
//! [`rfc7518, section 3.4`]: https://datatracker.ietf.org/doc/html/rfc7518#section-3.4

use jwx_error::OpaqueError;

use crate::jose::{
    JWA, JWKEllipticCurves, JoseError,
    constants::{
        DER_LENGTH_ONE_OCTET, DER_LENGTH_SHORT_FORM_MAX, DER_TAG_INTEGER, DER_TAG_SEQUENCE,
        INTEGER_SIGN_BIT_MASK,
    },
    jwk_utils::{encode_integer, encode_tlv},
};

fn invalid(message: &str) -> OpaqueError {
    JoseError::argument(format!("Invalid DER signature: {message}")).into()
}

fn component_len(alg: JWA) -> Result<usize, OpaqueError> {
    Ok(JWKEllipticCurves::try_from(alg)?.component_len())
}

/// Convert a JWA `R || S` signature of `alg` into its DER encoding.
pub fn jwa_to_der(alg: JWA, signature: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let len = component_len(alg)?;
    if signature.len() != 2 * len {
        return Err(JoseError::argument(format!(
            "{alg} signature must be {} bytes, got {}",
            2 * len,
            signature.len()
        ))
        .into());
    }

    let (r, s) = signature.split_at(len);
    if r.iter().all(|b| *b == 0) || s.iter().all(|b| *b == 0) {
        return Err(JoseError::argument(format!("{alg} signature must not be zero")).into());
    }

    let mut content = encode_integer(r);
    content.extend_from_slice(&encode_integer(s));
    Ok(encode_tlv(DER_TAG_SEQUENCE, &content))
}

/// Convert a DER encoded signature of `alg` into the JWA `R || S` form.
///
/// Only the canonical encoding is accepted.
pub fn der_to_jwa(alg: JWA, der: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let len = component_len(alg)?;

    let content = match der {
        [DER_TAG_SEQUENCE, short, rest @ ..] if *short as usize <= DER_LENGTH_SHORT_FORM_MAX => {
            (*short as usize, rest)
        }
        [DER_TAG_SEQUENCE, DER_LENGTH_ONE_OCTET, long, rest @ ..]
            if *long as usize > DER_LENGTH_SHORT_FORM_MAX =>
        {
            (*long as usize, rest)
        }
        [DER_TAG_SEQUENCE, ..] => return Err(invalid("unsupported sequence length")),
        _ => return Err(invalid("expected sequence")),
    };
    let (declared, mut content) = content;
    if declared != content.len() {
        return Err(invalid("sequence length does not match"));
    }

    let mut jwa = vec![0u8; 2 * len];
    for component in jwa.chunks_exact_mut(len) {
        let value = match content {
            [DER_TAG_INTEGER, ilen, rest @ ..] => {
                let ilen = *ilen as usize;
                if ilen == 0 || ilen > len + 1 || ilen > rest.len() {
                    return Err(invalid("integer length out of range"));
                }
                let (value, rest) = rest.split_at(ilen);
                content = rest;
                value
            }
            _ => return Err(invalid("expected integer")),
        };

        let value = match value {
            [first, ..] if first & INTEGER_SIGN_BIT_MASK != 0 => {
                return Err(invalid("negative integer"));
            }
            [0, next, ..] if next & INTEGER_SIGN_BIT_MASK == 0 => {
                return Err(invalid("non minimal integer"));
            }
            [0, rest @ ..] if !rest.is_empty() => rest,
            _ => value,
        };
        if value.len() > len {
            return Err(invalid("integer too large"));
        }
        component[len - value.len()..].copy_from_slice(value);
    }

    if !content.is_empty() {
        return Err(invalid("trailing bytes"));
    }
    Ok(jwa)
}
