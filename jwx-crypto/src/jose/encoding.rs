//! Encoding helpers shared by the JOSE types: base64url, compact serialization
//! segments, unsigned big-endian integers, the concat KDF and the little-endian
//! coordinate format of Edwards and Montgomery curve keys.

use std::{fmt, ops::Deref};

use aws_lc_rs::digest::{SHA256, SHA256_OUTPUT_LEN, digest};
use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jwx_error::{ErrorContext as _, OpaqueError};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::jose::{JoseError, KeyType};

/// Encode bytes as unpadded base64url.
pub fn b64url_encode(data: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(data)
}

/// Decode unpadded base64url.
pub fn b64url_decode(data: impl AsRef<[u8]>) -> Result<Vec<u8>, OpaqueError> {
    BASE64_URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|err| JoseError::argument(format!("invalid base64url: {err}")).into())
}

#[derive(Clone, Default, PartialEq, Eq, Hash)]
/// Binary value which serializes as an unpadded base64url string.
pub struct Base64Url(Vec<u8>);

impl Base64Url {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(data.into())
    }

    /// Decode a base64url string.
    pub fn decode(encoded: &str) -> Result<Self, OpaqueError> {
        b64url_decode(encoded).map(Self)
    }

    /// base64url representation of this value.
    pub fn encode(&self) -> String {
        b64url_encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Base64Url {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Base64Url {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64Url {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for Base64Url {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl fmt::Debug for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Base64Url").field(&self.encode()).finish()
    }
}

impl Serialize for Base64Url {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Base64Url {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::decode(&encoded).map_err(de::Error::custom)
    }
}

/// Split a compact serialization in exactly `N` dot separated segments.
///
/// Empty segments are kept as empty strings.
pub(crate) fn split_compact<const N: usize>(compact: &str) -> Result<[&str; N], OpaqueError> {
    let mut segments = [""; N];
    let mut parts = compact.split('.');
    for (i, segment) in segments.iter_mut().enumerate() {
        *segment = parts.next().ok_or_else(|| {
            JoseError::argument(format!(
                "Invalid compact format, expected {N} segments, found {i}"
            ))
        })?;
    }
    if parts.next().is_some() {
        return Err(JoseError::argument(format!(
            "Invalid compact format, found more than {N} segments"
        ))
        .into());
    }
    Ok(segments)
}

/// Decode a base64url compact segment holding a JSON object.
pub(crate) fn decode_json_segment(
    segment: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, OpaqueError> {
    let bytes = b64url_decode(segment)?;
    serde_json::from_slice(&bytes)
        .map_err(|err| JoseError::argument(format!("invalid JSON object: {err}")))
        .context("decode compact segment")
}

/// Strip the leading zero octets of an unsigned big-endian integer.
pub(crate) fn unsigned_minimal(value: &[u8]) -> &[u8] {
    let skip = value.iter().take_while(|b| **b == 0).count();
    &value[skip..]
}

/// Left pad an unsigned big-endian integer to exactly `width` octets.
pub(crate) fn unsigned_fixed_width(value: &[u8], width: usize) -> Result<Vec<u8>, OpaqueError> {
    let value = unsigned_minimal(value);
    if value.len() > width {
        return Err(JoseError::argument(format!(
            "integer does not fit in {width} bytes"
        ))
        .into());
    }
    let mut fixed = vec![0u8; width - value.len()];
    fixed.extend_from_slice(value);
    Ok(fixed)
}

/// Big-endian 64-bit encoding, used for the AAD length of the AES-CBC-HMAC construction.
pub(crate) fn big_endian(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Single step concat KDF with SHA-256, as defined in section 5.8.2.1 of NIST.SP.800-56Cr2
/// and profiled by section 4.6.2 of [RFC 7518](https://datatracker.ietf.org/doc/html/rfc7518#section-4.6.2).
///
/// `key_data_len` is expressed in bits.
pub(crate) fn concat_kdf(
    z: &[u8],
    algorithm_id: &[u8],
    party_u_info: &[u8],
    party_v_info: &[u8],
    key_data_len: usize,
) -> Vec<u8> {
    let key_len = key_data_len / 8;
    let rounds = key_len.div_ceil(SHA256_OUTPUT_LEN);

    let mut key = Vec::with_capacity(rounds * SHA256_OUTPUT_LEN);
    for round in 1..=rounds as u32 {
        let mut input = Vec::with_capacity(
            4 + z.len() + 12 + algorithm_id.len() + party_u_info.len() + party_v_info.len() + 4,
        );
        input.extend_from_slice(&round.to_be_bytes());
        input.extend_from_slice(z);
        for info in [algorithm_id, party_u_info, party_v_info] {
            input.extend_from_slice(&(info.len() as u32).to_be_bytes());
            input.extend_from_slice(info);
        }
        input.extend_from_slice(&(key_data_len as u32).to_be_bytes());
        key.extend_from_slice(digest(&SHA256, &input).as_ref());
    }
    key.truncate(key_len);
    key
}

/// 2^255 - 19
const X25519_P: [u8; 32] = {
    let mut p = [0xff; 32];
    p[0] = 0x7f;
    p[31] = 0xed;
    p
};

/// 2^448 - 2^224 - 1
const X448_P: [u8; 56] = {
    let mut p = [0xff; 56];
    p[27] = 0xfe;
    p
};

/// Width of the little-endian public key encoding of an OKP curve.
pub(crate) fn okp_width(curve: KeyType) -> Result<usize, OpaqueError> {
    match curve {
        KeyType::Ed25519 | KeyType::X25519 => Ok(32),
        KeyType::Ed448 | KeyType::X448 => Ok(57),
        other => Err(JoseError::argument(format!("{other} is not an OKP curve")).into()),
    }
}

/// Encode the public coordinate of an OKP key to its JWK `x` representation.
///
/// `coordinate` is the unsigned big-endian `u` (Montgomery) or `y` (Edwards) coordinate.
/// Montgomery coordinates are reduced modulo the curve prime, the result is written
/// little-endian in the fixed width of the curve, and for Edwards curves the parity
/// of `x` is stored in the top bit of the final octet.
pub fn okp_encode_coordinate(
    curve: KeyType,
    coordinate: &[u8],
    x_odd: bool,
) -> Result<Vec<u8>, OpaqueError> {
    let width = okp_width(curve)?;
    let value = match curve {
        KeyType::X25519 => reduce_mod(coordinate, &X25519_P),
        KeyType::X448 => reduce_mod(coordinate, &X448_P),
        _ => unsigned_minimal(coordinate).to_vec(),
    };

    let mut encoded = unsigned_fixed_width(&value, width)?;
    encoded.reverse();

    if matches!(curve, KeyType::Ed25519 | KeyType::Ed448) {
        let last = width - 1;
        if encoded[last] & 0x80 != 0 {
            return Err(JoseError::argument("Edwards coordinate overflows the sign bit").into());
        }
        if x_odd {
            encoded[last] |= 0x80;
        }
    }
    Ok(encoded)
}

/// Exact inverse of [`okp_encode_coordinate`]: returns the unsigned big-endian
/// coordinate (without leading zeros) and the parity of `x`.
pub fn okp_decode_coordinate(curve: KeyType, x: &[u8]) -> Result<(Vec<u8>, bool), OpaqueError> {
    let width = okp_width(curve)?;
    if x.len() != width {
        return Err(JoseError::argument(format!(
            "expected {width} bytes for {curve}, found {}",
            x.len()
        ))
        .into());
    }

    let mut value = x.to_vec();
    let mut x_odd = false;
    if matches!(curve, KeyType::Ed25519 | KeyType::Ed448) {
        x_odd = value[width - 1] & 0x80 != 0;
        value[width - 1] &= 0x7f;
    }
    value.reverse();
    Ok((unsigned_minimal(&value).to_vec(), x_odd))
}

/// `value mod modulus` for unsigned big-endian integers, by binary long division.
fn reduce_mod(value: &[u8], modulus: &[u8]) -> Vec<u8> {
    let mut remainder = vec![0u8; modulus.len() + 1];
    let mut modulus_ext = vec![0u8];
    modulus_ext.extend_from_slice(modulus);

    for byte in unsigned_minimal(value) {
        for bit in (0..8).rev() {
            // remainder = remainder * 2 + bit
            let mut carry = (byte >> bit) & 1;
            for limb in remainder.iter_mut().rev() {
                let next = *limb >> 7;
                *limb = (*limb << 1) | carry;
                carry = next;
            }
            if remainder.as_slice() >= modulus_ext.as_slice() {
                let mut borrow = 0i16;
                for (limb, m) in remainder.iter_mut().zip(modulus_ext.iter()).rev() {
                    let mut diff = *limb as i16 - *m as i16 - borrow;
                    borrow = 0;
                    if diff < 0 {
                        diff += 256;
                        borrow = 1;
                    }
                    *limb = diff as u8;
                }
            }
        }
    }
    unsigned_minimal(&remainder).to_vec()
}
