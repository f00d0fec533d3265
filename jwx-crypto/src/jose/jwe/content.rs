//! Content encryption of a JWE, see section 5 of [`rfc7518`].
//!
//! AES-GCM is delegated to the AEAD of the crypto provider. The composite
//! AES-CBC-HMAC-SHA2 construction is assembled here from AES-CBC and HMAC,
//! the way section 5.2 describes it: the first half of the key authenticates,
//! the second half encrypts, and the tag is checked before anything is decrypted.
//!
//! [`rfc7518`]: https://datatracker.ietf.org/doc/html/rfc7518#section-5

use std::io::{Read as _, Write as _};

use aws_lc_rs::{
    aead::{AES_128_GCM, AES_192_GCM, AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey},
    cipher::{
        AES_128, AES_192, AES_256, DecryptionContext, EncryptionContext,
        PaddedBlockDecryptingKey, PaddedBlockEncryptingKey, UnboundCipherKey,
    },
    constant_time, hmac,
};
use flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder};
use jwx_error::{ErrorContext as _, OpaqueError};

use crate::jose::{
    JWEEncryption, JoseError,
    constants::{CBC_IV_LEN, GCM_IV_LEN, GCM_TAG_LEN},
    encoding::big_endian,
    jwk_builder::random_bytes,
};

/// Output of a content encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sealed {
    pub(crate) iv: Vec<u8>,
    pub(crate) ciphertext: Vec<u8>,
    pub(crate) tag: Vec<u8>,
}

fn invalid_tag() -> OpaqueError {
    JoseError::verification("Invalid authentication tag").into()
}

fn check_key_len(enc: JWEEncryption, cek: &[u8]) -> Result<(), OpaqueError> {
    if cek.len() * 8 != enc.size() {
        return Err(JoseError::argument(format!("Invalid key size for {enc}")).into());
    }
    Ok(())
}

/// Encrypt `plaintext` with a fresh random IV.
pub(crate) fn encrypt(
    enc: JWEEncryption,
    cek: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Sealed, OpaqueError> {
    check_key_len(enc, cek)?;
    if enc.is_cbc_hmac() {
        let iv = random_bytes(CBC_IV_LEN)?;
        let (ciphertext, tag) = cbc_hmac_encrypt(enc, cek, &iv, aad, plaintext)?;
        Ok(Sealed {
            iv,
            ciphertext,
            tag,
        })
    } else {
        let iv = random_bytes(GCM_IV_LEN)?;
        let (ciphertext, tag) = gcm_seal(cek, &iv, aad, plaintext)?;
        Ok(Sealed {
            iv,
            ciphertext,
            tag,
        })
    }
}

/// Authenticate and decrypt, every authentication failure is a verification error.
pub(crate) fn decrypt(
    enc: JWEEncryption,
    cek: &[u8],
    aad: &[u8],
    sealed: &Sealed,
) -> Result<Vec<u8>, OpaqueError> {
    check_key_len(enc, cek)?;
    if enc.is_cbc_hmac() {
        cbc_hmac_decrypt(enc, cek, aad, sealed)
    } else {
        if sealed.iv.len() != GCM_IV_LEN {
            return Err(JoseError::argument("iv must be 96 bits").into());
        }
        gcm_open(cek, &sealed.iv, aad, &sealed.ciphertext, &sealed.tag)
    }
}

fn cbc_hmac_parts(
    enc: JWEEncryption,
) -> Result<(hmac::Algorithm, &'static aws_lc_rs::cipher::Algorithm), OpaqueError> {
    match enc {
        JWEEncryption::A128CbcHs256 => Ok((hmac::HMAC_SHA256, &AES_128)),
        JWEEncryption::A192CbcHs384 => Ok((hmac::HMAC_SHA384, &AES_192)),
        JWEEncryption::A256CbcHs512 => Ok((hmac::HMAC_SHA512, &AES_256)),
        other => Err(JoseError::argument(format!("{other} is not AES-CBC-HMAC")).into()),
    }
}

/// `MAC(AAD || IV || ciphertext || AL)` truncated to half the key length.
fn cbc_hmac_tag(
    mac: hmac::Algorithm,
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Vec<u8> {
    let key = hmac::Key::new(mac, mac_key);
    let mut context = hmac::Context::with_key(&key);
    context.update(aad);
    context.update(iv);
    context.update(ciphertext);
    context.update(&big_endian(aad.len() as u64 * 8));
    let mut tag = context.sign().as_ref().to_vec();
    tag.truncate(mac_key.len());
    tag
}

fn cbc_iv(iv: &[u8]) -> Result<[u8; CBC_IV_LEN], OpaqueError> {
    iv.try_into()
        .ok()
        .ok_or_else(|| JoseError::argument("iv must be 128 bits").into())
}

fn cbc_hmac_encrypt(
    enc: JWEEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), OpaqueError> {
    let (mac, cipher) = cbc_hmac_parts(enc)?;
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    let key = UnboundCipherKey::new(cipher, enc_key).context("load AES-CBC key")?;
    let key = PaddedBlockEncryptingKey::cbc_pkcs7(key).context("create AES-CBC cipher")?;
    let mut ciphertext = plaintext.to_vec();
    key.less_safe_encrypt(&mut ciphertext, EncryptionContext::Iv128(cbc_iv(iv)?.into()))
        .context("AES-CBC encrypt")?;

    let tag = cbc_hmac_tag(mac, mac_key, aad, iv, &ciphertext);
    Ok((ciphertext, tag))
}

fn cbc_hmac_decrypt(
    enc: JWEEncryption,
    cek: &[u8],
    aad: &[u8],
    sealed: &Sealed,
) -> Result<Vec<u8>, OpaqueError> {
    let (mac, cipher) = cbc_hmac_parts(enc)?;
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);

    let expected = cbc_hmac_tag(mac, mac_key, aad, &sealed.iv, &sealed.ciphertext);
    constant_time::verify_slices_are_equal(&expected, &sealed.tag)
        .ok()
        .ok_or_else(invalid_tag)?;

    let key = UnboundCipherKey::new(cipher, enc_key).context("load AES-CBC key")?;
    let key = PaddedBlockDecryptingKey::cbc_pkcs7(key).context("create AES-CBC cipher")?;
    let mut plaintext = sealed.ciphertext.clone();
    let len = key
        .decrypt(
            &mut plaintext,
            DecryptionContext::Iv128(cbc_iv(&sealed.iv)?.into()),
        )
        .ok()
        .ok_or_else(|| JoseError::verification("AES-CBC decryption failed"))?
        .len();
    plaintext.truncate(len);
    Ok(plaintext)
}

fn gcm_key(key: &[u8]) -> Result<LessSafeKey, OpaqueError> {
    let algorithm = match key.len() {
        16 => &AES_128_GCM,
        24 => &AES_192_GCM,
        32 => &AES_256_GCM,
        other => {
            return Err(JoseError::argument(format!("Invalid AES-GCM key size {other}")).into());
        }
    };
    Ok(LessSafeKey::new(
        UnboundKey::new(algorithm, key).context("load AES-GCM key")?,
    ))
}

fn gcm_nonce(iv: &[u8]) -> Result<Nonce, OpaqueError> {
    Nonce::try_assume_unique_for_key(iv)
        .ok()
        .ok_or_else(|| JoseError::argument("iv must be 96 bits").into())
}

/// AES-GCM with a 96 bit IV, returns the ciphertext and the 128 bit tag.
pub(crate) fn gcm_seal(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), OpaqueError> {
    let key = gcm_key(key)?;
    let mut ciphertext = plaintext.to_vec();
    let tag = key
        .seal_in_place_separate_tag(gcm_nonce(iv)?, Aad::from(aad), &mut ciphertext)
        .context("AES-GCM encrypt")?;
    Ok((ciphertext, tag.as_ref().to_vec()))
}

pub(crate) fn gcm_open(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, OpaqueError> {
    if tag.len() != GCM_TAG_LEN {
        return Err(invalid_tag());
    }
    let key = gcm_key(key)?;
    let mut in_out = [ciphertext, tag].concat();
    let len = key
        .open_in_place(gcm_nonce(iv)?, Aad::from(aad), &mut in_out)
        .ok()
        .ok_or_else(invalid_tag)?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}

/// Raw DEFLATE ([RFC 1951](https://datatracker.ietf.org/doc/html/rfc1951)), no zlib wrapper.
pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).context("deflate content")?;
    encoder.finish().context("deflate content")
}

pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>, OpaqueError> {
    let mut inflated = Vec::new();
    DeflateDecoder::new(data)
        .read_to_end(&mut inflated)
        .map_err(|err| JoseError::argument(format!("Invalid compressed content: {err}")))?;
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_err;

    use super::*;
    use crate::jose::{JoseErrorKind, error_kind};

    fn hex(value: &str) -> Vec<u8> {
        (0..value.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&value[i..i + 2], 16).unwrap())
            .collect()
    }

    const B1_PLAINTEXT: &[u8] = b"A cipher system must not be required to be secret, and it \
        must be able to fall into the hands of the enemy without inconvenience";
    const B1_AAD: &[u8] = b"The second principle of Auguste Kerckhoffs";

    // RFC 7518, appendix B.1
    #[test]
    fn aes_128_cbc_hmac_sha_256_known_answer() {
        let cek: Vec<u8> = (0..32).collect();
        let iv = hex("1af38c2dc2b96ffdd86694092341bc04");
        let (ciphertext, tag) = cbc_hmac_encrypt(
            JWEEncryption::A128CbcHs256,
            &cek,
            &iv,
            B1_AAD,
            B1_PLAINTEXT,
        )
        .unwrap();

        assert_eq!(
            hex(concat!(
                "c80edfa32ddf39d5ef00c0b468834279a2e46a1b8049f792f76bfe54b903a9c9",
                "a94ac9b47ad2655c5f10f9aef71427e2fc6f9b3f399a221489f16362c7032336",
                "09d45ac69864e3321cf82935ac4096c86e133314c54019e8ca7980dfa4b9cf1b",
                "384c486f3a54c51078158ee5d79de59fbd34d848b3d69550a67646344427ade5",
                "4b8851ffb598f7f80074b9473c82e2db",
            )),
            ciphertext
        );
        assert_eq!(hex("652c3fa36b0a7c5b3219fab3a30bc1c4"), tag);

        let sealed = Sealed {
            iv,
            ciphertext,
            tag,
        };
        assert_eq!(
            B1_PLAINTEXT,
            decrypt(JWEEncryption::A128CbcHs256, &cek, B1_AAD, &sealed).unwrap()
        );
    }

    #[test]
    fn corrupted_cbc_hmac_is_an_authentication_failure() {
        let enc = JWEEncryption::A256CbcHs512;
        let cek = random_bytes(64).unwrap();
        let sealed = encrypt(enc, &cek, B1_AAD, B1_PLAINTEXT).unwrap();
        assert_eq!(32, sealed.tag.len());

        let corruptions: [fn(&mut Sealed); 3] = [
            |sealed| sealed.iv[3] ^= 1,
            |sealed| sealed.ciphertext[17] ^= 0x80,
            |sealed| sealed.tag[0] ^= 1,
        ];
        for corrupt in corruptions {
            let mut tampered = sealed.clone();
            corrupt(&mut tampered);
            let err = decrypt(enc, &cek, B1_AAD, &tampered).unwrap_err();
            assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));
            assert_eq!("Invalid authentication tag", err.to_string());
        }

        assert_err!(decrypt(enc, &cek, b"other aad", &sealed));
        assert_eq!(
            B1_PLAINTEXT,
            decrypt(enc, &cek, B1_AAD, &sealed).unwrap()
        );
    }

    #[test]
    fn gcm_round_trip_and_tampering() {
        for enc in [
            JWEEncryption::A128GCM,
            JWEEncryption::A192GCM,
            JWEEncryption::A256GCM,
        ] {
            let cek = random_bytes(enc.size() / 8).unwrap();
            let sealed = encrypt(enc, &cek, b"aad", b"hello").unwrap();
            assert_eq!(GCM_IV_LEN, sealed.iv.len());
            assert_eq!(GCM_TAG_LEN, sealed.tag.len());
            assert_eq!(b"hello".to_vec(), decrypt(enc, &cek, b"aad", &sealed).unwrap());

            let mut tampered = sealed.clone();
            tampered.ciphertext[0] ^= 1;
            let err = decrypt(enc, &cek, b"aad", &tampered).unwrap_err();
            assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));

            let mut short_iv = sealed.clone();
            short_iv.iv.pop();
            assert_eq!(
                "iv must be 96 bits",
                decrypt(enc, &cek, b"aad", &short_iv).unwrap_err().to_string()
            );
        }
    }

    #[test]
    fn key_size_must_match_encryption() {
        let err = encrypt(JWEEncryption::A128CbcHs256, &[0; 16], b"", b"x").unwrap_err();
        assert_eq!("Invalid key size for A128CBC-HS256", err.to_string());
    }

    #[test]
    fn deflate_is_raw() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let compressed = deflate(data).unwrap();
        assert!(compressed.len() < data.len());
        // zlib streams start with 0x78
        assert_ne!(Some(&0x78), compressed.first());
        assert_eq!(data.to_vec(), inflate(&compressed).unwrap());
    }
}
