pub(crate) use der_encoding_tags::*;
pub(crate) use object_identifiers::*;
pub(crate) use rsa_algorithm_identifier::RSA_ALGORITHM_IDENTIFIER;

mod der_encoding_tags {
    /// Identifier tag for a DER encoded integer.
    /// Defined in [ITU X.680](https://www.itu.int/ITU-T/studygroups/com17/languages/X.680-0207.pdf).
    pub(crate) const DER_TAG_INTEGER: u8 = 0x02;
    /// Identifier tag for a DER encoded bit string.
    /// Defined in [ITU X.680](https://www.itu.int/ITU-T/studygroups/com17/languages/X.680-0207.pdf).
    pub(crate) const DER_TAG_BIT_STRING: u8 = 0x03;
    /// Identifier tag for a DER encoded octet string.
    pub(crate) const DER_TAG_OCTET_STRING: u8 = 0x04;
    /// Identifier tag for a DER encoded object identifier.
    pub(crate) const DER_TAG_OBJECT_IDENTIFIER: u8 = 0x06;
    /// Identifier tag for a DER encoded sequence.
    /// Defined in [ITU X.680](https://www.itu.int/ITU-T/studygroups/com17/languages/X.680-0207.pdf).
    pub(crate) const DER_TAG_SEQUENCE: u8 = 0x30;
    /// Maximum length of a DER encoded length in short form.
    /// Defined in [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf).
    pub(crate) const DER_LENGTH_SHORT_FORM_MAX: usize = 127;
    /// First octet of a long form length carrying a single length octet.
    pub(crate) const DER_LENGTH_ONE_OCTET: u8 = 0x81;
    /// Octet that indicates that no unused bits are present in a bit string.
    /// Defined in section 8.6 of [ITU X.690](https://www.itu.int/ITU-T/studygroups/com17/languages/X.690-0207.pdf).
    pub(crate) const BIT_STRING_NO_UNUSED_BITS: u8 = 0x00;
    /// Uncompressed point marker of an elliptic curve public key, see section 2.3.3 of SEC 1.
    pub(crate) const EC_POINT_UNCOMPRESSED: u8 = 0x04;
}

/// DER encoded (content octets only) object identifiers of the key algorithms we read and write.
mod object_identifiers {
    /// `1.2.840.113549.1.1.1`, rsaEncryption
    pub(crate) const OID_RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
    /// `1.2.840.10045.2.1`, id-ecPublicKey
    pub(crate) const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
    /// `1.2.840.10045.3.1.7`, prime256v1
    pub(crate) const OID_P256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
    /// `1.3.132.0.34`, secp384r1
    pub(crate) const OID_P384: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x22];
    /// `1.3.132.0.35`, secp521r1
    pub(crate) const OID_P521: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x23];
    /// `1.3.101.110`
    pub(crate) const OID_X25519: &[u8] = &[0x2b, 0x65, 0x6e];
    /// `1.3.101.111`
    pub(crate) const OID_X448: &[u8] = &[0x2b, 0x65, 0x6f];
    /// `1.3.101.112`
    pub(crate) const OID_ED25519: &[u8] = &[0x2b, 0x65, 0x70];
    /// `1.3.101.113`
    pub(crate) const OID_ED448: &[u8] = &[0x2b, 0x65, 0x71];
}

/// DER encoded byte representation of RSA encryption algorithm identifier.
///
/// The identifier oid: `1.2.840.113549.1.1.1` defined in appendix C of
/// [RFC 8017](https://datatracker.ietf.org/doc/rfc8017/)
///
/// Section 2.2.1 of the [RFC 3279](https://www.rfc-editor.org/rfc/rfc3279.html) specifies the
/// parameters need to be NULL.
mod rsa_algorithm_identifier {
    const SEQUENCE_TAG: u8 = 0x30;
    const LENGTH: u8 = 0x0d;
    const OBJECT_IDENTIFIER_TAG: u8 = 0x06;
    const LENGTH_OID: u8 = 0x09;
    const NULL_TAG: u8 = 0x05;
    const LENGTH_NULL: u8 = 0x00;

    /// `SEQUENCE { OID 1.2.840.113549.1.1.1, NULL }`
    ///
    /// Shared by the SubjectPublicKeyInfo and the PKCS#8 PrivateKeyInfo of an RSA key.
    pub(crate) const RSA_ALGORITHM_IDENTIFIER: [u8; 15] = [
        SEQUENCE_TAG,
        LENGTH,
        OBJECT_IDENTIFIER_TAG,
        LENGTH_OID,
        // OID: 1.2.840.113549.1.1.1
        0x2a,
        0x86,
        0x48,
        0x86,
        0xf7,
        0x0d,
        0x01,
        0x01,
        0x01,
        NULL_TAG,
        LENGTH_NULL,
    ];
}

// Integer encoding constants
pub(crate) const INTEGER_SIGN_BIT_MASK: u8 = 0x80;

/// Bytes needed by one component of a P-256 JWA signature or coordinate.
pub(crate) const P256_COMPONENT_LEN: usize = 32;
/// Bytes needed by one component of a P-384 JWA signature or coordinate.
pub(crate) const P384_COMPONENT_LEN: usize = 48;
/// Bytes needed by one component of a P-521 JWA signature or coordinate.
pub(crate) const P521_COMPONENT_LEN: usize = 66;

/// Default upper bound of the PBES2 iteration count (`p2c`) accepted from a received header.
pub(crate) const DEFAULT_MAX_PBES2_COUNT: u32 = 1_000_000;

/// Clock skew tolerated when validating token timestamps.
pub(crate) const CLOCK_SKEW_SECONDS: i64 = 15;

/// Size of the AES-GCM initialization vector, 96 bits.
pub(crate) const GCM_IV_LEN: usize = 12;
/// Size of the AES-GCM authentication tag, 128 bits.
pub(crate) const GCM_TAG_LEN: usize = 16;
/// Size of the AES-CBC initialization vector, one block.
pub(crate) const CBC_IV_LEN: usize = 16;
