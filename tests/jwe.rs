use jwx::jose::{
    JWA, JWE, JWEBuilder, JWEEncryption, JWERecipientBuilder, JWK, JoseBuilder, JoseErrorKind,
    KeyType, error_kind,
};
use serde_json::Value;

const MESSAGE: &[u8] = b"You can trust us to stick with you through thick and thin.";

#[test]
fn every_content_encryption() {
    for enc in [
        JWEEncryption::A128CbcHs256,
        JWEEncryption::A192CbcHs384,
        JWEEncryption::A256CbcHs512,
        JWEEncryption::A128GCM,
        JWEEncryption::A192GCM,
        JWEEncryption::A256GCM,
    ] {
        let key = JWK::ephemeral_content_key(enc).unwrap();
        let jwe = JWEBuilder::new(enc)
            .with_compact()
            .try_with_recipient_key(JWA::Dir, key.clone())
            .unwrap()
            .encrypt(MESSAGE)
            .unwrap();
        let compact = jwe.compact().unwrap();
        assert_eq!(MESSAGE, JWE::parse(&compact).unwrap().decrypt(&key).unwrap(), "{enc}");
    }
}

#[test]
fn multi_recipient_json() {
    let rsa = JWK::ephemeral(JWA::RsaOaep).unwrap();
    let ec = JWK::generate(KeyType::EcP256).unwrap();
    let passphrase = JWK::ephemeral(JWA::Pbes2Hs256A128KW).unwrap();

    let mut tagged = JWERecipientBuilder::new(JWA::EcdhEsA128KW, ec.well_known()).unwrap();
    tagged.set_header(JoseBuilder::new().with_kid("ec-1".to_owned()));

    let jwe = JWEBuilder::new(JWEEncryption::A128GCM)
        .try_with_recipient_key(JWA::RsaOaep, rsa.well_known())
        .unwrap()
        .with_recipient(tagged)
        .try_with_recipient_key(JWA::Pbes2Hs256A128KW, passphrase.clone())
        .unwrap()
        .try_with_aad(b"envelope".to_vec())
        .unwrap()
        .encrypt(MESSAGE)
        .unwrap();

    let json: Value = serde_json::from_str(&jwe.to_json()).unwrap();
    assert_eq!(3, json["recipients"].as_array().unwrap().len());
    assert_eq!(Some("ec-1"), json["recipients"][1]["header"]["kid"].as_str());
    assert!(json.get("aad").is_some());

    let parsed = JWE::parse(&jwe.to_json()).unwrap();
    for key in [&rsa, &ec, &passphrase] {
        assert_eq!(MESSAGE, parsed.decrypt(key).unwrap());
    }
    assert_eq!(Some("ec-1"), parsed.recipients()[1].header().kid());
}

#[test]
fn wrong_key_and_tampering_fail_alike() {
    let key = JWK::ephemeral(JWA::A256KW).unwrap();
    let jwe = JWEBuilder::new(JWEEncryption::A256CbcHs512)
        .try_with_recipient_key(JWA::A256KW, key.clone())
        .unwrap()
        .encrypt(MESSAGE)
        .unwrap();

    let stranger = JWK::ephemeral(JWA::A256KW).unwrap();
    let err = jwe.decrypt(&stranger).unwrap_err();
    assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));

    let mut json: Value = serde_json::from_str(&jwe.to_json()).unwrap();
    json["aad"] = Value::from("AQID");
    let err = JWE::parse(&json.to_string())
        .unwrap()
        .decrypt(&key)
        .unwrap_err();
    assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));
}

#[test]
fn compact_rules() {
    let key = JWK::ephemeral(JWA::A128GCMKW).unwrap();
    let err = JWEBuilder::new(JWEEncryption::A128GCM)
        .with_compact()
        .try_with_recipient_key(JWA::A128GCMKW, key.clone())
        .unwrap()
        .try_with_recipient_key(JWA::A128GCMKW, key)
        .unwrap()
        .encrypt(MESSAGE)
        .unwrap_err();
    assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));

    let err = JWE::parse("e30.AA.AA.AA").unwrap_err();
    assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));
}
