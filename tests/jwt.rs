use jwx::{
    dep::jiff::{SignedDuration, Timestamp},
    jose::{JWA, JWEEncryption, JWK, JWT, JWTBuilder, JoseErrorKind, KeyType, error_kind},
};

const ISSUER: &str = "https://sso.example.edu";
const AUDIENCE: &str = "https://api.example.edu";

fn token(ttl: i64) -> JWT {
    JWTBuilder::new()
        .with_issuer(ISSUER.to_owned())
        .with_subject("johndoe".to_owned())
        .with_audience(AUDIENCE.to_owned())
        .with_ttl(SignedDuration::from_secs(ttl))
        .build()
        .unwrap()
}

#[test]
fn signed_token() {
    let issuer = JWK::generate(KeyType::EcP384).unwrap();
    let jwt = token(300);
    let signed = jwt.sign("JWT", JWA::ES384, &issuer).unwrap();

    let verified = JWT::verify(&signed, &issuer.well_known()).unwrap();
    assert_eq!(jwt, verified);
    verified
        .validate_claims(AUDIENCE, SignedDuration::from_secs(300))
        .unwrap();

    let err = verified
        .validate_claims("https://other.example.edu", SignedDuration::from_secs(300))
        .unwrap_err();
    assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));
}

#[test]
fn signed_and_encrypted_token() {
    let issuer = JWK::generate(KeyType::Ed25519).unwrap();
    let audience = JWK::generate(KeyType::X25519).unwrap();
    let jwt = token(60);
    let token = jwt
        .sign_and_encrypt(
            "JWT",
            JWA::EdDSA,
            &issuer,
            JWA::EcdhEs,
            JWEEncryption::A256GCM,
            &audience.well_known(),
        )
        .unwrap();

    let decrypted = JWT::decrypt_and_verify(&token, &issuer.well_known(), &audience).unwrap();
    assert_eq!(jwt, decrypted);

    let impostor = JWK::generate(KeyType::Ed25519).unwrap();
    JWT::decrypt_and_verify(&token, &impostor.well_known(), &audience).unwrap_err();
}

#[test]
fn ttl_is_enforced() {
    let jwt = token(3600);
    let err = jwt
        .validate_claims(AUDIENCE, SignedDuration::from_secs(60))
        .unwrap_err();
    assert_eq!(
        "Token exp claim must be no more than PT60S in the future",
        err.to_string()
    );
}

/// Run `f` with the current second, again if the clock ticked meanwhile.
fn within_one_second<T>(f: impl Fn(i64) -> T) -> T {
    loop {
        let now = Timestamp::now().as_second();
        let result = f(now);
        if Timestamp::now().as_second() == now {
            return result;
        }
    }
}

#[test]
fn issued_at_clock_skew_boundary() {
    let build = |issued_at: i64| {
        JWTBuilder::new()
            .with_issued_at(Timestamp::from_second(issued_at).unwrap())
            .build()
    };

    within_one_second(|now| build(now + 14)).unwrap();
    within_one_second(|now| build(now + 15)).unwrap();

    for offset in [16, 120] {
        let err = within_one_second(|now| build(now + offset)).unwrap_err();
        assert_eq!(
            "Token iat claim must be no more than PT15S in the future",
            err.to_string()
        );
    }
}

#[test]
fn expires_clock_skew_boundary() {
    let build = |expires: i64| {
        JWTBuilder::new()
            .with_expires(Timestamp::from_second(expires).unwrap())
            .build()
    };

    let expired =
        within_one_second(|now| build(now - 15).and_then(|jwt| jwt.is_expired())).unwrap();
    assert!(!expired);

    let err = within_one_second(|now| build(now - 16)).unwrap_err();
    assert_eq!("Token is expired", err.to_string());
    assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));
}
