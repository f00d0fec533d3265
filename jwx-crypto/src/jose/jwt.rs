//! JSON Web Token, see [`rfc7519`].
//!
//! A [`JWT`] is a claims set, signed as a compact [`JWSSignedPayload`] and
//! optionally nested in a compact [`JWE`]. Time based claims are checked
//! every time a [`JWT`] is created, allowing for a clock skew of 15 seconds.
//!
//! [`rfc7519`]: https://datatracker.ietf.org/doc/html/rfc7519

use jiff::{SignedDuration, Timestamp};
use jwx_error::{ErrorContext as _, OpaqueError};
use jwx_utils::macros::generate_set_and_with;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::jose::{
    JWA, JWE, JWEBuilder, JWEEncryption, JWERecipientBuilder, JWK, JWKSigner, JWSBuilder,
    JWSSignedPayload, JoseError, adapter::is_uri, constants::CLOCK_SKEW_SECONDS,
};

/// Claims with a typed accessor, not accepted by [`JWTBuilder::try_with_claim`].
const REGISTERED_CLAIMS: &[&str] = &["iss", "sub", "aud", "iat", "nbf", "exp", "jti", "nonce"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Validated claims set of a JSON Web Token
///
/// Numeric dates are whole seconds since the epoch. `iss` and every `aud`
/// entry must be absolute URIs. `aud` is parsed from a single string as well
/// as from an array, and always written as an array.
pub struct JWT {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "audience"
    )]
    aud: Option<Vec<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "jiff::fmt::serde::timestamp::second::optional"
    )]
    iat: Option<Timestamp>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "jiff::fmt::serde::timestamp::second::optional"
    )]
    nbf: Option<Timestamp>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "jiff::fmt::serde::timestamp::second::optional"
    )]
    exp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

/// Claims are whole seconds, so they are checked against the current second.
fn current_second() -> Result<Timestamp, OpaqueError> {
    Timestamp::from_second(Timestamp::now().as_second()).context("truncate current time")
}

fn audience<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        Option::<Audience>::deserialize(deserializer)?.map(|aud| match aud {
            Audience::One(aud) => vec![aud],
            Audience::Many(aud) => aud,
        }),
    )
}

fn clock_skew() -> SignedDuration {
    SignedDuration::from_secs(CLOCK_SKEW_SECONDS)
}

fn require<'a, T: ?Sized>(value: Option<&'a T>, claim: &str) -> Result<&'a T, OpaqueError> {
    value.ok_or_else(|| JoseError::missing(format!("Missing {claim} claim")).into())
}

impl JWT {
    /// Parse and validate a claims set.
    pub fn from_json(json: &str) -> Result<Self, OpaqueError> {
        let jwt: Self = serde_json::from_str(json)
            .map_err(|err| JoseError::argument(format!("invalid JWT claims: {err}")))?;
        jwt.validate()?;
        Ok(jwt)
    }

    /// Claims set as compact JSON.
    pub fn to_json(&self) -> Result<String, OpaqueError> {
        serde_json::to_string(self).context("serialize JWT claims")
    }

    /// Verify the compact JWS `jwt` with `issuer_key` and return its claims.
    pub fn verify(jwt: &str, issuer_key: &JWK) -> Result<Self, OpaqueError> {
        let jws = JWSSignedPayload::parse(jwt)?;
        jws.verify(issuer_key)?;
        let claims = std::str::from_utf8(jws.payload())
            .ok()
            .ok_or_else(|| JoseError::argument("JWT claims must be UTF-8"))?;
        Self::from_json(claims)
    }

    /// Decrypt the compact JWE `jwt` with `audience_key`, then verify the
    /// nested JWS with `issuer_key`.
    pub fn decrypt_and_verify(
        jwt: &str,
        issuer_key: &JWK,
        audience_key: &JWK,
    ) -> Result<Self, OpaqueError> {
        let jws = JWE::parse(jwt)?.decrypt(audience_key)?;
        let jws = String::from_utf8(jws)
            .ok()
            .ok_or_else(|| JoseError::argument("nested JWS must be UTF-8"))?;
        Self::verify(&jws, issuer_key)
    }

    fn validate(&self) -> Result<(), OpaqueError> {
        if self.iss.as_deref().is_some_and(|iss| !is_uri(iss)) {
            return Err(JoseError::argument("Token iss claim must be an absolute URI").into());
        }
        if let Some(aud) = self.audience().iter().find(|aud| !is_uri(aud)) {
            return Err(JoseError::argument(format!(
                "Token aud claim {aud} must be an absolute URI"
            ))
            .into());
        }
        self.validate_at(current_second()?)
    }

    /// Time checks against `now`.
    fn validate_at(&self, now: Timestamp) -> Result<(), OpaqueError> {
        let latest = now.checked_add(clock_skew()).context("apply clock skew")?;
        for (name, value) in [("iat", self.iat), ("nbf", self.nbf)] {
            if value.is_some_and(|value| value > latest) {
                return Err(JoseError::argument(format!(
                    "Token {name} claim must be no more than PT{CLOCK_SKEW_SECONDS}S in the future"
                ))
                .into());
            }
        }
        if self.is_expired_at(now)? {
            return Err(JoseError::argument("Token is expired").into());
        }
        Ok(())
    }

    fn is_expired_at(&self, now: Timestamp) -> Result<bool, OpaqueError> {
        let Some(exp) = self.exp else {
            return Ok(false);
        };
        let earliest = now.checked_sub(clock_skew()).context("apply clock skew")?;
        Ok(exp < earliest)
    }

    /// `exp` lies more than the allowed clock skew in the past.
    pub fn is_expired(&self) -> Result<bool, OpaqueError> {
        self.is_expired_at(current_second()?)
    }

    /// Validate the claims of a token issued to `audience`, valid for no
    /// longer than `ttl`.
    ///
    /// On top of the time checks done on creation `iss`, `sub`, `iat` and
    /// `exp` are required and `aud` must include `audience`.
    pub fn validate_claims(&self, audience: &str, ttl: SignedDuration) -> Result<(), OpaqueError> {
        self.validate()?;

        require(self.issuer(), "iss")?;
        require(self.subject(), "sub")?;
        let aud = require(self.aud.as_deref(), "aud")?;
        if !aud.iter().any(|aud| aud == audience) {
            return Err(
                JoseError::argument(format!("Token aud claim doesn't include {audience}")).into(),
            );
        }

        let iat = require(self.iat.as_ref(), "iat")?;
        let exp = require(self.exp.as_ref(), "exp")?;
        if exp.duration_since(*iat) > ttl {
            return Err(JoseError::argument(format!(
                "Token exp claim must be no more than PT{}S in the future",
                ttl.as_secs()
            ))
            .into());
        }
        Ok(())
    }

    pub fn issuer(&self) -> Option<&str> {
        self.iss.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref()
    }

    pub fn audience(&self) -> &[String] {
        self.aud.as_deref().unwrap_or_default()
    }

    pub fn issued_at(&self) -> Option<Timestamp> {
        self.iat
    }

    pub fn not_before(&self) -> Option<Timestamp> {
        self.nbf
    }

    pub fn expires(&self) -> Option<Timestamp> {
        self.exp
    }

    pub fn token_id(&self) -> Option<&str> {
        self.jti.as_deref()
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Private claim `name`.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Sign the claims with `issuer_key`, `typ` is set in the header.
    pub fn sign(&self, typ: &str, alg: JWA, issuer_key: &JWK) -> Result<String, OpaqueError> {
        let mut builder = JWSBuilder::new()
            .with_payload(self.to_json()?.into_bytes())
            .with_compact();
        builder.header_mut().set_typ(typ.to_owned());
        trace!(%alg, typ, "sign JWT");
        builder
            .build(&JWKSigner::new(alg, issuer_key.clone())?)?
            .compact()
    }

    /// Sign the claims with `issuer_key`, then encrypt the compact JWS for
    /// `audience_key`. The JWE header carries `typ` as content type.
    pub fn sign_and_encrypt(
        &self,
        typ: &str,
        sign_alg: JWA,
        issuer_key: &JWK,
        encrypt_alg: JWA,
        enc: JWEEncryption,
        audience_key: &JWK,
    ) -> Result<String, OpaqueError> {
        let jws = self.sign(typ, sign_alg, issuer_key)?;
        let mut recipient = JWERecipientBuilder::new(encrypt_alg, audience_key.clone())?;
        recipient.header_mut().set_cty(typ.to_owned());
        JWEBuilder::new(enc)
            .with_compact()
            .with_recipient(recipient)
            .encrypt(jws.as_bytes())?
            .compact()
    }
}

#[derive(Debug, Clone, Default)]
/// Builder of a [`JWT`]
///
/// Either set `exp` directly or a time to live, counted from `iat` (now when
/// not set).
pub struct JWTBuilder {
    jwt: JWT,
    ttl: Option<SignedDuration>,
}

impl JWTBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        pub fn issuer(mut self, iss: Option<String>) -> Self {
            self.jwt.iss = iss;
            self
        }
    }

    generate_set_and_with! {
        pub fn subject(mut self, sub: Option<String>) -> Self {
            self.jwt.sub = sub;
            self
        }
    }

    generate_set_and_with! {
        /// Add `aud` to the audience.
        pub fn audience(mut self, aud: String) -> Self {
            self.jwt.aud.get_or_insert_default().push(aud);
            self
        }
    }

    generate_set_and_with! {
        pub fn issued_at(mut self, iat: Option<Timestamp>) -> Self {
            self.jwt.iat = iat;
            self
        }
    }

    generate_set_and_with! {
        pub fn not_before(mut self, nbf: Option<Timestamp>) -> Self {
            self.jwt.nbf = nbf;
            self
        }
    }

    generate_set_and_with! {
        pub fn expires(mut self, exp: Option<Timestamp>) -> Self {
            self.jwt.exp = exp;
            self
        }
    }

    generate_set_and_with! {
        /// Time to live, overrides `exp` on build.
        pub fn ttl(mut self, ttl: Option<SignedDuration>) -> Self {
            self.ttl = ttl;
            self
        }
    }

    generate_set_and_with! {
        pub fn token_id(mut self, jti: Option<String>) -> Self {
            self.jwt.jti = jti;
            self
        }
    }

    generate_set_and_with! {
        pub fn nonce(mut self, nonce: Option<String>) -> Self {
            self.jwt.nonce = nonce;
            self
        }
    }

    generate_set_and_with! {
        /// Private claim, registered claim names have their own setter.
        pub fn claim(mut self, name: &str, value: Value) -> Result<Self, OpaqueError> {
            if REGISTERED_CLAIMS.contains(&name) {
                return Err(JoseError::argument(format!("invalid extended claim name {name}")).into());
            }
            self.jwt.claims.insert(name.to_owned(), value);
            Ok(self)
        }
    }

    /// Build and validate the [`JWT`].
    ///
    /// Numeric dates are truncated to whole seconds, as they are serialized.
    pub fn build(self) -> Result<JWT, OpaqueError> {
        let mut jwt = self.jwt;
        if let Some(ttl) = self.ttl {
            let iat = *jwt.iat.get_or_insert_with(Timestamp::now);
            jwt.exp = Some(iat.checked_add(ttl).context("apply JWT ttl")?);
        }
        for date in [&mut jwt.iat, &mut jwt.nbf, &mut jwt.exp] {
            if let Some(value) = date.as_mut() {
                *value = Timestamp::from_second(value.as_second())
                    .context("truncate numeric date")?;
            }
        }
        jwt.validate()?;
        Ok(jwt)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::assert_err;

    use super::*;
    use crate::jose::{JoseErrorKind, KeyType, error_kind};

    fn at(offset: i64) -> Timestamp {
        let now = Timestamp::now().as_second();
        Timestamp::from_second(now + offset).unwrap()
    }

    fn claims() -> JWTBuilder {
        JWTBuilder::new()
            .with_issuer("https://issuer.example".to_owned())
            .with_subject("subject".to_owned())
            .with_audience("https://audience.example".to_owned())
            .with_ttl(SignedDuration::from_secs(60))
    }

    #[test]
    fn numeric_dates_and_audience_forms() {
        let iat = at(0);
        let jwt = JWT::from_json(
            &json!({
                "iss": "https://issuer.example",
                "aud": "https://one.example",
                "iat": iat.as_second(),
                "x": 1
            })
            .to_string(),
        )
        .unwrap();
        assert_eq!(["https://one.example".to_owned()], jwt.audience());
        assert_eq!(Some(iat), jwt.issued_at());
        assert_eq!(Some(&json!(1)), jwt.claim("x"));

        let value: Value = serde_json::from_str(&jwt.to_json().unwrap()).unwrap();
        assert_eq!(json!(["https://one.example"]), value["aud"]);
        assert_eq!(json!(iat.as_second()), value["iat"]);
        assert!(value.get("exp").is_none());
    }

    #[test]
    fn time_claims_are_checked_on_creation() {
        let err = JWTBuilder::new().with_issued_at(at(60)).build().unwrap_err();
        assert_eq!(
            "Token iat claim must be no more than PT15S in the future",
            err.to_string()
        );
        let err = JWTBuilder::new().with_not_before(at(60)).build().unwrap_err();
        assert_eq!(
            "Token nbf claim must be no more than PT15S in the future",
            err.to_string()
        );
        let err = JWTBuilder::new().with_expires(at(-60)).build().unwrap_err();
        assert_eq!("Token is expired", err.to_string());

        JWTBuilder::new()
            .with_issued_at(at(10))
            .with_expires(at(-10))
            .build()
            .unwrap();

        let err = JWT::from_json(&json!({"exp": at(-3600).as_second()}).to_string()).unwrap_err();
        assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));
    }

    #[test]
    fn clock_skew_boundaries_are_inclusive() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let at = |offset: i64| Some(Timestamp::from_second(now.as_second() + offset).unwrap());

        for claim in ["iat", "nbf"] {
            let jwt = |offset| {
                let mut jwt = JWT::default();
                match claim {
                    "iat" => jwt.iat = at(offset),
                    _ => jwt.nbf = at(offset),
                }
                jwt
            };
            jwt(15).validate_at(now).unwrap();
            let err = jwt(16).validate_at(now).unwrap_err();
            assert_eq!(
                format!("Token {claim} claim must be no more than PT15S in the future"),
                err.to_string()
            );
        }

        let expires = |offset| JWT {
            exp: at(offset),
            ..JWT::default()
        };
        expires(-15).validate_at(now).unwrap();
        assert!(!expires(-15).is_expired_at(now).unwrap());
        let err = expires(-16).validate_at(now).unwrap_err();
        assert_eq!("Token is expired", err.to_string());
        assert!(expires(-16).is_expired_at(now).unwrap());
    }

    #[test]
    fn issuer_and_audience_are_uris() {
        let err = JWTBuilder::new()
            .with_issuer("issuer".to_owned())
            .build()
            .unwrap_err();
        assert_eq!("Token iss claim must be an absolute URI", err.to_string());

        let err = JWTBuilder::new()
            .with_audience("https://one.example".to_owned())
            .with_audience("two example".to_owned())
            .build()
            .unwrap_err();
        assert_eq!(
            "Token aud claim two example must be an absolute URI",
            err.to_string()
        );

        let err = JWT::from_json(&json!({"aud": ["urn:example:api", "api"]}).to_string())
            .unwrap_err();
        assert_eq!(Some(JoseErrorKind::Argument), error_kind(&err));

        let jwt =
            JWT::from_json(&json!({"iss": "urn:example:sso", "aud": "urn:example:api"}).to_string())
                .unwrap();
        assert_eq!(Some("urn:example:sso"), jwt.issuer());
    }

    #[test]
    fn validate_claims() {
        let ttl = SignedDuration::from_secs(60);
        let jwt = claims().build().unwrap();
        jwt.validate_claims("https://audience.example", ttl).unwrap();
        assert!(!jwt.is_expired().unwrap());

        let err = jwt
            .validate_claims("https://other.example", ttl)
            .unwrap_err();
        assert_eq!(
            "Token aud claim doesn't include https://other.example",
            err.to_string()
        );

        let err = jwt
            .validate_claims("https://audience.example", SignedDuration::from_secs(30))
            .unwrap_err();
        assert_eq!(
            "Token exp claim must be no more than PT30S in the future",
            err.to_string()
        );

        let err = claims()
            .without_subject()
            .build()
            .unwrap()
            .validate_claims("https://audience.example", ttl)
            .unwrap_err();
        assert_eq!("Missing sub claim", err.to_string());
        assert_eq!(Some(JoseErrorKind::Missing), error_kind(&err));

        let err = claims()
            .without_ttl()
            .build()
            .unwrap()
            .validate_claims("https://audience.example", ttl)
            .unwrap_err();
        assert_eq!("Missing iat claim", err.to_string());
    }

    #[test]
    fn private_claims_must_not_shadow_registered_claims() {
        assert_err!(JWTBuilder::new().try_with_claim("exp", json!(1)));
        let jwt = JWTBuilder::new()
            .try_with_claim("scope", json!("read"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(Some(&json!("read")), jwt.claim("scope"));
    }

    #[test]
    fn sign_and_verify() {
        let issuer = JWK::generate(KeyType::EcP256).unwrap();
        let jwt = claims().with_token_id("id-1".to_owned()).build().unwrap();
        let token = jwt.sign("JWT", JWA::ES256, &issuer).unwrap();
        assert_eq!(jwt, JWT::verify(&token, &issuer.well_known()).unwrap());

        let other = JWK::generate(KeyType::EcP256).unwrap();
        assert_err!(JWT::verify(&token, &other.well_known()));
    }

    #[test]
    fn sign_and_encrypt() {
        let issuer = JWK::ephemeral(JWA::HS256).unwrap();
        let audience = JWK::ephemeral(JWA::RsaOaep).unwrap();
        let jwt = claims().with_nonce("n-0S6_WzA2Mj".to_owned()).build().unwrap();
        let token = jwt
            .sign_and_encrypt(
                "JWT",
                JWA::HS256,
                &issuer,
                JWA::RsaOaep,
                JWEEncryption::A128CbcHs256,
                &audience.well_known(),
            )
            .unwrap();
        assert_eq!(5, token.split('.').count());

        let jwe = JWE::parse(&token).unwrap();
        assert_eq!(Some("JWT"), jwe.recipients()[0].header().cty());

        let decrypted = JWT::decrypt_and_verify(&token, &issuer, &audience).unwrap();
        assert_eq!(jwt, decrypted);
        assert_eq!(Some("n-0S6_WzA2Mj"), decrypted.nonce());

        let stranger = JWK::ephemeral(JWA::RsaOaep).unwrap();
        let err = JWT::decrypt_and_verify(&token, &issuer, &stranger).unwrap_err();
        assert_eq!(Some(JoseErrorKind::Verification), error_kind(&err));
    }
}
