use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use aws_lc_rs::digest::{SHA1_FOR_LEGACY_USE_ONLY, SHA256, digest};
use jwx_error::{BoxError, ErrorContext as _, OpaqueError};
use jwx_utils::macros::generate_set_and_with;
use moka::sync::Cache;
use rustls_pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use tracing::trace;
use x509_parser::pem::Pem;

use crate::jose::{
    Base64Url, JWKSet, JoseConfig, JoseError,
    jwk_utils::{ParsedPublicKey, parse_subject_public_key_info},
};

/// Blocking retrieval of remote resources referenced by URI (`x5u`, `jku`).
///
/// The JOSE engine never performs network I/O by itself, callers that want
/// remote references resolved plug a [`RemoteFetcher`] into the [`JoseConfig`].
/// Timeouts are the fetcher's responsibility.
pub trait RemoteFetcher: Send + Sync + 'static {
    /// Fetch the raw bytes found at `uri`.
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, BoxError>;
}

impl<F> RemoteFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync + 'static,
{
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, BoxError> {
        self(uri)
    }
}

#[derive(Debug, Clone)]
/// Time bounded cache of certificate chains and key sets fetched by URI.
///
/// Concurrent misses for the same URI are coalesced: only one caller runs the
/// fetch, the others wait for its result. Failed fetches are not cached.
pub struct CertificateCache {
    chains: Cache<String, Arc<[CertificateDer<'static>]>>,
    key_sets: Cache<String, Arc<JWKSet>>,
}

static GLOBAL_CACHE: LazyLock<Arc<CertificateCache>> =
    LazyLock::new(|| Arc::new(CertificateCache::default()));

impl Default for CertificateCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIME_TO_LIVE)
    }
}

impl CertificateCache {
    /// Entries expire 15 minutes after they were fetched.
    pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(15 * 60);

    /// Create a new [`CertificateCache`] with the given entry lifetime.
    pub fn new(time_to_live: Duration) -> Self {
        Self {
            chains: Cache::builder().time_to_live(time_to_live).build(),
            key_sets: Cache::builder().time_to_live(time_to_live).build(),
        }
    }

    /// Process wide cache, used by [`JoseConfig::default`].
    pub fn global() -> Arc<Self> {
        GLOBAL_CACHE.clone()
    }

    /// PEM encoded certificate chain found at `uri`.
    pub fn certificate_chain(
        &self,
        uri: &str,
        fetcher: &dyn RemoteFetcher,
    ) -> Result<Arc<[CertificateDer<'static>]>, OpaqueError> {
        self.chains
            .try_get_with(uri.to_owned(), || {
                trace!(uri, "certificate chain cache miss");
                let pem = fetcher
                    .fetch(uri)
                    .map_err(OpaqueError::from_boxed)
                    .context("fetch certificate chain")?;
                parse_certificate_chain(&pem).map(Arc::from)
            })
            .with_context(|| format!("resolve certificate chain {uri}"))
    }

    /// JSON encoded key set found at `uri`.
    pub fn key_set(
        &self,
        uri: &str,
        fetcher: &dyn RemoteFetcher,
    ) -> Result<Arc<JWKSet>, OpaqueError> {
        self.key_sets
            .try_get_with(uri.to_owned(), || {
                trace!(uri, "key set cache miss");
                let json = fetcher
                    .fetch(uri)
                    .map_err(OpaqueError::from_boxed)
                    .context("fetch key set")?;
                JWKSet::parse(&json).map(Arc::new)
            })
            .with_context(|| format!("resolve key set {uri}"))
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.chains.invalidate_all();
        self.key_sets.invalidate_all();
    }
}

/// Parse the `CERTIFICATE` blocks of a PEM document.
pub(crate) fn parse_certificate_chain(
    pem: &[u8],
) -> Result<Vec<CertificateDer<'static>>, OpaqueError> {
    let mut chain = Vec::new();
    for block in Pem::iter_from_buffer(pem) {
        let block = block.map_err(|err| JoseError::argument(format!("invalid PEM: {err}")))?;
        if block.label != "CERTIFICATE" {
            return Err(JoseError::argument(format!(
                "Expected CERTIFICATE, found {}",
                block.label
            ))
            .into());
        }
        chain.push(CertificateDer::from(block.contents));
    }
    if chain.is_empty() {
        return Err(JoseError::missing("At least one certificate is required").into());
    }
    Ok(chain)
}

/// Public key found in the SubjectPublicKeyInfo of a certificate.
pub(crate) fn certificate_public_key(
    certificate: &CertificateDer<'_>,
) -> Result<ParsedPublicKey, OpaqueError> {
    let (_, parsed) = x509_parser::parse_x509_certificate(certificate.as_ref())
        .map_err(|err| JoseError::argument(format!("invalid X.509 certificate: {err}")))?;
    parse_subject_public_key_info(parsed.public_key().raw)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// X.509 certificate parameters shared by keys and JOSE headers
///
/// See section 4.6 - 4.9 of [`rfc7517`] and section 4.1.5 - 4.1.8 of [`rfc7515`].
///
/// [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517#section-4.6
/// [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.5
pub struct CertificateReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x5u: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "x5c")]
    x5c: Option<Vec<CertificateDer<'static>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x5t: Option<Base64Url>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "x5t#S256")]
    x5t_s256: Option<Base64Url>,
}

impl CertificateReference {
    /// Create an empty [`CertificateReference`].
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        /// URI of a PEM encoded certificate chain (`x5u`).
        pub fn certificate_uri(mut self, uri: Option<String>) -> Self {
            self.x5u = uri;
            self
        }
    }

    generate_set_and_with! {
        /// Certificate chain (`x5c`), the first certificate holds the key.
        pub fn certificate_chain(mut self, chain: Option<Vec<CertificateDer<'static>>>) -> Self {
            self.x5c = chain;
            self
        }
    }

    generate_set_and_with! {
        /// SHA-1 thumbprint of the first certificate (`x5t`).
        pub fn thumbprint(mut self, thumbprint: Option<Vec<u8>>) -> Self {
            self.x5t = thumbprint.map(Base64Url::from);
            self
        }
    }

    generate_set_and_with! {
        /// SHA-256 thumbprint of the first certificate (`x5t#S256`).
        pub fn sha256_thumbprint(mut self, thumbprint: Option<Vec<u8>>) -> Self {
            self.x5t_s256 = thumbprint.map(Base64Url::from);
            self
        }
    }

    generate_set_and_with! {
        /// Compute both thumbprints from the first certificate of the chain.
        pub fn computed_thumbprints(mut self) -> Self {
            if let Some(first) = self.x5c.as_ref().and_then(|chain| chain.first()) {
                self.x5t = Some(Base64Url::new(
                    digest(&SHA1_FOR_LEGACY_USE_ONLY, first.as_ref()).as_ref(),
                ));
                self.x5t_s256 = Some(Base64Url::new(digest(&SHA256, first.as_ref()).as_ref()));
            }
            self
        }
    }

    pub fn certificate_uri(&self) -> Option<&str> {
        self.x5u.as_deref()
    }

    pub fn certificate_chain(&self) -> Option<&[CertificateDer<'static>]> {
        self.x5c.as_deref()
    }

    pub fn thumbprint(&self) -> Option<&[u8]> {
        self.x5t.as_deref()
    }

    pub fn sha256_thumbprint(&self) -> Option<&[u8]> {
        self.x5t_s256.as_deref()
    }

    /// No certificate parameter is set.
    pub fn is_empty(&self) -> bool {
        self.x5u.is_none() && self.x5c.is_none() && self.x5t.is_none() && self.x5t_s256.is_none()
    }

    /// Each parameter is either unset on one side or equal on both.
    pub(crate) fn represents(&self, other: &Self) -> bool {
        fn either_none_or_equal<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        either_none_or_equal(self.x5u.as_ref(), other.x5u.as_ref())
            && either_none_or_equal(self.x5c.as_ref(), other.x5c.as_ref())
            && either_none_or_equal(self.x5t.as_ref(), other.x5t.as_ref())
            && either_none_or_equal(self.x5t_s256.as_ref(), other.x5t_s256.as_ref())
    }

    /// Resolve and verify the certificate chain.
    ///
    /// The chain is `x5c`, or fetched from `x5u` when a [`RemoteFetcher`] is
    /// configured. When both are available they must hold the same chain.
    /// Thumbprints must match the first certificate.
    ///
    /// Trust is not evaluated: the chain is not walked to any anchor.
    pub fn verify(
        &self,
        config: &JoseConfig,
    ) -> Result<Option<Vec<CertificateDer<'static>>>, OpaqueError> {
        let remote = match (self.x5u.as_deref(), config.fetcher()) {
            (Some(uri), Some(fetcher)) => Some(config.cache().certificate_chain(uri, fetcher)?),
            (Some(uri), None) => {
                trace!(uri, "no fetcher configured, x5u left unresolved");
                None
            }
            _ => None,
        };

        let chain = match (&self.x5c, remote) {
            (Some(chain), Some(remote)) => {
                if chain.as_slice() != &*remote {
                    return Err(JoseError::argument(
                        "Certificate chain doesn't match certificate URI",
                    )
                    .into());
                }
                chain.clone()
            }
            (Some(chain), None) => chain.clone(),
            (None, Some(remote)) => remote.to_vec(),
            (None, None) => return Ok(None),
        };

        let first = chain
            .first()
            .ok_or_else(|| JoseError::argument("At least one certificate is required"))?;

        if let Some(x5t) = &self.x5t
            && x5t.as_bytes() != digest(&SHA1_FOR_LEGACY_USE_ONLY, first.as_ref()).as_ref()
        {
            return Err(JoseError::argument("Certificate SHA-1 thumbprint mismatch").into());
        }
        if let Some(x5t_s256) = &self.x5t_s256
            && x5t_s256.as_bytes() != digest(&SHA256, first.as_ref()).as_ref()
        {
            return Err(JoseError::argument("Certificate SHA-256 thumbprint mismatch").into());
        }

        Ok(Some(chain))
    }
}

/// `x5c` is a JSON array of standard (not url safe) base64 DER certificates.
pub(crate) mod x5c {
    use base64::{Engine as _, prelude::BASE64_STANDARD};
    use rustls_pki_types::CertificateDer;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(crate) fn serialize<S: Serializer>(
        chain: &Option<Vec<CertificateDer<'static>>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match chain {
            Some(chain) => {
                serializer.collect_seq(chain.iter().map(|cert| BASE64_STANDARD.encode(cert)))
            }
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<CertificateDer<'static>>>, D::Error> {
        let Some(encoded) = Option::<Vec<String>>::deserialize(deserializer)? else {
            return Ok(None);
        };
        encoded
            .iter()
            .map(|cert| {
                BASE64_STANDARD
                    .decode(cert)
                    .map(CertificateDer::from)
                    .map_err(de::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    pub(crate) fn to_value(chain: &[CertificateDer<'static>]) -> serde_json::Value {
        chain
            .iter()
            .map(|cert| serde_json::Value::from(BASE64_STANDARD.encode(cert)))
            .collect()
    }
}
