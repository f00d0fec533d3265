use std::{fmt, sync::Arc};

use jwx_utils::macros::generate_set_and_with;

use crate::jose::{
    CertificateCache, ExtensionRegistry, RemoteFetcher, constants::DEFAULT_MAX_PBES2_COUNT,
};

#[derive(Clone)]
/// Collaborators of the JOSE engine
///
/// - the [`ExtensionRegistry`] used to understand non standard header parameters,
/// - an optional [`RemoteFetcher`] resolving `x5u` and `jku` references,
/// - the [`CertificateCache`] holding what the fetcher returned,
/// - the largest PBES2 iteration count (`p2c`) a parsed [`JWE`](super::JWE) may ask for.
///
/// The default config uses the process wide registry and cache and has no fetcher,
/// which means remote references are never resolved.
pub struct JoseConfig {
    registry: Arc<ExtensionRegistry>,
    fetcher: Option<Arc<dyn RemoteFetcher>>,
    cache: Arc<CertificateCache>,
    max_pbes2_count: u32,
}

impl Default for JoseConfig {
    fn default() -> Self {
        Self {
            registry: ExtensionRegistry::global(),
            fetcher: None,
            cache: CertificateCache::global(),
            max_pbes2_count: DEFAULT_MAX_PBES2_COUNT,
        }
    }
}

impl fmt::Debug for JoseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoseConfig")
            .field("registry", &self.registry)
            .field("fetcher", &self.fetcher.is_some())
            .field("cache", &self.cache)
            .field("max_pbes2_count", &self.max_pbes2_count)
            .finish()
    }
}

impl JoseConfig {
    /// Create a new [`JoseConfig`], same as [`JoseConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        /// Use the given extension registry instead of the process wide one.
        pub fn registry(mut self, registry: Arc<ExtensionRegistry>) -> Self {
            self.registry = registry;
            self
        }
    }

    generate_set_and_with! {
        /// Resolve remote references with the given fetcher.
        pub fn fetcher(mut self, fetcher: Option<Arc<dyn RemoteFetcher>>) -> Self {
            self.fetcher = fetcher;
            self
        }
    }

    generate_set_and_with! {
        /// Use the given cache instead of the process wide one.
        pub fn cache(mut self, cache: Arc<CertificateCache>) -> Self {
            self.cache = cache;
            self
        }
    }

    generate_set_and_with! {
        /// Reject received PBES2 recipients with a `p2c` above `count`, 1 000 000 by default.
        pub fn max_pbes2_count(mut self, count: u32) -> Self {
            self.max_pbes2_count = count;
            self
        }
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> Option<&dyn RemoteFetcher> {
        self.fetcher.as_deref()
    }

    pub fn cache(&self) -> &CertificateCache {
        &self.cache
    }

    pub fn max_pbes2_count(&self) -> u32 {
        self.max_pbes2_count
    }
}
