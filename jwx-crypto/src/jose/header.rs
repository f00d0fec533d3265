use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};

use jwx_error::{ErrorContext as _, OpaqueError};
use jwx_utils::macros::generate_set_and_with;
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::trace;

use crate::jose::{
    CertificateReference, JWA, JWE, JWEEncryption, JWERecipient, JWK, JWKBuilder, JWKType,
    JWKUse, JWSSignature, JoseConfig, JoseError,
    adapter::{ParamUsage, ParamValue, param_by_name},
    cert::certificate_public_key,
};

/// Handler of a non standard header parameter
///
/// Registered under a parameter name in an [`ExtensionRegistry`]. A header
/// holding a parameter that is neither standard nor registered is rejected.
/// All hooks default to accepting.
pub trait Extension: Send + Sync + 'static {
    /// Decoded parameter value.
    type Value: Serialize + DeserializeOwned;

    /// Validate a value set through a [`JoseBuilder`].
    fn validate(&self, value: &Self::Value) -> Result<(), OpaqueError> {
        let _ = value;
        Ok(())
    }

    /// Verify a parsed header holding this parameter.
    fn verify_header(&self, header: &Jose) -> Result<(), OpaqueError> {
        let _ = header;
        Ok(())
    }

    /// Verify a signature whose header holds this parameter.
    fn verify_signature(&self, signature: &JWSSignature) -> Result<(), OpaqueError> {
        let _ = signature;
        Ok(())
    }

    /// Verify a decrypted recipient whose header holds this parameter.
    fn verify_recipient(&self, jwe: &JWE, recipient: &JWERecipient) -> Result<(), OpaqueError> {
        let _ = (jwe, recipient);
        Ok(())
    }
}

trait DynExtension: Send + Sync + 'static {
    fn validate_json(&self, name: &str, value: &Value) -> Result<(), OpaqueError>;
    fn verify_header(&self, header: &Jose) -> Result<(), OpaqueError>;
    fn verify_signature(&self, signature: &JWSSignature) -> Result<(), OpaqueError>;
    fn verify_recipient(&self, jwe: &JWE, recipient: &JWERecipient) -> Result<(), OpaqueError>;
}

struct ExtensionAdapter<E>(E);

impl<E: Extension> DynExtension for ExtensionAdapter<E> {
    fn validate_json(&self, name: &str, value: &Value) -> Result<(), OpaqueError> {
        let value: E::Value = serde_json::from_value(value.clone())
            .map_err(|err| JoseError::argument(format!("invalid {name}: {err}")))?;
        self.0.validate(&value)
    }

    fn verify_header(&self, header: &Jose) -> Result<(), OpaqueError> {
        self.0.verify_header(header)
    }

    fn verify_signature(&self, signature: &JWSSignature) -> Result<(), OpaqueError> {
        self.0.verify_signature(signature)
    }

    fn verify_recipient(&self, jwe: &JWE, recipient: &JWERecipient) -> Result<(), OpaqueError> {
        self.0.verify_recipient(jwe, recipient)
    }
}

static GLOBAL_REGISTRY: LazyLock<Arc<ExtensionRegistry>> =
    LazyLock::new(|| Arc::new(ExtensionRegistry::new()));

#[derive(Default)]
/// Append only registry of header [`Extension`]s
///
/// Safe to share between threads: registration takes a write lock, header
/// processing only reads.
pub struct ExtensionRegistry {
    extensions: RwLock<HashMap<String, Arc<dyn DynExtension>>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extensions = self.extensions.read();
        let mut names: Vec<&str> = extensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &names)
            .finish()
    }
}

impl ExtensionRegistry {
    /// Create an empty [`ExtensionRegistry`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Process wide registry, used by [`JoseConfig::default`].
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.clone()
    }

    /// Register `extension` as handler of the header parameter `name`.
    ///
    /// Fails for standard parameter names and names registered before.
    pub fn register<E: Extension>(&self, name: &str, extension: E) -> Result<(), OpaqueError> {
        if param_by_name(name).is_some() {
            return Err(
                JoseError::argument("Must not be a standard registered parameter name").into(),
            );
        }
        let mut extensions = self.extensions.write();
        if extensions.contains_key(name) {
            return Err(JoseError::argument("Already registered").into());
        }
        trace!(name, "register header extension");
        extensions.insert(name.to_owned(), Arc::new(ExtensionAdapter(extension)));
        Ok(())
    }

    /// An extension is registered for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Result<Arc<dyn DynExtension>, OpaqueError> {
        self.extensions.read().get(name).cloned().ok_or_else(|| {
            JoseError::argument(format!("must understand extension {name}")).into()
        })
    }

    /// Extensions of the non standard parameters of `header`.
    fn extensions_of(
        &self,
        header: &Jose,
    ) -> Result<Vec<Arc<dyn DynExtension>>, OpaqueError> {
        header
            .extended
            .keys()
            .filter(|name| param_by_name(name).is_none())
            .map(|name| self.get(name))
            .collect()
    }

    pub(crate) fn verify_signature(&self, signature: &JWSSignature) -> Result<(), OpaqueError> {
        for extension in self.extensions_of(signature.header())? {
            extension.verify_signature(signature)?;
        }
        Ok(())
    }

    pub(crate) fn verify_recipient(
        &self,
        jwe: &JWE,
        recipient: &JWERecipient,
    ) -> Result<(), OpaqueError> {
        for extension in self.extensions_of(recipient.header())? {
            extension.verify_recipient(jwe, recipient)?;
        }
        Ok(())
    }
}

/// Register `extension` for the header parameter `name` in the process wide registry.
pub fn register_extension<E: Extension>(name: &str, extension: E) -> Result<(), OpaqueError> {
    ExtensionRegistry::global().register(name, extension)
}

#[derive(Debug, Clone, PartialEq)]
/// JOSE header shared by JWS and JWE, see section 4 of [`rfc7515`] and [`rfc7516`]
///
/// A [`Jose`] is always verified: the algorithm is known, encryption headers
/// carry the parameters their algorithm requires, critical parameters are
/// present and every non standard parameter has a registered [`Extension`].
///
/// Standard parameters only used by encryption, e.g. `enc` or `epk`, as well
/// as extension parameters are kept as extended parameters.
///
/// [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515#section-4
/// [`rfc7516`]: https://datatracker.ietf.org/doc/html/rfc7516#section-4
pub struct Jose {
    alg: JWA,
    kid: Option<String>,
    jku: Option<String>,
    jwk: Option<JWK>,
    certificate: CertificateReference,
    typ: Option<String>,
    cty: Option<String>,
    crit: Option<Vec<String>>,
    extended: Map<String, Value>,
    well_known: Option<JWK>,
}

/// Merge header fragments, later fragments override earlier ones.
pub(crate) fn merge_headers<'a>(
    fragments: impl IntoIterator<Item = Option<&'a Map<String, Value>>>,
) -> Map<String, Value> {
    let mut merged = Map::new();
    for fragment in fragments.into_iter().flatten() {
        merged.extend(fragment.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Header parameter names must be unique over the protected, shared and
/// per-recipient (or per-signature) headers.
pub(crate) fn check_disjoint(
    a: Option<&Map<String, Value>>,
    b: Option<&Map<String, Value>>,
) -> Result<(), OpaqueError> {
    if let (Some(a), Some(b)) = (a, b)
        && let Some(name) = a.keys().find(|name| b.contains_key(*name))
    {
        return Err(JoseError::argument(format!(
            "Header parameter {name} must not appear in more than one header"
        ))
        .into());
    }
    Ok(())
}

impl Jose {
    /// Parse and verify a header with the default config.
    pub fn from_json(json: &Map<String, Value>) -> Result<Self, OpaqueError> {
        Self::from_json_with_config(json, &JoseConfig::default())
    }

    pub fn from_json_with_config(
        json: &Map<String, Value>,
        config: &JoseConfig,
    ) -> Result<Self, OpaqueError> {
        let mut alg = None;
        let mut kid = None;
        let mut jku = None;
        let mut jwk = None;
        let mut certificate = Map::new();
        let mut typ = None;
        let mut cty = None;
        let mut crit = None;
        let mut extended = Map::new();

        for (name, value) in json {
            match param_by_name(name) {
                Some(param) if param.usage == ParamUsage::SignAndEncrypt => {
                    match (param.name, param.adapter.decode(name, value)?) {
                        ("alg", ParamValue::Algorithm(value)) => alg = Some(value),
                        ("kid", ParamValue::Text(value)) => kid = Some(value),
                        ("jku", ParamValue::Uri(value)) => jku = Some(value),
                        ("jwk", ParamValue::Key(key)) => {
                            key.verify(config).context("verify jwk header parameter")?;
                            jwk = Some(key.well_known());
                        }
                        ("typ", ParamValue::Text(value)) => typ = Some(value),
                        ("cty", ParamValue::Text(value)) => cty = Some(value),
                        ("crit", ParamValue::Names(names)) => crit = Some(names),
                        _ => {
                            certificate.insert(name.clone(), value.clone());
                        }
                    }
                }
                Some(param) => {
                    param.adapter.decode(name, value)?;
                    extended.insert(name.clone(), value.clone());
                }
                None => {
                    config.registry().get(name)?.validate_json(name, value)?;
                    extended.insert(name.clone(), value.clone());
                }
            }
        }

        let certificate: CertificateReference = serde_json::from_value(Value::Object(certificate))
            .map_err(|err| JoseError::argument(format!("invalid certificate reference: {err}")))?;

        let alg = alg.ok_or_else(|| {
            JoseError::missing("Signature or key protection algorithm is required")
        })?;

        let mut header = Self {
            alg,
            kid,
            jku,
            jwk,
            certificate,
            typ,
            cty,
            crit,
            extended,
            well_known: None,
        };

        header.verify_params()?;
        header.well_known = header.resolve_key(config)?;

        for extension in config.registry().extensions_of(&header)? {
            extension.verify_header(&header)?;
        }

        Ok(header)
    }

    fn verify_params(&self) -> Result<(), OpaqueError> {
        if self.alg.key_use() == JWKUse::Encryption {
            if !self.extended.contains_key("enc") {
                return Err(JoseError::missing("Content encryption algorithm is required").into());
            }
            for name in self.alg.encryption_params() {
                if param_by_name(name).is_some_and(|param| param.required)
                    && !self.extended.contains_key(*name)
                {
                    return Err(JoseError::missing(format!(
                        "Missing required encryption parameter {name}"
                    ))
                    .into());
                }
            }
        }

        for name in self.crit.iter().flatten() {
            if param_by_name(name).is_none() {
                if !self.extended.contains_key(name) {
                    return Err(JoseError::missing(format!(
                        "Missing critical extended parameter {name}"
                    ))
                    .into());
                }
            } else if self.value(name).is_none() {
                return Err(JoseError::missing(format!(
                    "Missing critical registered parameter {name}"
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Well known key identified by this header: the `jwk` parameter, else the
    /// key with matching `kid` found at `jku`, else the key of the certificate chain.
    fn resolve_key(&self, config: &JoseConfig) -> Result<Option<JWK>, OpaqueError> {
        let chain = self.certificate.verify(config)?;

        if let Some(jwk) = &self.jwk {
            return Ok(Some(jwk.clone()));
        }

        let kid = self.kid.as_deref();
        if let (Some(kid), Some(jku), Some(fetcher)) = (kid, self.jku.as_deref(), config.fetcher())
        {
            let key_set = config.cache().key_set(jku, fetcher)?;
            let key = key_set.find(kid).ok_or_else(|| {
                JoseError::missing(format!("Key {kid} not found in key set {jku}"))
            })?;
            return Ok(Some(key.well_known()));
        }

        let Some(chain) = chain else {
            return Ok(None);
        };
        let Some(first) = chain.first() else {
            return Ok(None);
        };
        let key_type = JWKType::from_public(certificate_public_key(first)?)?;
        let key = JWKBuilder::new()
            .with_key_type(key_type)
            .with_certificate_chain(chain)
            .build_with_config(config)?;
        Ok(Some(key))
    }

    pub fn alg(&self) -> JWA {
        self.alg
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    /// `jku`
    pub fn key_set_uri(&self) -> Option<&str> {
        self.jku.as_deref()
    }

    /// Embedded key (`jwk`), always the well known projection.
    pub fn key(&self) -> Option<&JWK> {
        self.jwk.as_ref()
    }

    pub fn certificate(&self) -> &CertificateReference {
        &self.certificate
    }

    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }

    pub fn cty(&self) -> Option<&str> {
        self.cty.as_deref()
    }

    pub fn crit(&self) -> Option<&[String]> {
        self.crit.as_deref()
    }

    /// Extended parameters: encryption parameters and extensions, as JSON.
    pub fn extended(&self) -> &Map<String, Value> {
        &self.extended
    }

    /// Public key identified by this header, if any.
    pub fn well_known(&self) -> Option<&JWK> {
        self.well_known.as_ref()
    }

    /// Content encryption (`enc`).
    pub fn enc(&self) -> Result<Option<JWEEncryption>, OpaqueError> {
        Ok(match self.param("enc")? {
            Some(ParamValue::Encryption(enc)) => Some(enc),
            _ => None,
        })
    }

    /// Compression (`zip`) is set to `DEF`.
    pub fn deflate(&self) -> bool {
        self.extended.contains_key("zip")
    }

    /// Decoded value of an extended standard parameter.
    pub fn param(&self, name: &str) -> Result<Option<ParamValue>, OpaqueError> {
        let Some(param) = param_by_name(name) else {
            return Err(JoseError::argument(format!("{name} is not a registered parameter")).into());
        };
        self.value(name)
            .map(|value| param.adapter.decode(name, &value))
            .transpose()
    }

    /// Decoded value of a base64url encoded parameter (`iv`, `tag`, `apu`, ...).
    pub(crate) fn binary(&self, name: &str) -> Result<Option<Vec<u8>>, OpaqueError> {
        match self.param(name)? {
            Some(ParamValue::Binary(bytes)) => Ok(Some(bytes)),
            Some(_) => Err(JoseError::argument(format!("{name} is not binary")).into()),
            None => Ok(None),
        }
    }

    /// Decoded value of an extension parameter.
    pub fn extension<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, OpaqueError> {
        self.extended
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|err| JoseError::argument(format!("invalid {name}: {err}")).into())
            })
            .transpose()
    }

    /// JSON value of parameter `name`, standard or extended.
    pub fn value(&self, name: &str) -> Option<Value> {
        let text = |value: &Option<String>| value.as_deref().map(Value::from);
        match name {
            "alg" => Some(Value::from(self.alg.name())),
            "kid" => text(&self.kid),
            "jku" => text(&self.jku),
            "jwk" => self
                .jwk
                .as_ref()
                .and_then(|key| serde_json::to_value(key).ok()),
            "typ" => text(&self.typ),
            "cty" => text(&self.cty),
            "crit" => self.crit.clone().map(Value::from),
            "x5u" | "x5c" | "x5t" | "x5t#S256" => serde_json::to_value(&self.certificate)
                .ok()
                .and_then(|mut value| value.get_mut(name).map(Value::take)),
            _ => self.extended.get(name).cloned(),
        }
    }

    /// JSON representation of this header.
    pub fn to_json(&self) -> Map<String, Value> {
        self.to_json_filtered(|_| true)
    }

    /// JSON representation limited to the parameters accepted by `filter`.
    pub fn to_json_filtered(&self, filter: impl Fn(&str) -> bool) -> Map<String, Value> {
        let mut json = Map::new();
        for name in ["alg", "kid", "jku", "jwk", "x5u", "x5c", "x5t", "x5t#S256", "typ", "cty", "crit"] {
            if filter(name)
                && let Some(value) = self.value(name)
            {
                json.insert(name.to_owned(), value);
            }
        }
        for (name, value) in &self.extended {
            if filter(name) {
                json.insert(name.clone(), value.clone());
            }
        }
        json
    }
}

#[derive(Debug, Clone, Default)]
/// Builder for a [`Jose`] header
///
/// Parameter values are validated when set, the header as a whole when built.
pub struct JoseBuilder {
    config: JoseConfig,
    params: Map<String, Value>,
}

impl JoseBuilder {
    /// Create a new [`JoseBuilder`] using the default [`JoseConfig`].
    pub fn new() -> Self {
        Self::default()
    }

    generate_set_and_with! {
        /// Config used to validate extension parameters and to build the header.
        pub fn config(mut self, config: JoseConfig) -> Self {
            self.config = config;
            self
        }
    }

    generate_set_and_with! {
        /// Algorithm (`alg`).
        pub fn algorithm(mut self, alg: JWA) -> Self {
            self.params.insert("alg".to_owned(), Value::from(alg.name()));
            self
        }
    }

    generate_set_and_with! {
        /// Key id (`kid`).
        pub fn kid(mut self, kid: Option<String>) -> Self {
            self.set_raw("kid", kid.map(Value::from));
            self
        }
    }

    generate_set_and_with! {
        /// Key set URI (`jku`).
        pub fn key_set_uri(mut self, uri: Option<String>) -> Self {
            self.set_raw("jku", uri.map(Value::from));
            self
        }
    }

    generate_set_and_with! {
        /// Embedded key (`jwk`), only its well known projection is written.
        pub fn key(mut self, key: Option<JWK>) -> Self {
            let value = key.and_then(|key| serde_json::to_value(key.well_known()).ok());
            self.set_raw("jwk", value);
            self
        }
    }

    generate_set_and_with! {
        /// Certificate parameters (`x5u`, `x5c`, `x5t`, `x5t#S256`).
        pub fn certificate(mut self, certificate: CertificateReference) -> Self {
            for name in ["x5u", "x5c", "x5t", "x5t#S256"] {
                self.params.remove(name);
            }
            if let Ok(Value::Object(json)) = serde_json::to_value(&certificate) {
                self.params.extend(json);
            }
            self
        }
    }

    generate_set_and_with! {
        /// Type (`typ`).
        pub fn typ(mut self, typ: Option<String>) -> Self {
            self.set_raw("typ", typ.map(Value::from));
            self
        }
    }

    generate_set_and_with! {
        /// Content type (`cty`).
        pub fn cty(mut self, cty: Option<String>) -> Self {
            self.set_raw("cty", cty.map(Value::from));
            self
        }
    }

    generate_set_and_with! {
        /// Critical parameter names (`crit`).
        pub fn crit(mut self, names: Option<Vec<String>>) -> Self {
            self.set_raw("crit", names.map(Value::from));
            self
        }
    }

    generate_set_and_with! {
        /// Any parameter: standard parameters are validated by their adapter,
        /// other names need a registered [`Extension`] accepting the value.
        pub fn param(mut self, name: &str, value: Value) -> Result<Self, OpaqueError> {
            match param_by_name(name) {
                Some(param) => {
                    param.adapter.decode(name, &value)?;
                }
                None => self
                    .config
                    .registry()
                    .get(name)?
                    .validate_json(name, &value)?,
            }
            self.params.insert(name.to_owned(), value);
            Ok(self)
        }
    }

    /// Extension parameter from its typed value, see [`JoseBuilder::try_with_param`].
    pub fn try_with_extension(
        self,
        name: &str,
        value: impl Serialize,
    ) -> Result<Self, OpaqueError> {
        let value = serde_json::to_value(value).context("serialize extension parameter")?;
        self.try_with_param(name, value)
    }

    /// Extension parameter from its typed value, see [`JoseBuilder::try_set_param`].
    pub fn try_set_extension(
        &mut self,
        name: &str,
        value: impl Serialize,
    ) -> Result<&mut Self, OpaqueError> {
        let value = serde_json::to_value(value).context("serialize extension parameter")?;
        self.try_set_param(name, value)
    }

    fn set_raw(&mut self, name: &str, value: Option<Value>) {
        match value {
            Some(value) => {
                self.params.insert(name.to_owned(), value);
            }
            None => {
                self.params.remove(name);
            }
        }
    }

    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        self.params.insert(name.to_owned(), value);
    }

    /// Algorithm set on this builder.
    pub fn alg(&self) -> Option<JWA> {
        self.params
            .get("alg")
            .and_then(Value::as_str)
            .and_then(JWA::from_name)
    }

    /// Value of parameter `name` set on this builder.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Parameters as JSON.
    pub fn to_json(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn config(&self) -> &JoseConfig {
        &self.config
    }

    /// Build and verify the header.
    pub fn build(&self) -> Result<Jose, OpaqueError> {
        Jose::from_json_with_config(&self.params, &self.config)
    }
}
