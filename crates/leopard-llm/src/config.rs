//! Provider configuration: environment variables layered over an optional
//! YAML file, resolved once into an immutable [`ProviderConfig`].

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use leopard_types::{LeopardError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const DEFAULT_PROVIDER: &str = "vllm";
pub const DEFAULT_MODEL: &str = "default-model";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_LOOPBACK_URL: &str = "http://localhost:8000";
pub const DEFAULT_LOOPBACK_ALIAS: &str = "http://host.containers.internal:8000";

/// Environment variables consulted for the provider selector, in order.
const SELECTOR_VARS: [&str; 3] = ["ACTIVE_PROVIDER", "LLM_PROVIDER", "ACTIVE_LLM"];

// ---------------------------------------------------------------------------
// FileConfig
// ---------------------------------------------------------------------------

/// Parsed YAML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub active_provider: Option<String>,
    #[serde(default)]
    pub loopback_url: Option<String>,
    #[serde(default)]
    pub loopback_alias: Option<String>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderFileEntry>,
}

/// Per-provider entry under `providers:` in the YAML file.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderFileEntry {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for ProviderFileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFileEntry")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key_present", &self.api_key.is_some())
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LeopardError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw).map_err(|e| match e {
            LeopardError::Configuration(msg) => {
                LeopardError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        // An empty file is a valid, empty config.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| LeopardError::Configuration(format!("failed to parse config: {e}")))
    }

    /// Exact key first, then the smallest key equal to `id` ignoring case.
    fn provider(&self, id: &str) -> Option<&ProviderFileEntry> {
        self.providers.get(id).or_else(|| {
            self.providers
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case(id))
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, entry)| entry)
        })
    }
}

// ---------------------------------------------------------------------------
// ConfigSource
// ---------------------------------------------------------------------------

/// Key-value configuration: environment variables layered over a file.
/// Environment values always win.
#[derive(Clone, Default)]
pub struct ConfigSource {
    vars: HashMap<String, String>,
    file: Option<FileConfig>,
}

impl ConfigSource {
    pub fn new<K, V>(vars: impl IntoIterator<Item = (K, V)>, file: Option<FileConfig>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file,
        }
    }

    /// Snapshot the process environment. The YAML file is read from
    /// `config_path` when given, otherwise from `LLM_CONFIG_PATH` if set.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self> {
        // Entries that are not valid UTF-8 are skipped.
        let vars: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        let file = match config_path {
            Some(path) => Some(FileConfig::load(path)?),
            None => match vars.get("LLM_CONFIG_PATH").map(|p| p.trim()) {
                Some(p) if !p.is_empty() => Some(FileConfig::load(Path::new(p))?),
                _ => None,
            },
        };
        Ok(Self { vars, file })
    }

    /// Non-empty, trimmed environment value.
    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn file(&self) -> Option<&FileConfig> {
        self.file.as_ref()
    }

    fn file_entry(&self, provider_id: &str) -> Option<&ProviderFileEntry> {
        self.file.as_ref().and_then(|f| f.provider(provider_id))
    }

    /// Resolve the active provider id. `explicit` (e.g. a CLI flag) wins
    /// over the environment, which wins over the file.
    pub fn select_provider(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| SELECTOR_VARS.iter().find_map(|name| self.var(name)))
            .or_else(|| {
                self.file()
                    .and_then(|f| f.active_provider.as_deref())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or(DEFAULT_PROVIDER)
            .to_lowercase()
    }

    pub fn loopback_rule(&self) -> LoopbackRule {
        let from = self
            .var("LLM_LOOPBACK_URL")
            .map(String::from)
            .or_else(|| self.file().and_then(|f| f.loopback_url.clone()))
            .unwrap_or_else(|| DEFAULT_LOOPBACK_URL.to_string());

        // An explicitly empty alias disables the rewrite.
        let alias = match self.vars.get("LLM_LOOPBACK_ALIAS") {
            Some(v) => v.trim().to_string(),
            None => self
                .file()
                .and_then(|f| f.loopback_alias.clone())
                .unwrap_or_else(|| DEFAULT_LOOPBACK_ALIAS.to_string()),
        };

        LoopbackRule::new(from, alias)
    }
}

impl std::fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ConfigSource")
            .field("var_names", &names)
            .field("file", &self.file)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoopbackRule
// ---------------------------------------------------------------------------

/// Rewrites a local loopback base URL to an address reachable from inside
/// a container or VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackRule {
    from: String,
    to: Option<String>,
}

impl LoopbackRule {
    /// An empty `to` disables the rule.
    pub fn new(from: impl AsRef<str>, to: impl AsRef<str>) -> Self {
        let to = normalize_base_url(to.as_ref());
        Self {
            from: normalize_base_url(from.as_ref()),
            to: if to.is_empty() { None } else { Some(to) },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.to.is_some()
    }

    pub fn apply(&self, base_url: &str) -> String {
        match &self.to {
            Some(alias) if !base_url.is_empty() && base_url == self.from => alias.clone(),
            _ => base_url.to_string(),
        }
    }
}

impl Default for LoopbackRule {
    fn default() -> Self {
        Self::new(DEFAULT_LOOPBACK_URL, DEFAULT_LOOPBACK_ALIAS)
    }
}

/// Trim whitespace and surrounding quotes, drop trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim()
        .trim_end_matches('/')
        .to_string()
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

/// Immutable provider settings, resolved once per client.
///
/// An empty `base_url` is allowed here; the client reports it as a
/// configuration failure when a call is made.
#[derive(Clone)]
pub struct ProviderConfig {
    provider_id: String,
    model_name: String,
    base_url: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    timeout: Duration,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, base_url: impl AsRef<str>) -> Self {
        let provider_id: String = provider_id.into();
        Self {
            provider_id: provider_id.trim().to_lowercase(),
            model_name: DEFAULT_MODEL.to_string(),
            base_url: normalize_base_url(base_url.as_ref()),
            api_key: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() {
            None
        } else {
            Some(SecretString::from(key))
        };
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the configuration for the selected provider.
    ///
    /// Per field: environment variable, then the provider's file entry, then
    /// the built-in default (model, retries, timeout only).
    pub fn resolve(explicit_provider: Option<&str>, source: &ConfigSource) -> Result<Self> {
        let provider_id = source.select_provider(explicit_provider);
        let prefix = env_prefix(&provider_id);
        let entry = source.file_entry(&provider_id);

        let raw_base_url = source
            .var(&format!("{prefix}_BASE_URL"))
            .map(String::from)
            .or_else(|| entry.and_then(|e| e.base_url.clone()))
            .unwrap_or_default();
        let base_url = source
            .loopback_rule()
            .apply(&normalize_base_url(&raw_base_url));

        let model_name = source
            .var(&format!("{prefix}_MODEL"))
            .map(String::from)
            .or_else(|| entry.and_then(|e| e.model.clone()))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_key = source
            .var("LLM_API_KEY")
            .map(SecretString::from)
            .or_else(|| entry.and_then(|e| e.api_key.clone()))
            .filter(|k| !k.expose_secret().trim().is_empty());

        let retries_var = format!("{prefix}_MAX_RETRIES");
        let max_retries = match first_var(source, &[retries_var.as_str(), "LLM_MAX_RETRIES"]) {
            Some((name, raw)) => parse_positive::<u32>(name, raw)?,
            None => match entry.and_then(|e| e.max_retries) {
                Some(0) => {
                    return Err(LeopardError::Configuration(format!(
                        "providers.{provider_id}.max_retries must be positive"
                    )))
                }
                Some(n) => n,
                None => DEFAULT_MAX_RETRIES,
            },
        };

        let timeout_var = format!("{prefix}_TIMEOUT_SECS");
        let timeout = match first_var(source, &[timeout_var.as_str(), "LLM_TIMEOUT_SECS"]) {
            Some((name, raw)) => Duration::from_secs(parse_positive::<u64>(name, raw)?),
            None => match entry.and_then(|e| e.timeout_secs) {
                Some(0) => {
                    return Err(LeopardError::Configuration(format!(
                        "providers.{provider_id}.timeout_secs must be positive"
                    )))
                }
                Some(secs) => Duration::from_secs(secs),
                None => DEFAULT_TIMEOUT,
            },
        };

        let config = Self {
            provider_id,
            model_name,
            base_url,
            api_key,
            max_retries,
            timeout,
        };

        tracing::info!(
            provider = %config.provider_id,
            model = %config.model_name,
            base_url = %config.base_url,
            api_key_present = config.has_api_key(),
            "Resolved LLM provider"
        );
        if config.base_url.is_empty() {
            tracing::error!(
                provider = %config.provider_id,
                "LLM base URL is missing, set {prefix}_BASE_URL or the config file entry"
            );
        }

        Ok(config)
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key_present", &self.has_api_key())
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `granite-7b` -> `GRANITE_7B`
fn env_prefix(provider_id: &str) -> String {
    provider_id.to_uppercase().replace('-', "_")
}

fn first_var<'a>(source: &'a ConfigSource, names: &[&'a str]) -> Option<(&'a str, &'a str)> {
    names
        .iter()
        .find_map(|name| source.var(name).map(|v| (*name, v)))
}

fn parse_positive<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(LeopardError::Configuration(format!(
            "{name} must be a positive integer, got {raw:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
