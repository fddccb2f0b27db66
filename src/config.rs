use jtoken_core::{
    get_token_payload, AlgorithmType, ExpireMode, JsonKeyStore, KeyResolver, RelativePeriod,
    SupportedType, TokenBuilder, TokenError, TokenValidator, KEY_ID_CLAIM,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::info;

/// Configuration for issuing and validating tokens
///
/// A configuration names either a shared secret, a key registry file, or
/// both. When `key_id` is set, tokens are issued with that registry key and
/// carry its id; otherwise the shared secret signs them.
///
/// # Examples
///
/// ## Creating a configuration with the builder
///
/// ```
/// use jtoken::{ExpireMode, JTokenConfig};
///
/// let config = JTokenConfig::builder()
///     .secret("k")
///     .expire_mode(ExpireMode::Strict)
///     .build()
///     .expect("valid configuration");
///
/// let token = config.token_builder().unwrap().make_token().unwrap();
/// assert!(config.validate_token(&token).unwrap());
/// ```
///
/// ## Loading from a JSON file
///
/// ```no_run
/// use jtoken::JTokenConfig;
/// use std::path::Path;
///
/// let config = JTokenConfig::from_file(Path::new("./jtoken.json"))
///     .expect("Failed to load configuration");
/// ```
///
/// ## Loading from environment variables
///
/// ```no_run
/// use jtoken::JTokenConfig;
///
/// // Assuming the following environment variables are set:
/// // JTOKEN_SECRET=<shared secret>
/// // JTOKEN_ALGORITHM=HS512
/// // JTOKEN_EXPIRE_MODE=middle
/// let config = JTokenConfig::from_env("JTOKEN")
///     .expect("Failed to load configuration from environment");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JTokenConfig {
    /// Shared secret for tokens that are not tied to a registry key
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub algorithm: AlgorithmType,
    #[serde(default)]
    pub token_type: SupportedType,
    #[serde(default)]
    pub expire_mode: ExpireMode,
    /// Relative lifetime such as `"+2 hours"`; overrides `expire_mode`
    #[serde(default)]
    pub expires_period: Option<String>,
    #[serde(default = "default_url_safe")]
    pub url_safe: bool,
    /// Path to a JSON key registry
    #[serde(default)]
    pub keys_file: Option<PathBuf>,
    /// Registry key used to sign issued tokens
    #[serde(default)]
    pub key_id: Option<String>,
}

fn default_url_safe() -> bool {
    true
}

impl Default for JTokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: AlgorithmType::default(),
            token_type: SupportedType::default(),
            expire_mode: ExpireMode::default(),
            expires_period: None,
            url_safe: default_url_safe(),
            keys_file: None,
            key_id: None,
        }
    }
}

/// Builder for JTokenConfig
#[derive(Default, Debug)]
pub struct JTokenConfigBuilder {
    config: JTokenConfig,
}

impl JTokenConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: &JTokenConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = Some(secret.into());
        self
    }

    pub fn algorithm(mut self, algorithm: AlgorithmType) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn token_type(mut self, token_type: SupportedType) -> Self {
        self.config.token_type = token_type;
        self
    }

    pub fn expire_mode(mut self, expire_mode: ExpireMode) -> Self {
        self.config.expire_mode = expire_mode;
        self
    }

    pub fn expires_period(mut self, period: impl Into<String>) -> Self {
        self.config.expires_period = Some(period.into());
        self
    }

    pub fn url_safe(mut self, url_safe: bool) -> Self {
        self.config.url_safe = url_safe;
        self
    }

    pub fn keys_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.keys_file = Some(path.into());
        self
    }

    pub fn key_id(mut self, key_id: impl Into<String>) -> Self {
        self.config.key_id = Some(key_id.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns the first problem [`JTokenConfig::validate`] finds
    pub fn build(self) -> Result<JTokenConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Errors that can occur when working with JToken configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Neither a secret nor a key registry was configured. Set `secret` or `keys_file`.")]
    MissingSecret,

    #[error("The configured secret is empty")]
    EmptySecret,

    #[error("`key_id` is set but no `keys_file` was configured")]
    MissingKeysFile,

    #[error("Invalid expiry period '{0}'")]
    InvalidPeriod(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("I/O error occurred while reading configuration: {0}")]
    IOError(String),

    #[error("Failed to parse configuration data: {0}")]
    ParseError(String),

    #[error("Environment variable error: {0}")]
    EnvVarError(String),

    #[error("Global configuration has already been initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

impl JTokenConfig {
    /// Create a configuration signing with a shared secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn builder() -> JTokenConfigBuilder {
        JTokenConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> JTokenConfigBuilder {
        JTokenConfigBuilder::from_config(self)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: JTokenConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: JTokenConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from environment variables
    ///
    /// The environment variables should be named with the given prefix followed by:
    /// - SECRET: The shared secret
    /// - SECRET_FILE: Path to a file holding the shared secret (wins over SECRET)
    /// - ALGORITHM: HS256, HS384 or HS512 (optional, defaults to HS256)
    /// - EXPIRE_MODE: low, middle or strict (optional, defaults to low)
    /// - EXPIRES_PERIOD: A relative period such as "+2 hours" (optional)
    /// - URL_SAFE: true or false (optional, defaults to true)
    /// - KEYS_FILE: Path to a JSON key registry (optional)
    /// - KEY_ID: Registry key used for issuing (optional)
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a variable cannot be parsed or the resulting
    /// configuration does not validate.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let secret = match optional_var(prefix, "SECRET_FILE")? {
            Some(secret_file) => Some(
                fs::read_to_string(secret_file)
                    .map_err(|e| {
                        ConfigError::IOError(format!("Failed to read secret file: {}", e))
                    })?
                    .trim_end()
                    .to_string(),
            ),
            None => optional_var(prefix, "SECRET")?,
        };

        let algorithm = match optional_var(prefix, "ALGORITHM")? {
            Some(algorithm) => algorithm
                .parse::<AlgorithmType>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
            None => AlgorithmType::default(),
        };

        let expire_mode = match optional_var(prefix, "EXPIRE_MODE")? {
            Some(mode) => mode
                .parse::<ExpireMode>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?,
            None => ExpireMode::default(),
        };

        let url_safe = match optional_var(prefix, "URL_SAFE")? {
            Some(flag) => match flag.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid URL_SAFE flag: {}",
                        flag
                    )))
                }
            },
            None => default_url_safe(),
        };

        let config = JTokenConfig {
            secret,
            algorithm,
            token_type: SupportedType::default(),
            expire_mode,
            expires_period: optional_var(prefix, "EXPIRES_PERIOD")?,
            url_safe,
            keys_file: optional_var(prefix, "KEYS_FILE")?.map(PathBuf::from),
            key_id: optional_var(prefix, "KEY_ID")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Rejects an empty secret, an unparseable expiry period, a `key_id`
    /// without a `keys_file`, and a configuration with nothing to sign or
    /// verify with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.secret, Some(secret) if secret.is_empty()) {
            return Err(ConfigError::EmptySecret);
        }

        if self.secret.is_none() && self.keys_file.is_none() {
            return Err(ConfigError::MissingSecret);
        }

        if self.key_id.is_some() && self.keys_file.is_none() {
            return Err(ConfigError::MissingKeysFile);
        }

        if let Some(period) = &self.expires_period {
            RelativePeriod::parse(period)
                .map_err(|_| ConfigError::InvalidPeriod(period.clone()))?;
        }

        Ok(())
    }

    /// Load the configured key registry, if any
    pub fn load_key_store(&self) -> Result<Option<JsonKeyStore>, ConfigError> {
        let Some(path) = &self.keys_file else {
            return Ok(None);
        };
        let store = JsonKeyStore::from_file(path)?;
        info!(path = %path.display(), keys = store.len(), "key registry configured");
        Ok(Some(store))
    }

    /// A token builder pre-populated from this configuration
    ///
    /// The registry key named by `key_id` signs tokens when set, otherwise
    /// the shared secret does.
    pub fn token_builder(&self) -> Result<TokenBuilder, ConfigError> {
        let mut builder = TokenBuilder::new()
            .algorithm(self.algorithm)
            .token_type(self.token_type)
            .expire_mode(self.expire_mode)
            .url_safe(self.url_safe);

        if let Some(period) = &self.expires_period {
            builder = builder.expires_period(period)?;
        }

        let builder = match (&self.key_id, &self.secret) {
            (Some(key_id), _) => {
                let store = self.load_key_store()?.ok_or(ConfigError::MissingKeysFile)?;
                builder.secret(store.get_key_by_id(key_id)?)
            }
            (None, Some(secret)) => builder.secret(secret),
            (None, None) => return Err(ConfigError::MissingSecret),
        };

        Ok(builder)
    }

    /// Validate a token with this configuration's secret, algorithm and registry
    ///
    /// Tokens carrying a `key_id` are checked against the key registry,
    /// others against the shared secret. Either way the configuration can
    /// validate every token its own `token_builder` issues.
    pub fn validate_token(&self, token: &str) -> Result<bool, ConfigError> {
        let carries_key_id = get_token_payload(token)?
            .get(KEY_ID_CLAIM)
            .is_some_and(|key_id| !key_id.is_null());
        let store = if carries_key_id {
            self.load_key_store()?
        } else {
            None
        };

        let mut validator = TokenValidator::new().with_algorithm(self.algorithm);
        if let Some(secret) = &self.secret {
            validator = validator.with_secret(secret);
        }
        if let Some(store) = &store {
            validator = validator.with_resolver(store);
        }

        Ok(validator.validate(token)?)
    }
}

fn optional_var(prefix: &str, name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(format!("{}_{}", prefix, name)) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Global configuration singleton
static DEFAULT_CONFIG: OnceLock<JTokenConfig> = OnceLock::new();

/// Set the default global configuration
///
/// Returns an error if the configuration is invalid or a default
/// configuration is already set.
pub fn set_default_config(config: JTokenConfig) -> Result<(), ConfigError> {
    config.validate()?;
    DEFAULT_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Get the default global configuration, if set
pub fn get_default_config() -> Option<&'static JTokenConfig> {
    DEFAULT_CONFIG.get()
}

/// Try to load a default configuration from standard locations
///
/// This function attempts to load a configuration from:
/// 1. Environment variables with the prefix "JTOKEN"
/// 2. A file at ./jtoken.json
/// 3. A file at ~/.jtoken/config.json
/// 4. A file at /etc/jtoken/config.json
/// 5. TOML files at the same locations (./jtoken.toml, ~/.jtoken/config.toml, ...)
///
/// Returns None if no configuration could be found.
pub fn try_load_default_config() -> Option<JTokenConfig> {
    if let Ok(config) = JTokenConfig::from_env("JTOKEN") {
        return Some(config);
    }

    let json_paths = ["./jtoken.json", "~/.jtoken/config.json", "/etc/jtoken/config.json"];
    if let Some(config) = first_loadable(&json_paths, |path| JTokenConfig::from_file(path)) {
        return Some(config);
    }

    let toml_paths = ["./jtoken.toml", "~/.jtoken/config.toml", "/etc/jtoken/config.toml"];
    first_loadable(&toml_paths, |path| JTokenConfig::from_toml(path))
}

fn first_loadable(
    paths: &[&str],
    load: impl Fn(&Path) -> Result<JTokenConfig, ConfigError>,
) -> Option<JTokenConfig> {
    paths
        .iter()
        .filter_map(|path| expand_home(path))
        .filter(|path| path.exists())
        .find_map(|path| load(&path).ok())
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(Path::new(path).to_path_buf()),
    }
}
