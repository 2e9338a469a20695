//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and the
//! environment, and resolves everything into a [`ClientConfig`] plus the
//! account [`Credentials`] with proper precedence rules:
//! explicit overrides > environment > config files > defaults.

use crate::error::MetunicError;
use crate::types::{ClientConfig, Credentials, EndpointConfig};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [account]
/// username = "reseller@example.com"
/// password = "secret"
///
/// [api]
/// test_mode = true
/// timeout = "30s"
///
/// [endpoints]
/// session_check = "/session/check"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Registrar account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountConfig>,

    /// Connection settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Endpoint path overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointsConfig>,
}

/// Account credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AccountConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApiConfig {
    /// Use the sandbox environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_mode: Option<bool>,

    /// Explicit API root, overriding the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout (as string, e.g., "30s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Directory for persisted session cookies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,
}

/// Per-endpoint path overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EndpointsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_check: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queried_services: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cities: Option<String>,
}

impl EndpointsConfig {
    fn entries(&self) -> [(&'static str, &Option<String>); 5] {
        [
            ("session_check", &self.session_check),
            ("login", &self.login),
            ("queried_services", &self.queried_services),
            ("countries", &self.countries),
            ("cities", &self.cities),
        ]
    }

    /// Apply the overrides on top of `base`.
    pub fn apply(&self, mut base: EndpointConfig) -> EndpointConfig {
        if let Some(path) = &self.session_check {
            base.session_check = path.clone();
        }
        if let Some(path) = &self.login {
            base.login = path.clone();
        }
        if let Some(path) = &self.queried_services {
            base.queried_services = path.clone();
        }
        if let Some(path) = &self.countries {
            base.countries = path.clone();
        }
        if let Some(path) = &self.cities {
            base.cities = path.clone();
        }
        base
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, MetunicError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MetunicError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            MetunicError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| MetunicError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is the lowest precedence, then the home directory file,
    /// then a file in the working directory.
    pub fn discover_and_load(&self) -> Result<FileConfig, MetunicError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded_files {
                debug!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    /// Looks for configuration files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./metunic.toml", "./.metunic.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Looks for a configuration file in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let path = Path::new(&env::var_os("HOME")?).join(".metunic.toml");
        path.exists().then_some(path)
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("metunic").join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations field by field.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            account: match (lower.account, higher.account) {
                (Some(lower), Some(higher)) => Some(AccountConfig {
                    username: higher.username.or(lower.username),
                    password: higher.password.or(lower.password),
                }),
                (lower, higher) => higher.or(lower),
            },
            api: match (lower.api, higher.api) {
                (Some(lower), Some(higher)) => Some(ApiConfig {
                    test_mode: higher.test_mode.or(lower.test_mode),
                    base_url: higher.base_url.or(lower.base_url),
                    timeout: higher.timeout.or(lower.timeout),
                    session_dir: higher.session_dir.or(lower.session_dir),
                }),
                (lower, higher) => higher.or(lower),
            },
            endpoints: match (lower.endpoints, higher.endpoints) {
                (Some(lower), Some(higher)) => Some(EndpointsConfig {
                    session_check: higher.session_check.or(lower.session_check),
                    login: higher.login.or(lower.login),
                    queried_services: higher.queried_services.or(lower.queried_services),
                    countries: higher.countries.or(lower.countries),
                    cities: higher.cities.or(lower.cities),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), MetunicError> {
        if let Some(account) = &config.account {
            if matches!(&account.username, Some(name) if name.trim().is_empty()) {
                return Err(MetunicError::config("Account username cannot be empty"));
            }
        }

        if let Some(api) = &config.api {
            if let Some(timeout_str) = &api.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(MetunicError::config(format!(
                        "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                        timeout_str
                    )));
                }
            }

            if let Some(base_url) = &api.base_url {
                if !is_http_url(base_url) {
                    return Err(MetunicError::config(format!(
                        "Invalid base_url '{}'. It must start with http:// or https://",
                        base_url
                    )));
                }
            }
        }

        if let Some(endpoints) = &config.endpoints {
            for (name, path) in endpoints.entries() {
                if let Some(path) = path {
                    if !path.starts_with('/') {
                        return Err(MetunicError::config(format!(
                            "Endpoint '{}' must start with '/', got '{}'",
                            name, path
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Environment variable configuration.
///
/// Values set via `METUNIC_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub test_mode: Option<bool>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub session_dir: Option<PathBuf>,
}

/// Load configuration from the process environment.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|name| env::var(name).ok())
}

/// Build an [`EnvConfig`] from any variable lookup.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    env_config.username = non_empty("METUNIC_USERNAME");
    env_config.password = lookup("METUNIC_PASSWORD").filter(|value| !value.is_empty());

    if let Some(val) = non_empty("METUNIC_TEST_MODE") {
        match parse_bool(&val) {
            Some(flag) => env_config.test_mode = Some(flag),
            None => warn!(value = %val, "invalid METUNIC_TEST_MODE, use true/false"),
        }
    }

    if let Some(url) = non_empty("METUNIC_BASE_URL") {
        if is_http_url(&url) {
            env_config.base_url = Some(url);
        } else {
            warn!(value = %url, "invalid METUNIC_BASE_URL, must start with http:// or https://");
        }
    }

    if let Some(timeout_str) = non_empty("METUNIC_TIMEOUT") {
        if parse_timeout_string(&timeout_str).is_some() {
            env_config.timeout = Some(timeout_str);
        } else {
            warn!(
                value = %timeout_str,
                "invalid METUNIC_TIMEOUT, use format like '5s', '30s', '2m'"
            );
        }
    }

    env_config.session_dir = non_empty("METUNIC_SESSION_DIR").map(PathBuf::from);

    env_config
}

/// Values given explicitly, e.g. on the command line. Highest precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub test_mode: Option<bool>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub session_dir: Option<PathBuf>,
}

/// Combine overrides, environment and file settings into a client
/// configuration.
///
/// Credentials are optional here; [`resolve_credentials`] insists on them.
pub fn resolve_client_config(
    file: &FileConfig,
    env_config: &EnvConfig,
    overrides: &ConfigOverrides,
) -> Result<ClientConfig, MetunicError> {
    let api = file.api.clone().unwrap_or_default();
    let mut config = ClientConfig::default();

    let test_mode = overrides
        .test_mode
        .or(env_config.test_mode)
        .or(api.test_mode)
        .unwrap_or(false);
    config = config.with_test_mode(test_mode);

    if let Some(base_url) = overrides
        .base_url
        .clone()
        .or_else(|| env_config.base_url.clone())
        .or(api.base_url)
    {
        config = config.with_base_url(base_url);
    }

    if let Some(timeout_str) = overrides
        .timeout
        .as_ref()
        .or(env_config.timeout.as_ref())
        .or(api.timeout.as_ref())
    {
        let secs = parse_timeout_string(timeout_str).ok_or_else(|| {
            MetunicError::config(format!(
                "Invalid timeout format '{}'. Use format like '5s', '30s', '2m'",
                timeout_str
            ))
        })?;
        if secs == 0 {
            return Err(MetunicError::config("Timeout must be greater than zero"));
        }
        config = config.with_timeout(Duration::from_secs(secs));
    }

    if let Some(dir) = overrides
        .session_dir
        .clone()
        .or_else(|| env_config.session_dir.clone())
        .or(api.session_dir)
    {
        config = config.with_session_dir(dir);
    }

    if let Some(endpoints) = &file.endpoints {
        config = config.with_endpoints(endpoints.apply(EndpointConfig::default()));
    }

    Ok(config)
}

/// Pick the account credentials with the same precedence rules.
///
/// # Errors
///
/// Returns `ConfigError` when no username or no password is configured.
pub fn resolve_credentials(
    file: &FileConfig,
    env_config: &EnvConfig,
    overrides: &ConfigOverrides,
) -> Result<Credentials, MetunicError> {
    let account = file.account.clone().unwrap_or_default();

    let username = overrides
        .username
        .clone()
        .or_else(|| env_config.username.clone())
        .or(account.username)
        .ok_or_else(|| {
            MetunicError::config(
                "No username configured. Set METUNIC_USERNAME or [account] username in metunic.toml",
            )
        })?;
    let password = overrides
        .password
        .clone()
        .or_else(|| env_config.password.clone())
        .or(account.password)
        .ok_or_else(|| {
            MetunicError::config(
                "No password configured. Set METUNIC_PASSWORD or [account] password in metunic.toml",
            )
        })?;

    Ok(Credentials::new(username, password))
}

/// Parse a timeout string like "5s", "30s", "2m" into seconds.
///
/// A bare number is taken as seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().and_then(|m| m.checked_mul(60))
    } else {
        timeout_str.parse::<u64>().ok()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
