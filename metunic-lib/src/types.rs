//! Core data types for talking to the registrar.
//!
//! This module defines credentials, request descriptors, the plain-data
//! HTTP request/response pair handed to a [`Transport`](crate::Transport),
//! and the client configuration.

use crate::error::MetunicError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Production API root.
pub const PRODUCTION_BASE_URL: &str = "https://api.metunic.com.tr/api";

/// Sandbox API root.
pub const TEST_BASE_URL: &str = "https://api-test.metunic.com.tr/v1";

/// Mask written in place of the password in logs and audit records.
pub const PASSWORD_MASK: &str = "********";

/// Login credentials for one registrar account.
///
/// Immutable once built. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Stable identity for the session store.
    ///
    /// Hashes the API root together with the username so sandbox and
    /// production sessions for the same account never share cookies.
    pub fn session_key(&self, base_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(base_url.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.username.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Credential tuple safe to hand to logs.
    pub fn redacted(&self) -> RedactedCredentials {
        RedactedCredentials {
            username: self.username.clone(),
            password: PASSWORD_MASK,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &PASSWORD_MASK)
            .finish()
    }
}

/// Credentials with the secret replaced by [`PASSWORD_MASK`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedCredentials {
    pub username: String,
    pub password: &'static str,
}

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = MetunicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(MetunicError::invalid_argument(
                "method",
                format!("unsupported HTTP method '{}'", other),
            )),
        }
    }
}

/// One logical API call: method, endpoint path, parameters and optional body.
///
/// Parameters keep insertion order and may repeat a key, which list
/// parameters such as `nameservers[0]`, `nameservers[1]` rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new<P: Into<String>>(method: HttpMethod, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Append one parameter.
    pub fn param<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Send `body` verbatim instead of form-encoding the parameters.
    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Label used in logs and audit records, e.g. `GET /session/check`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// An HTTP request described as plain data, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Which registrar environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiEnvironment {
    #[default]
    Production,
    Test,
}

impl ApiEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            ApiEnvironment::Production => PRODUCTION_BASE_URL,
            ApiEnvironment::Test => TEST_BASE_URL,
        }
    }
}

/// Endpoint paths used by the core.
///
/// The registrar's exact contract is not stable across API revisions, so
/// every path the client depends on is configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Lightweight "whoami" request returning `{"result": {"valid": bool}}`
    pub session_check: String,
    /// Login endpoint receiving `username` and `password`
    pub login: String,
    /// Service lookup by `domainName`
    pub queried_services: String,
    /// Country reference list
    pub countries: String,
    /// City reference list, filtered by `countryId`
    pub cities: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            session_check: "/session/check".to_string(),
            login: "/login/auth".to_string(),
            queried_services: "/services/queried-services".to_string(),
            countries: "/definitions/countries".to_string(),
            cities: "/definitions/cities".to_string(),
        }
    }
}

/// Configuration for a [`RegistrarClient`](crate::RegistrarClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Production or sandbox
    /// Default: production
    pub environment: ApiEnvironment,

    /// Explicit API root, overriding the environment's URL
    pub base_url: Option<String>,

    /// Connect + read timeout for each HTTP request
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Directory for file-backed session jars
    /// Default: the OS temp directory
    pub session_dir: Option<PathBuf>,

    /// Endpoint paths
    pub endpoints: EndpointConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: ApiEnvironment::Production,
            base_url: None,
            timeout: Duration::from_secs(30),
            session_dir: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Switch between sandbox and production.
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.environment = if enabled {
            ApiEnvironment::Test
        } else {
            ApiEnvironment::Production
        };
        self
    }

    /// Point the client at a different API root.
    pub fn with_base_url<U: Into<String>>(mut self, base_url: U) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Store session jars under `dir` instead of the temp directory.
    pub fn with_session_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Replace the endpoint paths.
    pub fn with_endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// The effective API root, without a trailing slash.
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// The effective session directory.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
