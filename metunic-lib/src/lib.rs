//! # Metunic Library
//!
//! A session-aware client for the Metunic domain registrar REST API.
//!
//! The registrar authenticates with cookies and wraps every response in a
//! `{messageCode, messageText, result}` envelope. This library keeps one
//! cookie session per account, logs in when needed, unwraps envelopes into
//! typed errors and transparently recovers from a mid-call session expiry
//! with a single re-login and retry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metunic_lib::{ClientConfig, Credentials, RegistrarClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RegistrarClient::new(ClientConfig::default().with_test_mode(true))?;
//!     let creds = Credentials::new("reseller@example.com", "secret");
//!
//!     let nameservers = client.get_nameservers("example.com.tr", &creds).await?;
//!     println!("{:?}", nameservers);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Cookie sessions**: persisted per account across process runs
//! - **Bounded recovery**: at most one re-login and retry per call
//! - **Injectable seams**: transport, session store and audit sink are traits
//! - **Lookup helpers**: service ids, reference ids, E.164 phone numbers

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
pub use client::RegistrarClient;
pub use config::{
    env_config_from, load_env_config, parse_timeout_string, resolve_client_config,
    resolve_credentials, ConfigManager, ConfigOverrides, EnvConfig, FileConfig,
};
pub use envelope::{
    decode, Envelope, MessageCode, SESSION_EXPIRED_CODE, SUCCESS_CODE, UNRECOGNISED_CODE,
};
pub use error::MetunicError;
pub use http::{
    build_http_request, CookieJar, FileSessionStore, MemorySessionStore, ReqwestTransport,
    SessionStore, Transport,
};
pub use lookup::{
    extract_id, find_reference_id, find_service_id, format_phone_e164, MatchMode,
    ReferenceLookup,
};
pub use operations::{parse_nameservers, SyncStatus, TldFamily, MAX_NAMESERVERS};
pub use types::{
    ApiEnvironment, ApiRequest, ClientConfig, Credentials, EndpointConfig, HttpMethod,
    HttpRequest, HttpResponse, RedactedCredentials, PASSWORD_MASK, PRODUCTION_BASE_URL,
    TEST_BASE_URL,
};
pub use utils::{is_tr_domain, normalize_domain, parse_key_value, validate_domain};

// Public modules
pub mod config;
pub mod http;
pub mod lookup;

// Internal modules - these are not part of the public API
mod audit;
mod client;
mod envelope;
mod error;
mod exchange;
mod operations;
mod session;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, MetunicError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        production_url: PRODUCTION_BASE_URL,
        test_url: TEST_BASE_URL,
    }
}

/// Information about the library build
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub production_url: &'static str,
    pub test_url: &'static str,
}
