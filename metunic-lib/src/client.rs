//! Main registrar client implementation.
//!
//! This module provides the [`RegistrarClient`] that composes the transport,
//! the envelope decoder and the session manager into one `call` operation
//! with an automatic, single re-login when the registrar reports an expired
//! session.

use crate::audit::{AuditSink, TracingAuditSink};
use crate::error::MetunicError;
use crate::exchange::Exchange;
use crate::http::{CookieJar, FileSessionStore, ReqwestTransport, SessionStore, Transport};
use crate::session::{Session, SessionManager};
use crate::types::{ApiRequest, ClientConfig, Credentials};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Position in the bounded attempt sequence of one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Sent after the session gate
    First,
    /// Sent once after a forced re-login, without the gate
    Retry,
}

/// Session-aware client for the registrar REST API.
///
/// The client owns one cookie session per account. Calls for the same
/// account are serialized end to end (session check, login, request, retry), so
/// cookie writes never interleave; calls for different accounts run
/// concurrently.
///
/// # Example
///
/// ```rust,no_run
/// use metunic_lib::{ApiRequest, ClientConfig, Credentials, RegistrarClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = RegistrarClient::new(ClientConfig::default().with_test_mode(true))?;
///     let creds = Credentials::new("reseller@example.com", "secret");
///
///     let service = client
///         .call(
///             &ApiRequest::get("/services/queried-services").param("domainName", "example.com"),
///             Some(&creds),
///         )
///         .await?;
///     println!("{}", service);
///     Ok(())
/// }
/// ```
pub struct RegistrarClient {
    /// Configuration settings for this client
    config: ClientConfig,
    /// Transport, audit sink and base URL
    exchange: Exchange,
    /// Persistence for session jars
    store: Arc<dyn SessionStore>,
    /// Live sessions keyed by session key
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Session>>>>,
}

impl RegistrarClient {
    /// Create a client with the reqwest transport and file-backed sessions.
    ///
    /// # Errors
    ///
    /// Returns `MetunicError` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, MetunicError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        let store = FileSessionStore::new(config.session_dir());
        Ok(Self::with_parts(config, Arc::new(transport), Arc::new(store)))
    }

    /// Create a client from an explicit transport and session store.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let exchange = Exchange::new(transport, Arc::new(TracingAuditSink), config.base_url());
        Self {
            config,
            exchange,
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Report every exchange to `sink` instead of the tracing sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.exchange.set_audit_sink(sink);
        self
    }

    /// Get the configuration of this client.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The API root requests are sent to.
    pub fn base_url(&self) -> &str {
        self.exchange.base_url()
    }

    /// Perform one API call and return the unwrapped `result`.
    ///
    /// With `credentials`, the account's session is validated (logging in
    /// if needed) before the request. If the registrar still answers
    /// "session expired" (code 3), the stored cookies are dropped, a fresh
    /// login is made and the same request is sent exactly once more
    /// without re-validation. Whatever that retry returns is final.
    ///
    /// Without `credentials` the request is sent as-is with an empty jar.
    ///
    /// # Errors
    ///
    /// - `ConnectionError` / `Timeout` when the transport fails
    /// - `MalformedResponse` when the body is not a JSON object
    /// - `ApiError` for any non-success `messageCode`
    pub async fn call(
        &self,
        request: &ApiRequest,
        credentials: Option<&Credentials>,
    ) -> Result<Value, MetunicError> {
        match credentials {
            Some(credentials) => self.call_authenticated(request, credentials).await,
            None => {
                let mut jar = CookieJar::new();
                self.exchange
                    .send(request, &mut jar, None)
                    .await?
                    .into_result()
                    .map_err(MetunicError::surface)
            }
        }
    }

    /// Make sure the account is logged in, without sending anything else.
    pub async fn ensure_session(&self, credentials: &Credentials) -> Result<(), MetunicError> {
        let handle = self.session_for(credentials);
        let mut guard = handle.lock().await;
        let session: &mut Session = &mut guard;
        session.refresh_credentials(credentials);
        SessionManager::new(&self.exchange, &self.config.endpoints)
            .ensure_valid(session)
            .await
    }

    /// Drop the account's cookies, in memory and in the store.
    ///
    /// The next authenticated call logs in again.
    pub async fn forget_session(&self, credentials: &Credentials) {
        let handle = self.session_for(credentials);
        let mut guard = handle.lock().await;
        guard.reset();
    }

    async fn call_authenticated(
        &self,
        request: &ApiRequest,
        credentials: &Credentials,
    ) -> Result<Value, MetunicError> {
        let handle = self.session_for(credentials);
        let mut guard = handle.lock().await;
        let session: &mut Session = &mut guard;
        session.refresh_credentials(credentials);

        let manager = SessionManager::new(&self.exchange, &self.config.endpoints);
        manager.ensure_valid(session).await?;

        let mut attempt = Attempt::First;
        loop {
            let outcome = self
                .exchange
                .send(request, &mut session.jar, Some(&session.credentials))
                .await;
            session.persist();

            match (outcome.and_then(|envelope| envelope.into_result()), attempt) {
                (Err(err), Attempt::First) if err.is_session_expired() => {
                    warn!(
                        action = %request.label(),
                        username = session.credentials.username(),
                        "session expired mid-call, logging in again and retrying once"
                    );
                    session.reset();
                    manager.login(session).await?;
                    attempt = Attempt::Retry;
                }
                (result, _) => return result.map_err(MetunicError::surface),
            }
        }
    }

    fn session_for(&self, credentials: &Credentials) -> Arc<tokio::sync::Mutex<Session>> {
        let key = credentials.session_key(self.exchange.base_url());
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(Session::open(
                    credentials.clone(),
                    key,
                    Arc::clone(&self.store),
                )))
            })
            .clone()
    }
}
