//! Session management: one cookie session per registrar account.
//!
//! A [`Session`] owns an account's credentials and cookie jar and writes the
//! jar through to its [`SessionStore`] after every exchange. The
//! [`SessionManager`] makes sure a session is authenticated before a gated
//! request goes out. Its session-check and login requests bypass the gate, so
//! validation can never recurse.

use crate::envelope::Envelope;
use crate::error::MetunicError;
use crate::exchange::Exchange;
use crate::http::{CookieJar, SessionStore};
use crate::types::{ApiRequest, Credentials, EndpointConfig};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cookie session for one account.
pub(crate) struct Session {
    pub(crate) credentials: Credentials,
    pub(crate) jar: CookieJar,
    key: String,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Open the session for `key`, picking up a jar left by an earlier run.
    pub(crate) fn open(credentials: Credentials, key: String, store: Arc<dyn SessionStore>) -> Self {
        let jar = match store.load(&key) {
            Ok(Some(jar)) => {
                debug!(username = credentials.username(), cookies = jar.len(), "restored stored session");
                jar
            }
            Ok(None) => CookieJar::new(),
            Err(err) => {
                warn!(error = %err, "could not restore stored session, starting fresh");
                CookieJar::new()
            }
        };
        Self {
            credentials,
            jar,
            key,
            store,
        }
    }

    /// Take over a newer password for the same account.
    pub(crate) fn refresh_credentials(&mut self, credentials: &Credentials) {
        if self.credentials != *credentials {
            self.credentials = credentials.clone();
        }
    }

    /// Write the jar through to the store. Failures only cost persistence.
    pub(crate) fn persist(&self) {
        if let Err(err) = self.store.save(&self.key, &self.jar) {
            warn!(error = %err, "failed to persist session cookies");
        }
    }

    /// Forget every cookie, in memory and in the store.
    pub(crate) fn reset(&mut self) {
        self.jar.clear();
        if let Err(err) = self.store.clear(&self.key) {
            warn!(error = %err, "failed to clear stored session");
        }
    }
}

/// Keeps sessions authenticated.
pub(crate) struct SessionManager<'a> {
    exchange: &'a Exchange,
    endpoints: &'a EndpointConfig,
}

impl<'a> SessionManager<'a> {
    pub(crate) fn new(exchange: &'a Exchange, endpoints: &'a EndpointConfig) -> Self {
        Self {
            exchange,
            endpoints,
        }
    }

    /// Guarantee the session is logged in.
    ///
    /// With no cookies at all there is nothing to check, so this logs in
    /// straight away. Otherwise the session-check endpoint decides; a check
    /// that fails for any reason counts as an invalid session.
    pub(crate) async fn ensure_valid(&self, session: &mut Session) -> Result<(), MetunicError> {
        if session.jar.is_empty() {
            debug!(username = session.credentials.username(), "no session cookies, logging in");
            return self.login(session).await;
        }

        let check = ApiRequest::get(self.endpoints.session_check.as_str());
        let outcome = self
            .exchange
            .send(&check, &mut session.jar, Some(&session.credentials))
            .await;
        session.persist();

        match outcome {
            Ok(envelope) if session_is_valid(&envelope) => return Ok(()),
            Ok(envelope) => {
                debug!(code = ?envelope.code, "session check reported an invalid session");
            }
            Err(err) => {
                warn!(error = %err, "session check failed, logging in again");
            }
        }
        self.login(session).await
    }

    /// Post the credentials to the login endpoint.
    ///
    /// The transport captures the session cookies into the jar; nothing
    /// else needs copying.
    pub(crate) async fn login(&self, session: &mut Session) -> Result<(), MetunicError> {
        info!(username = session.credentials.username(), "logging in to registrar");
        let request = ApiRequest::post(self.endpoints.login.as_str())
            .param("username", session.credentials.username())
            .param("password", session.credentials.password());

        let outcome = self
            .exchange
            .send(&request, &mut session.jar, Some(&session.credentials))
            .await;
        session.persist();

        outcome?
            .into_result()
            .map(|_| ())
            .map_err(MetunicError::surface)
    }
}

/// Only a literal `result.valid == true` counts as a live session.
fn session_is_valid(envelope: &Envelope) -> bool {
    envelope
        .result
        .as_ref()
        .and_then(|result| result.get("valid"))
        == Some(&Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::decode;

    #[test]
    fn test_session_validity_is_strict() {
        let valid = decode(200, r#"{"messageCode":1,"result":{"valid":true}}"#).unwrap();
        assert!(session_is_valid(&valid));

        for body in [
            r#"{"messageCode":1,"result":{"valid":false}}"#,
            r#"{"messageCode":1,"result":{"valid":"true"}}"#,
            r#"{"messageCode":1,"result":{"valid":1}}"#,
            r#"{"messageCode":1,"result":{}}"#,
            r#"{"messageCode":1}"#,
        ] {
            let env = decode(200, body).unwrap();
            assert!(!session_is_valid(&env), "{} must not count as valid", body);
        }
    }
}
