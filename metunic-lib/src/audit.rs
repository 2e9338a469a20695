//! Audit trail for registrar exchanges.
//!
//! Every HTTP exchange the client performs is reported to an [`AuditSink`]
//! with the request summary, the raw and decoded response, and the
//! credential tuple. Secrets are masked before the record is built, so a
//! sink can store records as-is.

use crate::types::{ApiRequest, Credentials, RedactedCredentials, PASSWORD_MASK};
use serde::Serialize;
use serde_json::{Map, Value};

/// One audited exchange.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Method and path, e.g. `POST /login/auth`
    pub action: String,
    /// Parameters and body as sent, with secrets masked
    pub request: Value,
    /// HTTP status, absent on transport failure
    pub status: Option<u16>,
    /// Response body as received, with secrets masked
    pub raw_response: String,
    /// Decoded body, absent when decoding failed
    pub decoded: Option<Value>,
    /// Transport or decoding failure, if any
    pub error: Option<String>,
    /// Account the exchange ran under
    pub credentials: Option<RedactedCredentials>,
}

impl AuditRecord {
    pub(crate) fn new(request: &ApiRequest, credentials: Option<&Credentials>) -> Self {
        let secrets = secrets_of(credentials);
        Self {
            action: request.label(),
            request: request_summary(request, &secrets),
            status: None,
            raw_response: String::new(),
            decoded: None,
            error: None,
            credentials: credentials.map(Credentials::redacted),
        }
    }

    pub(crate) fn with_response(mut self, status: u16, raw: &str, credentials: Option<&Credentials>) -> Self {
        self.status = Some(status);
        self.raw_response = redact(raw, &secrets_of(credentials));
        self
    }

    /// Attach the decoded body, masking secrets inside its string values.
    pub(crate) fn with_decoded(
        mut self,
        body: &Map<String, Value>,
        credentials: Option<&Credentials>,
    ) -> Self {
        let secrets = secrets_of(credentials);
        self.decoded = Some(redact_strings(&Value::Object(body.clone()), &secrets));
        self
    }
}

/// Receives one record per HTTP exchange.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Default sink: one `debug` event per exchange on target `metunic::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        tracing::debug!(
            target: "metunic::audit",
            action = %record.action,
            status = ?record.status,
            username = record.credentials.as_ref().map(|c| c.username.as_str()).unwrap_or("-"),
            request = %record.request,
            response = %record.raw_response,
            error = record.error.as_deref().unwrap_or(""),
            "registrar exchange"
        );
    }
}

fn secrets_of(credentials: Option<&Credentials>) -> Vec<&str> {
    credentials
        .map(|c| c.password())
        .filter(|p| !p.is_empty())
        .into_iter()
        .collect()
}

/// Replace every occurrence of each secret with [`PASSWORD_MASK`].
pub(crate) fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, PASSWORD_MASK))
}

/// Mask secrets in every string of a JSON value, leaving numbers and keys intact.
pub(crate) fn redact_strings(value: &Value, secrets: &[&str]) -> Value {
    match value {
        Value::String(text) => Value::String(redact(text, secrets)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_strings(item, secrets))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, item)| (key.clone(), redact_strings(item, secrets)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn request_summary(request: &ApiRequest, secrets: &[&str]) -> Value {
    let mut params = Map::new();
    for (key, value) in &request.params {
        params.insert(key.clone(), Value::String(redact(value, secrets)));
    }
    let mut summary = Map::new();
    summary.insert("params".to_string(), Value::Object(params));
    if let Some(body) = &request.body {
        summary.insert("body".to_string(), Value::String(redact(body, secrets)));
    }
    Value::Object(summary)
}
