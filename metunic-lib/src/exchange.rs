//! A single audited request/response exchange.
//!
//! Encodes the request, runs it through the transport with the caller's
//! cookie jar, reports it to the audit sink and decodes the envelope. No
//! session logic and no retries live here.

use crate::audit::{AuditRecord, AuditSink};
use crate::envelope::{self, Envelope};
use crate::error::MetunicError;
use crate::http::{build_http_request, CookieJar, Transport};
use crate::types::{ApiRequest, Credentials};
use std::sync::Arc;

pub(crate) struct Exchange {
    transport: Arc<dyn Transport>,
    audit: Arc<dyn AuditSink>,
    base_url: String,
}

impl Exchange {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        audit: Arc<dyn AuditSink>,
        base_url: String,
    ) -> Self {
        Self {
            transport,
            audit,
            base_url,
        }
    }

    pub(crate) fn set_audit_sink(&mut self, audit: Arc<dyn AuditSink>) {
        self.audit = audit;
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` once and decode the reply.
    ///
    /// `credentials` only feed redaction and the audit record; the
    /// authentication state travels in `jar`.
    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        jar: &mut CookieJar,
        credentials: Option<&Credentials>,
    ) -> Result<Envelope, MetunicError> {
        let http_request = build_http_request(&self.base_url, request)?;
        let mut record = AuditRecord::new(request, credentials);

        tracing::debug!(method = %request.method, path = %request.path, "sending registrar request");

        let response = match self.transport.execute(&http_request, jar).await {
            Ok(response) => response,
            Err(err) => {
                record.error = Some(err.to_string());
                self.audit.record(&record);
                return Err(err);
            }
        };

        let mut record = record.with_response(response.status, &response.body, credentials);
        let decoded = envelope::decode(response.status, &response.body);
        match &decoded {
            Ok(envelope) => record = record.with_decoded(envelope.root(), credentials),
            Err(err) => record.error = Some(err.to_string()),
        }
        self.audit.record(&record);

        if let Ok(envelope) = &decoded {
            tracing::debug!(
                path = %request.path,
                status = response.status,
                code = ?envelope.code,
                "registrar response decoded"
            );
        }
        decoded
    }
}
