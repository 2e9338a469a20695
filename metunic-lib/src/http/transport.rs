//! HTTP transport: request encoding and the reqwest-backed executor.
//!
//! Encoding is a pure step ([`build_http_request`]) so the method-to-body
//! policy can be tested without a network. Execution goes through the
//! [`Transport`] trait, which reads and writes the session's cookie jar on
//! every call.

use super::cookies::CookieJar;
use crate::error::MetunicError;
use crate::types::{ApiRequest, HttpMethod, HttpRequest, HttpResponse};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("metunic-lib/", env!("CARGO_PKG_VERSION"));

/// Executes one HTTP exchange.
///
/// Implementations must send the jar's cookies for the request URL and
/// record every `Set-Cookie` of the response back into the same jar.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &HttpRequest,
        jar: &mut CookieJar,
    ) -> Result<HttpResponse, MetunicError>;
}

/// Production transport on top of `reqwest` with rustls.
///
/// Certificate and hostname verification stay enabled. Redirects are not
/// followed so every `Set-Cookie` is captured against the URL that sent it.
#[derive(Clone)]
pub struct ReqwestTransport {
    /// HTTP client for making registrar requests
    http_client: reqwest::Client,
    /// Connect + read timeout
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a new transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, MetunicError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                MetunicError::connection_with_source(
                    "Failed to create registrar HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(&self, err: reqwest::Error) -> MetunicError {
        if err.is_timeout() {
            MetunicError::timeout("HTTP request", self.timeout)
        } else {
            MetunicError::from(err)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        jar: &mut CookieJar,
    ) -> Result<HttpResponse, MetunicError> {
        let url = Url::parse(&request.url)
            .map_err(|e| MetunicError::invalid_argument("url", e.to_string()))?;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http_client.request(method, url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = jar.cookie_header(&url) {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();

        for value in response.headers().get_all(SET_COOKIE) {
            if let Ok(header) = value.to_str() {
                if !jar.store_set_cookie(header, &url) {
                    tracing::debug!(url = %url, "ignored Set-Cookie header");
                }
            }
        }
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Encode an [`ApiRequest`] against `base_url`.
///
/// - GET: parameters go to the query string.
/// - POST/PUT/DELETE with an explicit body: the body is sent verbatim, with
///   a JSON content type when it starts with `{` or `[`; any parameters
///   then go to the query string.
/// - POST/PUT/DELETE without a body: parameters are form-encoded.
pub fn build_http_request(base_url: &str, request: &ApiRequest) -> Result<HttpRequest, MetunicError> {
    let path = if request.path.starts_with('/') {
        request.path.clone()
    } else {
        format!("/{}", request.path)
    };
    let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), path)).map_err(|e| {
        MetunicError::invalid_argument("path", format!("cannot build URL for '{}': {}", path, e))
    })?;

    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];

    let body = match (request.method, &request.body) {
        (HttpMethod::Get, _) => {
            append_query(&mut url, &request.params);
            None
        }
        (_, Some(body)) => {
            append_query(&mut url, &request.params);
            if looks_like_json(body) {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            Some(body.clone())
        }
        (_, None) if !request.params.is_empty() => {
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
            Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&request.params)
                    .finish(),
            )
        }
        (_, None) => None,
    };

    Ok(HttpRequest {
        method: request.method,
        url: url.to_string(),
        headers,
        body,
    })
}

fn append_query(url: &mut Url, params: &[(String, String)]) {
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
}

fn looks_like_json(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
