//! Cookie jar holding one account's session cookies.
//!
//! Implements the subset of RFC 6265 the registrar needs: `Set-Cookie`
//! parsing with `Domain`, `Path`, `Max-Age`, `Expires` and `Secure`, and
//! domain/path matching when building the `Cookie` header. The jar is plain
//! serde data so a [`SessionStore`](super::SessionStore) can persist it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A single stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// Lowercase host or domain, without a leading dot
    pub domain: String,
    /// Set when the cookie had no `Domain` attribute
    pub host_only: bool,
    pub path: String,
    /// Unix seconds; `None` for session cookies
    pub expires_at: Option<i64>,
    pub secure: bool,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, now: i64) -> bool {
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        domain_matches(&host, &self.domain, self.host_only) && path_matches(url.path(), &self.path)
    }
}

/// Set of cookies for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredCookie> {
        self.cookies.iter()
    }

    /// Forget every cookie.
    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    /// Record one `Set-Cookie` header received from `url`.
    ///
    /// Returns `false` when the header was ignored (unparsable, or a
    /// `Domain` the host is not allowed to set).
    pub fn store_set_cookie(&mut self, header: &str, url: &Url) -> bool {
        self.store_set_cookie_at(header, url, Utc::now().timestamp())
    }

    /// Build the `Cookie` header value for a request to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookie_header_at(url, Utc::now().timestamp())
    }

    /// Drop cookies whose expiry has passed.
    pub fn purge_expired(&mut self) {
        let now = Utc::now().timestamp();
        self.cookies.retain(|cookie| !cookie.is_expired(now));
    }

    pub(crate) fn store_set_cookie_at(&mut self, header: &str, url: &Url, now: i64) -> bool {
        let host = match url.host_str() {
            Some(host) => host.to_ascii_lowercase(),
            None => return false,
        };

        let mut parts = header.split(';');
        let (name, value) = match parts.next().and_then(|pair| pair.split_once('=')) {
            Some((name, value)) => (name.trim(), value.trim()),
            None => return false,
        };
        if name.is_empty() {
            return false;
        }

        let mut domain_attr: Option<String> = None;
        let mut path_attr: Option<String> = None;
        let mut max_age: Option<i64> = None;
        let mut expires: Option<i64> = None;
        let mut secure = false;

        for attribute in parts {
            let (key, val) = match attribute.split_once('=') {
                Some((key, val)) => (key.trim(), val.trim()),
                None => (attribute.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    domain_attr = Some(val.trim_start_matches('.').to_ascii_lowercase());
                }
                "path" if val.starts_with('/') => path_attr = Some(val.to_string()),
                "max-age" => {
                    if let Ok(seconds) = val.parse::<i64>() {
                        max_age = Some(seconds);
                    }
                }
                "expires" => expires = parse_cookie_date(val),
                "secure" => secure = true,
                _ => {}
            }
        }

        let (domain, host_only) = match domain_attr {
            Some(domain) => {
                if !domain_matches(&host, &domain, false) {
                    return false;
                }
                (domain, false)
            }
            None => (host, true),
        };
        let path = path_attr.unwrap_or_else(|| default_path(url.path()));
        let expires_at = match max_age {
            Some(seconds) if seconds <= 0 => Some(i64::MIN),
            Some(seconds) => Some(now.saturating_add(seconds)),
            None => expires,
        };

        self.cookies
            .retain(|c| !(c.name == name && c.domain == domain && c.path == path));

        let cookie = StoredCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain,
            host_only,
            path,
            expires_at,
            secure,
        };
        if !cookie.is_expired(now) {
            self.cookies.push(cookie);
        }
        true
    }

    pub(crate) fn cookie_header_at(&self, url: &Url, now: i64) -> Option<String> {
        let mut matching: Vec<&StoredCookie> = self
            .cookies
            .iter()
            .filter(|cookie| cookie.matches(url, now))
            .collect();
        if matching.is_empty() {
            return None;
        }
        // Longer paths first.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

fn domain_matches(host: &str, domain: &str, host_only: bool) -> bool {
    if host == domain {
        return true;
    }
    !host_only
        && host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/')
            || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(request_path: &str) -> String {
    if !request_path.starts_with('/') {
        return "/".to_string();
    }
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => request_path[..index].to_string(),
    }
}

/// Parse the date formats servers actually send in `Expires`.
fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.timestamp());
    }
    ["%a, %d-%b-%Y %H:%M:%S GMT", "%a, %d %b %Y %H:%M:%S GMT", "%A, %d-%b-%y %H:%M:%S GMT"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc().timestamp())
}
