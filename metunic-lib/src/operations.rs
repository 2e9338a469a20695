//! Typed registrar operations.
//!
//! Each operation validates the domain, resolves its service id where the
//! endpoint needs one, and issues a single call through the client. `.tr`
//! domains are served by a separate endpoint family from generic TLDs.

use crate::client::RegistrarClient;
use crate::error::MetunicError;
use crate::lookup::{first_string_field, EXPIRY_FIELDS};
use crate::types::{ApiRequest, Credentials};
use crate::utils::{is_tr_domain, normalize_domain};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::info;

/// Maximum number of nameservers the registrar accepts.
pub const MAX_NAMESERVERS: usize = 5;

/// Endpoint family a domain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TldFamily {
    /// `.tr` ccTLD
    Tr,
    /// Every other TLD
    Tld,
}

impl TldFamily {
    pub fn for_domain(domain: &str) -> Self {
        if is_tr_domain(domain) {
            TldFamily::Tr
        } else {
            TldFamily::Tld
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TldFamily::Tr => "tr",
            TldFamily::Tld => "tld",
        }
    }
}

impl fmt::Display for TldFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expiry and status of a registered domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Expiry date as reported by the registrar, unparsed
    pub expiry_date: Option<String>,
    /// Whether the registrar reports the service as active
    pub active: bool,
    /// Always `!active`
    pub expired: bool,
}

impl SyncStatus {
    /// Build the status from a service `info` result.
    pub fn from_info(info: &Value) -> Self {
        let active = info
            .get("status")
            .and_then(Value::as_str)
            .map_or(false, |status| status.to_lowercase().contains("active"));
        Self {
            expiry_date: first_string_field(info, EXPIRY_FIELDS),
            active,
            expired: !active,
        }
    }
}

impl RegistrarClient {
    /// Extend a registration by `years`.
    pub async fn renew_domain(
        &self,
        domain: &str,
        years: u32,
        credentials: &Credentials,
    ) -> Result<(), MetunicError> {
        let domain = normalize_domain(domain)?;
        if years == 0 {
            return Err(MetunicError::invalid_argument(
                "years",
                "renewal period must be at least one year",
            ));
        }

        let service_id = self.resolve_service_id(&domain, credentials).await?;
        let request = ApiRequest::post(format!("/services/{}/renew-duration", service_id))
            .param("duration", years);
        self.call(&request, Some(credentials)).await?;

        info!(domain = %domain, years, "domain renewed");
        Ok(())
    }

    /// Start an incoming transfer with the domain's auth (EPP) code.
    pub async fn transfer_domain(
        &self,
        domain: &str,
        auth_code: &str,
        credentials: &Credentials,
    ) -> Result<(), MetunicError> {
        let domain = normalize_domain(domain)?;
        if auth_code.trim().is_empty() {
            return Err(MetunicError::invalid_argument(
                "auth",
                "transfer auth code cannot be empty",
            ));
        }

        let family = TldFamily::for_domain(&domain);
        let request = ApiRequest::post(format!("/transfers/{}/add", family))
            .param("domain", &domain)
            .param("auth", auth_code.trim());
        self.call(&request, Some(credentials)).await?;

        info!(domain = %domain, family = %family, "transfer requested");
        Ok(())
    }

    /// Current nameservers of a domain, in registrar order.
    pub async fn get_nameservers(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<Vec<String>, MetunicError> {
        let domain = normalize_domain(domain)?;
        let path = self.service_path(&domain, "nameservers/list", credentials).await?;
        let result = self.call(&ApiRequest::get(path), Some(credentials)).await?;
        Ok(parse_nameservers(&result))
    }

    /// Replace a domain's nameservers with `hosts` (1 to 5 entries).
    pub async fn save_nameservers(
        &self,
        domain: &str,
        hosts: &[String],
        credentials: &Credentials,
    ) -> Result<(), MetunicError> {
        let domain = normalize_domain(domain)?;
        let hosts = clean_nameservers(hosts)?;

        let path = self.service_path(&domain, "nameservers/change", credentials).await?;
        let request = nameserver_params(ApiRequest::put(path), TldFamily::for_domain(&domain), &hosts);
        self.call(&request, Some(credentials)).await?;

        info!(domain = %domain, count = hosts.len(), "nameservers updated");
        Ok(())
    }

    /// Enable or disable the registrar transfer lock.
    pub async fn set_registrar_lock(
        &self,
        domain: &str,
        locked: bool,
        credentials: &Credentials,
    ) -> Result<(), MetunicError> {
        let domain = normalize_domain(domain)?;
        let action = if locked { "transfer/lock" } else { "transfer/unlock" };
        let path = self.service_path(&domain, action, credentials).await?;
        self.call(&ApiRequest::post(path), Some(credentials)).await?;

        info!(domain = %domain, locked, "registrar lock changed");
        Ok(())
    }

    /// Read expiry date and status for a domain.
    pub async fn sync_domain(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<SyncStatus, MetunicError> {
        let domain = normalize_domain(domain)?;
        let path = self.service_path(&domain, "info", credentials).await?;
        let info = self.call(&ApiRequest::get(path), Some(credentials)).await?;
        Ok(SyncStatus::from_info(&info))
    }

    /// `/services/{id}/{family}/{suffix}` for an already normalized domain.
    async fn service_path(
        &self,
        domain: &str,
        suffix: &str,
        credentials: &Credentials,
    ) -> Result<String, MetunicError> {
        let service_id = self.resolve_service_id(domain, credentials).await?;
        Ok(format!(
            "/services/{}/{}/{}",
            service_id,
            TldFamily::for_domain(domain),
            suffix
        ))
    }
}

/// Host names from a `nameservers/list` result.
///
/// Items are either plain strings or objects carrying the host under
/// `name` (or, failing that, their first string field).
pub fn parse_nameservers(result: &Value) -> Vec<String> {
    let items = match result {
        Value::Array(items) => items.as_slice(),
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(host) => Some(host.clone()),
            Value::Object(fields) => fields
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| fields.values().find_map(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter(|host| !host.trim().is_empty())
        .collect()
}

fn clean_nameservers(hosts: &[String]) -> Result<Vec<String>, MetunicError> {
    let hosts: Vec<String> = hosts
        .iter()
        .map(|host| host.trim().trim_end_matches('.').to_lowercase())
        .filter(|host| !host.is_empty())
        .collect();

    if hosts.is_empty() {
        return Err(MetunicError::invalid_argument(
            "nameservers",
            "at least one nameserver is required",
        ));
    }
    if hosts.len() > MAX_NAMESERVERS {
        return Err(MetunicError::invalid_argument(
            "nameservers",
            format!("at most {} nameservers are allowed", MAX_NAMESERVERS),
        ));
    }
    for host in &hosts {
        normalize_domain(host)?;
    }
    Ok(hosts)
}

fn nameserver_params(request: ApiRequest, family: TldFamily, hosts: &[String]) -> ApiRequest {
    hosts
        .iter()
        .enumerate()
        .fold(request, |request, (index, host)| match family {
            TldFamily::Tr => request.param(format!("ns{}", index + 1), host),
            TldFamily::Tld => request.param(format!("nameservers[{}]", index), host),
        })
}
