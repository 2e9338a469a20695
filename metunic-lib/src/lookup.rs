//! Lookup helpers built on top of [`RegistrarClient::call`].
//!
//! The registrar wraps lists and identifiers in a handful of shapes. Rather
//! than probing them ad hoc, each lookup tries an ordered list of candidate
//! field names, declared once below.

use crate::client::RegistrarClient;
use crate::error::MetunicError;
use crate::types::{ApiRequest, Credentials};
use serde_json::Value;

/// Fields that may carry a service identifier, in precedence order.
pub const SERVICE_ID_FIELDS: &[&str] = &["serviceId", "id"];

/// Field that carries a reference item's identifier.
pub const REFERENCE_ID_FIELD: &str = "id";

/// Generic list wrapper tried after the endpoint's own list field.
pub const GENERIC_LIST_FIELD: &str = "data";

/// Fields that may carry a service's expiry date, in precedence order.
pub const EXPIRY_FIELDS: &[&str] = &["endDate", "expirationDate"];

/// How a reference list entry is compared against the wanted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// ASCII case-insensitive, for ISO codes
    Code,
    /// Unicode lowercase with Turkish `I`/`ı`/`İ` folded to `i`, for names
    Name,
}

impl MatchMode {
    fn normalize(&self, value: &str) -> String {
        match self {
            MatchMode::Code => value.trim().to_ascii_lowercase(),
            MatchMode::Name => fold_turkish(value.trim()),
        }
    }

    fn matches(&self, candidate: &str, wanted: &str) -> bool {
        self.normalize(candidate) == self.normalize(wanted)
    }
}

/// Description of one reference-list lookup.
#[derive(Debug, Clone)]
pub struct ReferenceLookup {
    /// Endpoint returning the list
    pub request: ApiRequest,
    /// Named list field the endpoint wraps its items in, if any
    pub list_field: Option<String>,
    /// Item field compared against `value`
    pub match_field: String,
    /// Wanted value
    pub value: String,
    pub mode: MatchMode,
}

impl ReferenceLookup {
    pub fn new<F: Into<String>, V: Into<String>>(
        request: ApiRequest,
        match_field: F,
        value: V,
        mode: MatchMode,
    ) -> Self {
        Self {
            request,
            list_field: None,
            match_field: match_field.into(),
            value: value.into(),
            mode,
        }
    }

    /// Look for the items under `field` before falling back to `data`.
    pub fn with_list_field<F: Into<String>>(mut self, field: F) -> Self {
        self.list_field = Some(field.into());
        self
    }
}

impl RegistrarClient {
    /// Find the registrar's service identifier for `domain`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the lookup succeeds but carries no usable
    /// identifier. A missing id is never assumed to be zero.
    pub async fn resolve_service_id(
        &self,
        domain: &str,
        credentials: &Credentials,
    ) -> Result<u64, MetunicError> {
        let request = ApiRequest::get(self.config().endpoints.queried_services.as_str())
            .param("domainName", domain);
        let result = self.call(&request, Some(credentials)).await?;

        find_service_id(&result, domain)
            .ok_or_else(|| MetunicError::not_found(format!("service id for {}", domain)))
    }

    /// Fetch a reference list and return the first matching item's id.
    ///
    /// `Ok(None)` means the list was fetched but nothing matched; the caller
    /// picks the fallback.
    pub async fn resolve_reference_id(
        &self,
        lookup: &ReferenceLookup,
        credentials: &Credentials,
    ) -> Result<Option<u64>, MetunicError> {
        let result = self.call(&lookup.request, Some(credentials)).await?;
        Ok(find_reference_id(
            &result,
            lookup.list_field.as_deref(),
            &lookup.match_field,
            &lookup.value,
            lookup.mode,
        ))
    }

    /// Registrar id of the country with ISO code `iso_code`.
    pub async fn resolve_country_id(
        &self,
        iso_code: &str,
        credentials: &Credentials,
    ) -> Result<Option<u64>, MetunicError> {
        let lookup = ReferenceLookup::new(
            ApiRequest::get(self.config().endpoints.countries.as_str()),
            "code",
            iso_code,
            MatchMode::Code,
        )
        .with_list_field("countries");
        self.resolve_reference_id(&lookup, credentials).await
    }

    /// Registrar id of the city called `name` within country `country_id`.
    pub async fn resolve_city_id(
        &self,
        country_id: u64,
        name: &str,
        credentials: &Credentials,
    ) -> Result<Option<u64>, MetunicError> {
        let lookup = ReferenceLookup::new(
            ApiRequest::get(self.config().endpoints.cities.as_str()).param("countryId", country_id),
            "name",
            name,
            MatchMode::Name,
        )
        .with_list_field("cities");
        self.resolve_reference_id(&lookup, credentials).await
    }
}

/// Pull the service id out of a queried-services result.
///
/// The result is either one service object or a list of them. A list only
/// yields the id of the entry whose `domainName` matches.
pub fn find_service_id(result: &Value, domain: &str) -> Option<u64> {
    match result {
        Value::Array(items) => items
            .iter()
            .find(|item| {
                item.get("domainName")
                    .and_then(Value::as_str)
                    .map_or(false, |name| name.eq_ignore_ascii_case(domain))
            })
            .and_then(|item| first_id(item, SERVICE_ID_FIELDS)),
        other => first_id(other, SERVICE_ID_FIELDS),
    }
}

/// Scan a reference list for the first item whose `match_field` equals `value`.
pub fn find_reference_id(
    result: &Value,
    list_field: Option<&str>,
    match_field: &str,
    value: &str,
    mode: MatchMode,
) -> Option<u64> {
    unwrap_list(result, list_field)?
        .iter()
        .find(|item| {
            item.get(match_field)
                .and_then(Value::as_str)
                .map_or(false, |candidate| mode.matches(candidate, value))
        })
        .and_then(|item| item.get(REFERENCE_ID_FIELD))
        .and_then(extract_id)
}

/// Read an identifier stored as an integer or a numeric string.
pub fn extract_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First string value among `fields`, in order.
pub fn first_string_field(value: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| value.get(*field))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
}

/// Normalize a phone number to `+` followed by its digits.
///
/// Every character other than an ASCII digit is dropped and a single `+`
/// is prepended, so the result is stable under repeated formatting.
///
/// ```
/// use metunic_lib::format_phone_e164;
///
/// assert_eq!(format_phone_e164("+90 555 123 45 67"), "+905551234567");
/// assert_eq!(format_phone_e164("1-555-123-4567"), "+15551234567");
/// ```
pub fn format_phone_e164(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    format!("+{}", digits)
}

fn first_id(value: &Value, fields: &[&str]) -> Option<u64> {
    fields
        .iter()
        .filter_map(|field| value.get(*field))
        .find_map(extract_id)
}

fn unwrap_list<'a>(result: &'a Value, list_field: Option<&str>) -> Option<&'a Vec<Value>> {
    list_field
        .into_iter()
        .chain(std::iter::once(GENERIC_LIST_FIELD))
        .find_map(|field| result.get(field).and_then(Value::as_array))
        .or_else(|| result.as_array())
}

fn fold_turkish(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{0307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}
