//! Utility functions for domain processing and validation.
//!
//! Domain names are checked before any network call, and the endpoint
//! family (`tr` or `tld`) is derived from the domain's suffix.

use crate::error::MetunicError;

/// Maximum length of a fully qualified domain name.
const MAX_DOMAIN_LEN: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LEN: usize = 63;

/// Normalize and validate a domain name.
///
/// Trims whitespace, lowercases and drops one trailing dot, then checks the
/// basic FQDN structure: at least two labels, each 1 to 63 characters of
/// letters, digits or hyphens, never starting or ending with a hyphen.
///
/// # Returns
///
/// The normalized domain, or `InvalidDomain` explaining what is wrong.
pub fn normalize_domain(domain: &str) -> Result<String, MetunicError> {
    let trimmed = domain.trim();
    let normalized = trimmed
        .strip_suffix('.')
        .unwrap_or(trimmed)
        .to_lowercase();

    validate_domain(&normalized)?;
    Ok(normalized)
}

/// Validate a domain name format.
pub fn validate_domain(domain: &str) -> Result<(), MetunicError> {
    if domain.is_empty() {
        return Err(MetunicError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.len() > MAX_DOMAIN_LEN {
        return Err(MetunicError::invalid_domain(domain, "Domain name too long"));
    }

    if !domain.contains('.') {
        return Err(MetunicError::invalid_domain(
            domain,
            "Domain name needs a TLD (e.g. example.com)",
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(MetunicError::invalid_domain(domain, "Empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(MetunicError::invalid_domain(
                domain,
                format!("Label '{}' is longer than {} characters", label, MAX_LABEL_LEN),
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(MetunicError::invalid_domain(
                domain,
                format!("Label '{}' cannot start or end with a hyphen", label),
            ));
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err(MetunicError::invalid_domain(
                domain,
                format!("Label '{}' contains invalid characters", label),
            ));
        }
    }

    Ok(())
}

/// True for domains under the `.tr` ccTLD, which use their own endpoint family.
pub fn is_tr_domain(domain: &str) -> bool {
    domain.trim().trim_end_matches('.').to_lowercase().ends_with(".tr")
}

/// Parse a `key=value` pair as given on the command line.
pub fn parse_key_value(pair: &str) -> Result<(String, String), MetunicError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(MetunicError::invalid_argument(
            pair,
            "expected KEY=VALUE",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain(" Example.COM. ").unwrap(), "example.com");
        assert_eq!(normalize_domain("örnek.com.tr").unwrap(), "örnek.com.tr");
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub.example.co.uk").is_ok());
        assert!(validate_domain("xn--rnek-zoa.com.tr").is_ok());

        assert!(validate_domain("").is_err());
        assert!(validate_domain("example").is_err());
        assert!(validate_domain(".com").is_err());
        assert!(validate_domain("example..com").is_err());
        assert!(validate_domain("-example.com").is_err());
        assert!(validate_domain("example-.com").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_is_tr_domain() {
        assert!(is_tr_domain("example.com.tr"));
        assert!(is_tr_domain("EXAMPLE.TR"));
        assert!(is_tr_domain("example.tr."));
        assert!(!is_tr_domain("example.com"));
        assert!(!is_tr_domain("example.trade"));
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("domainName=example.com").unwrap(),
            ("domainName".to_string(), "example.com".to_string())
        );
        assert_eq!(
            parse_key_value("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
