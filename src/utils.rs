// src/utils.rs
use crate::types::CertFinderError;
use regex::Regex;

/// Hostname grammar accepted as a target: lowercase labels of 1-63
/// alphanumerics or hyphens, no leading/trailing hyphen, at least one dot.
const DOMAIN_PATTERN: &str =
    r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$";

/// Check if a string is a valid target domain
pub fn is_valid_domain(domain: &str) -> Result<bool, CertFinderError> {
    if domain.is_empty() || domain.len() > 253 {
        return Ok(false);
    }

    let re = Regex::new(DOMAIN_PATTERN)
        .map_err(|e| CertFinderError::ParseError(format!("Regex error: {}", e)))?;

    Ok(re.is_match(domain))
}

/// Reduce a domain to its registrable base (effective TLD plus one label)
pub fn registrable_base(domain: &str) -> Result<String, CertFinderError> {
    psl::domain_str(domain)
        .map(str::to_string)
        .ok_or_else(|| CertFinderError::InvalidDomain(format!("{} has no registrable base", domain)))
}

/// Validate a user supplied domain and turn it into the `%.<base>` wildcard
/// used against both the aggregator and the local store.
pub fn sanitize_domain(input: &str) -> Result<String, CertFinderError> {
    if !is_valid_domain(input)? {
        return Err(CertFinderError::InvalidDomain(input.to_string()));
    }

    let base = registrable_base(input)?;
    Ok(format!("%.{}", base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("example.com").unwrap());
        assert!(is_valid_domain("sub.example.com").unwrap());
        assert!(is_valid_domain("a-b.example.co.uk").unwrap());
        assert!(!is_valid_domain("example").unwrap());
        assert!(!is_valid_domain("").unwrap());
        assert!(!is_valid_domain("-example.com").unwrap());
        assert!(!is_valid_domain("example-.com").unwrap());
        assert!(!is_valid_domain("Example.com").unwrap());
        assert!(!is_valid_domain("exa_mple.com").unwrap());
        assert!(!is_valid_domain("example..com").unwrap());
    }

    #[test]
    fn test_label_length_limit() {
        let ok = format!("{}.com", "a".repeat(63));
        let too_long = format!("{}.com", "a".repeat(64));
        assert!(is_valid_domain(&ok).unwrap());
        assert!(!is_valid_domain(&too_long).unwrap());
    }

    #[test]
    fn test_sanitize_reduces_to_registrable_base() {
        assert_eq!(sanitize_domain("example.com").unwrap(), "%.example.com");
        assert_eq!(sanitize_domain("www.example.com").unwrap(), "%.example.com");
        assert_eq!(sanitize_domain("a.b.example.co.uk").unwrap(), "%.example.co.uk");
    }

    #[test]
    fn test_sanitize_rejects_invalid_input() {
        for input in ["", "localhost", "bad domain.com", "UPPER.com", "-x.com", "x.com."] {
            match sanitize_domain(input) {
                Err(CertFinderError::InvalidDomain(_)) => {}
                other => panic!("expected invalid domain for {:?}, got {:?}", input, other),
            }
        }
    }
}
