//! Endpoint URL construction.
//!
//! Any path segments in front of the `dna` namespace segment (reverse-proxy
//! prefixes) are preserved and prepended to every endpoint path. Without a
//! `dna` segment no prefix is applied.

use reqwest::Url;

use crate::error::{DatasourceError, Result};

/// Path segment that anchors the vendor API namespace.
pub const ANCHOR_SEGMENT: &str = "dna";

pub const TOKEN_PATH: &str = "/dna/system/api/v1/auth/token";
pub const ISSUES_PATH: &str = "/dna/data/api/v1/assuranceIssues";
pub const SITE_PATH: &str = "/dna/intent/api/v1/site";
pub const SITE_HEALTH_PATH: &str = "/dna/intent/api/v1/site-health";

/// Path prefix preceding the anchor segment, e.g. `/proxy/dnac`.
pub fn path_prefix(base: &Url) -> String {
    let segments: Vec<&str> = base
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.iter().position(|seg| *seg == ANCHOR_SEGMENT) {
        Some(idx) => segments[..idx]
            .iter()
            .map(|seg| format!("/{}", seg))
            .collect(),
        None => String::new(),
    }
}

/// Build an absolute endpoint URL from the configured base URL.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| DatasourceError::Configuration(format!("invalid baseUrl: {}", e)))?;
    let prefix = path_prefix(&url);
    url.set_path(&format!("{}{}", prefix, path));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

pub fn token_url(base_url: &str) -> Result<String> {
    endpoint_url(base_url, TOKEN_PATH)
}

pub fn issues_url(base_url: &str) -> Result<String> {
    endpoint_url(base_url, ISSUES_PATH)
}

pub fn site_url(base_url: &str) -> Result<String> {
    endpoint_url(base_url, SITE_PATH)
}

pub fn site_health_url(base_url: &str) -> Result<String> {
    endpoint_url(base_url, SITE_HEALTH_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issues_url_data_assurance() {
        assert_eq!(
            issues_url("https://example.local/dna/intent/api/v1").unwrap(),
            "https://example.local/dna/data/api/v1/assuranceIssues"
        );
    }

    #[test]
    fn test_issues_url_prefix_preserved() {
        assert_eq!(
            issues_url("https://gw/proxy/dnac/dna").unwrap(),
            "https://gw/proxy/dnac/dna/data/api/v1/assuranceIssues"
        );
    }

    #[test]
    fn test_no_anchor_means_no_prefix() {
        assert_eq!(
            token_url("https://gw:8443/proxy/dnac").unwrap(),
            "https://gw:8443/dna/system/api/v1/auth/token"
        );
        assert_eq!(
            site_url("https://host").unwrap(),
            "https://host/dna/intent/api/v1/site"
        );
    }

    #[test]
    fn test_prefix_with_token_and_site_health() {
        assert_eq!(
            token_url("https://gw/a/b/dna/intent/api/v1").unwrap(),
            "https://gw/a/b/dna/system/api/v1/auth/token"
        );
        assert_eq!(
            site_health_url("http://gw/a/dna").unwrap(),
            "http://gw/a/dna/intent/api/v1/site-health"
        );
    }

    #[test]
    fn test_query_string_dropped() {
        assert_eq!(
            issues_url("https://host/dna/intent?x=1#frag").unwrap(),
            "https://host/dna/data/api/v1/assuranceIssues"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = issues_url("::not-a-url").unwrap_err();
        assert!(err.is_configuration());
    }
}
