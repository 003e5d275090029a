//! Instance settings.
//!
//! Parsed once per inbound request from the plain JSON settings and the
//! decrypted secure map supplied by the host. Immutable afterwards.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DatasourceError, Result};

/// Settings for one configured connection to a Catalyst Center backend.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InstanceSettings {
    pub base_url: String,
    pub insecure_skip_verify: bool,
    pub username: String,
    pub password: String,
    /// Manual token; when set it bypasses login and the token cache.
    pub api_token: String,
}

impl std::fmt::Debug for InstanceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceSettings")
            .field("base_url", &self.base_url)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("api_token", &redacted(&self.api_token))
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonData {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    insecure_skip_verify: Option<bool>,
    #[serde(default)]
    tls_skip_verify: Option<bool>,
}

impl InstanceSettings {
    /// Parse settings from the host-supplied JSON and secure map.
    ///
    /// Unknown JSON keys are ignored. A missing or non-http(s) base URL is a
    /// configuration error.
    pub fn parse(json_data: &Value, secure: &HashMap<String, String>) -> Result<Self> {
        let jd: JsonData = if json_data.is_null() {
            JsonData::default()
        } else {
            serde_json::from_value(json_data.clone())
                .map_err(|e| DatasourceError::Configuration(format!("invalid jsonData: {}", e)))?
        };

        let base_url = jd.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(DatasourceError::Configuration(
                "baseUrl is not configured".to_string(),
            ));
        }
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| DatasourceError::Configuration(format!("invalid baseUrl: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DatasourceError::Configuration(format!(
                "unsupported baseUrl scheme: {}",
                parsed.scheme()
            )));
        }

        let secret = |key: &str| secure.get(key).cloned().unwrap_or_default();

        Ok(Self {
            base_url,
            insecure_skip_verify: jd
                .insecure_skip_verify
                .or(jd.tls_skip_verify)
                .unwrap_or(false),
            username: secret("username"),
            password: secret("password"),
            api_token: secret("apiToken"),
        })
    }

    /// The override token, if one is configured (whitespace trimmed).
    pub fn override_token(&self) -> Option<&str> {
        let t = self.api_token.trim();
        (!t.is_empty()).then_some(t)
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
