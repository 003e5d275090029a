//! Site-name enrichment.
//!
//! Resolves site ids to display names with one batched lookup. Lookup
//! failures degrade to an empty mapping so rows keep their raw ids.

use std::collections::HashMap;

use reqwest::Url;
use serde::Deserialize;

use crate::auth::token::AUTH_TOKEN_HEADER;
use crate::config::endpoints::site_url;
use crate::error::{DatasourceError, Result};
use crate::logging::structured::LogContext;
use crate::pipeline::context::CredentialSource;
use crate::transport::http::{HttpRequest, HttpTransport};

#[derive(Debug, Default, Deserialize)]
struct SiteEnvelope {
    #[serde(default)]
    response: Vec<SiteRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    site_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl SiteRecord {
    fn into_pair(self) -> Option<(String, String)> {
        let id = self.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
        let name = [self.site_name, self.name]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())?;
        Some((id, name))
    }
}

/// Map site ids to names. Never fails: errors are logged and an empty map
/// is returned.
pub fn resolve_site_names(
    ids: &[String],
    credentials: CredentialSource<'_>,
    transport: &dyn HttpTransport,
    ctx: &LogContext,
) -> HashMap<String, String> {
    if ids.is_empty() {
        return HashMap::new();
    }

    match lookup_sites(ids, credentials, transport, ctx) {
        Ok(names) => {
            log::info!(
                "{} SITE_ENRICHMENT_COMPLETE requested={} resolved={}",
                ctx,
                ids.len(),
                names.len()
            );
            names
        }
        Err(e) => {
            log::warn!(
                "{} SITE_ENRICHMENT_FAILED requested={} error={}",
                ctx,
                ids.len(),
                e
            );
            HashMap::new()
        }
    }
}

fn lookup_sites(
    ids: &[String],
    credentials: CredentialSource<'_>,
    transport: &dyn HttpTransport,
    ctx: &LogContext,
) -> Result<HashMap<String, String>> {
    let base = site_url(&credentials.settings.base_url)?;
    let url = Url::parse_with_params(&base, &[("siteId", ids.join(","))])
        .map_err(|e| DatasourceError::Enrichment(format!("invalid site url: {}", e)))?;

    let token = credentials.token(transport, ctx)?;
    let request = HttpRequest::get(url.as_str())
        .header(AUTH_TOKEN_HEADER, token)
        .header("Accept", "application/json");

    let resp = transport
        .execute(&request)
        .map_err(|e| DatasourceError::Enrichment(e.message))?;
    if !resp.is_success() {
        return Err(DatasourceError::Enrichment(format!(
            "site endpoint returned {}: {}",
            resp.status, resp.body
        )));
    }

    let envelope: SiteEnvelope = serde_json::from_str(&resp.body)
        .map_err(|e| DatasourceError::Enrichment(format!("undecodable site response: {}", e)))?;

    Ok(envelope
        .response
        .into_iter()
        .filter_map(SiteRecord::into_pair)
        .collect())
}
