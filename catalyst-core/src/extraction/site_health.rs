//! Site-health record handling.

use serde_json::Value;

use crate::extraction::json_path::{first_non_empty_str, resolve_json_path, value_to_i64, RawRecord};

pub const SITE_NAME_KEYS: &[&str] = &["siteName", "name"];

/// One site-health row: the site name plus the selected metric values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteHealthRow {
    pub site_name: String,
    pub metrics: Vec<i64>,
}

/// Read one metric as a 64-bit integer. A plain key is tried first, then a
/// dotted path into nested objects. Missing or malformed values are 0.
pub fn site_metric(record: &RawRecord, metric: &str) -> i64 {
    if let Some(v) = record.get(metric) {
        return value_to_i64(v);
    }
    let mut parts = metric.splitn(2, '.');
    match (parts.next(), parts.next()) {
        (Some(head), Some(rest)) => record
            .get(head)
            .and_then(|v| resolve_json_path(v, rest))
            .map(value_to_i64)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Exact-match filter on `parentSiteName` / `siteName`; empty filters pass.
pub fn matches_site_filters(record: &RawRecord, parent_site_name: &str, site_name: &str) -> bool {
    let field_is = |key: &str, expected: &str| {
        expected.is_empty() || record.get(key).and_then(Value::as_str) == Some(expected)
    };
    field_is("parentSiteName", parent_site_name) && field_is("siteName", site_name)
}

pub fn site_health_row(record: &RawRecord, metrics: &[String]) -> SiteHealthRow {
    SiteHealthRow {
        site_name: first_non_empty_str(record, SITE_NAME_KEYS),
        metrics: metrics.iter().map(|m| site_metric(record, m)).collect(),
    }
}
