//! Wire parameter building.
//!
//! Translates a [`QueryModel`] into the ordered query-string parameters the
//! list endpoints expect. Values are trimmed, checked against allow-lists
//! and case-normalized; a filter left with no valid value is omitted rather
//! than rejected. No parameter, once included, is empty.

use crate::extraction::json_path::{first_non_empty_str, RawRecord};
use crate::extraction::normalize::SEVERITY_KEYS;
use crate::query::model::QueryModel;

pub const ALLOWED_PRIORITIES: &[&str] = &["P1", "P2", "P3", "P4"];
pub const ALLOWED_ISSUE_STATUSES: &[&str] = &["ACTIVE", "RESOLVED", "IGNORED"];

/// Page-size bounds for one endpoint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub default: usize,
    pub min: usize,
    pub max: usize,
}

pub const ISSUES_PAGE_BOUNDS: PageBounds = PageBounds {
    default: 100,
    min: 1,
    max: 1000,
};

pub const SITE_HEALTH_PAGE_BOUNDS: PageBounds = PageBounds {
    default: 25,
    min: 1,
    max: 50,
};

impl PageBounds {
    /// Non-positive sizes get the default; others are clamped into range.
    pub fn clamp(&self, page_size: i64) -> usize {
        if page_size <= 0 {
            return self.default;
        }
        usize::try_from(page_size)
            .unwrap_or(self.max)
            .clamp(self.min, self.max)
    }
}

/// Ordered key/value pairs for URL query-string encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireParams(Vec<(String, String)>);

impl WireParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value. Empty values are dropped.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        self.remove(key);
        if !value.is_empty() {
            self.0.push((key.to_string(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_allowed(value: &str, allowed: &[&str]) -> Option<String> {
    let v = value.trim().to_uppercase();
    allowed.contains(&v.as_str()).then_some(v)
}

/// Normalized priority from the primary field, else the legacy severity.
pub fn normalize_priority(priority: &str, severity: &str) -> Option<String> {
    normalize_allowed(priority, ALLOWED_PRIORITIES)
        .or_else(|| normalize_allowed(severity, ALLOWED_PRIORITIES))
}

/// Normalized issue status from the primary field, else the legacy status.
pub fn normalize_issue_status(issue_status: &str, status: &str) -> Option<String> {
    normalize_allowed(issue_status, ALLOWED_ISSUE_STATUSES)
        .or_else(|| normalize_allowed(status, ALLOWED_ISSUE_STATUSES))
}

fn dedup_in_order(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Valid priorities: the `priority` list if any entry survives, else the
/// legacy `severity` field.
pub fn valid_priorities(q: &QueryModel) -> Vec<String> {
    let primary = dedup_in_order(
        q.priority
            .iter()
            .filter_map(|p| normalize_allowed(p, ALLOWED_PRIORITIES)),
    );
    if !primary.is_empty() {
        return primary;
    }
    normalize_allowed(&q.severity, ALLOWED_PRIORITIES)
        .into_iter()
        .collect()
}

/// Valid statuses: the dedicated `issueStatus` list if any entry survives,
/// else the legacy single `status` field.
pub fn valid_statuses(q: &QueryModel) -> Vec<String> {
    let primary = dedup_in_order(
        q.issue_status
            .iter()
            .filter_map(|s| normalize_allowed(s, ALLOWED_ISSUE_STATUSES)),
    );
    if !primary.is_empty() {
        return primary;
    }
    normalize_allowed(&q.status, ALLOWED_ISSUE_STATUSES)
        .into_iter()
        .collect()
}

fn set_trimmed(params: &mut WireParams, key: &str, value: &str) {
    let v = value.trim();
    if !v.is_empty() {
        params.set(key, v);
    }
}

/// Parameters for one page of the assurance issues list.
///
/// `start_ms`/`end_ms` are sent only when strictly positive; `offset` is
/// 1-based and clamped to at least 1.
pub fn build_issue_params(
    q: &QueryModel,
    start_ms: i64,
    end_ms: i64,
    page_size: i64,
    offset: i64,
) -> WireParams {
    let mut params = WireParams::new();

    params.set("limit", ISSUES_PAGE_BOUNDS.clamp(page_size).to_string());
    params.set("offset", offset.max(1).to_string());

    if start_ms > 0 {
        params.set("startTime", start_ms.to_string());
    }
    if end_ms > 0 {
        params.set("endTime", end_ms.to_string());
    }

    set_trimmed(&mut params, "siteId", &q.site_id);
    set_trimmed(&mut params, "deviceId", &q.device_id);
    set_trimmed(&mut params, "macAddress", &q.mac_address);

    let priorities = valid_priorities(q);
    if !priorities.is_empty() {
        params.set("priority", priorities.join(","));
    }

    let statuses = valid_statuses(q);
    if !statuses.is_empty() {
        params.set("status", statuses.join(",").to_lowercase());
    }

    if let Some(flag) = q.ai_driven_flag() {
        params.set("aiDriven", flag.to_string());
    }

    params
}

/// Parameters for one page of the site-health list. `end_ms` becomes the
/// `timestamp` parameter when strictly positive.
pub fn build_site_health_params(
    q: &QueryModel,
    end_ms: i64,
    page_size: i64,
    offset: i64,
) -> WireParams {
    let mut params = WireParams::new();

    params.set("limit", SITE_HEALTH_PAGE_BOUNDS.clamp(page_size).to_string());
    params.set("offset", offset.max(1).to_string());

    set_trimmed(&mut params, "siteType", &q.site_type);
    set_trimmed(&mut params, "parentSiteName", &q.parent_site_name);
    set_trimmed(&mut params, "siteName", &q.site_name);

    if end_ms > 0 {
        params.set("timestamp", end_ms.to_string());
    }

    params
}

/// Client-side priority filter, used when more than one priority is
/// selected: the upstream API does not reliably OR priorities, so the wire
/// parameter is dropped and records are filtered after each page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityFilter {
    allowed: Vec<String>,
}

impl PriorityFilter {
    pub fn for_query(q: &QueryModel) -> Option<Self> {
        let allowed = valid_priorities(q);
        (allowed.len() > 1).then_some(Self { allowed })
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        let p = first_non_empty_str(record, SEVERITY_KEYS).trim().to_uppercase();
        self.allowed.contains(&p)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}
