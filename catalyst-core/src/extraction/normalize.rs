//! Issue record normalization.
//!
//! Each logical attribute has a fixed, ordered list of candidate source
//! keys. The first present, correctly-typed, non-empty (strings) or
//! non-zero (numbers) value wins; otherwise the attribute is empty/zero.

use std::collections::HashMap;

use serde::Serialize;

use crate::extraction::json_path::{first_non_empty_str, first_non_zero_i64, RawRecord};

pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "firstOccurredTime", "startTime"];
pub const ID_KEYS: &[&str] = &["issueId", "id", "instanceId"];
pub const TITLE_KEYS: &[&str] = &["name", "title", "issueTitle"];
pub const SEVERITY_KEYS: &[&str] = &["priority", "severity"];
pub const STATUS_KEYS: &[&str] = &["issueStatus", "status"];
pub const CATEGORY_KEYS: &[&str] = &["category", "type"];
pub const DEVICE_KEYS: &[&str] = &["deviceId", "deviceIp", "device"];
pub const MAC_KEYS: &[&str] = &["macAddress", "clientMac"];
pub const SITE_KEYS: &[&str] = &["siteId"];
pub const RULE_KEYS: &[&str] = &["ruleId"];
pub const DETAILS_KEYS: &[&str] = &["description", "details", "issueDescription"];

/// One normalized issue row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRow {
    /// Epoch milliseconds.
    pub time_ms: i64,
    pub id: String,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub category: String,
    pub device: String,
    pub mac: String,
    /// Resolved site name, or the raw site id when unresolved.
    pub site: String,
    pub rule: String,
    pub details: String,
}

/// Normalize one raw issue record.
///
/// `window_start_ms` fills in the timestamp when no candidate key carries
/// one. `site_names` maps site ids to display names; unknown ids are kept
/// as-is.
pub fn normalize_issue(
    record: &RawRecord,
    window_start_ms: i64,
    site_names: &HashMap<String, String>,
) -> IssueRow {
    let time_ms = match first_non_zero_i64(record, TIMESTAMP_KEYS) {
        0 => window_start_ms,
        t => t,
    };

    let site_id = first_non_empty_str(record, SITE_KEYS);
    let site = site_names.get(&site_id).cloned().unwrap_or(site_id);

    IssueRow {
        time_ms,
        id: first_non_empty_str(record, ID_KEYS),
        title: first_non_empty_str(record, TITLE_KEYS),
        severity: first_non_empty_str(record, SEVERITY_KEYS),
        status: first_non_empty_str(record, STATUS_KEYS),
        category: first_non_empty_str(record, CATEGORY_KEYS),
        device: first_non_empty_str(record, DEVICE_KEYS),
        mac: first_non_empty_str(record, MAC_KEYS),
        site,
        rule: first_non_empty_str(record, RULE_KEYS),
        details: first_non_empty_str(record, DETAILS_KEYS),
    }
}

/// Distinct, non-empty site ids referenced by the records, sorted.
pub fn collect_site_ids(records: &[RawRecord]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .map(|r| first_non_empty_str(r, SITE_KEYS))
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
