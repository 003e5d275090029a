//! Panel query model.
//!
//! Constructed fresh per inbound query and never mutated; parameter
//! building derives wire parameters from it without side effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{DatasourceError, Result};
use crate::extraction::json_path::{parse_boolish, value_to_i64};

/// Endpoint family a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryKind {
    #[default]
    Alerts,
    SiteHealth,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryModel {
    #[serde(deserialize_with = "lenient_kind")]
    pub query_type: QueryKind,
    #[serde(deserialize_with = "lenient_string")]
    pub ref_id: String,

    #[serde(deserialize_with = "lenient_string")]
    pub site_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub device_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub mac_address: String,

    #[serde(deserialize_with = "string_or_list")]
    pub priority: Vec<String>,
    /// Legacy alias of `priority`.
    #[serde(deserialize_with = "lenient_string")]
    pub severity: String,

    /// Dedicated (multi-value) status filter.
    #[serde(deserialize_with = "string_or_list")]
    pub issue_status: Vec<String>,
    /// Legacy single-value status filter.
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,

    /// Raw value; interpreted with [`parse_boolish`].
    pub ai_driven: Option<Value>,

    #[serde(deserialize_with = "lenient_i64")]
    pub limit: Option<i64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enrich: bool,

    #[serde(deserialize_with = "lenient_string")]
    pub site_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub parent_site_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub site_name: String,
    #[serde(deserialize_with = "string_or_list")]
    pub metrics: Vec<String>,
}

impl QueryModel {
    pub fn from_json(json: &Value) -> Result<Self> {
        serde_json::from_value(json.clone()).map_err(|e| DatasourceError::InvalidQuery(e.to_string()))
    }

    /// Row cap: the positive `limit`, else the supplied default.
    pub fn row_limit(&self, default: usize) -> usize {
        match self.limit {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
            _ => default,
        }
    }

    pub fn ai_driven_flag(&self) -> Option<bool> {
        self.ai_driven.as_ref().and_then(parse_boolish)
    }
}

/// Caller-supplied query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn from_ms(&self) -> i64 {
        self.from.timestamp_millis()
    }

    pub fn to_ms(&self) -> i64 {
        self.to.timestamp_millis()
    }
}

/// Accepts a string (comma-separated) or an array of strings.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Value::Array(arr) => arr
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .collect(),
        _ => Vec::new(),
    };
    Ok(items.into_iter().filter(|s: &String| !s.is_empty()).collect())
}

/// Null and non-string values read as absent (empty). A one-element array
/// holding a string is accepted for the legacy single-value fields.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Array(arr) => arr
            .first()
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        _ => String::new(),
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        v => Some(value_to_i64(&v)),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_boolish(&value).unwrap_or(false))
}

/// Unknown or blank query types fall back to the alerts query.
fn lenient_kind<'de, D>(deserializer: D) -> std::result::Result<QueryKind, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str().map(str::trim) {
        Some("siteHealth") => QueryKind::SiteHealth,
        _ => QueryKind::Alerts,
    })
}
