//! Data frames.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extraction::normalize::IssueRow;
use crate::extraction::site_health::SiteHealthRow;

pub const ISSUES_FRAME_NAME: &str = "issues";
pub const SITE_HEALTH_FRAME_NAME: &str = "site_health";

/// Notice attached to an empty issues frame.
pub const NO_ISSUES_NOTICE: &str = "No issues found for the selected time range/filters";

pub const ISSUE_COLUMNS: &[&str] = &[
    "Time",
    "Issue ID",
    "Title",
    "Priority",
    "Status",
    "Category",
    "Device ID",
    "MAC",
    "Site Name",
    "Rule",
    "Details",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub text: String,
}

/// Typed column values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum FieldValues {
    Time(Vec<DateTime<Utc>>),
    String(Vec<String>),
    Int64(Vec<i64>),
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            FieldValues::Time(v) => v.len(),
            FieldValues::String(v) => v.len(),
            FieldValues::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub values: FieldValues,
}

impl Field {
    pub fn new(name: &str, values: FieldValues) -> Self {
        Self {
            name: name.to_string(),
            values,
        }
    }

    pub fn strings(name: &str, values: Vec<String>) -> Self {
        Self::new(name, FieldValues::String(values))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub name: String,
    pub ref_id: String,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

impl Frame {
    pub fn new(name: &str, ref_id: &str) -> Self {
        Self {
            name: name.to_string(),
            ref_id: ref_id.to_string(),
            fields: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.fields.first().map(|f| f.values.len()).unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn push_notice(&mut self, severity: NoticeSeverity, text: &str) {
        self.notices.push(Notice {
            severity,
            text: text.to_string(),
        });
    }
}

fn millis_to_time(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn string_column(name: &str, rows: &[IssueRow], get: fn(&IssueRow) -> &str) -> Field {
    Field::strings(name, rows.iter().map(|r| get(r).to_string()).collect())
}

/// Issues table in fixed column order. Empty input yields an empty frame
/// carrying the no-data notice.
pub fn issues_frame(ref_id: &str, rows: &[IssueRow]) -> Frame {
    let mut frame = Frame::new(ISSUES_FRAME_NAME, ref_id);
    frame.fields = vec![
        Field::new(
            "Time",
            FieldValues::Time(rows.iter().map(|r| millis_to_time(r.time_ms)).collect()),
        ),
        string_column("Issue ID", rows, |r| r.id.as_str()),
        string_column("Title", rows, |r| r.title.as_str()),
        string_column("Priority", rows, |r| r.severity.as_str()),
        string_column("Status", rows, |r| r.status.as_str()),
        string_column("Category", rows, |r| r.category.as_str()),
        string_column("Device ID", rows, |r| r.device.as_str()),
        string_column("MAC", rows, |r| r.mac.as_str()),
        string_column("Site Name", rows, |r| r.site.as_str()),
        string_column("Rule", rows, |r| r.rule.as_str()),
        string_column("Details", rows, |r| r.details.as_str()),
    ];

    if rows.is_empty() {
        frame.push_notice(NoticeSeverity::Info, NO_ISSUES_NOTICE);
    }
    frame
}

/// Site-health table: `Site Name` followed by one int column per metric.
pub fn site_health_frame(ref_id: &str, metrics: &[String], rows: &[SiteHealthRow]) -> Frame {
    let mut frame = Frame::new(SITE_HEALTH_FRAME_NAME, ref_id);
    frame.fields.push(Field::strings(
        "Site Name",
        rows.iter().map(|r| r.site_name.clone()).collect(),
    ));
    for (idx, metric) in metrics.iter().enumerate() {
        let values = rows
            .iter()
            .map(|r| r.metrics.get(idx).copied().unwrap_or(0))
            .collect();
        frame.fields.push(Field::new(metric, FieldValues::Int64(values)));
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, time_ms: i64) -> IssueRow {
        IssueRow {
            time_ms,
            id: id.to_string(),
            title: "AP down".to_string(),
            severity: "P1".to_string(),
            status: "active".to_string(),
            category: "availability".to_string(),
            device: "10.0.0.1".to_string(),
            mac: "aa:bb".to_string(),
            site: "Building 1".to_string(),
            rule: "ap_down".to_string(),
            details: "AP lost contact".to_string(),
        }
    }

    #[test]
    fn test_issue_columns_in_order() {
        let frame = issues_frame("A", &[row("I-1", 1_700_000_000_000), row("I-2", 0)]);
        let names: Vec<&str> = frame.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ISSUE_COLUMNS);
        assert_eq!(frame.row_count(), 2);
        assert!(frame.notices.is_empty());

        match &frame.field("Time").map(|f| &f.values) {
            Some(FieldValues::Time(times)) => {
                assert_eq!(times[0].timestamp_millis(), 1_700_000_000_000);
                assert_eq!(times[1].timestamp_millis(), 0);
            }
            other => panic!("unexpected time column: {:?}", other),
        }
        assert_eq!(
            frame.field("Priority").map(|f| f.values.clone()),
            Some(FieldValues::String(vec!["P1".to_string(), "P1".to_string()]))
        );
    }

    #[test]
    fn test_empty_issues_frame_has_notice() {
        let frame = issues_frame("A", &[]);
        assert_eq!(frame.row_count(), 0);
        assert_eq!(frame.fields.len(), ISSUE_COLUMNS.len());
        assert_eq!(
            frame.notices,
            vec![Notice {
                severity: NoticeSeverity::Info,
                text: NO_ISSUES_NOTICE.to_string(),
            }]
        );
    }

    #[test]
    fn test_site_health_frame_columns() {
        let metrics = vec!["healthScore".to_string(), "clientCount".to_string()];
        let rows = vec![
            SiteHealthRow {
                site_name: "HQ".to_string(),
                metrics: vec![90, 12],
            },
            SiteHealthRow {
                site_name: "Branch".to_string(),
                metrics: vec![75],
            },
        ];
        let frame = site_health_frame("B", &metrics, &rows);
        assert_eq!(frame.fields.len(), 3);
        assert_eq!(frame.fields[0].name, "Site Name");
        assert_eq!(frame.fields[2].values, FieldValues::Int64(vec![12, 0]));
    }

    #[test]
    fn test_frame_serializes_typed_columns() {
        let frame = issues_frame("A", &[]);
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["refId"], "A");
        assert_eq!(json["fields"][0]["name"], "Time");
        assert_eq!(json["fields"][0]["type"], "time");
        assert_eq!(json["fields"][1]["type"], "string");
        assert_eq!(json["notices"][0]["severity"], "info");
    }
}
