//! Structured output returned by the language model.
//!
//! Only `segments` is load-bearing: everything else is best-effort, and each
//! field deserializes leniently so one odd value never discards a whole
//! analysis.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structural role of a [`Segment`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Title,
    Author,
    Abstract,
    Keywords,
    #[serde(rename = "heading_l1")]
    HeadingL1,
    #[serde(rename = "heading_l2")]
    HeadingL2,
    Body,
    Table,
    Figure,
    Footnote,
    References,
    Jel,
    /// Any tag outside the known set.
    #[default]
    #[serde(other)]
    Unknown,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Title => "title",
            SegmentKind::Author => "author",
            SegmentKind::Abstract => "abstract",
            SegmentKind::Keywords => "keywords",
            SegmentKind::HeadingL1 => "heading_l1",
            SegmentKind::HeadingL2 => "heading_l2",
            SegmentKind::Body => "body",
            SegmentKind::Table => "table",
            SegmentKind::Figure => "figure",
            SegmentKind::Footnote => "footnote",
            SegmentKind::References => "references",
            SegmentKind::Jel => "jel",
            SegmentKind::Unknown => "unknown",
        }
    }
}

/// One structurally classified unit of the reformatted document.
///
/// `content` is kept as raw JSON because models return strings, lists of
/// strings, or lists of objects depending on the segment kind. Use
/// [`Segment::text`] or [`Segment::items`] to flatten it for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type", default)]
    pub kind: SegmentKind,
    #[serde(default)]
    pub content: Value,
    /// Table / figure title, kept out of `data`.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub caption: Option<String>,
    /// Data source note printed under a table or figure.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<String>,
    /// Table cells, header row first.
    #[serde(
        default,
        deserialize_with = "lenient_grid",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Vec<Vec<String>>>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub style: Option<String>,
}

impl Segment {
    pub fn new(kind: SegmentKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: Value::String(content.into()),
            ..Default::default()
        }
    }

    /// Build a segment from any JSON value, falling back to an `unknown`
    /// segment that carries the value as its content.
    pub fn from_value(value: Value) -> Self {
        if value.is_object() {
            if let Ok(segment) = serde_json::from_value::<Segment>(value.clone()) {
                return segment;
            }
        }
        Segment {
            kind: SegmentKind::Unknown,
            content: value,
            ..Default::default()
        }
    }

    /// Content flattened to display text.
    ///
    /// Strings pass through, numbers are formatted, objects join their
    /// non-empty values with ". ", and arrays put one flattened item per line.
    pub fn text(&self) -> String {
        self.items().join("\n")
    }

    /// Content flattened to a list of display lines (one per array item).
    pub fn items(&self) -> Vec<String> {
        match &self.content {
            Value::Array(items) => items
                .iter()
                .map(flatten_value)
                .filter(|s| !s.is_empty())
                .collect(),
            Value::Null => Vec::new(),
            other => {
                let text = flatten_value(other);
                if text.is_empty() { Vec::new() } else { vec![text] }
            }
        }
    }

    pub fn has_table_data(&self) -> bool {
        self.data.as_ref().is_some_and(|rows| !rows.is_empty())
    }
}

/// Flatten a JSON value into display text.
pub fn flatten_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Object(map) => map
            .values()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(". "),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Bibliographic metadata the model extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub authors: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub r#abstract: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub keywords: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub jel_codes: Option<String>,
}

/// Compliance summary reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    #[serde(default, deserialize_with = "best_effort")]
    pub title_count: Option<u64>,
    #[serde(default, deserialize_with = "best_effort")]
    pub abstract_count: Option<u64>,
    #[serde(default, deserialize_with = "string_list")]
    pub major_changes: Vec<String>,
    #[serde(default, deserialize_with = "best_effort")]
    pub is_compliant: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub compliance_summary: Option<String>,
}

/// The parsed, shape-checked model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "best_effort")]
    pub metadata: Option<Metadata>,
    #[serde(rename = "statusReport", default, deserialize_with = "best_effort")]
    pub status_report: Option<StatusReport>,
    #[serde(deserialize_with = "segment_list")]
    pub segments: Vec<Segment>,
    #[serde(alias = "auditAlerts", default, deserialize_with = "string_list")]
    pub audit_alerts: Vec<String>,
    #[serde(
        rename = "titleSuggestions",
        alias = "title_suggestions",
        default,
        deserialize_with = "string_list"
    )]
    pub title_suggestions: Vec<String>,
}

impl AnalysisResult {
    /// First segment of the given kind.
    pub fn first_of(&self, kind: SegmentKind) -> Option<&Segment> {
        self.segments.iter().find(|s| s.kind == kind)
    }
}

fn best_effort<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| flatten_value(&v)).filter(|s| !s.is_empty()))
}

fn lenient_grid<'de, D>(deserializer: D) -> Result<Option<Vec<Vec<String>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Array(rows)) = value else {
        return Ok(None);
    };
    let grid = rows
        .iter()
        .filter_map(|row| match row {
            Value::Array(cells) => Some(cells.iter().map(flatten_value).collect()),
            _ => None,
        })
        .collect();
    Ok(Some(grid))
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn segment_list<'de, D>(deserializer: D) -> Result<Vec<Segment>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(items.into_iter().map(Segment::from_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_and_unknown_kinds() {
        let seg: Segment = serde_json::from_value(json!({"type": "heading_l1", "content": "I. Intro"})).unwrap();
        assert_eq!(seg.kind, SegmentKind::HeadingL1);

        let seg: Segment = serde_json::from_value(json!({"type": "equation", "content": "x"})).unwrap();
        assert_eq!(seg.kind, SegmentKind::Unknown);
    }

    #[test]
    fn table_cells_are_stringified() {
        let seg: Segment = serde_json::from_value(json!({
            "type": "table",
            "content": "",
            "caption": "Table 1",
            "data": [["Var", "Mean"], ["ROA", 0.12]]
        }))
        .unwrap();
        assert_eq!(seg.caption.as_deref(), Some("Table 1"));
        assert_eq!(seg.data.unwrap()[1], vec!["ROA".to_string(), "0.12".to_string()]);
    }

    #[test]
    fn table_without_data_or_caption() {
        let seg: Segment = serde_json::from_value(json!({"type": "table", "data": "oops"})).unwrap();
        assert!(seg.data.is_none());
        assert!(seg.caption.is_none());
        assert!(!seg.has_table_data());
    }

    #[test]
    fn non_object_segment_becomes_unknown() {
        let seg = Segment::from_value(json!("stray paragraph"));
        assert_eq!(seg.kind, SegmentKind::Unknown);
        assert_eq!(seg.text(), "stray paragraph");
    }

    #[test]
    fn flatten_reference_objects() {
        let seg: Segment = serde_json::from_value(json!({
            "type": "references",
            "content": [
                {"author": "Fama, E.", "year": "1970", "title": ""},
                "Jensen, M. (1976)"
            ]
        }))
        .unwrap();
        assert_eq!(seg.items(), vec!["Fama, E.. 1970", "Jensen, M. (1976)"]);
    }

    #[test]
    fn best_effort_fields_tolerate_garbage() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "metadata": "not an object",
            "statusReport": {"titleCount": "twelve", "isCompliant": true},
            "segments": [],
            "auditAlerts": ["Title too long"],
            "titleSuggestions": "Shorter title"
        }))
        .unwrap();
        assert!(result.metadata.is_none());
        let report = result.status_report.unwrap();
        assert_eq!(report.title_count, None);
        assert_eq!(report.is_compliant, Some(true));
        assert_eq!(result.audit_alerts, vec!["Title too long"]);
        assert_eq!(result.title_suggestions, vec!["Shorter title"]);
    }

    #[test]
    fn snake_case_audit_alerts_accepted() {
        let result: AnalysisResult =
            serde_json::from_value(json!({"segments": [], "audit_alerts": ["JEL missing"]})).unwrap();
        assert_eq!(result.audit_alerts, vec!["JEL missing"]);
    }
}
