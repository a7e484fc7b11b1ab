use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MasterOId,
    ContentLaunchDate,
    Challenges,
    CompletionStatus,
    CompletionDate,
    CompletedInDays,
    Attempts,
    Score,
    MaxScore,
    TimeSpent,
    MicroskillName,
    LoginStatus,
    LastLoginDate,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Self::MasterOId,
        Self::ContentLaunchDate,
        Self::Challenges,
        Self::CompletionStatus,
        Self::CompletionDate,
        Self::CompletedInDays,
        Self::Attempts,
        Self::Score,
        Self::MaxScore,
        Self::TimeSpent,
        Self::MicroskillName,
        Self::LoginStatus,
        Self::LastLoginDate,
    ];

    /// Display name, which doubles as the row key and CSV column title.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MasterOId => "Master-O ID",
            Self::ContentLaunchDate => "Content launch date",
            Self::Challenges => "Challenges",
            Self::CompletionStatus => "Completion Status",
            Self::CompletionDate => "Completion Date",
            Self::CompletedInDays => "Completed In Days",
            Self::Attempts => "Attempts",
            Self::Score => "Score",
            Self::MaxScore => "Max Score",
            Self::TimeSpent => "Time Spent",
            Self::MicroskillName => "Microskill Name",
            Self::LoginStatus => "Login Status",
            Self::LastLoginDate => "Last Login Date",
        }
    }

    /// Exact, case-sensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.as_str() == name)
    }

    /// Returns the names in `names` that are not recognized metrics, in input order.
    pub fn unknown_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| Self::from_name(name).is_none())
            .map(ToString::to_string)
            .collect()
    }
}

/// A single generated cell. `Empty` is the placeholder written as `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Empty,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Rendering used for tabular export.
    pub fn to_field(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Empty => String::new(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(value) => serializer.serialize_str(value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Empty => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCell {
            Integer(i64),
            Text(String),
        }

        Ok(match RawCell::deserialize(deserializer)? {
            RawCell::Integer(value) => Self::Integer(value),
            RawCell::Text(value) if value.is_empty() => Self::Empty,
            RawCell::Text(value) => Self::Text(value),
        })
    }
}

/// One generated record: metric → value, in column order.
///
/// Serializes as a JSON object whose key order is the column order, and
/// deserializes preserving document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(Metric, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(key, _)| *key == metric)
            .map(|(_, value)| value)
    }

    /// Writes `value` under `metric`. An existing column keeps its position.
    pub fn set(&mut self, metric: Metric, value: CellValue) {
        match self.cells.iter_mut().find(|(key, _)| *key == metric) {
            Some(slot) => slot.1 = value,
            None => self.cells.push((metric, value)),
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.cells.iter().map(|(metric, _)| *metric)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (metric, value) in &self.cells {
            map.serialize_entry(metric.as_str(), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object keyed by metric name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((name, value)) = access.next_entry::<String, CellValue>()? {
                    let metric = Metric::from_name(&name).ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown metric column {name:?}"))
                    })?;
                    row.set(metric, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub name: String,
    pub user_id: Option<String>,
    pub metrics: Vec<String>,
    pub filters: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A report joined with its owner's display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    #[serde(flatten)]
    pub report: Report,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetail {
    #[serde(flatten)]
    pub report: Report,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub id: String,
    pub report_id: String,
    pub data: Vec<Row>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub filters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportResponse {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportResponse {
    pub message: String,
    pub data: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailReportPayload {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

/// CSV payload ready to hand to a download or mail attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}
