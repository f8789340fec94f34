use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StatlensError;

/// Identifier of a dataset as exposed by the upstream provider (e.g. `EPA`, `IPC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetCode(String);

impl DatasetCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetCode {
    type Err = StatlensError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !is_valid {
            return Err(StatlensError::InvalidDatasetCode(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Opaque provider-supplied value. Records are carried as-is and never
/// validated against a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(value) => Some(*value as f64),
            FieldValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

pub type Record = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "cod_ioe", skip_serializing_if = "Option::is_none")]
    pub statistical_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataResponse {
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(default)]
    pub dataset_name: String,
    pub record_count: u64,
    pub raw_data: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RawDataResponse {
    /// Whether the advertised `record_count` agrees with the payload length.
    /// Purely informational; mismatches are passed through untouched.
    pub fn count_matches(&self) -> bool {
        self.record_count == self.raw_data.len() as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    #[serde(default)]
    pub total_series: u64,
    #[serde(default)]
    pub total_data_points: u64,
    #[serde(default)]
    pub data_type_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub period_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub unit_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub metadata_enriched: bool,
    #[serde(default)]
    pub units_enriched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingSummary {
    pub fn is_enriched(&self) -> bool {
        self.metadata_enriched || self.units_enriched
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDataResponse {
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(default)]
    pub dataset_name: String,
    pub record_count: u64,
    pub processed_data: Vec<Record>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, alias = "processing_summary")]
    pub summary: ProcessingSummary,
    /// Naive timestamps are read as UTC; anything unreadable becomes `None`.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub retrieved_at: Option<DateTime<Utc>>,
    /// Numeric versions are kept in their textual form.
    #[serde(
        default,
        alias = "metadata_version",
        deserialize_with = "lenient_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FieldValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(FieldValue::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|stamp| stamp.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            text.parse::<NaiveDateTime>()
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn lenient_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<FieldValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(FieldValue::Text(version)) => Some(version),
        Some(FieldValue::Integer(version)) => Some(version.to_string()),
        Some(FieldValue::Float(version)) => Some(version.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_dataset_code_trims() {
        let code: DatasetCode = "  EPA ".parse().unwrap();
        assert_eq!(code.as_str(), "EPA");
    }

    #[test]
    fn parse_dataset_code_rejects_path_segments() {
        let err = "EPA/../admin".parse::<DatasetCode>().unwrap_err();
        assert_matches!(err, StatlensError::InvalidDatasetCode(_));
        let err = "   ".parse::<DatasetCode>().unwrap_err();
        assert_matches!(err, StatlensError::InvalidDatasetCode(_));
    }

    #[test]
    fn dataset_accepts_backend_field_names() {
        let dataset: Dataset = serde_json::from_str(
            r#"{"codigo":"IPC","nombre":"Índice de Precios de Consumo","cod_ioe":"30138","url":null}"#,
        )
        .unwrap();
        assert_eq!(dataset.code, "IPC");
        assert_eq!(dataset.statistical_code.as_deref(), Some("30138"));
        assert!(dataset.url.is_none());
    }

    #[test]
    fn records_keep_opaque_values() {
        let raw: RawDataResponse = serde_json::from_str(
            r#"{"code":"EPA","dataset_name":"Encuesta","record_count":2,
                "raw_data":[{"COD":"EPA1","Valor":12.5,"Data":[{"Anyo":2023}]},{"Secreto":false,"x":null}]}"#,
        )
        .unwrap();
        assert!(raw.count_matches());
        assert_eq!(raw.raw_data[0]["COD"].as_str(), Some("EPA1"));
        assert_eq!(raw.raw_data[0]["Valor"].as_f64(), Some(12.5));
        assert_matches!(raw.raw_data[0]["Data"], FieldValue::List(_));
        assert!(raw.raw_data[1]["x"].is_null());
    }
}
