use assert_matches::assert_matches;

use statlens::domain::{
    Dataset, DatasetCode, FieldValue, HealthStatus, ProcessedDataResponse, RawDataResponse,
};
use statlens::error::StatlensError;

#[test]
fn parse_dataset_code_valid() {
    let code: DatasetCode = "IPC_2021".parse().unwrap();
    assert_eq!(code.as_str(), "IPC_2021");
    assert_eq!(code.to_string(), "IPC_2021");
}

#[test]
fn parse_dataset_code_invalid() {
    let err = "EPA?x=1".parse::<DatasetCode>().unwrap_err();
    assert_matches!(err, StatlensError::InvalidDatasetCode(_));
}

#[test]
fn dataset_serializes_with_english_names() {
    let dataset: Dataset =
        serde_json::from_str(r#"{"codigo":"EPA","nombre":"Encuesta de Población Activa"}"#)
            .unwrap();
    let json = serde_json::to_value(&dataset).unwrap();
    assert_eq!(json["code"], "EPA");
    assert_eq!(json["name"], "Encuesta de Población Activa");
    assert!(json.get("statistical_code").is_none());
}

#[test]
fn record_count_mismatch_is_passed_through() {
    let raw: RawDataResponse = serde_json::from_str(
        r#"{"codigo":"EPA","dataset_name":"Encuesta","record_count":10,"raw_data":[{"COD":"A"}]}"#,
    )
    .unwrap();
    assert_eq!(raw.record_count, 10);
    assert_eq!(raw.raw_data.len(), 1);
    assert!(!raw.count_matches());
}

#[test]
fn processed_envelope_defaults_when_sparse() {
    let processed: ProcessedDataResponse = serde_json::from_str(
        r#"{"codigo":"IPC","dataset_name":"IPC","record_count":0,"processed_data":[]}"#,
    )
    .unwrap();
    assert!(processed.columns.is_empty());
    assert!(!processed.summary.is_enriched());
    assert_eq!(processed.summary.total_series, 0);
    assert!(processed.retrieved_at.is_none());
    assert!(processed.schema_version.is_none());
}

#[test]
fn nested_values_stay_opaque() {
    let value: FieldValue =
        serde_json::from_str(r#"{"Data":[{"Fecha":1704067200000,"Secreto":false}]}"#).unwrap();
    let FieldValue::Map(map) = value else {
        panic!("expected a map");
    };
    let FieldValue::List(points) = &map["Data"] else {
        panic!("expected a list");
    };
    assert_matches!(&points[0], FieldValue::Map(point) if point["Fecha"] == FieldValue::Integer(1_704_067_200_000));
}

#[test]
fn health_status() {
    let health: HealthStatus =
        serde_json::from_str(r#"{"status":"healthy","service":"augusta-data-collector"}"#)
            .unwrap();
    assert!(health.is_healthy());
}

#[test]
fn processed_metadata_tolerates_naive_timestamp_and_numeric_version() {
    let processed: ProcessedDataResponse = serde_json::from_str(
        r#"{"codigo":"EPA","record_count":1,"processed_data":[{"COD":"EPA1"}],
            "retrieved_at":"2024-05-01T10:00:00.123456","schema_version":2}"#,
    )
    .unwrap();

    assert_eq!(processed.processed_data.len(), 1);
    assert_eq!(
        processed.retrieved_at.unwrap().to_rfc3339(),
        "2024-05-01T10:00:00.123456+00:00"
    );
    assert_eq!(processed.schema_version.as_deref(), Some("2"));
}

#[test]
fn unreadable_processed_metadata_is_dropped() {
    let processed: ProcessedDataResponse = serde_json::from_str(
        r#"{"codigo":"EPA","record_count":0,"processed_data":[],
            "retrieved_at":"last tuesday","metadata_version":{"major":1}}"#,
    )
    .unwrap();

    assert!(processed.retrieved_at.is_none());
    assert!(processed.schema_version.is_none());
}
