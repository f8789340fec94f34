use std::io::{self, Write};

use serde::Serialize;

use crate::domain::{Dataset, HealthStatus, ProcessedDataResponse, ProviderInfo, RawDataResponse};
use crate::providers::ProviderRegistry;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Rows of a record payload echoed in human output.
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct HumanOutput;

impl HumanOutput {
    pub fn print_datasets(datasets: &[Dataset], registry: &ProviderRegistry) {
        println!("{CYAN}{} datasets{RESET}", datasets.len());
        for dataset in datasets {
            let provider = registry
                .provider_for(dataset)
                .map(|provider| provider.name.as_str())
                .unwrap_or("?");
            println!(
                "{GREEN}{:<12}{RESET} {} {DIM}[{provider}]{RESET}",
                dataset.code, dataset.name
            );
        }
    }

    pub fn print_dataset(dataset: &Dataset) {
        println!("{CYAN}{}{RESET} {}", dataset.code, dataset.name);
        if let Some(code) = &dataset.statistical_code {
            println!("   statistical code: {code}");
        }
        if let Some(url) = &dataset.url {
            println!("   source: {url}");
        }
    }

    pub fn print_raw(data: &RawDataResponse) {
        println!(
            "{CYAN}{}{RESET} {} {GREEN}({} records){RESET}",
            data.code, data.dataset_name, data.record_count
        );
        if !data.count_matches() {
            println!(
                "{YELLOW}   record_count says {} but {} records were returned{RESET}",
                data.record_count,
                data.raw_data.len()
            );
        }
        if let Some(message) = &data.message {
            println!("{DIM}   {message}{RESET}");
        }
        print_preview(&data.raw_data);
    }

    pub fn print_processed(data: &ProcessedDataResponse) {
        println!(
            "{CYAN}{}{RESET} {} {GREEN}({} records){RESET}",
            data.code, data.dataset_name, data.record_count
        );
        let summary = &data.summary;
        println!(
            "   series: {}  data points: {}  enriched: {}",
            summary.total_series,
            summary.total_data_points,
            if summary.is_enriched() { "yes" } else { "no" }
        );
        if !data.columns.is_empty() {
            println!("   columns: {}", data.columns.join(", "));
        }
        if let Some(retrieved_at) = &data.retrieved_at {
            println!("   retrieved: {}", retrieved_at.to_rfc3339());
        }
        if let Some(version) = &data.schema_version {
            println!("   schema: {version}");
        }
        for (label, distribution) in [
            ("data types", &summary.data_type_distribution),
            ("periods", &summary.period_distribution),
            ("units", &summary.unit_distribution),
        ] {
            if distribution.is_empty() {
                continue;
            }
            let parts = distribution
                .iter()
                .map(|(key, count)| format!("{key}={count}"))
                .collect::<Vec<_>>();
            println!("   {label}: {}", parts.join(", "));
        }
        print_preview(&data.processed_data);
    }

    pub fn print_providers(registry: &ProviderRegistry) {
        for provider in registry.providers() {
            let (marker, color) = if provider.enabled {
                ("●", GREEN)
            } else {
                ("○", YELLOW)
            };
            let count = registry
                .dataset_count(&provider.id)
                .map(|count| format!(" ({count} datasets)"))
                .unwrap_or_default();
            println!(
                "{color}{marker} {:<10}{RESET} {} {DIM}{}{RESET}{count}",
                provider.id, provider.name, provider.description
            );
        }
    }

    pub fn print_provider_info(info: &ProviderInfo) {
        println!("{CYAN}{}{RESET} {} via {}", info.code, info.name, info.provider);
        if let Some(table_id) = &info.table_id {
            println!("   table: {table_id}");
        }
        if let Some(api_url) = &info.api_url {
            println!("   upstream: {api_url}");
        }
    }

    pub fn print_health(health: &HealthStatus) {
        let color = if health.is_healthy() { GREEN } else { YELLOW };
        println!("{color}{}{RESET} {}", health.status, health.service);
    }
}

fn print_preview<T: Serialize>(records: &[T]) {
    for record in records.iter().take(PREVIEW_ROWS) {
        if let Ok(line) = serde_json::to_string(record) {
            println!("{DIM}   {line}{RESET}");
        }
    }
    if records.len() > PREVIEW_ROWS {
        println!("{DIM}   … {} more{RESET}", records.len() - PREVIEW_ROWS);
    }
}
