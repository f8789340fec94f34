//! Transport layer: the only place that talks to the remote API.
//!
//! Every failure mode (non-2xx status, unreachable host, malformed body) is
//! folded into [`StatlensError`] whose `Display` text is the human-readable
//! message the orchestrator shows. Successful bodies are deserialized into the
//! expected shape without any further validation.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, validate_base_url};
use crate::domain::{
    Dataset, DatasetCode, HealthStatus, ProcessedDataResponse, ProviderInfo, RawDataResponse,
};
use crate::error::StatlensError;

pub const DATASETS_PATH: &str = "v1/datasets";
pub const SEARCH_PATH: &str = "v1/datasets/search";
pub const HEALTH_PATH: &str = "v1/health";

pub fn dataset_path(code: &DatasetCode) -> String {
    format!("v1/datasets/{code}")
}

pub fn raw_data_path(code: &DatasetCode) -> String {
    format!("v1/data/raw/{code}")
}

pub fn processed_data_path(code: &DatasetCode) -> String {
    format!("v1/data/processed/{code}")
}

pub fn provider_info_path(code: &DatasetCode) -> String {
    format!("v1/data/info/{code}")
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, StatlensError>;
    async fn search_datasets(&self, query: &str, limit: u32)
    -> Result<Vec<Dataset>, StatlensError>;
    async fn dataset_info(&self, code: &DatasetCode) -> Result<Dataset, StatlensError>;
    async fn raw_data(&self, code: &DatasetCode) -> Result<RawDataResponse, StatlensError>;
    async fn processed_data(
        &self,
        code: &DatasetCode,
    ) -> Result<ProcessedDataResponse, StatlensError>;
    async fn provider_info(&self, code: &DatasetCode) -> Result<ProviderInfo, StatlensError>;
    async fn health_check(&self) -> Result<HealthStatus, StatlensError>;
}

/// Per-request overrides. Headers given here replace the defaults of the
/// same name; repeating a header keeps every value.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, StatlensError> {
        let mut builder =
            Client::builder().user_agent(format!("statlens/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| StatlensError::InvalidRequest(err.to_string()))?;

        Ok(Self {
            client,
            base_url: validate_base_url(&config.base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, StatlensError> {
        let url = self.endpoint_url(path);
        let method = options.method.unwrap_or(Method::GET);

        let mut headers = default_headers();
        for name in options.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in options.headers.iter() {
            headers.append(name.clone(), value.clone());
        }

        debug!(%method, %url, "sending request");
        let mut request = self.client.request(method, &url).headers(headers);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|err| {
            warn!(%url, error = %err, "request did not reach the API");
            StatlensError::from(err)
        })?;
        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, status = status.as_u16(), error = %err, "response body was cut short");
                return Err(truncated_body_error(status, path, &err));
            }
        };
        debug!(%url, status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            let err = error_from_response(status, &body);
            warn!(%url, status = status.as_u16(), error = %err, "API returned an error status");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|err| StatlensError::Parse(format!("{path}: {err}")))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, StatlensError> {
        self.request(DATASETS_PATH, RequestOptions::default()).await
    }

    async fn search_datasets(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Dataset>, StatlensError> {
        let options = RequestOptions::default()
            .query("q", query)
            .query("limit", limit.to_string());
        self.request(SEARCH_PATH, options).await
    }

    async fn dataset_info(&self, code: &DatasetCode) -> Result<Dataset, StatlensError> {
        self.request(&dataset_path(code), RequestOptions::default())
            .await
    }

    async fn raw_data(&self, code: &DatasetCode) -> Result<RawDataResponse, StatlensError> {
        self.request(&raw_data_path(code), RequestOptions::default())
            .await
    }

    async fn processed_data(
        &self,
        code: &DatasetCode,
    ) -> Result<ProcessedDataResponse, StatlensError> {
        self.request(&processed_data_path(code), RequestOptions::default())
            .await
    }

    async fn provider_info(&self, code: &DatasetCode) -> Result<ProviderInfo, StatlensError> {
        self.request(&provider_info_path(code), RequestOptions::default())
            .await
    }

    async fn health_check(&self) -> Result<HealthStatus, StatlensError> {
        self.request(HEALTH_PATH, RequestOptions::default()).await
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

/// The status line already arrived, so a failed body read is not a
/// connectivity problem.
fn truncated_body_error(status: StatusCode, path: &str, err: &reqwest::Error) -> StatlensError {
    if status.is_success() {
        StatlensError::Parse(format!("{path}: incomplete response body: {err}"))
    } else {
        error_from_response(status, "")
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

static HTML_DOCUMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<!doctype\s+html|<html[\s>]").ok());

fn looks_like_html(body: &str) -> bool {
    HTML_DOCUMENT
        .as_ref()
        .map(|re| re.is_match(body))
        .unwrap_or(false)
}

/// Turns a non-success response into a message: JSON `detail` first, then
/// the HTML-page heuristic, then the bare status line.
pub fn error_from_response(status: StatusCode, body: &str) -> StatlensError {
    let code = status.as_u16();
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => match parsed.detail {
            Some(Value::String(message)) if !message.trim().is_empty() => {
                return StatlensError::Http {
                    status: code,
                    message,
                };
            }
            Some(Value::Null) | Some(Value::String(_)) | None => {}
            Some(other) => {
                return StatlensError::Http {
                    status: code,
                    message: other.to_string(),
                };
            }
        },
        Err(_) if looks_like_html(body) => {
            return StatlensError::Http {
                status: code,
                message: format!(
                    "API endpoint not found or misconfigured (HTTP {code}): the server answered \
                     with an HTML page instead of JSON. Check the API base URL and path."
                ),
            };
        }
        Err(_) => {}
    }

    StatlensError::Http {
        status: code,
        message: format!(
            "HTTP {code}: {}",
            status.canonical_reason().unwrap_or("Unknown Status")
        ),
    }
}
