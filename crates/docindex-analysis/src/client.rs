//! Document-analysis clients.
//!
//! Analysis is asynchronous on the service side: a submit call returns an
//! `Operation-Location` URL, which is polled until the job succeeds or
//! fails.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use docindex_types::{AnalysisSettings, ConfigError};

use crate::error::AnalysisError;
use crate::raw::AnalyzeResult;

const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Where the document to analyze comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Publicly reachable URL
    Url(String),
    /// Raw file bytes, sent base64-encoded
    Bytes(Vec<u8>),
}

/// Runs an analysis job to completion.
#[async_trait]
pub trait DocumentAnalysisClient: Send + Sync {
    async fn analyze(
        &self,
        model_id: &str,
        source: &DocumentSource,
    ) -> Result<AnalyzeResult, AnalysisError>;
}

/// Connection and polling settings for [`HttpAnalysisClient`].
#[derive(Debug, Clone)]
pub struct HttpAnalysisConfig {
    /// Service endpoint without a trailing slash
    pub endpoint: String,

    /// Subscription key
    pub api_key: SecretString,

    /// REST API version
    pub api_version: String,

    /// First delay between status polls
    pub poll_interval: Duration,

    /// Longest delay between status polls
    pub max_poll_interval: Duration,

    /// Give up on a job after this long
    pub max_poll_time: Duration,

    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpAnalysisConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::from_parts(endpoint.into(), api_key.into(), &AnalysisSettings::default())
    }

    /// Build from loaded settings. The endpoint and key must both be set.
    pub fn from_settings(settings: &AnalysisSettings) -> Result<Self, AnalysisError> {
        settings.validate()?;
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::invalid("analysis.api_key", "must be set"))?;
        Ok(Self::from_parts(settings.endpoint.clone(), api_key, settings))
    }

    fn from_parts(endpoint: String, api_key: String, settings: &AnalysisSettings) -> Self {
        let poll_interval = Duration::from_millis(settings.poll_interval_ms);
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            api_version: settings.api_version.clone(),
            poll_interval,
            max_poll_interval: poll_interval * 8,
            max_poll_time: Duration::from_secs(settings.max_poll_secs),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Override the polling schedule.
    pub fn with_polling(mut self, interval: Duration, max_time: Duration) -> Self {
        self.poll_interval = interval;
        self.max_poll_interval = interval * 8;
        self.max_poll_time = max_time;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum AnalyzeRequest<'a> {
    UrlSource(&'a str),
    Base64Source(String),
}

impl<'a> AnalyzeRequest<'a> {
    fn from_source(source: &'a DocumentSource) -> Self {
        match source {
            DocumentSource::Url(url) => Self::UrlSource(url),
            DocumentSource::Bytes(bytes) => Self::Base64Source(STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
enum JobStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    status: JobStatus,
    #[serde(default)]
    error: Option<ServiceError>,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ServiceError,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ServiceError {
    fn describe(&self) -> String {
        match (self.code.is_empty(), self.message.is_empty()) {
            (_, true) => self.code.clone(),
            (true, false) => self.message.clone(),
            (false, false) => format!("{}: {}", self.code, self.message),
        }
    }
}

async fn check(response: Response) -> Result<Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.error.describe(),
        Err(_) => body.trim().to_string(),
    };
    warn!(status = status.as_u16(), message = %message, "Analysis request failed");
    Err(AnalysisError::Backend {
        status: status.as_u16(),
        message,
    })
}

/// Client for the document-analysis REST API.
pub struct HttpAnalysisClient {
    client: Client,
    config: HttpAnalysisConfig,
}

impl HttpAnalysisClient {
    pub fn new(config: HttpAnalysisConfig) -> Result<Self, AnalysisError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Submit a job and return its operation URL.
    async fn submit(&self, model_id: &str, source: &DocumentSource) -> Result<String, AnalysisError> {
        let url = format!(
            "{}/documentintelligence/documentModels/{}:analyze",
            self.config.endpoint, model_id
        );
        let response = self
            .client
            .post(url)
            .query(&[("api-version", self.config.api_version.as_str())])
            .header(KEY_HEADER, self.config.api_key.expose_secret())
            .json(&AnalyzeRequest::from_source(source))
            .send()
            .await?;
        let response = check(response).await?;

        response
            .headers()
            .get("operation-location")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(AnalysisError::MissingOperationLocation)
    }

    async fn poll_once(&self, operation: &str) -> Result<OperationResponse, AnalysisError> {
        let response = self
            .client
            .get(operation)
            .header(KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;
        let body = check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Poll until the job leaves the running states or the budget runs out.
    async fn wait_for(&self, operation: &str) -> Result<AnalyzeResult, AnalysisError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.poll_interval)
            .with_max_interval(self.config.max_poll_interval)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(Some(self.config.max_poll_time))
            .build();
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            polls += 1;
            let state = self.poll_once(operation).await?;
            debug!(poll = polls, status = ?state.status, "Analysis job status");

            match state.status {
                JobStatus::Succeeded => {
                    info!(
                        polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Analysis job succeeded"
                    );
                    return Ok(state.analyze_result.unwrap_or_default());
                }
                JobStatus::Failed | JobStatus::Canceled => {
                    let message = state
                        .error
                        .map(|e| e.describe())
                        .unwrap_or_else(|| format!("job {:?}", state.status).to_lowercase());
                    return Err(AnalysisError::JobFailed(message));
                }
                JobStatus::NotStarted | JobStatus::Running | JobStatus::Unknown => {}
            }

            match backoff.next_backoff() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    warn!(polls, "Analysis polling budget exhausted");
                    return Err(AnalysisError::Timeout {
                        status: format!("{:?}", state.status).to_lowercase(),
                        elapsed_secs: started.elapsed().as_secs(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl DocumentAnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        model_id: &str,
        source: &DocumentSource,
    ) -> Result<AnalyzeResult, AnalysisError> {
        let operation = self.submit(model_id, source).await?;
        debug!(model_id, operation = %operation, "Analysis job submitted");
        self.wait_for(&operation).await
    }
}

/// Client that returns a fixed result, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MockAnalysisClient {
    result: AnalyzeResult,
}

impl MockAnalysisClient {
    pub fn new(result: AnalyzeResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl DocumentAnalysisClient for MockAnalysisClient {
    async fn analyze(
        &self,
        _model_id: &str,
        _source: &DocumentSource,
    ) -> Result<AnalyzeResult, AnalysisError> {
        Ok(self.result.clone())
    }
}
