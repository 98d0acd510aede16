//! Transport to the analysis service
//!
//! [`AnalysisService`] is the seam between orchestration and the network.
//! [`HttpAnalysisService`] is the production implementation; tests substitute
//! their own.

use crate::config::ClientConfig;
use crate::error::{AnalysisError, ConfigError};
use crate::request::AnalysisRequest;
use crate::wire::{ChartKind, ChartPayload, ErrorBody, FullAnalysisResponse, PortfolioData};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};

static DATE_RANGE_MISMATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)data has different start dates.*The latest start date is (\d{4}-\d{2}-\d{2})")
        .expect("date range mismatch pattern compiles")
});

/// Operations offered by the analysis service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Primary analysis call (`analyze`)
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PortfolioData, AnalysisError>;

    /// Consolidated call returning data and every chart (`analyze/all`)
    async fn analyze_all(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FullAnalysisResponse, AnalysisError>;

    /// One legacy chart call
    async fn chart(
        &self,
        kind: ChartKind,
        request: &AnalysisRequest,
    ) -> Result<ChartPayload, AnalysisError>;

    /// Liveness check; returns the service's status text
    async fn health(&self) -> Result<String, AnalysisError>;
}

/// Map a non-success response onto the error taxonomy
///
/// A `message` naming mismatched start dates becomes
/// [`AnalysisError::DateRangeMismatch`]; any other message, or the status line
/// when there is none, becomes [`AnalysisError::ServiceError`].
pub fn classify_failure(status: StatusCode, body: &str) -> AnalysisError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .filter(|message| !message.trim().is_empty());

    match message {
        Some(message) => classify_message(&message),
        None => AnalysisError::ServiceError(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        )),
    }
}

/// Classify a service error message
pub fn classify_message(message: &str) -> AnalysisError {
    match DATE_RANGE_MISMATCH.captures(message) {
        Some(caps) => AnalysisError::DateRangeMismatch {
            suggested_start_date: caps[1].to_string(),
        },
        None => AnalysisError::ServiceError(message.to_string()),
    }
}

/// HTTP client for the analysis API
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    client: Client,
    config: ClientConfig,
}

impl HttpAnalysisService {
    /// Create a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &AnalysisRequest,
    ) -> Result<T, AnalysisError> {
        let url = self.config.endpoint(path);
        debug!(%url, "POST");

        let response = self.client.post(&url).json(request).send().await?;
        let response = Self::ensure_success(response).await?;

        response.json::<T>().await.map_err(|e| {
            AnalysisError::ServiceError(format!("Failed to parse response from {path}: {e}"))
        })
    }

    async fn ensure_success(response: Response) -> Result<Response, AnalysisError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_failure(status, &body);
        warn!(status = status.as_u16(), error = %err, "analysis service call failed");
        Err(err)
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    #[instrument(skip(self, request), fields(tickers = request.tickers().len()))]
    async fn analyze(&self, request: &AnalysisRequest) -> Result<PortfolioData, AnalysisError> {
        self.post("analyze", request).await
    }

    #[instrument(skip(self, request), fields(tickers = request.tickers().len()))]
    async fn analyze_all(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FullAnalysisResponse, AnalysisError> {
        self.post("analyze/all", request).await
    }

    #[instrument(skip(self, request), fields(kind = %kind))]
    async fn chart(
        &self,
        kind: ChartKind,
        request: &AnalysisRequest,
    ) -> Result<ChartPayload, AnalysisError> {
        self.post(kind.path(), request).await
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<String, AnalysisError> {
        let response = self.client.get(self.config.endpoint("health")).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }
}
