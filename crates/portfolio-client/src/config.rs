//! Configuration for the analysis client

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_API_BASE: &str = "http://localhost:8080/api/portfolio";

/// How a run talks to the analysis service
///
/// Picked per deployment, never switched inside a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStrategy {
    /// One call to the combined `analyze/all` endpoint
    #[default]
    Consolidated,
    /// Primary `analyze` call followed by per-chart calls, with local fallback
    Legacy,
}

impl FromStr for RequestStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "consolidated" | "all" => Ok(Self::Consolidated),
            "legacy" | "multi" => Ok(Self::Legacy),
            other => Err(ConfigError(format!(
                "unknown request strategy `{other}` (expected `consolidated` or `legacy`)"
            ))),
        }
    }
}

impl fmt::Display for RequestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consolidated => f.write_str("consolidated"),
            Self::Legacy => f.write_str("legacy"),
        }
    }
}

/// Configuration for the analysis client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the analysis API; endpoint paths are appended to it
    pub api_base: String,

    /// Request strategy for every run
    pub strategy: RequestStrategy,

    /// Optional transport timeout; `None` leaves it to the transport
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            strategy: RequestStrategy::Consolidated,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build a configuration from `PORTFOLIO_API_BASE`, `PORTFOLIO_STRATEGY`
    /// and `PORTFOLIO_TIMEOUT_SECS`, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        ClientConfigBuilder::default().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base)
            .map_err(|e| ConfigError(format!("invalid api_base `{}`: {e}", self.api_base)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError(format!(
                "api_base must use http or https, got `{}`",
                url.scheme()
            )));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ConfigError(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Absolute URL for an endpoint path such as `analyze/all`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    api_base: Option<String>,
    strategy: Option<RequestStrategy>,
    request_timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the API base URL
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Set the request strategy
    pub fn strategy(mut self, strategy: RequestStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the transport timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Fill unset fields from the environment
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if self.api_base.is_none() {
            self.api_base = std::env::var("PORTFOLIO_API_BASE").ok();
        }
        if self.strategy.is_none() {
            if let Ok(value) = std::env::var("PORTFOLIO_STRATEGY") {
                self.strategy = Some(value.parse()?);
            }
        }
        if self.request_timeout.is_none() {
            if let Ok(value) = std::env::var("PORTFOLIO_TIMEOUT_SECS") {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    ConfigError(format!("PORTFOLIO_TIMEOUT_SECS is not a number: `{value}`"))
                })?;
                self.request_timeout = Some(Duration::from_secs(secs));
            }
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let defaults = ClientConfig::default();

        let config = ClientConfig {
            api_base: self.api_base.unwrap_or(defaults.api_base),
            strategy: self.strategy.unwrap_or(defaults.strategy),
            request_timeout: self.request_timeout.or(defaults.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
