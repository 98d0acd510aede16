//! Portfolio analysis client
//!
//! This crate is the client side of a portfolio-return analysis service. It
//! does not compute returns or risk metrics itself; it prepares requests,
//! talks to the service and reshapes what comes back. It includes:
//!
//! - Input normalisation and validation (tickers, dates, initial amount)
//! - A weight allocator with edit, equalize and normalize operations
//! - Two request strategies: a consolidated single call and a legacy
//!   multi-call flow that falls back to local data when follow-ups fail
//! - Adaptation of every known response shape into one canonical model
//! - Run tokens so that only the latest submission publishes its result
//!
//! # Architecture
//!
//! `RawInput` → [`input::normalize`] → [`AnalysisOrchestrator`] →
//! [`adapter::adapt`] → [`AnalysisResult`], driven by [`PortfolioClient`].
//! The network sits behind the [`AnalysisService`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use portfolio_client::{ClientConfig, PortfolioClient, RawInput, WeightAllocation};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PortfolioClient::new(ClientConfig::from_env()?)?;
//!
//!     let input = RawInput::new("AAPL, MSFT").with_dates("2023-01", "2023-12-31");
//!     let allocation = WeightAllocation::rebuild(&input.ticker_list())
//!         .edit("AAPL", 60.0)?
//!         .edit("MSFT", 40.0)?;
//!
//!     let result = client.submit(&input, &allocation).await?;
//!     println!("total return: {:.2}%", result.summary.total_return * 100.0);
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod request;
pub mod run;
pub mod service;
pub mod weights;
pub mod wire;

// Re-export main types for convenience
pub use adapter::{
    AdaptationWarning, AnalysisResult, AxisDirection, ComparisonRow, ComparisonShape,
    DrawdownSeries, NamedCurve, Period, SeriesPoint, SummaryMetrics, TickerMetrics,
};
pub use client::PortfolioClient;
pub use config::{ClientConfig, ClientConfigBuilder, RequestStrategy};
pub use error::{AnalysisError, ClientError, ConfigError, Result, ValidationError};
pub use input::RawInput;
pub use orchestrator::{AnalysisOrchestrator, Degradation, RawAnalysis, Section};
pub use request::AnalysisRequest;
pub use run::{FailureKind, RunContext, RunState, RunToken};
pub use service::{AnalysisService, HttpAnalysisService};
pub use weights::{WeightAllocation, WeightBalance, WeightRow};
pub use wire::ChartKind;
