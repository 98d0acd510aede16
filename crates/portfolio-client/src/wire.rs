//! Response payloads as the analysis service sends them
//!
//! Every field is optional or defaulted and chart series are kept as raw JSON.
//! [`crate::adapter`] turns them into the canonical model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Series name used by the service for the portfolio-level curve
pub const PORTFOLIO_LABEL: &str = "Portfolio";
/// Comparison series holding price returns
pub const PRICE_RETURN_SERIES: &str = "Price Return";
/// Comparison series holding total returns
pub const TOTAL_RETURN_SERIES: &str = "Total Return";

/// Chart endpoints of the legacy per-chart API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    TimeSeries,
    #[default]
    Cumulative,
    Comparison,
    Amount,
}

impl ChartKind {
    /// Endpoint path relative to the API base
    pub fn path(self) -> &'static str {
        match self {
            Self::TimeSeries => "chart/timeseries",
            Self::Cumulative => "chart/cumulative",
            Self::Comparison => "chart/comparison",
            Self::Amount => "chart/amount",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TimeSeries => "timeseries",
            Self::Cumulative => "cumulative",
            Self::Comparison => "comparison",
            Self::Amount => "amount",
        };
        f.write_str(name)
    }
}

/// One chart payload: `{title?, dates?, labels?, series}`
///
/// `series` values are usually number arrays, but comparison payloads have
/// also been sent as objects keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub series: Map<String, Value>,
}

/// Per-ticker (or portfolio-level) return and risk data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StockReturn {
    pub ticker: String,
    pub price_return: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: Option<f64>,
    pub value_at_risk: Option<f64>,
    pub beta: Option<f64>,
    pub dates: Option<Vec<String>>,
    pub cumulative_returns: Option<Vec<Option<f64>>>,
    pub amount_changes: Option<Vec<Option<f64>>>,
    pub max_drawdowns: Option<Vec<Option<f64>>>,
}

/// Result of the primary `analyze` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortfolioData {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub stock_returns: Vec<StockReturn>,
    pub portfolio_stock_return: Option<StockReturn>,
}

/// Body of a successful `analyze/all` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FullAnalysisResponse {
    pub portfolio_data: PortfolioData,
    pub time_series_chart: Option<ChartPayload>,
    pub comparison_chart: Option<ChartPayload>,
    pub cumulative_chart: Option<ChartPayload>,
    pub amount_chart: Option<ChartPayload>,
}

/// Optional JSON body of a failed call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
