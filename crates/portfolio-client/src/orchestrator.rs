//! Request orchestration
//!
//! Runs one validated [`AnalysisRequest`] against the service using the
//! configured [`RequestStrategy`] and hands back a [`RawAnalysis`] for the
//! adapter. The legacy strategy tolerates failed follow-up calls by deriving
//! minimal curves and comparison rows from the primary result.

use crate::config::RequestStrategy;
use crate::error::AnalysisError;
use crate::request::AnalysisRequest;
use crate::service::AnalysisService;
use crate::wire::{
    ChartKind, ChartPayload, PORTFOLIO_LABEL, PRICE_RETURN_SERIES, PortfolioData, StockReturn,
    TOTAL_RETURN_SERIES,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result section the presentation layer cannot populate for a degraded run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Amount,
    Drawdown,
}

/// Record of a legacy run that fell back to local data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Degradation {
    /// Follow-up calls that failed
    pub failed: Vec<ChartKind>,
    /// Sections to leave out when presenting
    pub suppressed: Vec<Section>,
}

impl Degradation {
    pub fn suppresses(&self, section: Section) -> bool {
        self.suppressed.contains(&section)
    }

    /// Whether curves or comparison rows were built locally
    pub fn derived_locally(&self) -> bool {
        self.failed
            .iter()
            .any(|kind| matches!(kind, ChartKind::Cumulative | ChartKind::Comparison))
    }
}

/// Strategy-agnostic bundle of service payloads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAnalysis {
    pub portfolio: PortfolioData,
    /// Source of the named portfolio curves
    pub curves: Option<ChartPayload>,
    /// Chart the curves were read from
    pub curves_kind: ChartKind,
    pub comparison: Option<ChartPayload>,
    pub amount: Option<ChartPayload>,
    pub degradation: Option<Degradation>,
}

/// Runs requests against an [`AnalysisService`]
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    service: Arc<dyn AnalysisService>,
    strategy: RequestStrategy,
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>, strategy: RequestStrategy) -> Self {
        Self { service, strategy }
    }

    pub fn strategy(&self) -> RequestStrategy {
        self.strategy
    }

    pub fn service(&self) -> &Arc<dyn AnalysisService> {
        &self.service
    }

    /// Execute a request with the configured strategy
    #[instrument(skip(self, request), fields(strategy = %self.strategy, tickers = request.tickers().len()))]
    pub async fn run(&self, request: &AnalysisRequest) -> Result<RawAnalysis, AnalysisError> {
        match self.strategy {
            RequestStrategy::Consolidated => self.run_consolidated(request).await,
            RequestStrategy::Legacy => self.run_legacy(request).await,
        }
    }

    async fn run_consolidated(&self, request: &AnalysisRequest) -> Result<RawAnalysis, AnalysisError> {
        let response = self.service.analyze_all(request).await?;

        let (curves_kind, curves) = match response.time_series_chart {
            Some(chart) => (ChartKind::TimeSeries, Some(chart)),
            None => (ChartKind::Cumulative, response.cumulative_chart),
        };

        Ok(RawAnalysis {
            portfolio: response.portfolio_data,
            curves,
            curves_kind,
            comparison: response.comparison_chart,
            amount: response.amount_chart,
            degradation: None,
        })
    }

    async fn run_legacy(&self, request: &AnalysisRequest) -> Result<RawAnalysis, AnalysisError> {
        let portfolio = self.service.analyze(request).await?;

        let amount_call = async {
            if request.tracks_amount() {
                Some(self.service.chart(ChartKind::Amount, request).await)
            } else {
                None
            }
        };
        let (cumulative, comparison, amount) = futures::join!(
            self.service.chart(ChartKind::Cumulative, request),
            self.service.chart(ChartKind::Comparison, request),
            amount_call,
        );

        let mut failed = Vec::new();

        let curves = match cumulative {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "cumulative chart call failed, deriving curves locally");
                failed.push(ChartKind::Cumulative);
                derive_cumulative(&portfolio)
            }
        };

        let comparison = match comparison {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "comparison chart call failed, deriving rows locally");
                failed.push(ChartKind::Comparison);
                derive_comparison(&portfolio)
            }
        };

        let amount = match amount {
            Some(Ok(payload)) => Some(payload),
            Some(Err(e)) => {
                warn!(error = %e, "amount chart call failed");
                failed.push(ChartKind::Amount);
                None
            }
            None => None,
        };

        let degradation = if failed.is_empty() {
            None
        } else {
            let mut degradation = Degradation {
                failed,
                suppressed: vec![Section::Amount],
            };
            if degradation.derived_locally() {
                degradation.suppressed.push(Section::Drawdown);
            }
            info!(failed = ?degradation.failed, "legacy run degraded");
            Some(degradation)
        };

        Ok(RawAnalysis {
            portfolio,
            curves: Some(curves),
            curves_kind: ChartKind::Cumulative,
            comparison: Some(comparison),
            amount: if degradation.is_some() { None } else { amount },
            degradation,
        })
    }
}

fn number_array(values: &[Option<f64>]) -> Value {
    Value::Array(
        values
            .iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect(),
    )
}

/// Portfolio row first, then the tickers in response order
fn rows_with_portfolio(data: &PortfolioData) -> impl Iterator<Item = (&str, &StockReturn)> {
    data.portfolio_stock_return
        .iter()
        .map(|row| (PORTFOLIO_LABEL, row))
        .chain(data.stock_returns.iter().map(|row| (row.ticker.as_str(), row)))
}

/// Build cumulative curves from per-ticker `cumulativeReturns`
pub fn derive_cumulative(data: &PortfolioData) -> ChartPayload {
    let mut series = Map::new();
    for (name, row) in rows_with_portfolio(data) {
        if let Some(values) = &row.cumulative_returns {
            series.insert(name.to_string(), number_array(values));
        }
    }

    let dates = data
        .stock_returns
        .first()
        .and_then(|row| row.dates.clone())
        .or_else(|| {
            data.portfolio_stock_return
                .as_ref()
                .and_then(|row| row.dates.clone())
        });

    ChartPayload {
        title: Some("Cumulative Returns".to_string()),
        dates,
        labels: None,
        series,
    }
}

/// Build comparison rows from per-ticker price and total returns
pub fn derive_comparison(data: &PortfolioData) -> ChartPayload {
    let (labels, (price, total)): (Vec<String>, (Vec<Value>, Vec<Value>)) = rows_with_portfolio(data)
        .map(|(name, row)| {
            (
                name.to_string(),
                (Value::from(row.price_return), Value::from(row.total_return)),
            )
        })
        .unzip();

    let mut series = Map::new();
    series.insert(PRICE_RETURN_SERIES.to_string(), Value::Array(price));
    series.insert(TOTAL_RETURN_SERIES.to_string(), Value::Array(total));

    ChartPayload {
        title: Some("Return Comparison".to_string()),
        dates: None,
        labels: Some(labels),
        series,
    }
}
