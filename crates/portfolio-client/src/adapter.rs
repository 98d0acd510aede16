//! Response adaptation
//!
//! Turns a [`RawAnalysis`] from either strategy into the canonical
//! [`AnalysisResult`]. Adaptation never fails: payloads that cannot be read
//! are reported as [`AdaptationWarning`]s and the affected section is left
//! empty.

use crate::orchestrator::{Degradation, RawAnalysis, Section};
use crate::request::AnalysisRequest;
use crate::run::RunToken;
use crate::wire::{
    ChartKind, ChartPayload, PORTFOLIO_LABEL, PRICE_RETURN_SERIES, StockReturn,
    TOTAL_RETURN_SERIES,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// One point of a curve; a blank date means the payload carried no date axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    /// `None` is a gap in the curve
    pub value: Option<f64>,
}

/// A named curve, e.g. `Portfolio` or a ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCurve {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

/// How a renderer should orient the value axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisDirection {
    #[default]
    Normal,
    /// Zero at the top, larger values further down
    Inverted,
}

/// Portfolio drawdown as fractions, plotted on an inverted axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownSeries {
    pub points: Vec<SeriesPoint>,
    pub axis: AxisDirection,
}

/// Price and total return for one ticker (or the portfolio)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub ticker: String,
    pub price_return: f64,
    pub total_return: f64,
}

/// Portfolio-level scalars with the service's omissions filled in
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub price_return: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub value_at_risk: f64,
    pub beta: f64,
}

impl Default for SummaryMetrics {
    fn default() -> Self {
        Self {
            price_return: 0.0,
            total_return: 0.0,
            cagr: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            value_at_risk: 0.0,
            beta: 1.0,
        }
    }
}

impl From<&StockReturn> for SummaryMetrics {
    fn from(row: &StockReturn) -> Self {
        Self {
            price_return: row.price_return,
            total_return: row.total_return,
            cagr: row.cagr,
            volatility: row.volatility,
            sharpe_ratio: row.sharpe_ratio.unwrap_or(0.0),
            max_drawdown: row.max_drawdown,
            value_at_risk: row.value_at_risk.unwrap_or(0.0),
            beta: row.beta.unwrap_or(1.0),
        }
    }
}

/// One row of the per-ticker table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerMetrics {
    pub ticker: String,
    #[serde(flatten)]
    pub metrics: SummaryMetrics,
}

/// Analysed period as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Non-fatal problem found while adapting a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdaptationWarning {
    /// Comparison payload matched no known shape
    UnrecognizedComparison,
    /// Labelled comparison arrays of different lengths; extra entries dropped
    ComparisonLengthMismatch {
        labels: usize,
        price: usize,
        total: usize,
    },
    /// A comparison entry without a numeric value was dropped
    ComparisonValueMissing { ticker: String },
    /// A time-series payload had no date axis
    MissingDates { chart: ChartKind },
    /// A series value that is not an array was skipped
    SeriesNotArray { chart: ChartKind, series: String },
    /// A series and the date axis have different lengths
    SeriesLengthMismatch {
        chart: ChartKind,
        series: String,
        points: usize,
        dates: usize,
    },
    /// Drawdown values present without a date axis
    DrawdownMissingDates,
    /// No portfolio-level metrics; summary defaults used
    MissingPortfolioMetrics,
}

impl fmt::Display for AdaptationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedComparison => {
                write!(f, "comparison data is in an unrecognized format")
            }
            Self::ComparisonLengthMismatch {
                labels,
                price,
                total,
            } => write!(
                f,
                "comparison arrays differ in length (labels {labels}, price {price}, total {total})"
            ),
            Self::ComparisonValueMissing { ticker } => {
                write!(f, "comparison values missing for {ticker}")
            }
            Self::MissingDates { chart } => write!(f, "{chart} chart has no dates"),
            Self::SeriesNotArray { chart, series } => {
                write!(f, "{chart} series {series} is not a list of values")
            }
            Self::SeriesLengthMismatch {
                chart,
                series,
                points,
                dates,
            } => write!(
                f,
                "{chart} series {series} has {points} points for {dates} dates"
            ),
            Self::DrawdownMissingDates => write!(f, "drawdown series has no dates"),
            Self::MissingPortfolioMetrics => write!(f, "portfolio metrics missing from response"),
        }
    }
}

/// Canonical result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub portfolio_series: Vec<NamedCurve>,
    pub comparison: Vec<ComparisonRow>,
    pub amount_series: Option<Vec<NamedCurve>>,
    pub drawdown: Option<DrawdownSeries>,
    pub summary: SummaryMetrics,
    /// Portfolio row first
    pub per_ticker: Vec<TickerMetrics>,
    pub period: Period,
    pub warnings: Vec<AdaptationWarning>,
    pub degradation: Option<Degradation>,
    pub run: RunToken,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }

    /// Whether the presentation layer should render `section`
    pub fn shows(&self, section: Section) -> bool {
        let populated = match section {
            Section::Amount => self.amount_series.is_some(),
            Section::Drawdown => self.drawdown.is_some(),
        };
        populated
            && !self
                .degradation
                .as_ref()
                .is_some_and(|degradation| degradation.suppresses(section))
    }

    /// Look up a curve by name
    pub fn curve(&self, name: &str) -> Option<&NamedCurve> {
        self.portfolio_series.iter().find(|curve| curve.name == name)
    }
}

/// Comparison payload shapes, in detection priority order
#[derive(Debug, PartialEq)]
pub enum ComparisonShape<'a> {
    /// `labels` plus positionally aligned `Price Return` / `Total Return` arrays
    Labelled {
        labels: &'a [String],
        price: &'a [Value],
        total: &'a [Value],
    },
    /// `Price Return` / `Total Return` objects keyed by ticker
    Keyed {
        price: &'a Map<String, Value>,
        total: &'a Map<String, Value>,
    },
    Unrecognized,
}

impl<'a> ComparisonShape<'a> {
    pub fn detect(payload: &'a ChartPayload) -> Self {
        let price = payload.series.get(PRICE_RETURN_SERIES);
        let total = payload.series.get(TOTAL_RETURN_SERIES);

        if let Some(labels) = payload.labels.as_deref().filter(|labels| !labels.is_empty()) {
            if let (Some(Value::Array(price)), Some(Value::Array(total))) = (price, total) {
                return Self::Labelled {
                    labels,
                    price,
                    total,
                };
            }
        }

        if let (Some(Value::Object(price)), Some(Value::Object(total))) = (price, total) {
            return Self::Keyed { price, total };
        }

        Self::Unrecognized
    }

    /// Rows in payload order
    pub fn rows(&self, warnings: &mut Vec<AdaptationWarning>) -> Vec<ComparisonRow> {
        match self {
            Self::Labelled {
                labels,
                price,
                total,
            } => {
                if labels.len() != price.len() || labels.len() != total.len() {
                    warnings.push(AdaptationWarning::ComparisonLengthMismatch {
                        labels: labels.len(),
                        price: price.len(),
                        total: total.len(),
                    });
                }
                labels
                    .iter()
                    .zip(price.iter().zip(total.iter()))
                    .filter_map(|(ticker, (p, t))| comparison_row(ticker, Some(p), Some(t), warnings))
                    .collect()
            }
            Self::Keyed { price, total } => price
                .iter()
                .filter_map(|(ticker, p)| comparison_row(ticker, Some(p), total.get(ticker), warnings))
                .collect(),
            Self::Unrecognized => {
                warnings.push(AdaptationWarning::UnrecognizedComparison);
                Vec::new()
            }
        }
    }
}

fn comparison_row(
    ticker: &str,
    price: Option<&Value>,
    total: Option<&Value>,
    warnings: &mut Vec<AdaptationWarning>,
) -> Option<ComparisonRow> {
    match (price.and_then(Value::as_f64), total.and_then(Value::as_f64)) {
        (Some(price_return), Some(total_return)) => Some(ComparisonRow {
            ticker: ticker.to_string(),
            price_return,
            total_return,
        }),
        _ => {
            warnings.push(AdaptationWarning::ComparisonValueMissing {
                ticker: ticker.to_string(),
            });
            None
        }
    }
}

/// Order rows by the request's tickers; rows the request does not name
/// (such as the portfolio row) lead in payload order
pub fn order_by_request(mut rows: Vec<ComparisonRow>, tickers: &[String]) -> Vec<ComparisonRow> {
    rows.sort_by_key(|row| {
        tickers
            .iter()
            .position(|ticker| ticker.eq_ignore_ascii_case(&row.ticker))
            .map_or(0, |index| index + 1)
    });
    rows
}

/// Read every named series of a cumulative or amount payload
pub fn adapt_time_series(
    payload: &ChartPayload,
    chart: ChartKind,
    warnings: &mut Vec<AdaptationWarning>,
) -> Vec<NamedCurve> {
    let dates: &[String] = match payload.dates.as_deref() {
        Some(dates) => dates,
        None => {
            warnings.push(AdaptationWarning::MissingDates { chart });
            &[]
        }
    };

    let mut curves = Vec::with_capacity(payload.series.len());
    for (name, value) in &payload.series {
        let Value::Array(values) = value else {
            warnings.push(AdaptationWarning::SeriesNotArray {
                chart,
                series: name.clone(),
            });
            continue;
        };

        if !dates.is_empty() && values.len() != dates.len() {
            warnings.push(AdaptationWarning::SeriesLengthMismatch {
                chart,
                series: name.clone(),
                points: values.len(),
                dates: dates.len(),
            });
        }

        let values: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        curves.push(NamedCurve {
            name: name.clone(),
            points: points(dates, &values),
        });
    }
    curves
}

fn points(dates: &[String], values: &[Option<f64>]) -> Vec<SeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| SeriesPoint {
            date: dates.get(i).cloned().unwrap_or_default(),
            value: *value,
        })
        .collect()
}

/// Drawdown from the portfolio row, if it reports any points
pub fn adapt_drawdown(
    portfolio: Option<&StockReturn>,
    warnings: &mut Vec<AdaptationWarning>,
) -> Option<DrawdownSeries> {
    let portfolio = portfolio?;
    let values = portfolio.max_drawdowns.as_deref().filter(|v| !v.is_empty())?;

    let dates = match portfolio.dates.as_deref() {
        Some(dates) => dates,
        None => {
            warnings.push(AdaptationWarning::DrawdownMissingDates);
            &[]
        }
    };

    Some(DrawdownSeries {
        points: points(dates, values),
        axis: AxisDirection::Inverted,
    })
}

/// Adapt one run's payloads into the canonical model
pub fn adapt(raw: RawAnalysis, request: &AnalysisRequest, run: RunToken) -> AnalysisResult {
    let mut warnings = Vec::new();
    let suppressed = |section: Section| {
        raw.degradation
            .as_ref()
            .is_some_and(|degradation| degradation.suppresses(section))
    };

    let portfolio_series = raw
        .curves
        .as_ref()
        .map(|payload| adapt_time_series(payload, raw.curves_kind, &mut warnings))
        .unwrap_or_default();

    let comparison = match raw.comparison.as_ref() {
        Some(payload) => {
            let rows = ComparisonShape::detect(payload).rows(&mut warnings);
            order_by_request(rows, request.tickers())
        }
        None => {
            warnings.push(AdaptationWarning::UnrecognizedComparison);
            Vec::new()
        }
    };

    let amount_series = if request.tracks_amount() && !suppressed(Section::Amount) {
        raw.amount
            .as_ref()
            .map(|payload| adapt_time_series(payload, ChartKind::Amount, &mut warnings))
    } else {
        None
    };

    let portfolio_row = raw.portfolio.portfolio_stock_return.as_ref();
    let drawdown = if suppressed(Section::Drawdown) {
        None
    } else {
        adapt_drawdown(portfolio_row, &mut warnings)
    };

    let summary = match portfolio_row {
        Some(row) => SummaryMetrics::from(row),
        None => {
            warnings.push(AdaptationWarning::MissingPortfolioMetrics);
            SummaryMetrics::default()
        }
    };

    let per_ticker = portfolio_row
        .map(|row| TickerMetrics {
            ticker: PORTFOLIO_LABEL.to_string(),
            metrics: SummaryMetrics::from(row),
        })
        .into_iter()
        .chain(raw.portfolio.stock_returns.iter().map(|row| TickerMetrics {
            ticker: row.ticker.clone(),
            metrics: SummaryMetrics::from(row),
        }))
        .collect();

    for warning in &warnings {
        warn!(run = %run, %warning, "adaptation warning");
    }
    debug!(
        run = %run,
        curves = portfolio_series.len(),
        comparison = comparison.len(),
        warnings = warnings.len(),
        "adapted analysis response"
    );

    AnalysisResult {
        portfolio_series,
        comparison,
        amount_series,
        drawdown,
        summary,
        per_ticker,
        period: Period {
            start_date: raw.portfolio.start_date,
            end_date: raw.portfolio.end_date,
        },
        warnings,
        degradation: raw.degradation,
        run,
    }
}
