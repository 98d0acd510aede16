//! Client facade wiring normalisation, orchestration and adaptation

use crate::adapter::{self, AnalysisResult};
use crate::config::{ClientConfig, RequestStrategy};
use crate::error::{ClientError, Result};
use crate::input::{self, RawInput};
use crate::orchestrator::AnalysisOrchestrator;
use crate::run::{RunContext, RunState, RunToken};
use crate::service::{AnalysisService, HttpAnalysisService};
use crate::weights::WeightAllocation;
use std::sync::Arc;
use tracing::{info, instrument};

/// Portfolio analysis client
///
/// Submissions may overlap; only the most recent one publishes its result.
pub struct PortfolioClient {
    orchestrator: AnalysisOrchestrator,
    runs: RunContext,
}

impl PortfolioClient {
    /// Create a client talking HTTP to the configured service
    pub fn new(config: ClientConfig) -> Result<Self> {
        let strategy = config.strategy;
        let service = HttpAnalysisService::new(config)?;
        Ok(Self::with_service(Arc::new(service), strategy))
    }

    /// Create a client over any [`AnalysisService`]
    pub fn with_service(service: Arc<dyn AnalysisService>, strategy: RequestStrategy) -> Self {
        Self {
            orchestrator: AnalysisOrchestrator::new(service, strategy),
            runs: RunContext::new(),
        }
    }

    pub fn strategy(&self) -> RequestStrategy {
        self.orchestrator.strategy()
    }

    /// Validate, request and adapt one analysis
    ///
    /// A run overtaken by a newer submission returns
    /// [`ClientError::Superseded`] and leaves the displayed result alone.
    #[instrument(skip_all, fields(tickers = %raw.tickers, strategy = %self.strategy()))]
    pub async fn submit(
        &self,
        raw: &RawInput,
        allocation: &WeightAllocation,
    ) -> Result<Arc<AnalysisResult>> {
        let token = self.runs.begin();

        let request = match input::normalize(raw, allocation) {
            Ok(request) => request,
            Err(e) => {
                self.runs.transition(token, RunState::Idle)?;
                return Err(ClientError::Validation(e));
            }
        };

        self.runs.transition(token, RunState::Requesting)?;
        let response = match self.orchestrator.run(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.runs.fail(token, &e)?;
                return Err(ClientError::Analysis(e));
            }
        };

        self.runs.transition(token, RunState::Adapting)?;
        let result = adapter::adapt(response, &request, token);
        let result = self.runs.commit(token, result)?;

        info!(
            run = %token,
            degraded = result.is_degraded(),
            warnings = result.warnings.len(),
            "analysis ready"
        );
        Ok(result)
    }

    /// Currently displayed result
    pub fn snapshot(&self) -> Option<Arc<AnalysisResult>> {
        self.runs.snapshot()
    }

    /// State of the latest run
    pub fn state(&self) -> RunState {
        self.runs.state()
    }

    pub fn latest_run(&self) -> RunToken {
        self.runs.latest()
    }

    /// Ping the service
    pub async fn health(&self) -> Result<String> {
        Ok(self.orchestrator.service().health().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, ValidationError};
    use crate::orchestrator::Section;
    use crate::request::AnalysisRequest;
    use crate::run::FailureKind;
    use crate::service::MockAnalysisService;
    use crate::wire::{ChartKind, ChartPayload, FullAnalysisResponse, PortfolioData, StockReturn};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    fn response_for(request: &AnalysisRequest) -> FullAnalysisResponse {
        let tickers = request.tickers();
        let price: Vec<f64> = (1..=tickers.len()).map(|i| i as f64 / 10.0).collect();

        FullAnalysisResponse {
            portfolio_data: PortfolioData {
                start_date: Some(request.start_date().to_string()),
                end_date: Some(request.end_date().to_string()),
                stock_returns: tickers
                    .iter()
                    .map(|ticker| StockReturn {
                        ticker: ticker.clone(),
                        ..Default::default()
                    })
                    .collect(),
                portfolio_stock_return: Some(StockReturn {
                    ticker: "Portfolio".to_string(),
                    price_return: 0.15,
                    ..Default::default()
                }),
            },
            comparison_chart: Some(
                serde_json::from_value(json!({
                    "labels": tickers,
                    "series": {"Price Return": price, "Total Return": price}
                }))
                .unwrap(),
            ),
            ..Default::default()
        }
    }

    /// Holds back any request whose first ticker is `SLOW` until released
    #[derive(Default)]
    struct GatedService {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AnalysisService for GatedService {
        async fn analyze(&self, _request: &AnalysisRequest) -> std::result::Result<PortfolioData, AnalysisError> {
            Err(AnalysisError::ServiceError("not used".to_string()))
        }

        async fn analyze_all(
            &self,
            request: &AnalysisRequest,
        ) -> std::result::Result<FullAnalysisResponse, AnalysisError> {
            if request.tickers()[0] == "SLOW" {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(response_for(request))
        }

        async fn chart(
            &self,
            _kind: ChartKind,
            _request: &AnalysisRequest,
        ) -> std::result::Result<ChartPayload, AnalysisError> {
            Err(AnalysisError::ServiceError("not used".to_string()))
        }

        async fn health(&self) -> std::result::Result<String, AnalysisError> {
            Ok("Portfolio Analysis API is running".to_string())
        }
    }

    fn input(tickers: &str) -> RawInput {
        RawInput::new(tickers).with_dates("2023-01-01", "2023-12-31")
    }

    fn allocation_for(raw: &RawInput) -> WeightAllocation {
        WeightAllocation::rebuild(&raw.ticker_list())
    }

    #[tokio::test]
    async fn test_submit_reaches_ready() {
        let client = PortfolioClient::with_service(Arc::new(GatedService::default()), RequestStrategy::Consolidated);
        let raw = input("aapl, msft");

        let result = client.submit(&raw, &allocation_for(&raw)).await.unwrap();

        assert_eq!(client.state(), RunState::Ready);
        assert_eq!(client.snapshot().unwrap().run, result.run);
        assert_eq!(result.comparison.len(), 2);
        assert_eq!(result.comparison[1].ticker, "MSFT");
        assert_eq!(result.per_ticker[0].ticker, "Portfolio");
        assert_eq!(result.summary.price_return, 0.15);
    }

    #[tokio::test]
    async fn test_validation_failure_sends_nothing() {
        let mut mock = MockAnalysisService::new();
        mock.expect_analyze_all().never();
        let client = PortfolioClient::with_service(Arc::new(mock), RequestStrategy::Consolidated);

        let raw = RawInput::new("AAPL").with_dates("2023-12-31", "2023-01-01");
        let err = client.submit(&raw, &WeightAllocation::empty()).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::StartNotBeforeEnd { .. })
        ));
        assert_eq!(client.state(), RunState::Idle);
        assert!(client.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_date_range_mismatch_then_resubmit() {
        let mut mock = MockAnalysisService::new();
        mock.expect_analyze_all().returning(|request| {
            if request.start_date() < "2022-03-01" {
                Err(AnalysisError::DateRangeMismatch {
                    suggested_start_date: "2022-03-01".to_string(),
                })
            } else {
                Ok(response_for(request))
            }
        });
        let client = PortfolioClient::with_service(Arc::new(mock), RequestStrategy::Consolidated);

        let raw = RawInput::new("AAPL,NEWCO").with_dates("2020-01", "2023-12");
        let err = client.submit(&raw, &allocation_for(&raw)).await.unwrap_err();
        assert_eq!(
            client.state(),
            RunState::Failed(FailureKind::DateRangeMismatch)
        );

        let suggested = match err {
            ClientError::Analysis(err) => err.suggested_start_date().map(str::to_string),
            other => panic!("Expected Analysis error, got {other:?}"),
        }
        .unwrap();

        let retry = raw.with_start_date(suggested);
        let result = client.submit(&retry, &allocation_for(&retry)).await.unwrap();
        assert_eq!(result.period.start_date.as_deref(), Some("2022-03-01"));
        assert_eq!(client.state(), RunState::Ready);
    }

    #[tokio::test]
    async fn test_superseded_run_never_replaces_newer_result() {
        let service = Arc::new(GatedService::default());
        let client = Arc::new(PortfolioClient::with_service(service.clone(), RequestStrategy::Consolidated));

        let slow = tokio::spawn({
            let client = Arc::clone(&client);
            async move {
                let raw = input("SLOW");
                client.submit(&raw, &allocation_for(&raw)).await
            }
        });
        service.started.notified().await;

        let raw = input("FAST");
        let fast = client.submit(&raw, &allocation_for(&raw)).await.unwrap();
        service.release.notify_one();

        match slow.await.unwrap() {
            Err(ClientError::Superseded { token, latest }) => {
                assert!(token < latest);
                assert_eq!(latest, fast.run);
            }
            other => panic!("Expected Superseded, got {other:?}"),
        }

        let shown = client.snapshot().unwrap();
        assert_eq!(shown.run, fast.run);
        assert_eq!(shown.comparison[0].ticker, "FAST");
        assert_eq!(client.state(), RunState::Ready);
    }

    #[tokio::test]
    async fn test_legacy_amount_failure_still_ready() {
        let mut mock = MockAnalysisService::new();
        mock.expect_analyze().returning(|request| {
            let mut data = response_for(request).portfolio_data;
            if let Some(portfolio) = data.portfolio_stock_return.as_mut() {
                portfolio.dates = Some(vec!["2023-01-03".to_string(), "2023-01-04".to_string()]);
                portfolio.max_drawdowns = Some(vec![Some(0.0), Some(0.02)]);
            }
            Ok(data)
        });
        mock.expect_chart().returning(|kind, request| match kind {
            ChartKind::Amount => Err(AnalysisError::ServiceError("HTTP 503: Service Unavailable".to_string())),
            ChartKind::Comparison => Ok(response_for(request).comparison_chart.unwrap_or_default()),
            _ => Ok(serde_json::from_value(json!({
                "dates": ["2023-01-03", "2023-01-04"],
                "series": {"Portfolio": [0.0, 0.01], "AAPL": [0.0, 0.02], "MSFT": [0.0, -0.01]}
            }))
            .unwrap()),
        });
        let client = PortfolioClient::with_service(Arc::new(mock), RequestStrategy::Legacy);

        let raw = input("AAPL,MSFT").with_initial_amount("1000");
        let result = client.submit(&raw, &allocation_for(&raw)).await.unwrap();

        assert_eq!(client.state(), RunState::Ready);
        assert!(result.is_degraded());
        assert!(result.amount_series.is_none());
        assert!(!result.shows(Section::Amount));
        assert_eq!(result.comparison.len(), 2);

        assert_eq!(result.portfolio_series.len(), 3);
        assert_eq!(result.portfolio_series[0].points.len(), 2);
        assert!(result.shows(Section::Drawdown));
        let drawdown = result.drawdown.as_ref().unwrap();
        assert_eq!(drawdown.points.len(), 2);
        assert_eq!(drawdown.points[1].value, Some(0.02));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let client = PortfolioClient::with_service(Arc::new(GatedService::default()), RequestStrategy::Legacy);
        assert_eq!(
            client.health().await.unwrap(),
            "Portfolio Analysis API is running"
        );
    }

    #[test]
    fn test_new_validates_config() {
        let config = ClientConfig {
            api_base: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            PortfolioClient::new(config),
            Err(ClientError::Config(_))
        ));
    }
}
