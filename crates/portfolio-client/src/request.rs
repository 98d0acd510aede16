//! Outbound analysis request

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Validated request body shared by every endpoint
///
/// Serialises as `{tickers, weights|null, startDate, endDate,
/// includeDividends, initialAmount}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    tickers: Vec<String>,
    weights: Option<Vec<f64>>,
    start_date: String,
    end_date: String,
    include_dividends: bool,
    initial_amount: f64,
}

impl AnalysisRequest {
    /// Build a request without weights (equal weight, service decides)
    pub fn new(
        tickers: Vec<String>,
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        include_dividends: bool,
        initial_amount: f64,
    ) -> Self {
        Self {
            tickers,
            weights: None,
            start_date: start_date.into(),
            end_date: end_date.into(),
            include_dividends,
            initial_amount: initial_amount.max(0.0),
        }
    }

    /// Attach fractional weights
    ///
    /// An empty vector leaves the weights unspecified rather than zero.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self, ValidationError> {
        if weights.is_empty() {
            self.weights = None;
            return Ok(self);
        }
        if weights.len() != self.tickers.len() {
            return Err(ValidationError::WeightCountMismatch {
                expected: self.tickers.len(),
                actual: weights.len(),
            });
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn start_date(&self) -> &str {
        &self.start_date
    }

    pub fn end_date(&self) -> &str {
        &self.end_date
    }

    pub fn include_dividends(&self) -> bool {
        self.include_dividends
    }

    pub fn initial_amount(&self) -> f64 {
        self.initial_amount
    }

    /// Whether the service should track currency amounts
    pub fn tracks_amount(&self) -> bool {
        self.initial_amount > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AnalysisRequest {
        AnalysisRequest::new(
            vec!["AAPL".to_string(), "MSFT".to_string()],
            "2023-01-01",
            "2023-12-31",
            true,
            1000.0,
        )
        .with_weights(vec![0.6, 0.4])
        .unwrap()
    }

    #[test]
    fn test_wire_shape() {
        let body = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            body,
            json!({
                "tickers": ["AAPL", "MSFT"],
                "weights": [0.6, 0.4],
                "startDate": "2023-01-01",
                "endDate": "2023-12-31",
                "includeDividends": true,
                "initialAmount": 1000.0
            })
        );
    }

    #[test]
    fn test_absent_weights_serialise_as_null() {
        let request = AnalysisRequest::new(vec!["SPY".to_string()], "2023-01-01", "2024-01-01", false, 0.0)
            .with_weights(Vec::new())
            .unwrap();
        assert!(request.weights().is_none());

        let body = serde_json::to_value(&request).unwrap();
        assert!(body["weights"].is_null());
        assert!(!request.tracks_amount());
    }

    #[test]
    fn test_weight_count_must_match() {
        let err = AnalysisRequest::new(vec!["AAPL".to_string()], "2023-01-01", "2023-12-31", true, 0.0)
            .with_weights(vec![0.5, 0.5])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::WeightCountMismatch {
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_roundtrip_is_unchanged() {
        let request = sample();
        let text = serde_json::to_string(&request).unwrap();
        let back: AnalysisRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, request);
    }
}
