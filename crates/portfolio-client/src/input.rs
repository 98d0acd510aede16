//! Raw form input and its normalization into an [`AnalysisRequest`]

use crate::error::ValidationError;
use crate::request::AnalysisRequest;
use crate::weights::WeightAllocation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Unvalidated input exactly as the user typed it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    /// Comma separated ticker symbols
    pub tickers: String,
    /// `YYYY-MM-DD` or `YYYY-MM`
    pub start_date: String,
    /// `YYYY-MM-DD` or `YYYY-MM`
    pub end_date: String,
    pub include_dividends: bool,
    /// Initial investment; blank means no amount tracking
    pub initial_amount: String,
}

impl RawInput {
    pub fn new(tickers: impl Into<String>) -> Self {
        Self {
            tickers: tickers.into(),
            ..Default::default()
        }
    }

    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = start.into();
        self.end_date = end.into();
        self
    }

    pub fn with_dividends(mut self, include: bool) -> Self {
        self.include_dividends = include;
        self
    }

    pub fn with_initial_amount(mut self, amount: impl Into<String>) -> Self {
        self.initial_amount = amount.into();
        self
    }

    /// Replace the start date, e.g. with a service-suggested one
    pub fn with_start_date(mut self, start: impl Into<String>) -> Self {
        self.start_date = start.into();
        self
    }

    /// Parsed ticker list, used to rebuild the weight allocation
    pub fn ticker_list(&self) -> Vec<String> {
        parse_tickers(&self.tickers)
    }
}

/// Split on commas, trim, uppercase and drop empty tokens
///
/// Order is kept and duplicates pass through.
pub fn parse_tickers(text: &str) -> Vec<String> {
    text.split(',')
        .map(|token| token.trim().to_uppercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// `YYYY-MM` becomes `YYYY-MM-01`; anything else is returned unchanged
pub fn normalize_date_input(value: &str) -> String {
    let value = value.trim();
    let bytes = value.as_bytes();
    let is_year_month = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit);

    if is_year_month {
        format!("{value}-01")
    } else {
        value.to_string()
    }
}

/// Non-negative decimal; anything unusable means 0 (no amount tracking)
pub fn parse_initial_amount(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => amount,
        _ => 0.0,
    }
}

fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Validate raw input and attach the allocation's weights
///
/// Checks run in order and stop at the first failure: at least one ticker,
/// both dates present, start strictly before end. Dates that are not
/// calendar dates cannot be ordered here and are left for the service.
pub fn normalize(
    raw: &RawInput,
    allocation: &WeightAllocation,
) -> Result<AnalysisRequest, ValidationError> {
    let tickers = parse_tickers(&raw.tickers);
    if tickers.is_empty() {
        return Err(ValidationError::NoTickers);
    }

    let start = normalize_date_input(&raw.start_date);
    let end = normalize_date_input(&raw.end_date);
    if start.is_empty() || end.is_empty() {
        return Err(ValidationError::MissingDates);
    }

    if let (Some(s), Some(e)) = (parse_calendar_date(&start), parse_calendar_date(&end)) {
        if s >= e {
            return Err(ValidationError::StartNotBeforeEnd { start, end });
        }
    }

    let amount = parse_initial_amount(&raw.initial_amount);
    tracing::debug!(
        tickers = tickers.len(),
        %start,
        %end,
        amount,
        "normalized analysis input"
    );

    AnalysisRequest::new(tickers, start, end, raw.include_dividends, amount)
        .with_weights(allocation.to_fractions())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(tickers: &str) -> RawInput {
        RawInput::new(tickers).with_dates("2023-01-01", "2023-12-31")
    }

    #[test]
    fn test_parse_tickers() {
        assert_eq!(
            parse_tickers(" aapl, msft ,,nvda , "),
            vec!["AAPL", "MSFT", "NVDA"]
        );
        assert_eq!(parse_tickers("AAPL,aapl"), vec!["AAPL", "AAPL"]);
        assert!(parse_tickers(" , ").is_empty());
    }

    #[test]
    fn test_normalize_date_input() {
        assert_eq!(normalize_date_input("2023-04"), "2023-04-01");
        assert_eq!(normalize_date_input("2023-04-15"), "2023-04-15");
        assert_eq!(normalize_date_input("04/2023"), "04/2023");
        assert_eq!(normalize_date_input(""), "");
    }

    #[test]
    fn test_parse_initial_amount() {
        assert_eq!(parse_initial_amount("1000"), 1000.0);
        assert_eq!(parse_initial_amount(" 2500.50 "), 2500.5);
        assert_eq!(parse_initial_amount(""), 0.0);
        assert_eq!(parse_initial_amount("lots"), 0.0);
        assert_eq!(parse_initial_amount("-10"), 0.0);
        assert_eq!(parse_initial_amount("inf"), 0.0);
    }

    #[test]
    fn test_validation_order() {
        let allocation = WeightAllocation::empty();

        let err = normalize(&RawInput::new(" , "), &allocation).unwrap_err();
        assert_eq!(err, ValidationError::NoTickers);

        // tickers checked before dates
        let err = normalize(&RawInput::new(""), &allocation).unwrap_err();
        assert_eq!(err, ValidationError::NoTickers);

        let err = normalize(&RawInput::new("AAPL").with_dates("2023-01-01", ""), &allocation)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingDates);

        let err = normalize(
            &RawInput::new("AAPL").with_dates("2023-12-31", "2023-12-31"),
            &allocation,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::StartNotBeforeEnd { .. }));
    }

    #[test]
    fn test_month_inputs_are_compared_as_first_of_month() {
        let allocation = WeightAllocation::empty();
        let err = normalize(
            &RawInput::new("AAPL").with_dates("2023-05", "2023-05-01"),
            &allocation,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::StartNotBeforeEnd {
                start: "2023-05-01".to_string(),
                end: "2023-05-01".to_string()
            }
        );

        let request = normalize(
            &RawInput::new("AAPL").with_dates("2023-01", "2023-06"),
            &allocation,
        )
        .unwrap();
        assert_eq!(request.start_date(), "2023-01-01");
        assert_eq!(request.end_date(), "2023-06-01");
    }

    #[test]
    fn test_unrecognised_dates_pass_through() {
        let request = normalize(
            &RawInput::new("AAPL").with_dates("01/02/2023", "2023-12-31"),
            &WeightAllocation::empty(),
        )
        .unwrap();
        assert_eq!(request.start_date(), "01/02/2023");
    }

    #[test]
    fn test_weights_attached_from_allocation() {
        let input = raw("aapl, msft").with_initial_amount("1000").with_dividends(true);
        let allocation = WeightAllocation::rebuild(&input.ticker_list())
            .edit("AAPL", 60.0)
            .unwrap()
            .edit("MSFT", 40.0)
            .unwrap();

        let request = normalize(&input, &allocation).unwrap();
        assert_eq!(request.tickers(), ["AAPL", "MSFT"]);
        assert_eq!(request.weights(), Some(&[0.6, 0.4][..]));
        assert!(request.include_dividends());
        assert_eq!(request.initial_amount(), 1000.0);
    }

    #[test]
    fn test_no_allocation_means_no_weights() {
        let request = normalize(&raw("SPY"), &WeightAllocation::empty()).unwrap();
        assert!(request.weights().is_none());
        assert_eq!(request.initial_amount(), 0.0);
    }

    #[test]
    fn test_stale_allocation_is_rejected() {
        let allocation = WeightAllocation::rebuild(&["AAPL".to_string()]);
        let err = normalize(&raw("AAPL,MSFT"), &allocation).unwrap_err();
        assert!(matches!(err, ValidationError::WeightCountMismatch { .. }));
    }

    #[test]
    fn test_apply_suggested_start() {
        let input = raw("AAPL").with_start_date("2022-03-01");
        assert_eq!(input.start_date, "2022-03-01");
        assert_eq!(input.end_date, "2023-12-31");
    }
}
