//! Per-ticker weight allocation
//!
//! A [`WeightAllocation`] is an immutable value: every operation returns a new
//! allocation and leaves the receiver untouched. Values are percentages in
//! `[0, 100]` with one-decimal granularity; [`WeightAllocation::to_fractions`]
//! converts them to the fractional weights sent to the service.
//!
//! Balance is advisory only. An allocation that does not add up to 100 can
//! still be submitted; the service is free to reject or rescale it.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

const FULL: f64 = 100.0;
const BALANCE_TOLERANCE: f64 = 0.1;

/// Round to one decimal place
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn equal_share(count: usize) -> f64 {
    round1(FULL / count as f64)
}

/// One allocation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRow {
    pub ticker: String,
    pub percent: f64,
}

/// Advisory classification of the allocation total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightBalance {
    /// Within 0.1 of 100
    Balanced,
    /// Above 100
    Over,
    /// Below 100
    Under,
}

impl fmt::Display for WeightBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Balanced => write!(f, "balanced"),
            Self::Over => write!(f, "over"),
            Self::Under => write!(f, "under"),
        }
    }
}

/// Allocation table, one row per ticker in ticker order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightAllocation {
    rows: Vec<WeightRow>,
}

impl WeightAllocation {
    /// Empty allocation ("no allocations")
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fresh equal split for a ticker list
    ///
    /// Prior edits are not merged; duplicates get their own row.
    pub fn rebuild(tickers: &[String]) -> Self {
        if tickers.is_empty() {
            return Self::empty();
        }
        let share = equal_share(tickers.len());
        Self {
            rows: tickers
                .iter()
                .map(|ticker| WeightRow {
                    ticker: ticker.clone(),
                    percent: share,
                })
                .collect(),
        }
    }

    /// Set one ticker's percentage, clamped into `[0, 100]`
    ///
    /// Siblings are left alone. With duplicate tickers the first row wins;
    /// use [`edit_at`](Self::edit_at) to address a specific row.
    pub fn edit(&self, ticker: &str, percent: f64) -> Result<Self, ValidationError> {
        let index = self
            .rows
            .iter()
            .position(|row| row.ticker.eq_ignore_ascii_case(ticker))
            .ok_or_else(|| ValidationError::UnknownTicker(ticker.to_ascii_uppercase()))?;
        self.edit_at(index, percent)
    }

    /// Set the percentage of the row at `index`, clamped into `[0, 100]`
    pub fn edit_at(&self, index: usize, percent: f64) -> Result<Self, ValidationError> {
        let Some(row) = self.rows.get(index) else {
            return Err(ValidationError::UnknownTicker(format!("#{index}")));
        };
        tracing::debug!(ticker = %row.ticker, percent, "editing weight");

        let percent = if percent.is_finite() {
            percent.clamp(0.0, FULL)
        } else {
            0.0
        };

        let mut next = self.clone();
        next.rows[index].percent = percent;
        Ok(next)
    }

    /// Reset every row to `100 / count`
    pub fn equalize(&self) -> Self {
        if self.rows.is_empty() {
            return self.clone();
        }
        let share = equal_share(self.rows.len());
        self.map_percent(|_| share)
    }

    /// Rescale proportionally so the total becomes 100
    ///
    /// Each row becomes `round1(percent / total * 100)`. A zero total has no
    /// proportions to keep and falls back to [`equalize`](Self::equalize).
    /// When rounding leaves a result that would move again on a second pass,
    /// the drift is settled a tenth at a time on the largest rows so that
    /// normalizing twice equals normalizing once.
    pub fn normalize(&self) -> Self {
        if self.rows.is_empty() {
            return self.clone();
        }
        if self.total() == 0.0 {
            return self.equalize();
        }
        let rescaled = self.rescale();
        if rescaled.rescale() == rescaled {
            return rescaled;
        }
        tracing::debug!(total = rescaled.total(), "settling normalize rounding drift");
        rescaled.settle_rounding_drift()
    }

    fn rescale(&self) -> Self {
        let total = self.total();
        self.map_percent(|percent| round1(percent / total * FULL))
    }

    /// Step the largest rows by a tenth until the total is exactly 100
    fn settle_rounding_drift(mut self) -> Self {
        let drift_tenths = ((FULL - self.total()) * 10.0).round() as i64;
        if drift_tenths == 0 {
            return self;
        }
        let step = if drift_tenths > 0 { 0.1 } else { -0.1 };

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|a, b| self.rows[*b].percent.total_cmp(&self.rows[*a].percent));

        for k in 0..drift_tenths.unsigned_abs() as usize {
            let row = &mut self.rows[order[k % order.len()]];
            row.percent = round1(row.percent + step).clamp(0.0, FULL);
        }
        self
    }

    fn map_percent(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self
                .rows
                .iter()
                .map(|row| WeightRow {
                    ticker: row.ticker.clone(),
                    percent: f(row.percent),
                })
                .collect(),
        }
    }

    /// Sum of all row percentages
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.percent).sum()
    }

    /// Advisory balance of the total
    pub fn balance(&self) -> WeightBalance {
        let total = self.total();
        if (total - FULL).abs() < BALANCE_TOLERANCE {
            WeightBalance::Balanced
        } else if total > FULL {
            WeightBalance::Over
        } else {
            WeightBalance::Under
        }
    }

    /// Total formatted for display, e.g. `"100.0%"`
    pub fn total_label(&self) -> String {
        format!("{:.1}%", self.total())
    }

    /// Fractional weights in ticker order; empty when there are no rows
    pub fn to_fractions(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.percent / FULL).collect()
    }

    pub fn rows(&self) -> &[WeightRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Percentage of the first row for `ticker`
    pub fn percent_of(&self, ticker: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.ticker.eq_ignore_ascii_case(ticker))
            .map(|row| row.percent)
    }
}
