//! Background spending baseline from trailing expenses
//!
//! The baseline is the sum of expenses inside the trailing window divided by the
//! window length, not by the number of matching transactions, so a few large
//! expenses are spread across the whole window. Calendar policy (weekday-only
//! deduction) belongs to the projector.

use crate::ledger::Transaction;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

/// Default trailing window in days
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Baseline estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Trailing window length; also the divisor
    pub window_days: u32,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// Average daily non-recurring expense
#[derive(Debug, Clone, Default)]
pub struct BaselineEstimator {
    config: BaselineConfig,
}

impl BaselineEstimator {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    /// Daily baseline as of `as_of`: expenses dated `0..=window_days` days before
    /// `as_of`, summed and divided by `window_days`. Zero when nothing matches.
    pub fn daily_baseline(&self, transactions: &[Transaction], as_of: NaiveDate) -> f64 {
        let window = i64::from(self.config.window_days);
        if window == 0 {
            return 0.0;
        }

        let (count, total) = transactions
            .iter()
            .filter(|t| t.is_expense())
            .filter(|t| {
                let age = (as_of - t.date).num_days();
                (0..=window).contains(&age)
            })
            .fold((0usize, 0.0), |(n, sum), t| (n + 1, sum + t.amount));

        if count == 0 {
            return 0.0;
        }

        let baseline = total / window as f64;
        debug!(
            "baseline as of {}: {} expenses totalling {:.2} over {} days -> {:.4}/day",
            as_of, count, total, window, baseline
        );
        baseline
    }
}

/// Daily baseline with the default 30-day window
pub fn daily_baseline(transactions: &[Transaction], as_of: NaiveDate) -> f64 {
    BaselineEstimator::default().daily_baseline(transactions, as_of)
}
