//! Forecast output structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::engine::Horizon;

/// Per-day flows that moved the balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    /// Recurring income that fired on the day
    pub income: f64,

    /// Recurring expenses plus the weekday baseline
    pub expenses: f64,

    /// Net of recurring entries only (income positive, expenses negative)
    pub recurring: f64,
}

/// A single projected day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,

    /// Balance at the end of the day, carrying every earlier day's flows
    pub projected_balance: f64,

    /// Heuristic certainty in [floor, 1.0], non-increasing over the run
    pub confidence: f64,

    pub breakdown: Breakdown,
}

/// Lowest projected balance in a sequence, `None` when empty
pub fn min_balance(points: &[ForecastPoint]) -> Option<f64> {
    points
        .iter()
        .map(|p| p.projected_balance)
        .fold(None, |acc, b| Some(acc.map_or(b, |m: f64| m.min(b))))
}

/// Highest projected balance in a sequence, `None` when empty
pub fn max_balance(points: &[ForecastPoint]) -> Option<f64> {
    points
        .iter()
        .map(|p| p.projected_balance)
        .fold(None, |acc, b| Some(acc.map_or(b, |m: f64| m.max(b))))
}

/// One recalculation of the forecast. Not persisted as a whole; callers store
/// the points keyed by user and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRun {
    pub horizon: Horizon,

    pub include_recurring: bool,

    /// Balance supplied by the caller for day 0, before day 0's flows
    pub start_balance: f64,

    /// Weekday background expense used for this run
    pub baseline: f64,

    /// One point per day in `[today, today + days]`, ascending
    pub points: Vec<ForecastPoint>,
}

impl ForecastRun {
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Headline figures for the run
    pub fn summary(&self) -> ForecastSummary {
        ForecastSummary::from_points(&self.points)
    }
}

/// How worrying the projected path looks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum BalanceRisk {
    /// Balance drops below zero, first on `on`
    Negative { on: NaiveDate },
    /// Minimum falls under 20% of the day-0 balance
    Declining,
    Stable,
}

/// Share of the current balance under which a projection is flagged as declining
pub const DECLINING_THRESHOLD: f64 = 0.2;

/// Summary statistics for a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub days: usize,
    pub current_balance: f64,
    pub min_balance: f64,
    pub max_balance: f64,
    pub final_balance: f64,
    pub first_negative_date: Option<NaiveDate>,
    pub risk: BalanceRisk,
}

impl ForecastSummary {
    pub fn from_points(points: &[ForecastPoint]) -> Self {
        let current_balance = points.first().map(|p| p.projected_balance).unwrap_or(0.0);
        let final_balance = points.last().map(|p| p.projected_balance).unwrap_or(0.0);
        let min = min_balance(points).unwrap_or(0.0);
        let max = max_balance(points).unwrap_or(0.0);
        let first_negative_date = points
            .iter()
            .find(|p| p.projected_balance < 0.0)
            .map(|p| p.date);

        let risk = match first_negative_date {
            Some(on) => BalanceRisk::Negative { on },
            None if min < current_balance * DECLINING_THRESHOLD => BalanceRisk::Declining,
            None => BalanceRisk::Stable,
        };

        Self {
            days: points.len(),
            current_balance,
            min_balance: min,
            max_balance: max,
            final_balance,
            first_negative_date,
            risk,
        }
    }
}
