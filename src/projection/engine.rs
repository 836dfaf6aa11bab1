//! Day-by-day balance projection
//!
//! For each day from today to today + horizon (inclusive):
//! 1. recurring entries that fire on the day move the balance
//! 2. on weekdays the baseline is deducted as background spending
//! 3. confidence decays linearly from 1.0 to the floor at the last day

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::points::{Breakdown, ForecastPoint, ForecastRun};
use super::state::ForecastState;
use crate::error::EngineError;
use crate::ledger::{RecurringTransaction, TransactionType};
use crate::recurrence::fires_on;

/// Lowest confidence a point can carry
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.5;

/// Supported forecast horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Horizon {
    #[default]
    Days30,
    Days60,
    Days90,
}

impl Horizon {
    pub fn days(&self) -> u32 {
        match self {
            Horizon::Days30 => 30,
            Horizon::Days60 => 60,
            Horizon::Days90 => 90,
        }
    }
}

impl TryFrom<i64> for Horizon {
    type Error = EngineError;

    fn try_from(days: i64) -> Result<Self, Self::Error> {
        match days {
            30 => Ok(Horizon::Days30),
            60 => Ok(Horizon::Days60),
            90 => Ok(Horizon::Days90),
            other => Err(EngineError::UnsupportedHorizon(other)),
        }
    }
}

impl From<Horizon> for i64 {
    fn from(horizon: Horizon) -> Self {
        i64::from(horizon.days())
    }
}

/// Configuration for a forecast run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Number of days past today to project
    pub horizon: Horizon,

    /// Whether recurring transactions move the balance
    pub include_recurring: bool,

    /// Confidence reached on the last day and never undercut
    pub confidence_floor: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: Horizon::Days30,
            include_recurring: true,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

/// Forecast projector
#[derive(Debug, Clone, Default)]
pub struct ForecastProjector {
    config: ForecastConfig,
}

impl ForecastProjector {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Project the balance forward from `today`.
    ///
    /// Amounts are assumed validated by the caller; only the contract checks
    /// (finite inputs, recurring entries present when requested) run here.
    pub fn project(
        &self,
        start_balance: f64,
        today: NaiveDate,
        recurring: &[RecurringTransaction],
        baseline: f64,
    ) -> Result<ForecastRun, EngineError> {
        self.check_inputs(start_balance, recurring, baseline)?;

        let days = self.config.horizon.days();
        let active: Vec<&RecurringTransaction> = if self.config.include_recurring {
            recurring.iter().filter(|r| r.is_active).collect()
        } else {
            Vec::new()
        };

        debug!(
            "projecting {} days from {} (start balance {:.2}, baseline {:.2}, {} active recurring)",
            days,
            today,
            start_balance,
            baseline,
            active.len()
        );

        let mut points = Vec::with_capacity(days as usize + 1);
        let mut state = ForecastState::start(today, start_balance);

        loop {
            points.push(self.project_day(&mut state, &active, baseline));

            if state.day_index >= days {
                break;
            }
            state.advance_day();
        }

        let run = ForecastRun {
            horizon: self.config.horizon,
            include_recurring: self.config.include_recurring,
            start_balance,
            baseline,
            points,
        };

        info!(
            "forecast {}..{}: final balance {:.2}",
            today,
            state.date,
            state.balance
        );

        Ok(run)
    }

    fn check_inputs(
        &self,
        start_balance: f64,
        recurring: &[RecurringTransaction],
        baseline: f64,
    ) -> Result<(), EngineError> {
        if !start_balance.is_finite() {
            return Err(EngineError::NonFinite {
                field: "start_balance",
                value: start_balance,
            });
        }
        if !baseline.is_finite() {
            return Err(EngineError::NonFinite {
                field: "baseline",
                value: baseline,
            });
        }
        if self.config.include_recurring && recurring.is_empty() {
            return Err(EngineError::MissingRecurring);
        }
        Ok(())
    }

    /// Apply one day's flows to `state` and emit its point
    fn project_day(
        &self,
        state: &mut ForecastState,
        active: &[&RecurringTransaction],
        baseline: f64,
    ) -> ForecastPoint {
        let date = state.date;
        for recurring in active.iter().filter(|r| fires_on(r, date)) {
            match recurring.transaction_type {
                TransactionType::Income => state.apply_income(recurring.amount),
                TransactionType::Expense => state.apply_expense(recurring.amount),
            }
            state.recurring_net += recurring.signed_amount();
        }

        if state.is_weekday() {
            state.apply_expense(baseline);
        }

        ForecastPoint {
            date,
            projected_balance: state.balance,
            confidence: self.confidence(state.day_index),
            breakdown: Breakdown {
                income: state.daily_income,
                expenses: state.daily_expenses,
                recurring: state.recurring_net,
            },
        }
    }

    /// Linear decay from 1.0 on day 0 to the floor on the last day
    pub fn confidence(&self, day_index: u32) -> f64 {
        let floor = self.config.confidence_floor;
        let days = f64::from(self.config.horizon.days());
        let progress = f64::from(day_index) / days;
        (1.0 - progress * (1.0 - floor)).max(floor)
    }
}

/// Project with explicit parameters instead of a config struct
pub fn project(
    start_balance: f64,
    today: NaiveDate,
    days: i64,
    recurring: &[RecurringTransaction],
    baseline: f64,
    include_recurring: bool,
) -> Result<ForecastRun, EngineError> {
    let config = ForecastConfig {
        horizon: Horizon::try_from(days)?,
        include_recurring,
        ..Default::default()
    };
    ForecastProjector::new(config).project(start_balance, today, recurring, baseline)
}
