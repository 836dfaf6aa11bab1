//! What-if simulation over a base forecast
//!
//! A scenario is a hypothetical future expense. It lowers the projected
//! balance from its date to the end of the horizon; installment scenarios do
//! the same once per installment. Scenarios are independent subtractions, so
//! the order they are applied in does not change the result.

use chrono::{Duration, Months, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::projection::{min_balance, ForecastPoint};

/// Default spacing between installments in days
pub const DEFAULT_INSTALLMENT_DAYS: u32 = 30;

/// How a scenario's amount is spread over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Whole amount on `date`
    OneTime,
    /// `amount / count` on `date` and on each following cadence step
    Installments {
        #[serde(rename = "installment_count", default = "single_installment")]
        count: u32,
    },
}

fn single_installment() -> u32 {
    1
}

/// A user-declared hypothetical cash event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,

    pub name: String,

    /// Total amount, strictly positive
    pub amount: f64,

    /// Date of the (first) payment
    pub date: NaiveDate,

    #[serde(flatten)]
    pub kind: ScenarioKind,
}

impl Scenario {
    pub fn one_time(id: impl Into<String>, name: impl Into<String>, amount: f64, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            date,
            kind: ScenarioKind::OneTime,
        }
    }

    pub fn installments(
        id: impl Into<String>,
        name: impl Into<String>,
        amount: f64,
        date: NaiveDate,
        count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            amount,
            date,
            kind: ScenarioKind::Installments { count },
        }
    }
}

/// Spacing between installment payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "days", rename_all = "snake_case")]
pub enum InstallmentCadence {
    /// Fixed number of days, ignoring month lengths
    FixedDays(u32),
    /// Same day of each following month, clamped to the month's last day
    CalendarMonth,
}

impl Default for InstallmentCadence {
    fn default() -> Self {
        InstallmentCadence::FixedDays(DEFAULT_INSTALLMENT_DAYS)
    }
}

impl InstallmentCadence {
    /// Date of installment `index` (0-based) for a plan starting on `start`
    pub fn installment_date(&self, start: NaiveDate, index: u32) -> Option<NaiveDate> {
        match self {
            InstallmentCadence::FixedDays(days) => {
                start.checked_add_signed(Duration::days(i64::from(*days) * i64::from(index)))
            }
            InstallmentCadence::CalendarMonth => start.checked_add_months(Months::new(index)),
        }
    }
}

/// Scenario simulation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub installment_cadence: InstallmentCadence,
}

/// Change in worst-case balance caused by a set of scenarios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioImpact {
    pub base_min_balance: f64,

    pub scenario_min_balance: f64,

    /// `base_min_balance - scenario_min_balance`; positive means worse
    pub impact: f64,

    /// Whether the modified path dips below zero
    pub goes_negative: bool,
}

impl ScenarioImpact {
    /// The single definition of impact: difference of the minima
    pub fn between(base: &[ForecastPoint], modified: &[ForecastPoint]) -> Self {
        let base_min_balance = min_balance(base).unwrap_or(0.0);
        let scenario_min_balance = min_balance(modified).unwrap_or(0.0);
        Self {
            base_min_balance,
            scenario_min_balance,
            impact: base_min_balance - scenario_min_balance,
            goes_negative: scenario_min_balance < 0.0,
        }
    }
}

/// One row of a before/after chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub date: NaiveDate,
    pub original: f64,
    pub with_scenarios: f64,
}

/// Modified forecast plus its impact against the base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub points: Vec<ForecastPoint>,
    pub impact: ScenarioImpact,
    #[serde(skip)]
    base_balances: Vec<f64>,
}

impl ScenarioOutcome {
    /// Pair every base point with its modified balance
    pub fn comparison(&self) -> Vec<ComparisonRow> {
        self.points
            .iter()
            .zip(&self.base_balances)
            .map(|(point, original)| ComparisonRow {
                date: point.date,
                original: *original,
                with_scenarios: point.projected_balance,
            })
            .collect()
    }
}

/// Applies scenarios to a base forecast without touching it
#[derive(Debug, Clone, Default)]
pub struct ScenarioSimulator {
    config: ScenarioConfig,
}

impl ScenarioSimulator {
    pub fn new(config: ScenarioConfig) -> Self {
        Self { config }
    }

    /// Copy of `base` with every scenario subtracted from its date onward
    pub fn apply(
        &self,
        base: &[ForecastPoint],
        scenarios: &[Scenario],
    ) -> Result<Vec<ForecastPoint>, EngineError> {
        for scenario in scenarios {
            validate(scenario)?;
        }

        let mut modified = base.to_vec();
        for scenario in scenarios {
            match scenario.kind {
                ScenarioKind::OneTime => {
                    subtract_from(&mut modified, scenario.date, scenario.amount);
                }
                ScenarioKind::Installments { count } => {
                    let count = count.max(1);
                    let installment = scenario.amount / f64::from(count);
                    for index in 0..count {
                        let Some(date) = self.config.installment_cadence.installment_date(scenario.date, index) else {
                            break;
                        };
                        subtract_from(&mut modified, date, installment);
                    }
                }
            }
            debug!("applied scenario {} ({}): {:.2}", scenario.id, scenario.name, scenario.amount);
        }

        Ok(modified)
    }

    /// `apply` plus the impact summary
    pub fn simulate(
        &self,
        base: &[ForecastPoint],
        scenarios: &[Scenario],
    ) -> Result<ScenarioOutcome, EngineError> {
        let points = self.apply(base, scenarios)?;
        let impact = ScenarioImpact::between(base, &points);
        Ok(ScenarioOutcome {
            points,
            impact,
            base_balances: base.iter().map(|p| p.projected_balance).collect(),
        })
    }

    /// Impact of each scenario on its own, in input order
    pub fn impact_per_scenario(
        &self,
        base: &[ForecastPoint],
        scenarios: &[Scenario],
    ) -> Result<Vec<(String, ScenarioImpact)>, EngineError> {
        scenarios
            .iter()
            .map(|scenario| {
                let modified = self.apply(base, std::slice::from_ref(scenario))?;
                Ok((scenario.id.clone(), ScenarioImpact::between(base, &modified)))
            })
            .collect()
    }
}

fn validate(scenario: &Scenario) -> Result<(), EngineError> {
    if !scenario.amount.is_finite() || scenario.amount <= 0.0 {
        return Err(EngineError::NonPositiveAmount {
            kind: "scenario",
            id: scenario.id.clone(),
            amount: scenario.amount,
        });
    }
    Ok(())
}

/// Subtract `amount` from the first point dated on/after `date` and every later point.
/// No effect when `date` is past the last point.
fn subtract_from(points: &mut [ForecastPoint], date: NaiveDate, amount: f64) {
    let start = points.partition_point(|p| p.date < date);
    for point in &mut points[start..] {
        point.projected_balance -= amount;
    }
}
