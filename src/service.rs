//! Service layer: collaborator interfaces and the recalculation flow
//!
//! The engine itself never does I/O. This module defines what it needs from
//! the outside (a ledger source and persistence sinks) and wires one
//! recalculation: fetch, validate, estimate baseline, project, persist.

use chrono::{Duration, NaiveDate, Utc};
use log::{info, warn};

use crate::anomaly::{Anomaly, AnomalyDetector};
use crate::baseline::BaselineEstimator;
use crate::config::EngineConfig;
use crate::error::{EngineError, ServiceError};
use crate::ledger::{RecurringTransaction, Transaction};
use crate::projection::{ForecastConfig, ForecastPoint, ForecastProjector, ForecastRun};
use crate::scenario::{Scenario, ScenarioOutcome, ScenarioSimulator};
use crate::store::BalanceCache;

/// Read access to a user's ledger
pub trait LedgerSource {
    /// Today's actual balance
    fn current_balance(&self, user_id: &str) -> Result<f64, ServiceError>;

    /// Transactions, optionally limited to those dated on or after `since`.
    /// The engine re-filters by date, so ordering and exact bounds are not relied on.
    fn transactions(&self, user_id: &str, since: Option<NaiveDate>) -> Result<Vec<Transaction>, ServiceError>;

    /// Active recurring definitions
    fn active_recurring(&self, user_id: &str) -> Result<Vec<RecurringTransaction>, ServiceError>;
}

impl<T: LedgerSource + ?Sized> LedgerSource for &T {
    fn current_balance(&self, user_id: &str) -> Result<f64, ServiceError> {
        (**self).current_balance(user_id)
    }

    fn transactions(&self, user_id: &str, since: Option<NaiveDate>) -> Result<Vec<Transaction>, ServiceError> {
        (**self).transactions(user_id, since)
    }

    fn active_recurring(&self, user_id: &str) -> Result<Vec<RecurringTransaction>, ServiceError> {
        (**self).active_recurring(user_id)
    }
}

/// Persistence for forecast points; one row per `(user, date)`, later writes overwrite
pub trait ForecastSink {
    fn upsert_forecast(&mut self, user_id: &str, points: &[ForecastPoint]) -> Result<usize, ServiceError>;
}

/// Append-only persistence for anomalies
pub trait AnomalySink {
    fn append_anomalies(&mut self, user_id: &str, anomalies: &[Anomaly]) -> Result<usize, ServiceError>;
}

/// Reject records with amounts the engine cannot interpret
pub fn validate_amounts(
    transactions: &[Transaction],
    recurring: &[RecurringTransaction],
) -> Result<(), EngineError> {
    let bad_transaction = transactions
        .iter()
        .find(|t| !t.amount.is_finite() || t.amount <= 0.0)
        .map(|t| ("transaction", &t.id, t.amount));
    let bad_recurring = recurring
        .iter()
        .find(|r| !r.amount.is_finite() || r.amount <= 0.0)
        .map(|r| ("recurring transaction", &r.id, r.amount));

    match bad_transaction.or(bad_recurring) {
        Some((kind, id, amount)) => {
            warn!("rejecting {} {} with amount {}", kind, id, amount);
            Err(EngineError::NonPositiveAmount {
                kind,
                id: id.clone(),
                amount,
            })
        }
        None => Ok(()),
    }
}

/// Orchestrates forecast recalculation and anomaly detection for one ledger source
pub struct ForecastService<S: LedgerSource> {
    source: S,
    config: EngineConfig,
    balance_cache: BalanceCache,
}

impl<S: LedgerSource> ForecastService<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            balance_cache: BalanceCache::default(),
        }
    }

    /// Replace the balance cache (e.g. with a different TTL)
    pub fn with_balance_cache(mut self, cache: BalanceCache) -> Self {
        self.balance_cache = cache;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn balance_cache_mut(&mut self) -> &mut BalanceCache {
        &mut self.balance_cache
    }

    /// Recalculate with the configured horizon and recurring flag
    pub fn recalculate<K: ForecastSink>(
        &mut self,
        user_id: &str,
        today: NaiveDate,
        sink: &mut K,
    ) -> Result<ForecastRun, ServiceError> {
        let forecast = self.config.forecast.clone();
        self.recalculate_with(user_id, today, forecast, sink)
    }

    /// Recalculate with an explicit forecast configuration and persist the points
    pub fn recalculate_with<K: ForecastSink>(
        &mut self,
        user_id: &str,
        today: NaiveDate,
        forecast: ForecastConfig,
        sink: &mut K,
    ) -> Result<ForecastRun, ServiceError> {
        let start_balance = self.starting_balance(user_id)?;
        let since = today - Duration::days(i64::from(self.config.baseline.window_days));
        let transactions = self.source.transactions(user_id, Some(since))?;
        let recurring = self.source.active_recurring(user_id)?;
        validate_amounts(&transactions, &recurring)?;

        let baseline = BaselineEstimator::new(self.config.baseline.clone()).daily_baseline(&transactions, today);
        let run = ForecastProjector::new(forecast).project(start_balance, today, &recurring, baseline)?;

        let written = sink.upsert_forecast(user_id, &run.points)?;
        info!("user {}: stored {} forecast points", user_id, written);

        Ok(run)
    }

    /// Detect anomalies over the user's recent history and append them
    pub fn detect_anomalies<K: AnomalySink>(
        &self,
        user_id: &str,
        today: NaiveDate,
        sink: &mut K,
    ) -> Result<Vec<Anomaly>, ServiceError> {
        let since = today - Duration::days(i64::from(self.config.anomaly.lookback_days));
        let transactions = self.source.transactions(user_id, Some(since))?;
        validate_amounts(&transactions, &[])?;

        let anomalies = AnomalyDetector::new(self.config.anomaly.clone()).detect(&transactions, today);
        if !anomalies.is_empty() {
            let written = sink.append_anomalies(user_id, &anomalies)?;
            info!("user {}: recorded {} anomalies", user_id, written);
        }

        Ok(anomalies)
    }

    /// Overlay scenarios on a forecast
    pub fn simulate(&self, run: &ForecastRun, scenarios: &[Scenario]) -> Result<ScenarioOutcome, ServiceError> {
        let simulator = ScenarioSimulator::new(self.config.scenario.clone());
        Ok(simulator.simulate(&run.points, scenarios)?)
    }

    fn starting_balance(&mut self, user_id: &str) -> Result<f64, ServiceError> {
        let now = Utc::now();
        if let Some(balance) = self.balance_cache.get(user_id, now) {
            return Ok(balance);
        }
        let balance = self.source.current_balance(user_id)?;
        self.balance_cache.insert(user_id, balance, now);
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Frequency, TransactionType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_amounts() {
        let ok = Transaction::new("t1", date(2024, 1, 1), 10.0, TransactionType::Expense, None);
        let zero = Transaction::new("t2", date(2024, 1, 1), 0.0, TransactionType::Expense, None);
        let negative = RecurringTransaction::new("r1", -5.0, TransactionType::Income, Frequency::Daily, date(2024, 1, 1));

        assert!(validate_amounts(&[ok.clone()], &[]).is_ok());
        assert!(matches!(
            validate_amounts(&[ok.clone(), zero], &[]),
            Err(EngineError::NonPositiveAmount { kind: "transaction", .. })
        ));
        assert!(matches!(
            validate_amounts(&[ok], &[negative]),
            Err(EngineError::NonPositiveAmount { kind: "recurring transaction", .. })
        ));
    }
}
