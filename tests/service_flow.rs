use std::cell::Cell;

use approx::assert_relative_eq;
use balance_forecast::{
    ledger::{load_user_recurring_from_reader, load_user_transactions_from_reader},
    AnomalyLog, EngineConfig, EngineError, ForecastService, ForecastSink, ForecastStore, Frequency, Horizon,
    InMemoryLedger, LedgerSource, RecurringTransaction, Scenario, ServiceError, Transaction, TransactionType,
};
use chrono::{Duration, NaiveDate};

const TRANSACTIONS_CSV: &str = "\
user_id,id,date,amount,type,category_id,description
alice,a1,2024-01-02,100,expense,dining,Bistro
alice,a2,2024-01-03,100,expense,dining,Bistro
alice,a3,2024-01-04,100,expense,dining,Bistro
alice,a4,2024-01-05,100,expense,dining,Bistro
alice,a5,2024-01-06,100,expense,dining,Bistro
alice,a6,2024-01-07,600,expense,dining,Tasting menu
alice,a7,2024-01-07,2500,income,,Bonus
bob,b1,2024-01-03,30,expense,transport,Bus pass
";

const RECURRING_CSV: &str = "\
user_id,id,description,amount,type,frequency,next_execution_date,is_active
alice,r1,Salary,3000,income,monthly,2024-01-08,true
alice,r2,Streaming,15,expense,monthly,2024-01-20,false
bob,r3,Rent,900,expense,monthly,2024-01-10,true
";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
}

fn ledger() -> InMemoryLedger {
    let mut ledger = InMemoryLedger::new();
    for (user, txns) in load_user_transactions_from_reader(TRANSACTIONS_CSV.as_bytes()).unwrap() {
        ledger.add_transactions(&user, txns);
    }
    for (user, recurring) in load_user_recurring_from_reader(RECURRING_CSV.as_bytes()).unwrap() {
        ledger.add_recurring(&user, recurring);
    }
    ledger.set_balance("alice", 1000.0);
    ledger.set_balance("bob", 200.0);
    ledger
}

/// Counts balance lookups to observe the cache
struct CountingSource {
    inner: InMemoryLedger,
    balance_calls: Cell<usize>,
}

impl LedgerSource for CountingSource {
    fn current_balance(&self, user_id: &str) -> Result<f64, ServiceError> {
        self.balance_calls.set(self.balance_calls.get() + 1);
        self.inner.current_balance(user_id)
    }

    fn transactions(&self, user_id: &str, since: Option<NaiveDate>) -> Result<Vec<Transaction>, ServiceError> {
        self.inner.transactions(user_id, since)
    }

    fn active_recurring(&self, user_id: &str) -> Result<Vec<RecurringTransaction>, ServiceError> {
        self.inner.active_recurring(user_id)
    }
}

struct FailingSink;

impl ForecastSink for FailingSink {
    fn upsert_forecast(&mut self, _user_id: &str, _points: &[balance_forecast::ForecastPoint]) -> Result<usize, ServiceError> {
        Err(ServiceError::Sink("database unavailable".to_string()))
    }
}

#[test]
fn test_recalculate_persists_every_point() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let mut store = ForecastStore::new();

    let run = service.recalculate("alice", today(), &mut store).unwrap();

    assert_eq!(run.points.len(), 31);
    assert_eq!(store.len(), 31);
    // Expenses 1100 within the trailing 30 days
    assert_relative_eq!(run.baseline, 1100.0 / 30.0);
    // Salary anchored today lands on day 0
    assert_relative_eq!(run.points[0].breakdown.income, 3000.0);

    let stored = store.range("alice", today(), today() + Duration::days(30));
    assert_eq!(stored, run.points);
}

#[test]
fn test_recalculate_twice_overwrites() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let mut store = ForecastStore::new();

    service.recalculate("alice", today(), &mut store).unwrap();
    service.recalculate("alice", today() + Duration::days(1), &mut store).unwrap();

    // Two overlapping 31-day windows shifted by one day
    assert_eq!(store.len(), 32);
}

#[test]
fn test_users_are_isolated() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let mut store = ForecastStore::new();

    let bob = service.recalculate("bob", today(), &mut store).unwrap();
    assert_relative_eq!(bob.start_balance, 200.0);
    assert_relative_eq!(bob.baseline, 1.0);
    assert!(store.get("alice", today()).is_none());
    assert!(bob.summary().first_negative_date.is_some());
}

#[test]
fn test_balance_is_cached_until_cleared() {
    let source = CountingSource {
        inner: ledger(),
        balance_calls: Cell::new(0),
    };
    let mut service = ForecastService::new(source, EngineConfig::default());
    let mut store = ForecastStore::new();

    service.recalculate("alice", today(), &mut store).unwrap();
    service.recalculate("alice", today(), &mut store).unwrap();
    assert_eq!(service.source().balance_calls.get(), 1);

    service.balance_cache_mut().clear();
    service.recalculate("alice", today(), &mut store).unwrap();
    assert_eq!(service.source().balance_calls.get(), 2);
}

#[test]
fn test_horizon_override() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let mut store = ForecastStore::new();

    let mut forecast = service.config().forecast.clone();
    forecast.horizon = Horizon::Days90;
    let run = service.recalculate_with("alice", today(), forecast, &mut store).unwrap();
    assert_eq!(run.points.len(), 91);
}

#[test]
fn test_missing_recurring_is_engine_error() {
    let mut ledger = ledger();
    ledger.set_balance("carol", 50.0);
    let mut service = ForecastService::new(ledger, EngineConfig::default());

    let err = service.recalculate("carol", today(), &mut ForecastStore::new()).unwrap_err();
    assert!(matches!(err, ServiceError::Engine(EngineError::MissingRecurring)));
}

#[test]
fn test_non_positive_amount_rejected() {
    let mut ledger = ledger();
    ledger.add_transactions(
        "alice",
        vec![Transaction::new("bad", today(), -5.0, TransactionType::Expense, None)],
    );
    let mut service = ForecastService::new(ledger, EngineConfig::default());

    let err = service.recalculate("alice", today(), &mut ForecastStore::new()).unwrap_err();
    assert!(matches!(err, ServiceError::Engine(EngineError::NonPositiveAmount { .. })));
}

#[test]
fn test_sink_failure_propagates() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let err = service.recalculate("alice", today(), &mut FailingSink).unwrap_err();
    assert!(matches!(err, ServiceError::Sink(_)));
}

#[test]
fn test_detect_appends_anomalies() {
    let service = ForecastService::new(ledger(), EngineConfig::default());
    let mut log = AnomalyLog::new();

    let anomalies = service.detect_anomalies("alice", today(), &mut log).unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].transaction_id.as_deref(), Some("a6"));
    assert!(anomalies[0].description.ends_with("Tasting menu"));

    service.detect_anomalies("alice", today(), &mut log).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.unacknowledged_count("alice"), 2);
    assert!(service.detect_anomalies("bob", today(), &mut log).unwrap().is_empty());
}

#[test]
fn test_simulate_against_recalculated_forecast() {
    let mut service = ForecastService::new(ledger(), EngineConfig::default());
    let run = service.recalculate("alice", today(), &mut ForecastStore::new()).unwrap();

    let scenarios = vec![Scenario::installments("s1", "Laptop", 1500.0, today() + Duration::days(2), 3)];
    let outcome = service.simulate(&run, &scenarios).unwrap();

    // Only the first 30-day installment falls inside the horizon
    let comparison = outcome.comparison();
    assert_eq!(comparison.len(), run.points.len());
    assert_relative_eq!(comparison[1].original, comparison[1].with_scenarios);
    assert_relative_eq!(comparison[30].original - comparison[30].with_scenarios, 500.0, epsilon = 1e-9);
    assert!(outcome.impact.impact > 0.0);

    let bad = vec![Scenario::one_time("s2", "Nothing", 0.0, today())];
    assert!(matches!(
        service.simulate(&run, &bad),
        Err(ServiceError::Engine(EngineError::NonPositiveAmount { .. }))
    ));
}

#[test]
fn test_inactive_recurring_is_not_fetched() {
    let ledger = ledger();
    let active = ledger.active_recurring("alice").unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].frequency, Frequency::Monthly);
}
