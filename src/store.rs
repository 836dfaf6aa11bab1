//! In-memory collaborators: ledger source, forecast and anomaly stores, balance cache
//!
//! Used by the CLI, the batch runner and the tests. A deployment backed by a
//! database implements the same traits from [`crate::service`].

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::Anomaly;
use crate::error::ServiceError;
use crate::ledger::{RecurringTransaction, Transaction};
use crate::projection::{Breakdown, ForecastPoint};
use crate::service::{AnomalySink, ForecastSink, LedgerSource};

/// Default lifetime of a cached balance quote
pub const DEFAULT_BALANCE_TTL_SECS: i64 = 60;

/// Ledger data held in memory, keyed by user
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<String, f64>,
    transactions: HashMap<String, Vec<Transaction>>,
    recurring: HashMap<String, Vec<RecurringTransaction>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, user_id: &str, balance: f64) {
        self.balances.insert(user_id.to_string(), balance);
    }

    pub fn add_transactions(&mut self, user_id: &str, transactions: impl IntoIterator<Item = Transaction>) {
        self.transactions
            .entry(user_id.to_string())
            .or_default()
            .extend(transactions);
    }

    pub fn add_recurring(&mut self, user_id: &str, recurring: impl IntoIterator<Item = RecurringTransaction>) {
        self.recurring
            .entry(user_id.to_string())
            .or_default()
            .extend(recurring);
    }

    /// Every user that has a balance, transactions or recurring entries
    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .balances
            .keys()
            .chain(self.transactions.keys())
            .chain(self.recurring.keys())
            .cloned()
            .collect();
        users.sort();
        users.dedup();
        users
    }
}

impl LedgerSource for InMemoryLedger {
    fn current_balance(&self, user_id: &str) -> Result<f64, ServiceError> {
        Ok(self.balances.get(user_id).copied().unwrap_or(0.0))
    }

    fn transactions(&self, user_id: &str, since: Option<NaiveDate>) -> Result<Vec<Transaction>, ServiceError> {
        let all = self.transactions.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(all
            .iter()
            .filter(|t| since.map_or(true, |s| t.date >= s))
            .cloned()
            .collect())
    }

    fn active_recurring(&self, user_id: &str) -> Result<Vec<RecurringTransaction>, ServiceError> {
        let all = self.recurring.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(all.iter().filter(|r| r.is_active).cloned().collect())
    }
}

/// Persisted shape of a forecast point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredForecast {
    pub user_id: String,
    pub forecast_date: NaiveDate,
    pub projected_balance: f64,
    pub confidence_level: f64,
    pub breakdown: Breakdown,
}

/// Forecast points keyed by `(user, date)` with upsert semantics
#[derive(Debug, Clone, Default)]
pub struct ForecastStore {
    rows: BTreeMap<(String, NaiveDate), StoredForecast>,
}

impl ForecastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, user_id: &str, date: NaiveDate) -> Option<&StoredForecast> {
        self.rows.get(&(user_id.to_string(), date))
    }

    /// Stored points for `user_id` dated within `[from, to]`, ascending
    pub fn range(&self, user_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<ForecastPoint> {
        if from > to {
            return Vec::new();
        }
        let user = user_id.to_string();
        self.rows
            .range((user.clone(), from)..=(user, to))
            .map(|(_, row)| ForecastPoint {
                date: row.forecast_date,
                projected_balance: row.projected_balance,
                confidence: row.confidence_level,
                breakdown: row.breakdown,
            })
            .collect()
    }
}

impl ForecastSink for ForecastStore {
    fn upsert_forecast(&mut self, user_id: &str, points: &[ForecastPoint]) -> Result<usize, ServiceError> {
        for point in points {
            let row = StoredForecast {
                user_id: user_id.to_string(),
                forecast_date: point.date,
                projected_balance: point.projected_balance,
                confidence_level: point.confidence,
                breakdown: point.breakdown,
            };
            self.rows.insert((user_id.to_string(), point.date), row);
        }
        Ok(points.len())
    }
}

/// A recorded anomaly and its read state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnomaly {
    pub id: u64,
    pub user_id: String,
    pub anomaly: Anomaly,
    pub is_acknowledged: bool,
}

/// Append-only anomaly log. Acknowledgment is tracked here, never by the detector.
#[derive(Debug, Clone, Default)]
pub struct AnomalyLog {
    entries: Vec<StoredAnomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first, up to `limit`
    pub fn recent(&self, user_id: &str, limit: usize) -> Vec<&StoredAnomaly> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .collect()
    }

    /// Mark an entry as read; returns false for an unknown id
    pub fn acknowledge(&mut self, id: u64) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.is_acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn unacknowledged_count(&self, user_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.user_id == user_id && !e.is_acknowledged)
            .count()
    }
}

impl AnomalySink for AnomalyLog {
    fn append_anomalies(&mut self, user_id: &str, anomalies: &[Anomaly]) -> Result<usize, ServiceError> {
        for anomaly in anomalies {
            let id = self.entries.len() as u64 + 1;
            self.entries.push(StoredAnomaly {
                id,
                user_id: user_id.to_string(),
                anomaly: anomaly.clone(),
                is_acknowledged: false,
            });
        }
        Ok(anomalies.len())
    }
}

/// A cached balance with its own expiry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedBalance {
    pub balance: f64,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CachedBalance {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl
    }
}

/// Current-balance quotes with per-entry TTL. Owned by whoever needs it;
/// there is no process-wide instance.
#[derive(Debug, Clone)]
pub struct BalanceCache {
    default_ttl: Duration,
    entries: HashMap<String, CachedBalance>,
}

impl Default for BalanceCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_BALANCE_TTL_SECS))
    }
}

impl BalanceCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached balance if still fresh at `now`
    pub fn get(&self, user_id: &str, now: DateTime<Utc>) -> Option<f64> {
        self.entries
            .get(user_id)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.balance)
    }

    pub fn insert(&mut self, user_id: &str, balance: f64, now: DateTime<Utc>) {
        self.insert_with_ttl(user_id, balance, now, self.default_ttl);
    }

    pub fn insert_with_ttl(&mut self, user_id: &str, balance: f64, now: DateTime<Utc>, ttl: Duration) {
        self.entries.insert(
            user_id.to_string(),
            CachedBalance {
                balance,
                fetched_at: now,
                ttl,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    pub fn invalidate(&mut self, user_id: &str) -> bool {
        self.entries.remove(user_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyKind, Severity};
    use crate::ledger::{Frequency, TransactionType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn point(d: u32, balance: f64) -> ForecastPoint {
        ForecastPoint {
            date: date(2024, 1, d),
            projected_balance: balance,
            confidence: 1.0,
            breakdown: Breakdown::default(),
        }
    }

    #[test]
    fn test_forecast_upsert_overwrites_same_date() {
        let mut store = ForecastStore::new();
        store.upsert_forecast("u1", &[point(1, 100.0), point(2, 90.0)]).unwrap();
        store.upsert_forecast("u1", &[point(2, 50.0), point(3, 40.0)]).unwrap();
        store.upsert_forecast("u2", &[point(2, 7.0)]).unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.get("u1", date(2024, 1, 2)).unwrap().projected_balance, 50.0);

        let range = store.range("u1", date(2024, 1, 2), date(2024, 1, 3));
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].projected_balance, 50.0);
    }

    #[test]
    fn test_anomaly_log_append_and_acknowledge() {
        let anomaly = Anomaly {
            transaction_id: Some("t1".to_string()),
            category_id: None,
            kind: AnomalyKind::UnusualCategory,
            severity: Severity::Low,
            description: String::new(),
            suggested_action: String::new(),
        };
        let mut log = AnomalyLog::new();
        log.append_anomalies("u1", &[anomaly.clone(), anomaly.clone()]).unwrap();
        log.append_anomalies("u1", &[anomaly]).unwrap();

        assert_eq!(log.len(), 3);
        assert_eq!(log.unacknowledged_count("u1"), 3);
        assert!(log.acknowledge(2));
        assert!(!log.acknowledge(99));
        assert_eq!(log.unacknowledged_count("u1"), 2);
        assert_eq!(log.recent("u1", 1)[0].id, 3);
        assert_eq!(log.unacknowledged_count("u2"), 0);
    }

    #[test]
    fn test_balance_cache_ttl_and_eviction() {
        let t0 = DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
        let mut cache = BalanceCache::new(Duration::seconds(30));
        cache.insert("u1", 100.0, t0);
        cache.insert_with_ttl("u2", 200.0, t0, Duration::seconds(300));

        assert_eq!(cache.get("u1", t0 + Duration::seconds(10)), Some(100.0));
        assert_eq!(cache.get("u1", t0 + Duration::seconds(30)), None);
        assert_eq!(cache.get("u2", t0 + Duration::seconds(60)), Some(200.0));

        assert_eq!(cache.evict_expired(t0 + Duration::seconds(60)), 1);
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate("u2"));
        assert!(!cache.invalidate("u2"));
        assert_eq!(cache.get("u2", t0), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_in_memory_ledger_filters() {
        let mut ledger = InMemoryLedger::new();
        ledger.set_balance("u1", 500.0);
        ledger.add_transactions(
            "u1",
            vec![
                Transaction::new("old", date(2023, 12, 1), 10.0, TransactionType::Expense, None),
                Transaction::new("new", date(2024, 1, 10), 10.0, TransactionType::Expense, None),
            ],
        );
        let mut paused = RecurringTransaction::new("r2", 5.0, TransactionType::Expense, Frequency::Weekly, date(2024, 1, 1));
        paused.is_active = false;
        ledger.add_recurring(
            "u1",
            vec![
                RecurringTransaction::new("r1", 5.0, TransactionType::Expense, Frequency::Weekly, date(2024, 1, 1)),
                paused,
            ],
        );

        assert_eq!(ledger.current_balance("u1").unwrap(), 500.0);
        assert_eq!(ledger.current_balance("nobody").unwrap(), 0.0);
        assert_eq!(ledger.transactions("u1", Some(date(2024, 1, 1))).unwrap().len(), 1);
        assert_eq!(ledger.transactions("u1", None).unwrap().len(), 2);
        assert_eq!(ledger.active_recurring("u1").unwrap().len(), 1);
        assert_eq!(ledger.users(), vec!["u1".to_string()]);
    }
}
