//! Per-category spending spike detection
//!
//! Expenses from the lookback window are grouped by category (uncategorized
//! expenses form their own group). Groups with fewer than `min_samples`
//! entries are skipped. A transaction is a spike when its amount is strictly
//! greater than `mean + z_threshold * std_dev`, using the population standard
//! deviation of its group.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::types::{Anomaly, AnomalyKind, Severity, SpikeDetails};
use crate::ledger::Transaction;

pub const SPIKE_SUGGESTED_ACTION: &str =
    "Check whether this expense was planned and consider adjusting your budget.";

/// Detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Days of history considered, counted back from `as_of` inclusive
    pub lookback_days: u32,

    /// Smallest group that gets statistics at all
    pub min_samples: usize,

    /// Standard deviations above the mean before an amount is a spike
    pub z_threshold: f64,

    /// Deviation percentage above which a spike is high severity
    pub high_deviation_pct: f64,

    /// Deviation percentage above which a spike is medium severity
    pub medium_deviation_pct: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            min_samples: 3,
            z_threshold: 2.0,
            high_deviation_pct: 100.0,
            medium_deviation_pct: 50.0,
        }
    }
}

/// Summary statistics of one category group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category_id: Option<String>,
    pub sample_size: usize,
    pub mean: f64,
    /// Population standard deviation (divides by n)
    pub std_dev: f64,
    /// Amounts strictly above this are spikes
    pub threshold: f64,
}

impl CategoryStats {
    /// Statistics for `amounts` with the given z threshold; `None` when empty
    pub fn from_amounts(category_id: Option<String>, amounts: &[f64], z_threshold: f64) -> Option<Self> {
        if amounts.is_empty() {
            return None;
        }
        let n = amounts.len() as f64;
        let mean = amounts.iter().sum::<f64>() / n;
        let variance = amounts.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        Some(Self {
            category_id,
            sample_size: amounts.len(),
            mean,
            std_dev,
            threshold: mean + z_threshold * std_dev,
        })
    }

    pub fn is_spike(&self, amount: f64) -> bool {
        amount > self.threshold
    }

    /// Percent above the mean; `None` when the mean cannot anchor a percentage
    pub fn deviation_percentage(&self, amount: f64) -> Option<f64> {
        if self.mean <= 0.0 || !self.mean.is_finite() {
            return None;
        }
        Some((amount - self.mean) / self.mean * 100.0)
    }
}

/// Flags statistically unusual transactions
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Run every detection rule over `transactions` as of `as_of`
    pub fn detect(&self, transactions: &[Transaction], as_of: NaiveDate) -> Vec<Anomaly> {
        let groups = self.group_recent_expenses(transactions, as_of);
        let anomalies = self.detect_spikes(&groups);
        info!(
            "anomaly detection as of {}: {} groups, {} anomalies",
            as_of,
            groups.len(),
            anomalies.len()
        );
        anomalies
    }

    /// Statistics for every group large enough to be evaluated
    pub fn category_stats(&self, transactions: &[Transaction], as_of: NaiveDate) -> Vec<CategoryStats> {
        self.group_recent_expenses(transactions, as_of)
            .iter()
            .filter_map(|(category, txns)| self.stats_for(category, txns))
            .collect()
    }

    fn group_recent_expenses<'a>(
        &self,
        transactions: &'a [Transaction],
        as_of: NaiveDate,
    ) -> BTreeMap<Option<String>, Vec<&'a Transaction>> {
        let lookback = i64::from(self.config.lookback_days);
        let mut groups: BTreeMap<Option<String>, Vec<&Transaction>> = BTreeMap::new();

        for txn in transactions.iter().filter(|t| t.is_expense()) {
            let age = (as_of - txn.date).num_days();
            if (0..=lookback).contains(&age) {
                groups.entry(txn.category_id.clone()).or_default().push(txn);
            }
        }

        groups
    }

    fn stats_for(&self, category: &Option<String>, txns: &[&Transaction]) -> Option<CategoryStats> {
        if txns.len() < self.config.min_samples {
            debug!(
                "skipping category {:?}: {} samples < {}",
                category,
                txns.len(),
                self.config.min_samples
            );
            return None;
        }
        let amounts: Vec<f64> = txns.iter().map(|t| t.amount).collect();
        CategoryStats::from_amounts(category.clone(), &amounts, self.config.z_threshold)
    }

    fn detect_spikes(&self, groups: &BTreeMap<Option<String>, Vec<&Transaction>>) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for (category, txns) in groups {
            let Some(stats) = self.stats_for(category, txns) else {
                continue;
            };
            debug!(
                "category {:?}: n={} mean={:.2} sd={:.2} threshold={:.2}",
                category, stats.sample_size, stats.mean, stats.std_dev, stats.threshold
            );

            for txn in txns.iter().filter(|t| stats.is_spike(t.amount)) {
                let Some(deviation) = stats.deviation_percentage(txn.amount) else {
                    continue;
                };
                anomalies.push(self.spike(txn, &stats, deviation));
            }
        }

        anomalies
    }

    fn spike(&self, txn: &Transaction, stats: &CategoryStats, deviation: f64) -> Anomaly {
        let subject = if txn.description.is_empty() {
            txn.category_id.as_deref().unwrap_or("uncategorized")
        } else {
            txn.description.as_str()
        };

        Anomaly {
            transaction_id: Some(txn.id.clone()),
            category_id: txn.category_id.clone(),
            kind: AnomalyKind::Spike(SpikeDetails {
                historical_avg: stats.mean,
                current_value: txn.amount,
                deviation_percentage: deviation,
            }),
            severity: self.severity(deviation),
            description: format!("Spending {:.0}% above average on {}", deviation, subject),
            suggested_action: SPIKE_SUGGESTED_ACTION.to_string(),
        }
    }

    pub fn severity(&self, deviation_percentage: f64) -> Severity {
        if deviation_percentage > self.config.high_deviation_pct {
            Severity::High
        } else if deviation_percentage > self.config.medium_deviation_pct {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}
