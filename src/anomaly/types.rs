//! Anomaly records emitted by the detector

use serde::{Deserialize, Serialize};

/// How urgent an anomaly is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Measurements behind a spending spike
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeDetails {
    /// Mean of the category's amounts over the lookback window
    pub historical_avg: f64,

    /// Amount of the flagged transaction
    pub current_value: f64,

    /// `(current_value - historical_avg) / historical_avg * 100`
    pub deviation_percentage: f64,
}

/// What kind of anomaly was found, with kind-specific data.
///
/// Only `Spike` has a detection rule today. The other kinds are reserved so
/// that a new rule only adds a detection function, not a schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "anomaly_type", rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike(SpikeDetails),
    UnusualCategory,
    MissingExpected,
    LowBalance,
}

impl AnomalyKind {
    pub fn name(&self) -> &'static str {
        match self {
            AnomalyKind::Spike(_) => "spike",
            AnomalyKind::UnusualCategory => "unusual_category",
            AnomalyKind::MissingExpected => "missing_expected",
            AnomalyKind::LowBalance => "low_balance",
        }
    }
}

/// One flagged finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub transaction_id: Option<String>,

    /// `None` for the uncategorized group
    pub category_id: Option<String>,

    #[serde(flatten)]
    pub kind: AnomalyKind,

    pub severity: Severity,

    pub description: String,

    pub suggested_action: String,
}

impl Anomaly {
    pub fn spike_details(&self) -> Option<&SpikeDetails> {
        match &self.kind {
            AnomalyKind::Spike(details) => Some(details),
            _ => None,
        }
    }

    pub fn historical_avg(&self) -> Option<f64> {
        self.spike_details().map(|d| d.historical_avg)
    }

    pub fn current_value(&self) -> Option<f64> {
        self.spike_details().map(|d| d.current_value)
    }

    pub fn deviation_percentage(&self) -> Option<f64> {
        self.spike_details().map(|d| d.deviation_percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spike_serializes_flat() {
        let anomaly = Anomaly {
            transaction_id: Some("t9".to_string()),
            category_id: None,
            kind: AnomalyKind::Spike(SpikeDetails {
                historical_avg: 200.0,
                current_value: 601.0,
                deviation_percentage: 200.5,
            }),
            severity: Severity::High,
            description: "spike".to_string(),
            suggested_action: "check".to_string(),
        };

        let value = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(value["anomaly_type"], "spike");
        assert_eq!(value["historical_avg"], 200.0);
        assert_eq!(value["severity"], "high");
        assert!(value["category_id"].is_null());
        assert_eq!(anomaly.current_value(), Some(601.0));
    }

    #[test]
    fn test_reserved_kinds_have_no_measurements() {
        let anomaly = Anomaly {
            transaction_id: None,
            category_id: None,
            kind: AnomalyKind::LowBalance,
            severity: Severity::Medium,
            description: String::new(),
            suggested_action: String::new(),
        };
        assert_eq!(anomaly.kind.name(), "low_balance");
        assert_eq!(anomaly.historical_avg(), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
