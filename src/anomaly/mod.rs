//! Financial anomaly detection over recent transaction history

mod types;
mod detector;

pub use types::{Anomaly, AnomalyKind, Severity, SpikeDetails};
pub use detector::{AnomalyConfig, AnomalyDetector, CategoryStats, SPIKE_SUGGESTED_ACTION};
