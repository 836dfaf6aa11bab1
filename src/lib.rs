//! Balance Forecast - deterministic cash-flow projection and spending anomaly detection
//!
//! This library provides:
//! - Recurrence expansion for daily/weekly/monthly/yearly definitions
//! - Daily spending baseline from recent expense history
//! - 30/60/90-day balance projection with confidence decay
//! - What-if scenarios (one-time and installment purchases) over a forecast
//! - Per-category spending spike detection
//! - Collaborator traits and in-memory stores for wiring it to a ledger

pub mod error;
pub mod config;
pub mod ledger;
pub mod recurrence;
pub mod baseline;
pub mod projection;
pub mod scenario;
pub mod anomaly;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use error::{EngineError, LoadError, ServiceError};
pub use config::EngineConfig;
pub use ledger::{Frequency, RecurringTransaction, Transaction, TransactionType};
pub use baseline::{daily_baseline, BaselineConfig, BaselineEstimator};
pub use projection::{
    BalanceRisk, ForecastConfig, ForecastPoint, ForecastProjector, ForecastRun, ForecastSummary, Horizon,
};
pub use scenario::{Scenario, ScenarioImpact, ScenarioKind, ScenarioOutcome, ScenarioSimulator};
pub use anomaly::{Anomaly, AnomalyConfig, AnomalyDetector, AnomalyKind, Severity};
pub use service::{AnomalySink, ForecastService, ForecastSink, LedgerSource};
pub use store::{AnomalyLog, BalanceCache, ForecastStore, InMemoryLedger};
