//! Balance projection over a 30, 60 or 90 day horizon

mod state;
mod engine;
mod points;

pub use state::ForecastState;
pub use engine::{project, ForecastConfig, ForecastProjector, Horizon, DEFAULT_CONFIDENCE_FLOOR};
pub use points::{
    max_balance, min_balance, BalanceRisk, Breakdown, ForecastPoint, ForecastRun, ForecastSummary,
    DECLINING_THRESHOLD,
};
