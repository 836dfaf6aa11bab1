//! Engine-wide configuration
//!
//! Every section and field has a default, so a JSON file only needs the values
//! it overrides:
//!
//! ```json
//! { "forecast": { "horizon": 90 }, "anomaly": { "z_threshold": 2.5 } }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyConfig;
use crate::baseline::BaselineConfig;
use crate::error::LoadError;
use crate::projection::ForecastConfig;
use crate::scenario::ScenarioConfig;

/// Container for all engine settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub forecast: ForecastConfig,
    pub baseline: BaselineConfig,
    pub anomaly: AnomalyConfig,
    pub scenario: ScenarioConfig,
}

impl EngineConfig {
    /// Load from a JSON file
    pub fn from_json_path(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Parse from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }
}
