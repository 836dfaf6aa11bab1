//! AWS Lambda handler for forecasts, what-if scenarios and anomaly detection
//!
//! Accepts a JSON body carrying the ledger snapshot and an `action`, runs the
//! engine and returns the result as JSON. Supports Lambda Function URLs for
//! direct HTTP access.

use balance_forecast::{
    scenario::ComparisonRow, service::validate_amounts, Anomaly, AnomalyDetector, BaselineEstimator,
    EngineConfig, ForecastPoint, ForecastProjector, ForecastSummary, Horizon, RecurringTransaction, Scenario,
    ScenarioImpact, ScenarioSimulator, Transaction,
};
use chrono::NaiveDate;
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Forecast,
    Simulate,
    Detect,
}

/// Input for one invocation
#[derive(Debug, Deserialize)]
pub struct EngineRequest {
    #[serde(default)]
    pub action: Action,

    /// Forecast start / detection date (default: today, UTC)
    #[serde(default)]
    pub today: Option<NaiveDate>,

    /// Current balance
    #[serde(default)]
    pub starting_balance: f64,

    /// Horizon in days (30, 60 or 90; default: configured horizon)
    #[serde(default)]
    pub days: Option<i64>,

    /// Whether to apply recurring transactions (default: configured value)
    #[serde(default)]
    pub include_recurring: Option<bool>,

    #[serde(default)]
    pub transactions: Vec<Transaction>,

    #[serde(default)]
    pub recurring: Vec<RecurringTransaction>,

    #[serde(default)]
    pub scenarios: Vec<Scenario>,

    /// Engine overrides; omitted fields keep their defaults
    #[serde(default)]
    pub config: EngineConfig,
}

/// Output of one invocation; only the sections relevant to the action are set
#[derive(Debug, Serialize)]
pub struct EngineResponse {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ForecastSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forecast: Vec<ForecastPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ScenarioImpact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Vec<ComparisonRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<Anomaly>>,
    pub execution_time_ms: u64,
}

fn error_response(status: u16, message: &str) -> Result<Response<Body>, Error> {
    let body = serde_json::json!({ "error": message });
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Text(body.to_string()))?)
}

fn json_response(body: &EngineResponse) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::Text(serde_json::to_string(body)?))?)
}

/// Run the requested action; `Err` carries a client-facing message
fn execute(request: EngineRequest) -> Result<EngineResponse, String> {
    let today = request.today.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let config = request.config;

    let mut response = EngineResponse {
        action: request.action,
        baseline: None,
        summary: None,
        forecast: Vec::new(),
        impact: None,
        comparison: None,
        anomalies: None,
        execution_time_ms: 0,
    };

    validate_amounts(&request.transactions, &request.recurring).map_err(|e| e.to_string())?;

    if request.action == Action::Detect {
        let anomalies = AnomalyDetector::new(config.anomaly.clone()).detect(&request.transactions, today);
        response.anomalies = Some(anomalies);
        return Ok(response);
    }

    let mut forecast = config.forecast.clone();
    if let Some(days) = request.days {
        forecast.horizon = Horizon::try_from(days).map_err(|e| e.to_string())?;
    }
    if let Some(include_recurring) = request.include_recurring {
        forecast.include_recurring = include_recurring;
    }

    let baseline = BaselineEstimator::new(config.baseline.clone()).daily_baseline(&request.transactions, today);
    let run = ForecastProjector::new(forecast)
        .project(request.starting_balance, today, &request.recurring, baseline)
        .map_err(|e| e.to_string())?;

    response.baseline = Some(run.baseline);
    response.summary = Some(run.summary());

    if request.action == Action::Simulate {
        let outcome = ScenarioSimulator::new(config.scenario.clone())
            .simulate(&run.points, &request.scenarios)
            .map_err(|e| e.to_string())?;
        response.impact = Some(outcome.impact);
        response.comparison = Some(outcome.comparison());
        response.forecast = outcome.points;
    } else {
        response.forecast = run.points;
    }

    Ok(response)
}

/// Lambda handler function
async fn handler(event: Request) -> Result<Response<Body>, Error> {
    let start = std::time::Instant::now();

    // Handle CORS preflight
    if event.method().as_str() == "OPTIONS" {
        return Ok(Response::builder()
            .status(200)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Body::Empty)?);
    }

    let body_str = match event.body() {
        Body::Text(s) => s.clone(),
        Body::Binary(b) => String::from_utf8_lossy(b).to_string(),
        Body::Empty => "{}".to_string(),
    };

    let request: EngineRequest = match serde_json::from_str(&body_str) {
        Ok(r) => r,
        Err(e) => {
            warn!("rejecting request: {}", e);
            return error_response(400, &format!("Invalid JSON: {}", e));
        }
    };

    let action = request.action;
    let mut response = match execute(request) {
        Ok(r) => r,
        Err(message) => {
            warn!("{:?} request failed: {}", action, message);
            return error_response(400, &message);
        }
    };

    response.execution_time_ms = start.elapsed().as_millis() as u64;
    info!("{:?} completed in {} ms", action, response.execution_time_ms);

    json_response(&response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    run(service_fn(handler)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> EngineRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_forecast_action_defaults() {
        let response = execute(request(
            r#"{"today": "2024-01-08", "starting_balance": 1000.0, "include_recurring": false}"#,
        ))
        .unwrap();

        assert_eq!(response.action, Action::Forecast);
        assert_eq!(response.forecast.len(), 31);
        assert_eq!(response.baseline, Some(0.0));
        assert!(response.anomalies.is_none());
    }

    #[test]
    fn test_simulate_action_returns_comparison() {
        let response = execute(request(
            r#"{
                "action": "simulate",
                "today": "2024-01-08",
                "starting_balance": 1000.0,
                "include_recurring": false,
                "scenarios": [{"id": "s1", "name": "Laptop", "amount": 400.0, "date": "2024-01-10", "kind": "one_time"}]
            }"#,
        ))
        .unwrap();

        let impact = response.impact.unwrap();
        assert_eq!(impact.impact, 400.0);
        assert!(!impact.goes_negative);
        assert_eq!(response.comparison.unwrap().len(), 31);
    }

    #[test]
    fn test_bad_horizon_is_client_error() {
        let err = execute(request(r#"{"days": 45, "include_recurring": false}"#)).unwrap_err();
        assert!(err.contains("45"));
    }

    #[test]
    fn test_missing_recurring_is_client_error() {
        assert!(execute(request(r#"{"starting_balance": 10.0}"#)).is_err());
    }
}
