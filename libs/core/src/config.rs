//! Service configuration: builder defaults, optional file, env overrides.
//!
//! Every knob can be overridden with a `FEDTRUST_`-prefixed environment
//! variable (e.g. `FEDTRUST_LEDGER_URL`) or a config file named by
//! `FEDTRUST_CONFIG_FILE`.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub ledger_url: String,
    pub ledger_timeout_ms: u64,
    pub model_dim: usize,
    pub initial_model_value: f64,
    pub anomaly_threshold: f64,
    /// Reserved for quorum-triggered aggregation; logged at startup and
    /// otherwise unused. Aggregation stays explicitly triggered.
    pub expected_clients: usize,
}

impl ServiceConfig {
    pub fn initial_model(&self) -> Vec<f64> {
        vec![self.initial_model_value; self.model_dim]
    }
}

pub fn load_config() -> Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .set_default("bind_addr", "0.0.0.0:8000")?
        .set_default("ledger_url", "http://127.0.0.1:7545")?
        .set_default("ledger_timeout_ms", 5000i64)?
        .set_default("model_dim", 3i64)?
        .set_default("initial_model_value", 0.5)?
        .set_default("anomaly_threshold", 2.0)?
        .set_default("expected_clients", 3i64)?;
    if let Ok(file) = std::env::var("FEDTRUST_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix("FEDTRUST").separator("__"));
    let cfg = builder.build()?;
    Ok(cfg.try_deserialize()?)
}
