use anyhow::Result;
use fedtrust_core::{AnomalyDetector, HttpLedger, RoundTracker};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    fedtrust_core::init_tracing();
    let cfg = fedtrust_core::config::load_config()?;
    info!(target: "aggregator", bind = %cfg.bind_addr, ledger = %cfg.ledger_url,
        expected_clients = cfg.expected_clients, "Starting aggregator service");

    let ledger = Arc::new(HttpLedger::new(
        cfg.ledger_url.clone(),
        Duration::from_millis(cfg.ledger_timeout_ms),
    )?);
    let tracker = Arc::new(RoundTracker::new(
        cfg.initial_model(),
        AnomalyDetector::new(cfg.anomaly_threshold),
        ledger,
    ));

    let app = aggregator_service::router(tracker);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!(target: "aggregator", "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
