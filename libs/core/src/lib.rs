//! Core domain logic for the fedtrust aggregation coordinator.
//!
//! Houses the round state tracker, anomaly detector, trust ledger client and
//! trust history recorder. HTTP surfaces live in the service crates.

pub mod anomaly;
pub mod config;
pub mod ledger;
pub mod resilience;
pub mod rounds;
pub mod trust_history;

pub use anomaly::AnomalyDetector;
pub use config::ServiceConfig;
pub use ledger::{HttpLedger, InMemoryLedger, LedgerError, RegisterOutcome, TrustLedger};
pub use resilience::{retry_read, RetryConfig};
pub use rounds::{AggregationResult, ClientUpdate, RoundTracker, SubmitError, SubmitOutcome};
pub use trust_history::TrustHistory;

/// Install the fmt/env-filter subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
