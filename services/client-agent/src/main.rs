//! Simplified federated client: register, fetch, perturb, commit, submit.
//!
//! The training step is a stub perturbation of the fetched global model. In
//! malicious mode the agent submits out-of-distribution weights instead, to
//! exercise the server's anomaly screening.

use anyhow::{Context, Result};
use fedtrust_core::{HttpLedger, RegisterOutcome, TrustLedger};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

struct AgentEnv {
    client_id: String,
    address: String,
    server_url: String,
    ledger_url: String,
    malicious: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AgentEnv {
    fn from_env() -> Self {
        Self {
            client_id: env_or("FEDTRUST_AGENT__CLIENT_ID", "client1"),
            address: env_or(
                "FEDTRUST_AGENT__ADDRESS",
                "0x0000000000000000000000000000000000000001",
            ),
            server_url: env_or("FEDTRUST_AGENT__SERVER_URL", "http://127.0.0.1:8000"),
            ledger_url: env_or("FEDTRUST_AGENT__LEDGER_URL", "http://127.0.0.1:7545"),
            malicious: env_or("FEDTRUST_AGENT__MALICIOUS", "0") == "1",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fedtrust_core::init_tracing();
    let env = AgentEnv::from_env();
    info!(target: "client-agent", client_id = %env.client_id, malicious = env.malicious,
        "starting agent");

    let ledger = HttpLedger::new(env.ledger_url.clone(), Duration::from_millis(5000))?;
    match ledger.register_client(&env.address).await? {
        RegisterOutcome::Registered => info!(target: "client-agent", "registered on ledger"),
        RegisterOutcome::AlreadyRegistered => info!(target: "client-agent", "already registered"),
    }

    let http = reqwest::Client::new();
    let model: serde_json::Value = http
        .get(format!("{}/get_global_model", env.server_url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let round = model["round"].as_u64().context("round missing from model response")?;
    let global: Vec<f64> = model["weights"]
        .as_array()
        .context("weights missing from model response")?
        .iter()
        .filter_map(|v| v.as_f64())
        .collect();
    info!(target: "client-agent", round, dim = global.len(), "fetched global model");

    let weights = train(&global, env.malicious);
    let digest = commitment(&weights);

    // Commit the digest on the ledger before posting plaintext weights. A
    // rejected commitment aborts the round without submitting.
    ledger.submit_hash(&env.address, round, digest).await?;
    info!(target: "client-agent", round, digest = %hex::encode(digest), "commitment recorded");

    let resp: serde_json::Value = http
        .post(format!("{}/submit_update", env.server_url))
        .json(&serde_json::json!({
            "client_id": env.client_id,
            "client_address": env.address,
            "weights": weights,
        }))
        .send()
        .await?
        .json()
        .await?;
    info!(target: "client-agent", response = %resp, "submission outcome");
    Ok(())
}

/// Training stub: small random perturbation of the global weights, or a far
/// out-of-distribution vector in malicious mode.
fn train(global: &[f64], malicious: bool) -> Vec<f64> {
    if malicious {
        return global.iter().map(|w| w + 50.0).collect();
    }
    let mut rng = rand::thread_rng();
    global.iter().map(|w| w + rng.gen_range(-0.1..0.1)).collect()
}

/// sha256 over the little-endian f64 encoding of the weight vector.
fn commitment(weights: &[f64]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for w in weights {
        hasher.update(w.to_le_bytes());
    }
    hasher.finalize().into()
}
