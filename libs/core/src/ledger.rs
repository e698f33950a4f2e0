//! Typed client for the external trust ledger.
//!
//! The ledger (a trust-layer contract behind a gateway node) is the authority
//! on trust scores and blacklist state. This module only wraps its fixed call
//! interface: registration, trust and threshold reads, penalties, and
//! per-round commitment hashes. Writes can block for an unbounded mining
//! delay and can revert; both surface as `LedgerError`, never as a silent
//! success.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Contract constants mirrored by the in-memory ledger.
pub const INITIAL_TRUST: u64 = 100;
pub const PENALTY: u64 = 20;
pub const TRUST_THRESHOLD: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger node unreachable: {0}")]
    Unreachable(String),
    #[error("ledger transaction reverted: {0}")]
    Reverted(String),
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),
}

/// Registration is idempotent on the contract side; a repeat attempt is a
/// distinct outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    AlreadyRegistered,
}

#[async_trait]
pub trait TrustLedger: Send + Sync {
    async fn register_client(&self, address: &str) -> Result<RegisterOutcome, LedgerError>;
    async fn get_trust(&self, address: &str) -> Result<u64, LedgerError>;
    async fn threshold(&self) -> Result<u64, LedgerError>;
    async fn penalize_client(&self, address: &str) -> Result<(), LedgerError>;
    async fn submit_hash(
        &self,
        address: &str,
        round: u64,
        digest: [u8; 32],
    ) -> Result<(), LedgerError>;
}

/// Ledger gateway client speaking plain JSON over HTTP.
///
/// Non-2xx responses are reverted transactions, transport errors mean the
/// node is unreachable, and the per-request timeout bounds the mining wait.
pub struct HttpLedger {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TrustResponse {
    trust: u64,
}

#[derive(Deserialize)]
struct ThresholdResponse {
    threshold: u64,
}

#[derive(Deserialize)]
struct RegisterResponse {
    status: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        Ok(Self { base_url, client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> LedgerError {
        if err.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Unreachable(err.to_string())
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(LedgerError::Reverted(format!("{status}: {body}")))
    }
}

#[async_trait]
impl TrustLedger for HttpLedger {
    async fn register_client(&self, address: &str) -> Result<RegisterOutcome, LedgerError> {
        let resp = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(&serde_json::json!({ "address": address }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body: RegisterResponse =
            Self::check(resp).await?.json().await.map_err(|e| self.classify(e))?;
        match body.status.as_str() {
            "already_registered" => Ok(RegisterOutcome::AlreadyRegistered),
            _ => Ok(RegisterOutcome::Registered),
        }
    }

    async fn get_trust(&self, address: &str) -> Result<u64, LedgerError> {
        let resp = self
            .client
            .get(format!("{}/trust/{address}", self.base_url))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body: TrustResponse =
            Self::check(resp).await?.json().await.map_err(|e| self.classify(e))?;
        Ok(body.trust)
    }

    async fn threshold(&self) -> Result<u64, LedgerError> {
        let resp = self
            .client
            .get(format!("{}/threshold", self.base_url))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let body: ThresholdResponse =
            Self::check(resp).await?.json().await.map_err(|e| self.classify(e))?;
        Ok(body.threshold)
    }

    async fn penalize_client(&self, address: &str) -> Result<(), LedgerError> {
        let resp = self
            .client
            .post(format!("{}/penalize", self.base_url))
            .json(&serde_json::json!({ "address": address }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn submit_hash(
        &self,
        address: &str,
        round: u64,
        digest: [u8; 32],
    ) -> Result<(), LedgerError> {
        let resp = self
            .client
            .post(format!("{}/submit_hash", self.base_url))
            .json(&serde_json::json!({
                "address": address,
                "round": round,
                "digest": hex::encode(digest),
            }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[derive(Default)]
struct LedgerState {
    trust: HashMap<String, u64>,
    registered: HashSet<String>,
    blacklisted: HashSet<String>,
    update_hashes: HashMap<(u64, String), [u8; 32]>,
}

/// Contract-faithful in-memory ledger for local runs and tests.
///
/// Unregistered addresses read a trust of zero, the mapping default on the
/// contract side. Penalties saturate at zero and blacklist the address once
/// its trust drops below the threshold.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an address with a specific trust score (test and demo setup).
    pub fn with_trust(self, address: &str, trust: u64) -> Self {
        self.state.lock().trust.insert(address.to_string(), trust);
        self
    }

    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.state.lock().blacklisted.contains(address)
    }

    pub fn committed_hash(&self, round: u64, address: &str) -> Option<[u8; 32]> {
        self.state.lock().update_hashes.get(&(round, address.to_string())).copied()
    }
}

#[async_trait]
impl TrustLedger for InMemoryLedger {
    async fn register_client(&self, address: &str) -> Result<RegisterOutcome, LedgerError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.registered.insert(address.to_string()) {
            return Ok(RegisterOutcome::AlreadyRegistered);
        }
        st.trust.entry(address.to_string()).or_insert(INITIAL_TRUST);
        Ok(RegisterOutcome::Registered)
    }

    async fn get_trust(&self, address: &str) -> Result<u64, LedgerError> {
        Ok(self.state.lock().trust.get(address).copied().unwrap_or(0))
    }

    async fn threshold(&self) -> Result<u64, LedgerError> {
        Ok(TRUST_THRESHOLD)
    }

    async fn penalize_client(&self, address: &str) -> Result<(), LedgerError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let entry = st.trust.entry(address.to_string()).or_insert(0);
        *entry = entry.saturating_sub(PENALTY);
        let new_trust = *entry;
        if new_trust < TRUST_THRESHOLD {
            st.blacklisted.insert(address.to_string());
        }
        Ok(())
    }

    async fn submit_hash(
        &self,
        address: &str,
        round: u64,
        digest: [u8; 32],
    ) -> Result<(), LedgerError> {
        let mut st = self.state.lock();
        if st.blacklisted.contains(address) {
            return Err(LedgerError::Reverted("client is blacklisted".into()));
        }
        st.update_hashes.insert((round, address.to_string()), digest);
        Ok(())
    }
}
