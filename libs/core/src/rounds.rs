//! Round lifecycle: submission arbitration and federated averaging.
//!
//! `RoundTracker` owns all mutable round state behind a single lock. The
//! submit pipeline runs in three phases: a locked admission check that
//! reserves the client_id, the ledger round-trip with the lock released, and
//! a locked commit that re-validates whatever the ledger round-trip raced
//! with. The reservation keeps a same-client duplicate from reaching the
//! ledger while the first submission is in flight, so only reads from
//! distinct clients ever race. Aggregation advances the round atomically and
//! only then records the trust snapshot.

use crate::anomaly::AnomalyDetector;
use crate::ledger::{LedgerError, TrustLedger};
use crate::resilience::{retry_read, RetryConfig};
use crate::trust_history::TrustHistory;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub client_id: String,
    pub client_address: String,
    pub weights: Vec<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("weight vector has dimension {got}, global model has {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("ledger call failed: {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    AlreadySubmitted,
    Penalized { new_trust: u64 },
    RejectedLowTrust { trust: u64 },
    Accepted { trust: u64, round: u64 },
    /// The round advanced while the ledger round-trip was in flight; the
    /// submission belongs to neither round and is rejected as stale.
    StaleRound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    Empty,
    Complete {
        new_global_model: Vec<f64>,
        next_round: u64,
        trust_snapshot: HashMap<String, Vec<u64>>,
    },
}

enum Decision {
    Penalize { new_trust: u64 },
    RejectLowTrust { trust: u64 },
    Accept { trust: u64 },
}

#[derive(Debug)]
struct RoundState {
    round: u64,
    global_model: Vec<f64>,
    accepted: HashMap<String, Vec<f64>>,
    submitted: HashSet<String>,
    /// Clients whose submission is mid ledger round-trip. Reserved in phase
    /// 1, released on commit or ledger failure; a concurrent duplicate
    /// observes `AlreadySubmitted` instead of reaching the ledger twice.
    pending: HashSet<String>,
    addresses: HashMap<String, String>,
    history: TrustHistory,
}

pub struct RoundTracker {
    state: Mutex<RoundState>,
    detector: AnomalyDetector,
    ledger: Arc<dyn TrustLedger>,
    read_retry: RetryConfig,
}

impl RoundTracker {
    pub fn new(
        initial_model: Vec<f64>,
        detector: AnomalyDetector,
        ledger: Arc<dyn TrustLedger>,
    ) -> Self {
        Self {
            state: Mutex::new(RoundState {
                round: 1,
                global_model: initial_model,
                accepted: HashMap::new(),
                submitted: HashSet::new(),
                pending: HashSet::new(),
                addresses: HashMap::new(),
                history: TrustHistory::new(),
            }),
            detector,
            ledger,
            read_retry: RetryConfig::default(),
        }
    }

    pub fn current_round(&self) -> (u64, Vec<f64>) {
        let st = self.state.lock();
        (st.round, st.global_model.clone())
    }

    pub fn trust_history(&self) -> HashMap<String, Vec<u64>> {
        self.state.lock().history.snapshot()
    }

    /// Screen, trust-check and buffer one client update.
    ///
    /// A finalized outcome (accepted, penalized or rejected) consumes the
    /// client's submission for the round; a ledger failure aborts before the
    /// commit and leaves the client free to resubmit.
    pub async fn submit(&self, update: ClientUpdate) -> Result<SubmitOutcome, SubmitError> {
        // Phase 1: admission under the lock. Dimension and duplicate checks
        // plus the anomaly score; the snapshotted round pins which round the
        // decision belongs to, and the pending reservation holds off a
        // same-client duplicate for the duration of the ledger round-trip.
        let (round, deviation) = {
            let mut st = self.state.lock();
            if update.weights.len() != st.global_model.len() {
                return Err(SubmitError::DimensionMismatch {
                    expected: st.global_model.len(),
                    got: update.weights.len(),
                });
            }
            if st.submitted.contains(&update.client_id) || st.pending.contains(&update.client_id)
            {
                return Ok(SubmitOutcome::AlreadySubmitted);
            }
            st.pending.insert(update.client_id.clone());
            st.addresses.insert(update.client_id.clone(), update.client_address.clone());
            let deviation = self.detector.deviation(&st.global_model, &update.weights);
            (st.round, deviation)
        };

        // Phase 2: ledger round-trip, lock released. Reads from distinct
        // clients may race; ledger truth is authoritative and idempotent. A
        // ledger failure releases the reservation so the client can resubmit.
        let decision = match self.classify(&update, deviation).await {
            Ok(decision) => decision,
            Err(err) => {
                self.state.lock().pending.remove(&update.client_id);
                return Err(SubmitError::Ledger(err));
            }
        };

        // Phase 3: commit. A submission that straddled an aggregation is
        // detected here, with the ledger truth in hand.
        let mut st = self.state.lock();
        st.pending.remove(&update.client_id);
        if st.round != round {
            return Ok(SubmitOutcome::StaleRound);
        }
        if !st.submitted.insert(update.client_id.clone()) {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }
        match decision {
            Decision::Penalize { new_trust } => {
                info!(client_id = %update.client_id, new_trust, "client penalized");
                Ok(SubmitOutcome::Penalized { new_trust })
            }
            Decision::RejectLowTrust { trust } => {
                info!(client_id = %update.client_id, trust, "client rejected for low trust");
                Ok(SubmitOutcome::RejectedLowTrust { trust })
            }
            Decision::Accept { trust } => {
                st.accepted.insert(update.client_id.clone(), update.weights);
                info!(client_id = %update.client_id, trust, round, "update accepted");
                Ok(SubmitOutcome::Accepted { trust, round })
            }
        }
    }

    /// Federated averaging over the accepted buffer.
    ///
    /// The model swap, buffer drain and round increment commit under one lock
    /// acquisition, so a concurrent submission lands entirely in the old
    /// round or observes the new one. Trust snapshot reads run after the
    /// advance and never roll it back. The mean is unweighted: trust scores
    /// are in hand here and a trust-weighted mean is the obvious alternative
    /// policy, but the source policy averages uniformly.
    pub async fn aggregate(&self) -> AggregationResult {
        let (participants, new_model, next_round) = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            if st.accepted.is_empty() {
                return AggregationResult::Empty;
            }
            let mut mean = vec![0.0; st.global_model.len()];
            for weights in st.accepted.values() {
                for (slot, w) in mean.iter_mut().zip(weights) {
                    *slot += w;
                }
            }
            let n = st.accepted.len() as f64;
            for slot in &mut mean {
                *slot /= n;
            }
            st.global_model = mean.clone();
            st.accepted.clear();
            let addresses = &st.addresses;
            let participants: Vec<(String, String)> = st
                .submitted
                .drain()
                .filter_map(|id| addresses.get(&id).map(|a| (id, a.clone())))
                .collect();
            st.round += 1;
            info!(next_round = st.round, participants = participants.len(), "aggregation complete");
            (participants, mean, st.round)
        };

        for (client_id, address) in &participants {
            match self.read_trust(address).await {
                Ok(trust) => {
                    self.state.lock().history.record(client_id, trust);
                }
                Err(err) => {
                    warn!(client_id = %client_id, error = %err,
                        "trust read failed, skipping history entry for this round");
                }
            }
        }
        let trust_snapshot = self.state.lock().history.snapshot();
        AggregationResult::Complete { new_global_model: new_model, next_round, trust_snapshot }
    }

    async fn classify(
        &self,
        update: &ClientUpdate,
        deviation: f64,
    ) -> Result<Decision, LedgerError> {
        if self.detector.is_malicious(deviation) {
            warn!(client_id = %update.client_id, deviation, "malicious update detected");
            self.ledger.penalize_client(&update.client_address).await?;
            let new_trust = self.read_trust(&update.client_address).await?;
            return Ok(Decision::Penalize { new_trust });
        }
        let trust = self.read_trust(&update.client_address).await?;
        let threshold = retry_read(&self.read_retry, |_| self.ledger.threshold()).await?;
        if trust < threshold {
            Ok(Decision::RejectLowTrust { trust })
        } else {
            Ok(Decision::Accept { trust })
        }
    }

    async fn read_trust(&self, address: &str) -> Result<u64, LedgerError> {
        retry_read(&self.read_retry, |_| self.ledger.get_trust(address)).await
    }
}
