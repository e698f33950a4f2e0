//! Append-only per-client trust timeline.
//!
//! One score is recorded per round a client participated in. Entries are
//! never removed or truncated; the snapshot is a read-only clone handed to
//! reporting collaborators.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TrustHistory {
    entries: HashMap<String, Vec<u64>>,
}

impl TrustHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, client_id: &str, trust: u64) {
        self.entries.entry(client_id.to_string()).or_default().push(trust);
    }

    pub fn snapshot(&self) -> HashMap<String, Vec<u64>> {
        self.entries.clone()
    }

    pub fn len_for(&self, client_id: &str) -> usize {
        self.entries.get(client_id).map_or(0, Vec::len)
    }
}
