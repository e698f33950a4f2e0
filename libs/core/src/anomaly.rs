//! Statistical anomaly screening for candidate model updates.
//!
//! A candidate is scored by its Euclidean distance from the current global
//! model. The threshold is static and round-independent, matching the source
//! policy; a calibrated or adaptive threshold is future work.

pub const DEFAULT_DEVIATION_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    threshold: f64,
}

impl AnomalyDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Euclidean distance between a candidate update and the global model.
    /// Callers validate dimensions before scoring.
    pub fn deviation(&self, global: &[f64], candidate: &[f64]) -> f64 {
        global
            .iter()
            .zip(candidate)
            .map(|(g, c)| (c - g).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    pub fn is_malicious(&self, deviation: f64) -> bool {
        deviation > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DEVIATION_THRESHOLD)
    }
}
