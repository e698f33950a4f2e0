//! Bounded retry for ledger calls.
//!
//! The ledger can block for a mining delay and can fail independently of
//! local state. Reads are idempotent and get a small retry budget; writes
//! are never retried automatically, a failed write aborts the submission it
//! belongs to.

use rand::{thread_rng, Rng};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub jitter: f64, // 0.0 - 1.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 1, base_delay: Duration::from_millis(50), jitter: 0.25 }
    }
}

pub async fn retry_read<F, Fut, T, E>(cfg: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= cfg.max_retries => return Err(e),
            Err(_) => {
                let mut delay = cfg.base_delay.mul_f64(2f64.powi(attempt as i32));
                if cfg.jitter > 0.0 {
                    let jitter_ms = (delay.as_millis() as f64 * cfg.jitter) as u64;
                    let offset: i64 =
                        thread_rng().gen_range(-(jitter_ms as i64)..(jitter_ms as i64 + 1));
                    delay = Duration::from_millis((delay.as_millis() as i64 + offset).max(0) as u64);
                }
                tokio::time::sleep(delay).await;
            }
        }
        attempt += 1;
    }
}
