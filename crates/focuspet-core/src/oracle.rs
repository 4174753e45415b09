//! Check-in verification oracle.
//!
//! The decision itself happens elsewhere (a photo classifier, a human
//! reviewer); the engine only sees a boolean after an unknown delay.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::error::Result;
use crate::task::Evidence;

#[async_trait]
pub trait VerificationOracle: Send + Sync {
    /// Decide whether `evidence` proves engagement.
    async fn verify(&self, evidence: &Evidence) -> Result<bool>;
}

/// Oracle that accepts evidence with a fixed probability after a delay.
#[derive(Debug, Clone)]
pub struct SimulatedOracle {
    pub success_rate: f64,
    pub latency: Duration,
}

impl SimulatedOracle {
    /// Rates outside `[0, 1]` are clamped; NaN never succeeds.
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: usable_rate(success_rate),
            latency: Duration::from_millis(500),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for SimulatedOracle {
    fn default() -> Self {
        Self::new(0.9)
    }
}

#[async_trait]
impl VerificationOracle for SimulatedOracle {
    async fn verify(&self, evidence: &Evidence) -> Result<bool> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if evidence.is_empty() {
            return Ok(false);
        }
        Ok(rand::thread_rng().gen_bool(usable_rate(self.success_rate)))
    }
}

fn usable_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Oracle with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedOracle(pub bool);

#[async_trait]
impl VerificationOracle for FixedOracle {
    async fn verify(&self, _evidence: &Evidence) -> Result<bool> {
        Ok(self.0)
    }
}
