// src/arbitrage/fee_estimator.rs
use crate::error::ArbError;
use crate::solana::chain::ChainClient;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyTier {
    pub fn percentile(&self) -> f64 {
        match self {
            UrgencyTier::Low => 0.25,
            UrgencyTier::Medium => 0.50,
            UrgencyTier::High => 0.75,
            UrgencyTier::Critical => 0.95,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            UrgencyTier::Low => 1.0,
            UrgencyTier::Medium => 1.5,
            UrgencyTier::High => 2.5,
            UrgencyTier::Critical => 5.0,
        }
    }

    pub fn compute_unit_limit(&self) -> u32 {
        match self {
            UrgencyTier::Low => 200_000,
            UrgencyTier::Medium => 400_000,
            UrgencyTier::High => 600_000,
            UrgencyTier::Critical => 1_000_000,
        }
    }

    /// Hard-coded fallback, used only without a live sample.
    pub fn default_fee(&self) -> PriorityFeeConfig {
        let micro_lamports_per_cu = match self {
            UrgencyTier::Low => 1_000,
            UrgencyTier::Medium => 5_000,
            UrgencyTier::High => 25_000,
            UrgencyTier::Critical => 100_000,
        };
        PriorityFeeConfig {
            micro_lamports_per_cu,
            compute_unit_limit: self.compute_unit_limit(),
        }
    }
}

impl FromStr for UrgencyTier {
    type Err = ArbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(UrgencyTier::Low),
            "medium" => Ok(UrgencyTier::Medium),
            "high" => Ok(UrgencyTier::High),
            "critical" => Ok(UrgencyTier::Critical),
            other => Err(ArbError::ConfigError(format!("Unknown urgency tier: {}", other))),
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UrgencyTier::Low => "low",
            UrgencyTier::Medium => "medium",
            UrgencyTier::High => "high",
            UrgencyTier::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFeeConfig {
    pub micro_lamports_per_cu: u64,
    pub compute_unit_limit: u32,
}

impl PriorityFeeConfig {
    /// Upper bound of the priority fee in lamports if the whole limit is consumed.
    pub fn max_priority_fee_lamports(&self) -> u64 {
        (self.micro_lamports_per_cu as u128 * self.compute_unit_limit as u128 / 1_000_000) as u64
    }
}

/// Derives a fee from a fee sample. Pure: identical inputs give identical outputs.
pub fn fee_from_sample(sample: &[u64], tier: UrgencyTier) -> PriorityFeeConfig {
    if sample.is_empty() {
        return tier.default_fee();
    }
    let mut sorted = sample.to_vec();
    sorted.sort_unstable();

    let idx = (sorted.len() as f64 * tier.percentile()).floor() as usize;
    let base = sorted.get(idx).copied().unwrap_or(sorted[sorted.len() - 1]);
    let micro_lamports_per_cu = (base as f64 * tier.multiplier()).round() as u64;

    PriorityFeeConfig {
        micro_lamports_per_cu,
        compute_unit_limit: tier.compute_unit_limit(),
    }
}

pub struct FeeEstimator {
    chain: Arc<dyn ChainClient>,
}

impl FeeEstimator {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Never fails: query errors fall back to the tier defaults.
    pub async fn estimate_fee(&self, tier: UrgencyTier) -> PriorityFeeConfig {
        match self.chain.recent_prioritization_fees().await {
            Ok(sample) => {
                let fee = fee_from_sample(&sample, tier);
                debug!(
                    "[Fee Estimator] {} tier from {} samples: {} µlamports/CU, limit {}",
                    tier,
                    sample.len(),
                    fee.micro_lamports_per_cu,
                    fee.compute_unit_limit
                );
                fee
            }
            Err(e) => {
                warn!("[Fee Estimator] Fee sample unavailable ({}), using {} defaults", e, tier);
                tier.default_fee()
            }
        }
    }
}
