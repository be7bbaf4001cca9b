//! Priority-fee estimation
//!
//! Derives a tiered compute-unit price schedule from recent per-slot
//! prioritization-fee samples. The estimator is infallible by contract:
//! any network or parse failure collapses to the configured fallback
//! schedule so a fee-API outage never blocks a submission.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::config::{FeeConfig, FeeTier};
use crate::observability::Telemetry;
use crate::rpc::ChainRpc;

/// Tiered fee schedule in micro-lamports per compute unit.
///
/// Invariant: `low <= medium <= high <= extreme`, and every tier is at
/// least the configured floor. Always populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub extreme: u64,
}

impl FeeEstimate {
    /// The fee for a configured tier.
    pub fn for_tier(&self, tier: FeeTier) -> u64 {
        match tier {
            FeeTier::Low => self.low,
            FeeTier::Medium => self.medium,
            FeeTier::High => self.high,
            FeeTier::Extreme => self.extreme,
        }
    }

    pub fn is_monotonic(&self) -> bool {
        self.low <= self.medium && self.medium <= self.high && self.high <= self.extreme
    }
}

/// Estimates a competitive priority fee from recent fee-market data.
pub struct FeeEstimator {
    rpc: Arc<dyn ChainRpc>,
    config: FeeConfig,
    telemetry: Option<Arc<Telemetry>>,
}

impl FeeEstimator {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: FeeConfig) -> Self {
        Self {
            rpc,
            config,
            telemetry: None,
        }
    }

    /// Attach the shared telemetry handle so fallback use is counted.
    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    fn fallback(&self) -> FeeEstimate {
        if let Some(telemetry) = &self.telemetry {
            telemetry.metrics.fee_fallbacks.inc();
        }
        self.config.fallback
    }

    /// Derive the tier schedule, optionally scoping the sample window to a
    /// reference account used as a market proxy (e.g. the pool being
    /// traded). Never fails; errors and empty windows fall back to the
    /// configured schedule.
    pub async fn estimate(&self, reference_account: Option<&Pubkey>) -> FeeEstimate {
        let accounts: Vec<Pubkey> = reference_account.copied().into_iter().collect();

        let samples = match self.rpc.recent_prioritization_fees(&accounts).await {
            Ok(samples) => samples,
            Err(err) => {
                warn!(error = %err, "Prioritization fee query failed, using fallback schedule");
                return self.fallback();
            }
        };

        // Zero-fee samples come from uncontended slots and would bias the
        // estimate toward zero.
        let fees: Vec<u64> = samples
            .iter()
            .map(|s| s.prioritization_fee)
            .filter(|fee| *fee > 0)
            .collect();

        let max = match fees.iter().copied().max() {
            Some(max) => max,
            None => {
                debug!("No nonzero fee samples in window, using fallback schedule");
                return self.fallback();
            }
        };

        let estimate = self.schedule_from_max(max);
        debug!(
            samples = fees.len(),
            max = max,
            low = estimate.low,
            medium = estimate.medium,
            high = estimate.high,
            extreme = estimate.extreme,
            "Derived fee schedule"
        );
        estimate
    }

    /// Tiers as 25/50/75/100% of the largest observed fee, floored to
    /// integers and clamped up to the configured minimum. The 75% tier
    /// scales in u128 before dividing so rounding happens once and the
    /// intermediate product cannot overflow.
    fn schedule_from_max(&self, max: u64) -> FeeEstimate {
        let floor = self.config.minimum_floor;
        FeeEstimate {
            low: (max / 4).max(floor),
            medium: (max / 2).max(floor),
            high: ((max as u128 * 3 / 4) as u64).max(floor),
            extreme: max.max(floor),
        }
    }
}
