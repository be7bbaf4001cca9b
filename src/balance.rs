//! Balance-delta observation after a confirmed transaction
//!
//! Confirmation means a transaction executed, not that every RPC node's
//! account view reflects it yet. The observer takes a snapshot before
//! submission and polls after confirmation until the balance moves or
//! the attempt budget runs out. For native balances the network fee is
//! read from the transaction record and excluded, so a fee debit is
//! never mistaken for a transfer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{debug, warn};

use crate::config::BalancePollConfig;
use crate::observability::Telemetry;
use crate::rpc::ChainRpc;
use crate::types::AssetId;

/// A point-in-time balance reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub owner: Pubkey,
    pub asset: AssetId,
    /// Lamports for native, base units for tokens
    pub amount: u64,
    pub observed_at: DateTime<Utc>,
}

/// Observed movement between two snapshots of the same owner and asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Signed change in base units, with the network fee excluded for
    /// native balances. Zero when no movement was observed in time.
    pub change: i128,

    /// Network fee paid by the transaction, in lamports. Zero for token
    /// assets and when the fee could not be read.
    pub network_fee: u64,
}

impl BalanceDelta {
    pub fn is_zero(&self) -> bool {
        self.change == 0
    }
}

/// Polls an account balance until a transaction's effect becomes visible.
pub struct BalanceDeltaObserver {
    rpc: Arc<dyn ChainRpc>,
    config: BalancePollConfig,
    telemetry: Option<Arc<Telemetry>>,
}

impl BalanceDeltaObserver {
    pub fn new(rpc: Arc<dyn ChainRpc>, config: BalancePollConfig) -> Self {
        Self {
            rpc,
            config,
            telemetry: None,
        }
    }

    /// Attach the shared telemetry handle to record poll-attempt counts.
    pub fn with_telemetry(mut self, telemetry: Arc<Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Read the current balance of `owner` for `asset`.
    ///
    /// A missing token account reads as zero: an account that does not
    /// exist yet holds nothing.
    pub async fn snapshot(
        &self,
        owner: &Pubkey,
        asset: &AssetId,
    ) -> Result<BalanceSnapshot, crate::errors::RpcError> {
        let amount = match asset {
            AssetId::Native => self.rpc.lamport_balance(owner).await?,
            AssetId::Token(mint) => self.rpc.token_balance(owner, mint).await?,
        };
        Ok(BalanceSnapshot {
            owner: *owner,
            asset: *asset,
            amount,
            observed_at: Utc::now(),
        })
    }

    /// Poll until the balance diverges from `before`, then report the
    /// delta. Never fails: transient read errors consume an attempt, and
    /// an exhausted budget reports a zero delta rather than guessing.
    pub async fn observe(&self, before: &BalanceSnapshot, signature: &Signature) -> BalanceDelta {
        let mut attempts = 0u32;
        let mut raw_delta: i128 = 0;

        while attempts < self.config.max_attempts {
            attempts += 1;

            match self.snapshot(&before.owner, &before.asset).await {
                Ok(after) => {
                    raw_delta = after.amount as i128 - before.amount as i128;
                    if raw_delta != 0 {
                        break;
                    }
                }
                Err(err) => {
                    debug!(
                        owner = %before.owner,
                        asset = %before.asset,
                        attempt = attempts,
                        error = %err,
                        "Balance read failed during delta poll"
                    );
                }
            }

            if attempts < self.config.max_attempts {
                tokio::time::sleep(std::time::Duration::from_millis(self.config.interval_ms))
                    .await;
            }
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry
                .metrics
                .balance_poll_attempts
                .observe(attempts as f64);
        }

        if raw_delta == 0 {
            warn!(
                owner = %before.owner,
                asset = %before.asset,
                signature = %signature,
                attempts = attempts,
                "No balance movement observed within the poll budget"
            );
            return BalanceDelta {
                change: 0,
                network_fee: 0,
            };
        }

        let network_fee = match before.asset {
            // The payer's native balance absorbs the fee; add it back so
            // the delta reflects only the transfer.
            AssetId::Native => match self.rpc.transaction_fee(signature).await {
                Ok(Some(fee)) => fee,
                Ok(None) => {
                    debug!(signature = %signature, "Transaction record not yet queryable for fee");
                    0
                }
                Err(err) => {
                    warn!(signature = %signature, error = %err, "Fee lookup failed, delta includes fee");
                    0
                }
            },
            AssetId::Token(_) => 0,
        };

        let change = raw_delta + network_fee as i128;
        debug!(
            owner = %before.owner,
            asset = %before.asset,
            raw_delta = raw_delta,
            network_fee = network_fee,
            change = change,
            attempts = attempts,
            "Balance delta observed"
        );

        BalanceDelta {
            change,
            network_fee,
        }
    }
}
