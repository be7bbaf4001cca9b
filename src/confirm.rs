//! Confirmation reconciliation across inconsistent read paths
//!
//! A single RPC endpoint's signature-status index is not always
//! consistent with its transaction-history index, so the oracle consults
//! both and treats either one reporting success as authoritative. An
//! on-chain execution error is terminal: the transaction is already
//! included and its failure is final.

use std::sync::Arc;

use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
    signature::Signature,
};
use solana_transaction_status::TransactionConfirmationStatus;
use tracing::{debug, warn};

use crate::errors::RpcError;
use crate::rpc::{parse_history_signature, ChainRpc};

/// How many reverse-lookup entries to scan. The fee payer signs every
/// submission, so within one validity window the target sits near the
/// head of its history.
const REVERSE_LOOKUP_LIMIT: usize = 64;

/// Observed confirmation state for a signature.
///
/// `Failed` and (for the requested commitment) `Confirmed`/`Finalized`
/// are terminal: repeated checks return the same result because they
/// reflect settled chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationResult {
    /// Not yet visible at the requested commitment on either read path
    Pending,
    /// Included and confirmed
    Confirmed,
    /// Included and finalized
    Finalized,
    /// Included but the runtime reported an execution error; never retry
    Failed(String),
}

impl ConfirmationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConfirmationResult::Confirmed | ConfirmationResult::Finalized)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConfirmationResult::Pending)
    }
}

/// Determines whether a signature is confirmed, failed, or still pending.
pub struct ConfirmationOracle {
    rpc: Arc<dyn ChainRpc>,
}

impl ConfirmationOracle {
    pub fn new(rpc: Arc<dyn ChainRpc>) -> Self {
        Self { rpc }
    }

    /// Check a signature against both read paths.
    ///
    /// Path errors are absorbed: a transient failure on one path must not
    /// mask a success visible on the other, and a failure on both simply
    /// reads as `Pending` for this attempt.
    pub async fn check(
        &self,
        signature: &Signature,
        payer: &Pubkey,
        commitment: CommitmentConfig,
    ) -> ConfirmationResult {
        match self.check_direct(signature, commitment).await {
            Ok(result) if result.is_terminal() => return result,
            Ok(_) => {}
            Err(err) => {
                warn!(signature = %signature, error = %err, "Direct status lookup failed");
            }
        }

        match self.check_reverse(signature, payer, commitment).await {
            Ok(result) if result.is_terminal() => result,
            Ok(_) => ConfirmationResult::Pending,
            Err(err) => {
                warn!(signature = %signature, error = %err, "Reverse address lookup failed");
                ConfirmationResult::Pending
            }
        }
    }

    /// Direct `getSignatureStatuses` lookup with history search.
    async fn check_direct(
        &self,
        signature: &Signature,
        commitment: CommitmentConfig,
    ) -> Result<ConfirmationResult, RpcError> {
        let status = match self.rpc.signature_status_with_history(signature).await? {
            Some(status) => status,
            None => return Ok(ConfirmationResult::Pending),
        };

        // A non-null on-chain error means the transaction landed and
        // failed; this is terminal regardless of commitment.
        if let Some(err) = &status.err {
            return Ok(ConfirmationResult::Failed(err.to_string()));
        }

        let reached = status.confirmation_status();
        if !meets_commitment(&reached, commitment) {
            debug!(
                signature = %signature,
                reached = ?reached,
                requested = ?commitment.commitment,
                "Status below requested commitment"
            );
            return Ok(ConfirmationResult::Pending);
        }

        Ok(match reached {
            TransactionConfirmationStatus::Finalized => ConfirmationResult::Finalized,
            _ => ConfirmationResult::Confirmed,
        })
    }

    /// Reverse lookup: scan the fee payer's recent signature history for
    /// the target.
    async fn check_reverse(
        &self,
        signature: &Signature,
        payer: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<ConfirmationResult, RpcError> {
        let history = self
            .rpc
            .signatures_for_address(payer, REVERSE_LOOKUP_LIMIT)
            .await?;

        for entry in &history {
            if parse_history_signature(entry)? != *signature {
                continue;
            }
            if let Some(err) = &entry.err {
                return Ok(ConfirmationResult::Failed(err.to_string()));
            }
            // History entries report at least confirmed commitment.
            let reached = entry
                .confirmation_status
                .clone()
                .unwrap_or(TransactionConfirmationStatus::Confirmed);
            if !meets_commitment(&reached, commitment) {
                return Ok(ConfirmationResult::Pending);
            }
            return Ok(match reached {
                TransactionConfirmationStatus::Finalized => ConfirmationResult::Finalized,
                _ => ConfirmationResult::Confirmed,
            });
        }

        Ok(ConfirmationResult::Pending)
    }
}

/// Commitment levels are ordered: processed < confirmed < finalized.
fn meets_commitment(
    reached: &TransactionConfirmationStatus,
    requested: CommitmentConfig,
) -> bool {
    let rank = |status: &TransactionConfirmationStatus| match status {
        TransactionConfirmationStatus::Processed => 0u8,
        TransactionConfirmationStatus::Confirmed => 1,
        TransactionConfirmationStatus::Finalized => 2,
    };
    let requested_rank = match requested.commitment {
        CommitmentLevel::Processed => 0u8,
        CommitmentLevel::Confirmed => 1,
        CommitmentLevel::Finalized => 2,
    };
    rank(reached) >= requested_rank
}
