//! Transaction submission with bounded retry
//!
//! The submitter owns the hardest invariant in this layer: a transaction
//! is broadcast repeatedly until it confirms, but never after its
//! block-height validity window has closed. Block height and confirmation
//! status come from separate, possibly staled, read paths, so the loop
//! ends with one final confirmation check before declaring expiration,
//! since a transaction may have landed in the last iteration after the
//! height guard already failed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use solana_sdk::{
    commitment_config::CommitmentConfig,
    compute_budget::ComputeBudgetInstruction,
    message::Message,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use crate::confirm::{ConfirmationOracle, ConfirmationResult};
use crate::config::SubmitConfig;
use crate::errors::SubmitError;
use crate::fees::FeeEstimator;
use crate::observability::Telemetry;
use crate::rpc::ChainRpc;
use crate::types::PendingTransaction;

/// Phase of a submission. Transitions are strictly forward except for the
/// Sending/AwaitingConfirmation loop; Confirmed, Expired and Failed are
/// the only terminal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    Building,
    FeeAttached,
    Sending,
    AwaitingConfirmation,
    Confirmed,
    Expired,
    Failed,
}

impl SubmitPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmitPhase::Confirmed | SubmitPhase::Expired | SubmitPhase::Failed
        )
    }
}

fn transition(from: SubmitPhase, to: SubmitPhase) -> SubmitPhase {
    debug_assert!(!from.is_terminal(), "no transitions out of {:?}", from);
    debug!(from = ?from, to = ?to, "Submit phase transition");
    to
}

/// Attaches a priority fee, signs, broadcasts, and retries until the
/// transaction lands or its validity window expires.
pub struct TransactionSubmitter {
    rpc: Arc<dyn ChainRpc>,
    fees: FeeEstimator,
    oracle: ConfirmationOracle,
    config: SubmitConfig,
    telemetry: Arc<Telemetry>,
}

impl TransactionSubmitter {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        fees: FeeEstimator,
        oracle: ConfirmationOracle,
        config: SubmitConfig,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            rpc,
            fees,
            oracle,
            config,
            telemetry,
        }
    }

    /// Submit a transaction and drive it to a terminal state.
    ///
    /// Returns the signature once the requested commitment is reached.
    /// Fails with [`SubmitError::Expired`] when the window closes
    /// unconfirmed and [`SubmitError::OnChainExecution`] when the chain
    /// reports the transaction included but erroring.
    pub async fn submit(
        &self,
        tx: PendingTransaction,
        signers: &[&Keypair],
        fee_reference: Option<&Pubkey>,
        commitment: CommitmentConfig,
    ) -> Result<Signature, SubmitError> {
        let metrics = &self.telemetry.metrics;
        metrics.submissions_total.inc();
        metrics.inflight_submissions.inc();
        let started = Instant::now();

        let result = self.run(tx, signers, fee_reference, commitment).await;

        metrics.inflight_submissions.dec();
        metrics
            .submit_latency
            .observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => metrics.submissions_confirmed.inc(),
            Err(SubmitError::Expired { .. }) => metrics.submissions_expired.inc(),
            Err(SubmitError::OnChainExecution { .. }) => {
                metrics.submissions_failed_on_chain.inc()
            }
            Err(_) => {}
        }
        result
    }

    async fn run(
        &self,
        mut tx: PendingTransaction,
        signers: &[&Keypair],
        fee_reference: Option<&Pubkey>,
        commitment: CommitmentConfig,
    ) -> Result<Signature, SubmitError> {
        let mut phase = SubmitPhase::Building;

        // Fee estimation happens exactly once, and the instruction must be
        // appended before signing because it changes the signed payload.
        let estimate = self.fees.estimate(fee_reference).await;
        let unit_price = estimate.for_tier(self.config.fee_tier);
        tx.instructions
            .push(ComputeBudgetInstruction::set_compute_unit_price(unit_price));
        phase = transition(phase, SubmitPhase::FeeAttached);
        debug!(
            payer = %tx.payer,
            unit_price = unit_price,
            tier = ?self.config.fee_tier,
            last_valid_block_height = tx.last_valid_block_height,
            "Priority fee attached"
        );

        let signed = self.sign(&tx, signers)?;
        let signature = signed.signatures[0];

        let mut observed_height = self.initial_height().await?;
        let mut attempts = 0u32;

        while observed_height < tx.last_valid_block_height
            && attempts < self.config.max_resend_attempts
        {
            attempts += 1;
            phase = transition(phase, SubmitPhase::Sending);

            // Fresh signing per broadcast attempt; some node encodings
            // reject a reused wire payload.
            let signed = self.sign(&tx, signers)?;
            self.telemetry.metrics.broadcast_attempts.inc();
            if let Err(err) = self.rpc.send_transaction_skip_preflight(&signed).await {
                // A single broadcast failure is per-attempt noise; the
                // transaction may still land via an earlier attempt.
                self.telemetry.metrics.broadcast_errors.inc();
                warn!(
                    signature = %signature,
                    attempt = attempts,
                    error = %err,
                    "Broadcast attempt failed"
                );
            }

            tokio::time::sleep(Duration::from_millis(self.config.resend_interval_ms)).await;

            phase = transition(phase, SubmitPhase::AwaitingConfirmation);
            self.telemetry.metrics.confirmation_checks.inc();
            let check = self.oracle.check(&signature, &tx.payer, commitment).await;
            if check.is_success() {
                transition(phase, SubmitPhase::Confirmed);
                info!(
                    signature = %signature,
                    attempts = attempts,
                    "Transaction confirmed"
                );
                return Ok(signature);
            }
            if let ConfirmationResult::Failed(reason) = check {
                transition(phase, SubmitPhase::Failed);
                warn!(signature = %signature, reason = %reason, "Transaction failed on chain");
                return Err(SubmitError::OnChainExecution { signature, reason });
            }

            // A failed refresh keeps the last known height; the attempt
            // cap still bounds the loop.
            match self.rpc.block_height().await {
                Ok(height) => observed_height = height,
                Err(err) => {
                    debug!(error = %err, "Block height refresh failed, keeping last observation");
                }
            }
        }

        // The height guard and confirmation status come from different
        // endpoints; check once more before declaring expiration.
        self.telemetry.metrics.confirmation_checks.inc();
        let check = self.oracle.check(&signature, &tx.payer, commitment).await;
        if check.is_success() {
            transition(phase, SubmitPhase::Confirmed);
            info!(
                signature = %signature,
                attempts = attempts,
                "Transaction confirmed on final check"
            );
            return Ok(signature);
        }
        if let ConfirmationResult::Failed(reason) = check {
            transition(phase, SubmitPhase::Failed);
            return Err(SubmitError::OnChainExecution { signature, reason });
        }

        transition(phase, SubmitPhase::Expired);
        warn!(
            signature = %signature,
            last_valid_block_height = tx.last_valid_block_height,
            observed_height = observed_height,
            attempts = attempts,
            "Validity window closed without confirmation"
        );
        Err(SubmitError::Expired {
            last_valid_block_height: tx.last_valid_block_height,
            observed_height,
            attempts,
        })
    }

    fn sign(
        &self,
        tx: &PendingTransaction,
        signers: &[&Keypair],
    ) -> Result<Transaction, SubmitError> {
        let message =
            Message::new_with_blockhash(&tx.instructions, Some(&tx.payer), &tx.recent_blockhash);
        let mut transaction = Transaction::new_unsigned(message);
        transaction
            .try_sign(signers, tx.recent_blockhash)
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(transaction)
    }

    /// First height read; without it the loop guard has nothing to compare
    /// against, so a persistent failure here is surfaced.
    async fn initial_height(&self) -> Result<u64, SubmitError> {
        let mut attempt = 0u32;
        loop {
            match self.rpc.block_height().await {
                Ok(height) => return Ok(height),
                Err(err) if err.is_retryable() && attempt < 2 => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(SubmitPhase::Confirmed.is_terminal());
        assert!(SubmitPhase::Expired.is_terminal());
        assert!(SubmitPhase::Failed.is_terminal());
        assert!(!SubmitPhase::Building.is_terminal());
        assert!(!SubmitPhase::Sending.is_terminal());
        assert!(!SubmitPhase::AwaitingConfirmation.is_terminal());
    }
}
