//! RPC access seam
//!
//! `ChainRpc` narrows the node interface to exactly the calls this layer
//! issues. The production implementation wraps the nonblocking
//! `solana_client` RPC client; tests substitute a scripted mock. Every
//! method maps to one JSON-RPC call and classifies failures through
//! [`RpcError`](crate::errors::RpcError).

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_client::GetConfirmedSignaturesForAddress2Config,
    rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig},
    rpc_response::{RpcConfirmedTransactionStatusWithSignature, RpcPrioritizationFee},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::{TransactionStatus, UiTransactionEncoding};
use spl_associated_token_account::get_associated_token_address;
use tracing::debug;

use crate::errors::RpcError;

/// The node surface used by the reliability layer.
///
/// One method per JSON-RPC call; no method does its own retrying. Retry
/// policy lives with the callers, which know which failures are
/// per-attempt noise and which are terminal.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// `getRecentPrioritizationFees`, optionally scoped to reference
    /// accounts used as a market proxy.
    async fn recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, RpcError>;

    /// `getBlockHeight` at confirmed commitment.
    async fn block_height(&self) -> Result<u64, RpcError>;

    /// `sendTransaction` with pre-flight simulation disabled. The
    /// transaction has already been validated by the caller's SDK;
    /// skipping pre-flight avoids false negatives from stale simulation
    /// state.
    async fn send_transaction_skip_preflight(
        &self,
        tx: &Transaction,
    ) -> Result<Signature, RpcError>;

    /// `getSignatureStatuses` for a single signature with
    /// `searchTransactionHistory: true`.
    async fn signature_status_with_history(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, RpcError>;

    /// `getSignaturesForAddress`, most recent first.
    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>, RpcError>;

    /// `getBalance` in lamports.
    async fn lamport_balance(&self, owner: &Pubkey) -> Result<u64, RpcError>;

    /// `getTokenAccountBalance` for the owner's associated token account,
    /// in raw base units. A missing token account reads as zero.
    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, RpcError>;

    /// Network fee actually paid by a landed transaction, from its
    /// on-chain record. `None` while the record is not yet queryable.
    async fn transaction_fee(&self, signature: &Signature) -> Result<Option<u64>, RpcError>;
}

/// Production implementation on `solana_client`'s nonblocking client.
pub struct SolanaRpc {
    client: RpcClient,
    endpoint: String,
}

impl SolanaRpc {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: RpcClient::new_with_timeout_and_commitment(
                endpoint.clone(),
                timeout,
                CommitmentConfig::confirmed(),
            ),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    async fn recent_prioritization_fees(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<RpcPrioritizationFee>, RpcError> {
        let fees = self
            .client
            .get_recent_prioritization_fees(accounts)
            .await?;
        debug!(endpoint = %self.endpoint, samples = fees.len(), "Fetched prioritization fees");
        Ok(fees)
    }

    async fn block_height(&self) -> Result<u64, RpcError> {
        Ok(self.client.get_block_height().await?)
    }

    async fn send_transaction_skip_preflight(
        &self,
        tx: &Transaction,
    ) -> Result<Signature, RpcError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            ..RpcSendTransactionConfig::default()
        };
        Ok(self.client.send_transaction_with_config(tx, config).await?)
    }

    async fn signature_status_with_history(
        &self,
        signature: &Signature,
    ) -> Result<Option<TransactionStatus>, RpcError> {
        let response = self
            .client
            .get_signature_statuses_with_history(&[*signature])
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>, RpcError> {
        let config = GetConfirmedSignaturesForAddress2Config {
            limit: Some(limit),
            ..GetConfirmedSignaturesForAddress2Config::default()
        };
        Ok(self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?)
    }

    async fn lamport_balance(&self, owner: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.client.get_balance(owner).await?)
    }

    async fn token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, RpcError> {
        let ata = get_associated_token_address(owner, mint);
        match self.client.get_token_account_balance(&ata).await {
            Ok(amount) => amount
                .amount
                .parse::<u64>()
                .map_err(|e| RpcError::Malformed(format!("token amount {:?}: {}", amount.amount, e))),
            Err(err) => {
                // An ATA that does not exist yet is a zero balance, not a
                // failure.
                let text = err.to_string().to_lowercase();
                if text.contains("could not find account") || text.contains("invalid param") {
                    Ok(0)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn transaction_fee(&self, signature: &Signature) -> Result<Option<u64>, RpcError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        match self
            .client
            .get_transaction_with_config(signature, config)
            .await
        {
            Ok(tx) => Ok(tx.transaction.meta.map(|meta| meta.fee)),
            Err(err) => {
                let text = err.to_string().to_lowercase();
                // History indexes lag the write path; treat a missing
                // record as "not yet", not as a hard failure.
                if text.contains("not found") || text.contains("invalid param") {
                    Ok(None)
                } else {
                    Err(err.into())
                }
            }
        }
    }
}

/// Parse a signature out of a reverse-lookup entry. Entries carry string
/// signatures on the wire.
pub fn parse_history_signature(
    entry: &RpcConfirmedTransactionStatusWithSignature,
) -> Result<Signature, RpcError> {
    Signature::from_str(&entry.signature)
        .map_err(|e| RpcError::Malformed(format!("signature {:?}: {}", entry.signature, e)))
}
