//! Error taxonomy for the transaction-reliability layer
//!
//! Two layers: `RpcError` classifies individual RPC call failures as
//! retryable or not; `SubmitError` is the terminal surface the submitter
//! exposes to route handlers. Transient faults are absorbed as far down as
//! possible and never reach the caller directly.

use solana_client::client_error::ClientError;
use solana_sdk::signature::Signature;
use thiserror::Error;

/// Failure of a single RPC call.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Transport-level errors (connection refused, DNS, broken pipe)
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Request timed out
    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Endpoint rate limiting (429 / "too many requests")
    #[error("rate limit exceeded")]
    RateLimited,

    /// RPC server returned an error response
    #[error("rpc response error: {message} (code: {code:?})")]
    Response { message: String, code: Option<i64> },

    /// A response did not match the shape this layer expects
    #[error("malformed rpc response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Whether the next loop iteration may retry after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            RpcError::RateLimited => true,
            // Retry on server-side errors only
            RpcError::Response { code, .. } => matches!(code, Some(c) if (500..600).contains(c)),
            RpcError::Malformed(_) => false,
        }
    }

    /// Classify a `solana_client` error by its message.
    pub fn from_client_error(err: ClientError) -> Self {
        let text = err.to_string();
        let lower = text.to_lowercase();

        if lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("429") {
            RpcError::RateLimited
        } else if lower.contains("timeout") || lower.contains("timed out") {
            RpcError::Timeout { timeout_ms: 0 }
        } else if lower.contains("connection") || lower.contains("transport") || lower.contains("dns") {
            RpcError::Transport { message: text }
        } else {
            let code = lower
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_matches(|c: char| !c.is_ascii_digit() && c != '-').parse::<i64>().ok());
            RpcError::Response { message: text, code }
        }
    }
}

impl From<ClientError> for RpcError {
    fn from(err: ClientError) -> Self {
        RpcError::from_client_error(err)
    }
}

/// Terminal outcome of a submission, surfaced to the route handler.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The submission stopped unconfirmed: the block-height validity
    /// window closed or the broadcast attempt cap was reached. The
    /// transaction must never be resubmitted after this point.
    #[error(
        "transaction unconfirmed after {attempts} broadcast attempts: observed height {observed_height}, last valid height {last_valid_block_height}"
    )]
    Expired {
        last_valid_block_height: u64,
        observed_height: u64,
        attempts: u32,
    },

    /// The transaction was included on chain but the runtime reported an
    /// execution error. Resubmission would fail identically; never retried.
    #[error("transaction {signature} failed on chain: {reason}")]
    OnChainExecution { signature: Signature, reason: String },

    /// Signing with the supplied keypairs failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// An RPC failure that could not be absorbed (e.g. the initial
    /// block-height read never succeeded)
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),
}

impl SubmitError {
    /// Terminal errors must not be retried by callers.
    pub fn is_terminal(&self) -> bool {
        match self {
            SubmitError::Expired { .. } => true,
            SubmitError::OnChainExecution { .. } => true,
            SubmitError::Signing(_) => true,
            SubmitError::Rpc(e) => !e.is_retryable(),
        }
    }
}
