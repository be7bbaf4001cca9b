//! Transaction-reliability layer for a Solana liquidity-pool service
//!
//! Sits between request handlers and the chain: estimates priority fees
//! from recent fee-market data, drives submissions through a bounded
//! retry loop scoped to the blockhash validity window, reconciles
//! confirmation across two RPC read paths, and verifies balance effects
//! after confirmation. A concurrency-safe registry shares per-pool
//! handles across requests.

pub mod balance;
pub mod config;
pub mod confirm;
pub mod errors;
pub mod fees;
pub mod observability;
pub mod registry;
pub mod rpc;
pub mod submit;
pub mod types;
pub mod wallet;

pub use balance::{BalanceDelta, BalanceDeltaObserver, BalanceSnapshot};
pub use config::{Config, FeeTier};
pub use confirm::{ConfirmationOracle, ConfirmationResult};
pub use errors::{RpcError, SubmitError};
pub use fees::{FeeEstimate, FeeEstimator};
pub use observability::{OperationContext, Telemetry};
pub use registry::PoolRegistry;
pub use rpc::{ChainRpc, SolanaRpc};
pub use submit::{SubmitPhase, TransactionSubmitter};
pub use types::{AssetId, PendingTransaction, TokenInfo};
pub use wallet::WalletManager;
