//! Configuration for the transaction-reliability layer
//!
//! Loaded from a TOML file with optional environment overrides via
//! dotenv. Every tunable the submission path reads lives here; retry
//! counts and poll intervals are deliberately configuration rather than
//! constants because deployments disagree on them.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;

use crate::fees::FeeEstimate;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Priority-fee estimation
    #[serde(default)]
    pub fees: FeeConfig,

    /// Submission retry loop
    #[serde(default)]
    pub submit: SubmitConfig,

    /// Balance-delta polling
    #[serde(default)]
    pub balance_poll: BalancePollConfig,

    /// Logging and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Minimum per-tier fee in micro-lamports per compute unit; tiers
    /// never collapse below this during low-contention periods
    #[serde(default = "default_fee_floor")]
    pub minimum_floor: u64,

    /// Schedule returned when the fee API is unavailable or returns no
    /// usable samples
    #[serde(default = "default_fallback_fees")]
    pub fallback: FeeEstimate,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            minimum_floor: default_fee_floor(),
            fallback: default_fallback_fees(),
        }
    }
}

/// Fee tier the submitter attaches; deployment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeTier {
    Low,
    Medium,
    High,
    Extreme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Tier of the estimate used for the compute-unit price instruction
    #[serde(default = "default_fee_tier")]
    pub fee_tier: FeeTier,

    /// Pause between broadcast attempts in milliseconds (propagation
    /// window before the confirmation check)
    #[serde(default = "default_resend_interval")]
    pub resend_interval_ms: u64,

    /// Hard cap on broadcast attempts inside the validity window
    #[serde(default = "default_max_resend_attempts")]
    pub max_resend_attempts: u32,

    /// Commitment level required for success: "confirmed" or "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            fee_tier: default_fee_tier(),
            resend_interval_ms: default_resend_interval(),
            max_resend_attempts: default_max_resend_attempts(),
            commitment: default_commitment(),
        }
    }
}

impl SubmitConfig {
    /// Parse the configured commitment level.
    pub fn commitment_config(&self) -> anyhow::Result<CommitmentConfig> {
        match self.commitment.as_str() {
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => anyhow::bail!(
                "submit.commitment must be \"confirmed\" or \"finalized\", got {:?}",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancePollConfig {
    /// Maximum balance reads after confirmation
    #[serde(default = "default_balance_attempts")]
    pub max_attempts: u32,

    /// Sleep between reads in milliseconds
    #[serde(default = "default_balance_interval")]
    pub interval_ms: u64,
}

impl Default for BalancePollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_balance_attempts(),
            interval_ms: default_balance_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable the tracing subscriber
    #[serde(default = "default_true")]
    pub enable_tracing: bool,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub log_json: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_tracing: default_true(),
            log_json: false,
        }
    }
}

// Default value functions
fn default_rpc_timeout() -> u64 {
    30
}
fn default_fee_floor() -> u64 {
    1_000
}
fn default_fallback_fees() -> FeeEstimate {
    FeeEstimate {
        low: 10_000,
        medium: 100_000,
        high: 500_000,
        extreme: 1_000_000,
    }
}
fn default_fee_tier() -> FeeTier {
    FeeTier::High
}
fn default_resend_interval() -> u64 {
    2_000
}
fn default_max_resend_attempts() -> u32 {
    40
}
fn default_commitment() -> String {
    "confirmed".to_string()
}
fn default_balance_attempts() -> u32 {
    10
}
fn default_balance_interval() -> u64 {
    500
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides applied
    /// through dotenv first.
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    /// Reject configurations the submission path cannot operate on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.endpoint.is_empty() {
            anyhow::bail!("rpc.endpoint must not be empty");
        }
        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be > 0");
        }
        if self.fees.minimum_floor == 0 {
            anyhow::bail!("fees.minimum_floor must be > 0");
        }
        if !self.fees.fallback.is_monotonic() {
            anyhow::bail!("fees.fallback tiers must satisfy low <= medium <= high <= extreme");
        }
        if self.fees.fallback.low < self.fees.minimum_floor {
            anyhow::bail!("fees.fallback.low must be >= fees.minimum_floor");
        }
        if self.submit.resend_interval_ms == 0 {
            anyhow::bail!("submit.resend_interval_ms must be > 0");
        }
        if self.submit.max_resend_attempts == 0 {
            anyhow::bail!("submit.max_resend_attempts must be > 0");
        }
        self.submit.commitment_config()?;
        if self.balance_poll.max_attempts == 0 {
            anyhow::bail!("balance_poll.max_attempts must be > 0");
        }
        if self.balance_poll.interval_ms == 0 {
            anyhow::bail!("balance_poll.interval_ms must be > 0");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: "https://api.mainnet-beta.solana.com".to_string(),
                timeout_secs: default_rpc_timeout(),
            },
            fees: FeeConfig::default(),
            submit: SubmitConfig::default(),
            balance_poll: BalancePollConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}
