//! Common typed records shared across the reliability layer
//!
//! Token metadata and balance assets are validated once at the boundary
//! and carried as plain typed records afterwards.

use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash, instruction::Instruction, native_token::LAMPORTS_PER_SOL, pubkey::Pubkey,
};

/// Asset identifier for balance queries: the native asset or an SPL mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetId {
    /// Native SOL, denominated in lamports
    Native,
    /// SPL token identified by its mint, denominated in raw base units
    Token(Pubkey),
}

impl AssetId {
    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetId::Native => write!(f, "native"),
            AssetId::Token(mint) => write!(f, "{}", mint),
        }
    }
}

/// Token metadata supplied by the token-list collaborator.
///
/// Validated at construction so downstream code never re-checks the
/// symbol or decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Human-readable symbol (e.g. "USDC")
    pub symbol: String,

    /// Mint address
    pub mint: Pubkey,

    /// Number of base-unit decimals
    pub decimals: u8,
}

impl TokenInfo {
    /// Validate and build a token record.
    ///
    /// Rejects empty symbols and decimals beyond what SPL token mints can
    /// carry.
    pub fn new(symbol: impl Into<String>, mint: Pubkey, decimals: u8) -> anyhow::Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            anyhow::bail!("token symbol must not be empty");
        }
        if decimals > 18 {
            anyhow::bail!("token decimals out of range: {}", decimals);
        }
        Ok(Self {
            symbol,
            mint,
            decimals,
        })
    }

    /// Convert a raw base-unit amount to a display amount.
    pub fn ui_amount(&self, raw: u64) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// An unsigned transaction skeleton handed to the submitter.
///
/// Owned exclusively by the caller until submission. The submitter mutates
/// it only by appending the compute-unit price instruction; everything
/// else (instruction semantics included) is opaque to this layer.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    /// Ordered instruction list from the AMM SDK
    pub instructions: Vec<Instruction>,

    /// Designated fee payer; also the reverse-lookup address for
    /// confirmation
    pub payer: Pubkey,

    /// Blockhash captured together with the validity window
    pub recent_blockhash: Hash,

    /// Chain height past which this transaction must never be resubmitted
    pub last_valid_block_height: u64,
}

impl PendingTransaction {
    pub fn new(
        instructions: Vec<Instruction>,
        payer: Pubkey,
        recent_blockhash: Hash,
        last_valid_block_height: u64,
    ) -> Self {
        Self {
            instructions,
            payer,
            recent_blockhash,
            last_valid_block_height,
        }
    }
}

/// Convert lamports to a display SOL amount.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}
