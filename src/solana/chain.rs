// src/solana/chain.rs
use crate::error::ArbError;
use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

/// Outcome of a dry run. `err` is `None` when the transaction would succeed.
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    pub err: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn passed(&self) -> bool {
        self.err.is_none()
    }

    /// Error plus the tail of the program logs, for diagnostics.
    pub fn diagnostic(&self) -> String {
        let err = self.err.clone().unwrap_or_else(|| "ok".to_string());
        let tail: Vec<&str> = self
            .logs
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(String::as_str)
            .collect();
        if tail.is_empty() {
            err
        } else {
            format!("{} | logs: {}", err, tail.join(" | "))
        }
    }
}

/// Network operations the engine depends on. Implemented by `ResilientConnection`.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest blockhash and the last block height at which it is still valid.
    async fn latest_blockhash(&self) -> Result<(Hash, u64), ArbError>;

    async fn block_height(&self) -> Result<u64, ArbError>;

    async fn slot(&self) -> Result<u64, ArbError>;

    /// Recent per-transaction prioritization fees, micro-lamports per compute unit.
    async fn recent_prioritization_fees(&self) -> Result<Vec<u64>, ArbError>;

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome, ArbError>;

    async fn send(&self, tx: &Transaction) -> Result<Signature, ArbError>;

    /// `None` while the signature is unknown or unconfirmed; `Some(Err)` on on-chain failure.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<Result<(), String>>, ArbError>;

    /// Balance of `mint` held by `owner` in smallest units (lamports for native SOL).
    async fn balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ArbError>;
}
