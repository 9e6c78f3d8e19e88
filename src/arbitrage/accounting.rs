// src/arbitrage/accounting.rs
//! Post-execution bookkeeping: audit records and profit distribution.

use crate::{
    arbitrage::{
        execution_engine::{ExecutionResult, ExecutionStage},
        types::{MultiHopRoute, Token},
    },
    error::ArbError,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};
use uuid::Uuid;

pub const MAX_TOTAL_BPS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTarget {
    pub label: String,
    pub recipient: Pubkey,
    pub bps: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfitShare {
    pub label: String,
    pub recipient: String,
    pub bps: u16,
    pub amount: u64,
}

/// Fixed basis-point split of positive realized profit. The remainder stays with the operator.
#[derive(Debug, Clone, Default)]
pub struct ProfitSplitter {
    targets: Vec<SplitTarget>,
}

impl ProfitSplitter {
    pub fn new(targets: Vec<SplitTarget>) -> Result<Self, ArbError> {
        let total: u32 = targets.iter().map(|t| t.bps as u32).sum();
        if total > MAX_TOTAL_BPS {
            return Err(ArbError::ConfigError(format!(
                "Profit split totals {} bps, maximum is {}",
                total, MAX_TOTAL_BPS
            )));
        }
        Ok(Self { targets })
    }

    /// Parses `label:pubkey:bps` entries separated by commas.
    pub fn parse(raw: &str) -> Result<Self, ArbError> {
        let mut targets = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [label, recipient, bps] = parts.as_slice() else {
                return Err(ArbError::ConfigError(format!(
                    "Invalid profit split entry '{}', expected label:pubkey:bps",
                    entry
                )));
            };
            let recipient = Pubkey::from_str(recipient)
                .map_err(|e| ArbError::ConfigError(format!("Invalid split recipient '{}': {}", recipient, e)))?;
            let bps = bps
                .parse::<u16>()
                .map_err(|e| ArbError::ConfigError(format!("Invalid split bps '{}': {}", bps, e)))?;
            targets.push(SplitTarget {
                label: label.to_string(),
                recipient,
                bps,
            });
        }
        Self::new(targets)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Shares of `realized_profit` (smallest units). Non-positive profit yields nothing.
    pub fn split(&self, realized_profit: i64) -> (Vec<ProfitShare>, u64) {
        if realized_profit <= 0 {
            return (vec![], 0);
        }
        let profit = realized_profit as u64;
        let shares: Vec<ProfitShare> = self
            .targets
            .iter()
            .map(|t| ProfitShare {
                label: t.label.clone(),
                recipient: t.recipient.to_string(),
                bps: t.bps,
                amount: (profit as u128 * t.bps as u128 / MAX_TOTAL_BPS as u128) as u64,
            })
            .collect();
        let distributed: u64 = shares.iter().map(|s| s.amount).sum();
        (shares, profit - distributed)
    }

    /// Transfers paying each non-zero share in `token`, the token profit was realized in.
    /// Native SOL moves with system transfers; SPL shares move between associated token
    /// accounts, creating the recipient's account when missing.
    pub fn transfer_instructions(
        &self,
        from: &Pubkey,
        token: &Token,
        realized_profit: i64,
    ) -> Result<Vec<Instruction>, ArbError> {
        let (shares, _) = self.split(realized_profit);
        let mut instructions = Vec::new();
        for (target, share) in self.targets.iter().zip(shares) {
            if share.amount == 0 {
                continue;
            }
            if token.is_native() {
                instructions.push(system_instruction::transfer(from, &target.recipient, share.amount));
                continue;
            }
            let source = get_associated_token_address(from, &token.mint);
            let destination = get_associated_token_address(&target.recipient, &token.mint);
            instructions.push(create_associated_token_account_idempotent(
                from,
                &target.recipient,
                &token.mint,
                &spl_token::id(),
            ));
            instructions.push(
                spl_token::instruction::transfer_checked(
                    &spl_token::id(),
                    &source,
                    &token.mint,
                    &destination,
                    from,
                    &[],
                    share.amount,
                    token.decimals,
                )
                .map_err(|e| {
                    ArbError::InstructionError(format!("{} share transfer for {}: {}", token.symbol, target.label, e))
                })?,
            );
        }
        Ok(instructions)
    }
}

/// One append-only audit line per execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub route: Vec<String>,
    pub estimated_net_profit: i64,
    pub realized_profit: Option<i64>,
    pub fee_paid: u64,
    pub status: String,
    pub signatures: Vec<String>,
    pub bundle_id: Option<String>,
    pub used_atomic_bundle: bool,
    pub error: Option<String>,
    pub failed_at: Option<String>,
    pub profit_shares: Vec<ProfitShare>,
}

impl ExecutionRecord {
    pub fn from_execution(route: &MultiHopRoute, result: &ExecutionResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            route: route.path_symbols(),
            estimated_net_profit: route.net_profit,
            realized_profit: result.realized_profit,
            fee_paid: result.fee_paid,
            status: result.final_stage.to_string(),
            signatures: result.signatures.iter().map(|s| s.to_string()).collect(),
            bundle_id: result.bundle_id.clone(),
            used_atomic_bundle: result.used_atomic_bundle,
            error: result.error.as_ref().map(|e| e.to_string()),
            failed_at: result.failed_at.map(|s: ExecutionStage| s.to_string()),
            profit_shares: vec![],
        }
    }

    /// Record for a route that was selected but not executed.
    pub fn dry_run(route: &MultiHopRoute) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            route: route.path_symbols(),
            estimated_net_profit: route.net_profit,
            realized_profit: None,
            fee_paid: 0,
            status: "DRY_RUN".to_string(),
            signatures: vec![],
            bundle_id: None,
            used_atomic_bundle: false,
            error: None,
            failed_at: None,
            profit_shares: vec![],
        }
    }

    pub fn with_shares(mut self, shares: Vec<ProfitShare>) -> Self {
        self.profit_shares = shares;
        self
    }
}

pub trait ExecutionSink: Send + Sync {
    fn record(&self, record: &ExecutionRecord) -> Result<(), ArbError>;
}

/// Emits records through the log facade.
pub struct LogSink;

impl ExecutionSink for LogSink {
    fn record(&self, record: &ExecutionRecord) -> Result<(), ArbError> {
        info!(
            "[Audit] {} {} route={} est={} realized={:?} fee={} error={:?}",
            record.id,
            record.status,
            record.route.join(" → "),
            record.estimated_net_profit,
            record.realized_profit,
            record.fee_paid,
            record.error
        );
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct JsonlFileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExecutionSink for JsonlFileSink {
    fn record(&self, record: &ExecutionRecord) -> Result<(), ArbError> {
        let line = serde_json::to_string(record)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ArbError::ExecutionError("Audit sink lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ArbError::ExecutionError(format!("Cannot open {}: {}", self.path.display(), e)))?;
        writeln!(file, "{}", line)
            .map_err(|e| ArbError::ExecutionError(format!("Cannot write {}: {}", self.path.display(), e)))
    }
}

/// Delivers a record to every sink; sink failures are logged, never propagated.
pub fn emit_record(sinks: &[Box<dyn ExecutionSink>], record: &ExecutionRecord) {
    for sink in sinks {
        if let Err(e) = sink.record(record) {
            warn!("[Audit] Failed to write execution record {}: {}", record.id, e);
        }
    }
}
