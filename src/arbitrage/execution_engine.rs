// src/arbitrage/execution_engine.rs
//! Turns a scored route into signed transactions and drives them to a terminal state:
//! BUILD → SIMULATE → (SUBMIT_SINGLE | SUBMIT_BUNDLE) → CONFIRM → DONE | FAILED.

use crate::{
    arbitrage::{
        bundle::BundleSubmitter,
        fee_estimator::{FeeEstimator, PriorityFeeConfig, UrgencyTier},
        quote::ProviderRegistry,
        types::MultiHopRoute,
    },
    error::ArbError,
    solana::{chain::ChainClient, transaction_builder::TransactionBuilder},
};
use futures::future::try_join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use solana_sdk::{
    hash::Hash, instruction::Instruction, packet::PACKET_DATA_SIZE, pubkey::Pubkey,
    signature::Signature, signer::Signer, transaction::Transaction,
};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Bound on refresh-blockhash-and-resubmit cycles for the single-transaction path.
    pub max_retries: u32,
    pub confirm_timeout: Duration,
    pub confirm_poll_interval: Duration,
    pub max_hops_per_transaction: usize,
    /// Route single-transaction executions through the bundle submitter when one is configured.
    pub prefer_bundle: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            confirm_timeout: Duration::from_secs(60),
            confirm_poll_interval: Duration::from_millis(500),
            max_hops_per_transaction: 4,
            prefer_bundle: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionStage {
    Build,
    Simulate,
    SubmitSingle,
    SubmitBundle,
    Confirm,
    Done,
    Failed,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionStage::Build => "BUILD",
            ExecutionStage::Simulate => "SIMULATE",
            ExecutionStage::SubmitSingle => "SUBMIT_SINGLE",
            ExecutionStage::SubmitBundle => "SUBMIT_BUNDLE",
            ExecutionStage::Confirm => "CONFIRM",
            ExecutionStage::Done => "DONE",
            ExecutionStage::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Why an execution ended in FAILED.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionFailure {
    Build(String),
    SimulationRejected(String),
    BundleRejected(String),
    /// Multi-transaction route with no bundle submitter configured.
    BundleUnavailable,
    EndpointFailure(String),
    /// Bundle submission failed in transit; the engine may have accepted it.
    BundleOutcomeUnknown(String),
    /// Outcome unknown: the transaction or bundle (`id` is its signature or bundle id) may still land.
    ConfirmationTimeout { id: String },
    OnChainFailure(String),
    BlockhashExpired,
    Cancelled,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::Build(msg) => write!(f, "build failed: {}", msg),
            ExecutionFailure::SimulationRejected(msg) => write!(f, "simulation rejected: {}", msg),
            ExecutionFailure::BundleRejected(msg) => write!(f, "bundle rejected: {}", msg),
            ExecutionFailure::BundleUnavailable => {
                write!(f, "route needs an atomic bundle but no bundle submitter is configured")
            }
            ExecutionFailure::EndpointFailure(msg) => write!(f, "endpoint failure: {}", msg),
            ExecutionFailure::BundleOutcomeUnknown(msg) => {
                write!(f, "bundle submission outcome unknown: {}", msg)
            }
            ExecutionFailure::ConfirmationTimeout { id } => {
                write!(f, "confirmation timed out for {}", id)
            }
            ExecutionFailure::OnChainFailure(msg) => write!(f, "transaction failed on-chain: {}", msg),
            ExecutionFailure::BlockhashExpired => write!(f, "blockhash expired on every attempt"),
            ExecutionFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub signatures: Vec<Signature>,
    pub bundle_id: Option<String>,
    pub compute_units_used: u64,
    /// Lamports: signature fees plus priority fee.
    pub fee_paid: u64,
    pub error: Option<ExecutionFailure>,
    pub used_atomic_bundle: bool,
    /// `Done` or `Failed`.
    pub final_stage: ExecutionStage,
    /// Stage in which a failed execution stopped.
    pub failed_at: Option<ExecutionStage>,
    /// Start-token balance delta observed around the execution.
    pub realized_profit: Option<i64>,
}

impl ExecutionResult {
    fn failure(stage: ExecutionStage, error: ExecutionFailure) -> Self {
        Self {
            success: false,
            signatures: vec![],
            bundle_id: None,
            compute_units_used: 0,
            fee_paid: 0,
            error: Some(error),
            used_atomic_bundle: false,
            final_stage: ExecutionStage::Failed,
            failed_at: Some(stage),
            realized_profit: None,
        }
    }

    fn done(signatures: Vec<Signature>, compute_units_used: u64, fee_paid: u64) -> Self {
        Self {
            success: true,
            signatures,
            bundle_id: None,
            compute_units_used,
            fee_paid,
            error: None,
            used_atomic_bundle: false,
            final_stage: ExecutionStage::Done,
            failed_at: None,
            realized_profit: None,
        }
    }

    fn with_signatures(mut self, signatures: Vec<Signature>) -> Self {
        self.signatures = signatures;
        self
    }

    fn with_bundle(mut self, bundle_id: Option<String>) -> Self {
        self.used_atomic_bundle = true;
        self.bundle_id = bundle_id;
        self
    }
}

enum Confirmation {
    Confirmed,
    Failed(String),
    Expired,
    TimedOut,
    Cancelled,
}

/// Result of the bundle path. `Refused` means the submitter explicitly refused the bundle,
/// so none of its transactions can land.
enum BundlePath {
    Finished(ExecutionResult),
    Refused(String),
}

fn estimate_fee_paid(signature_count: usize, fee: &PriorityFeeConfig, units: Option<u64>) -> u64 {
    let units = units.unwrap_or(fee.compute_unit_limit as u64);
    let priority = (fee.micro_lamports_per_cu as u128 * units as u128 / 1_000_000) as u64;
    LAMPORTS_PER_SIGNATURE * signature_count as u64 + priority
}

fn transaction_size(payer: &Pubkey, fee: &PriorityFeeConfig, instructions: &[Instruction]) -> Result<usize, ArbError> {
    let mut builder = TransactionBuilder::new(*payer);
    builder.add_instructions(instructions.iter().cloned()).add_compute_budget(fee);
    builder.size_with(&[])
}

/// Packs per-hop instruction sets, in order, into as few transactions as fit under the
/// packet size limit and `max_hops_per_tx`. `reserve` is sized into every group.
pub fn pack_hop_instructions(
    payer: &Pubkey,
    hops: &[Vec<Instruction>],
    fee: &PriorityFeeConfig,
    reserve: Option<&Instruction>,
    max_hops_per_tx: usize,
) -> Result<Vec<Vec<Instruction>>, ArbError> {
    let max_hops_per_tx = max_hops_per_tx.max(1);
    let fits = |group: &[Instruction]| -> Result<bool, ArbError> {
        let mut candidate = group.to_vec();
        candidate.extend(reserve.cloned());
        Ok(transaction_size(payer, fee, &candidate)? <= PACKET_DATA_SIZE)
    };

    let mut groups = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();
    let mut hops_in_current = 0usize;

    for (idx, hop) in hops.iter().enumerate() {
        if hops_in_current > 0 {
            let mut candidate = current.clone();
            candidate.extend(hop.iter().cloned());
            if hops_in_current >= max_hops_per_tx || !fits(&candidate)? {
                groups.push(std::mem::take(&mut current));
                hops_in_current = 0;
            }
        }
        current.extend(hop.iter().cloned());
        hops_in_current += 1;
        if hops_in_current == 1 && !fits(&current)? {
            return Err(ArbError::InstructionError(format!(
                "Hop {} alone exceeds the {} byte transaction limit",
                idx, PACKET_DATA_SIZE
            )));
        }
    }
    if hops_in_current > 0 {
        groups.push(current);
    }
    Ok(groups)
}

pub struct ExecutionEngine {
    chain: Arc<dyn ChainClient>,
    providers: ProviderRegistry,
    fee_estimator: FeeEstimator,
    bundle_submitter: Option<Arc<dyn BundleSubmitter>>,
    config: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        providers: ProviderRegistry,
        bundle_submitter: Option<Arc<dyn BundleSubmitter>>,
        config: ExecutionConfig,
    ) -> Self {
        info!(
            "[Execution] Engine initialized: bundle submitter={}, prefer_bundle={}, max_retries={}",
            bundle_submitter.as_ref().map(|b| b.name()).unwrap_or("none"),
            config.prefer_bundle,
            config.max_retries
        );
        Self {
            fee_estimator: FeeEstimator::new(Arc::clone(&chain)),
            chain,
            providers,
            bundle_submitter,
            config,
        }
    }

    fn enter(&self, from: ExecutionStage, to: ExecutionStage) {
        debug!("[Execution] {} → {}", from, to);
    }

    /// Executes `route` as one atomic unit. Never returns `Err`: every outcome is an `ExecutionResult`.
    pub async fn execute(
        &self,
        route: &MultiHopRoute,
        signer: &(dyn Signer + Sync),
        urgency: UrgencyTier,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let payer = signer.pubkey();
        let Some(start_mint) = route.start_token().map(|t| t.mint) else {
            return ExecutionResult::failure(
                ExecutionStage::Build,
                ExecutionFailure::Build("route has no hops".to_string()),
            );
        };
        info!(
            "[Execution] Executing {} ({} hops, estimated net profit {})",
            route.describe(),
            route.hop_count(),
            route.net_profit
        );

        // BUILD
        let fee = self.fee_estimator.estimate_fee(urgency).await;
        let hop_instructions = match self.hop_instructions(route, &payer, cancel).await {
            Ok(ixs) => ixs,
            Err(ArbError::Cancelled(_)) => {
                return ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Cancelled)
            }
            Err(e) => {
                return ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Build(e.to_string()))
            }
        };
        let tip = self.bundle_submitter.as_ref().and_then(|s| s.tip_instruction(&payer));
        let groups = match pack_hop_instructions(
            &payer,
            &hop_instructions,
            &fee,
            tip.as_ref(),
            self.config.max_hops_per_transaction,
        ) {
            Ok(groups) if !groups.is_empty() => groups,
            Ok(_) => {
                return ExecutionResult::failure(
                    ExecutionStage::Build,
                    ExecutionFailure::Build("no transactions produced".to_string()),
                )
            }
            Err(e) => {
                return ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Build(e.to_string()))
            }
        };
        debug!("[Execution] {} hop(s) packed into {} transaction(s)", route.hop_count(), groups.len());

        let balance_before = self.chain.balance(&payer, &start_mint).await.ok();

        let mut result = match (&self.bundle_submitter, groups.len()) {
            (None, n) if n > 1 => {
                error!("[Execution] Route needs {} transactions but no bundle submitter is configured", n);
                ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::BundleUnavailable)
            }
            (Some(submitter), n) if n > 1 => {
                match self
                    .submit_bundle(route, &groups, submitter.as_ref(), tip.as_ref(), signer, &fee, cancel)
                    .await
                {
                    BundlePath::Finished(result) => result,
                    // Never fall back to sequential sends for a multi-transaction route.
                    BundlePath::Refused(reason) => ExecutionResult::failure(
                        ExecutionStage::SubmitBundle,
                        ExecutionFailure::BundleRejected(reason),
                    )
                    .with_bundle(None),
                }
            }
            (Some(submitter), _) if self.config.prefer_bundle => {
                match self
                    .submit_bundle(route, &groups, submitter.as_ref(), tip.as_ref(), signer, &fee, cancel)
                    .await
                {
                    BundlePath::Finished(result) => result,
                    BundlePath::Refused(reason) => {
                        warn!("[Execution] Bundle refused ({}), falling back to single submission", reason);
                        self.submit_single(&groups[0], signer, &fee, cancel).await
                    }
                }
            }
            _ => self.submit_single(&groups[0], signer, &fee, cancel).await,
        };

        if result.success {
            if let (Some(before), Ok(after)) = (balance_before, self.chain.balance(&payer, &start_mint).await) {
                result.realized_profit = Some(after as i64 - before as i64);
            }
            info!(
                "[Execution] DONE: {} signature(s), realized profit {:?} (estimated {})",
                result.signatures.len(),
                result.realized_profit,
                route.net_profit
            );
        } else if let Some(err) = &result.error {
            warn!("[Execution] FAILED at {:?}: {}", result.failed_at, err);
        }
        result
    }

    /// Sends a standalone instruction set, such as profit payouts, through the
    /// single-transaction path.
    pub async fn submit_instructions(
        &self,
        instructions: &[Instruction],
        signer: &(dyn Signer + Sync),
        urgency: UrgencyTier,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        if instructions.is_empty() {
            return ExecutionResult::failure(
                ExecutionStage::Build,
                ExecutionFailure::Build("no instructions to send".to_string()),
            );
        }
        let fee = self.fee_estimator.estimate_fee(urgency).await;
        self.submit_single(instructions, signer, &fee, cancel).await
    }

    /// Swap instructions for every hop, in route order.
    async fn hop_instructions(
        &self,
        route: &MultiHopRoute,
        payer: &Pubkey,
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<Instruction>>, ArbError> {
        let requests = route
            .hops
            .iter()
            .map(|hop| {
                let provider = self.providers.get(&hop.provider);
                async move { provider?.build_swap_instructions(&hop.quote, payer).await }
            })
            .collect::<Vec<_>>();

        tokio::select! {
            _ = cancel.cancelled() => Err(ArbError::Cancelled("build cancelled".to_string())),
            instructions = try_join_all(requests) => instructions,
        }
    }

    fn build_transaction(
        &self,
        instructions: &[Instruction],
        extra: Option<&Instruction>,
        signer: &(dyn Signer + Sync),
        fee: &PriorityFeeConfig,
        blockhash: Hash,
    ) -> Result<Transaction, ArbError> {
        let mut builder = TransactionBuilder::new(signer.pubkey());
        builder
            .add_instructions(instructions.iter().cloned())
            .add_instructions(extra.cloned())
            .add_compute_budget(fee);
        let signer: &dyn Signer = signer;
        builder.build_and_sign(&[signer], blockhash)
    }

    /// Single-transaction path with bounded refresh-and-resubmit on blockhash expiry.
    async fn submit_single(
        &self,
        instructions: &[Instruction],
        signer: &(dyn Signer + Sync),
        fee: &PriorityFeeConfig,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let max_attempts = self.config.max_retries.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Cancelled);
            }

            let (blockhash, last_valid_block_height) = match self.chain.latest_blockhash().await {
                Ok(pair) => pair,
                Err(e) => {
                    return ExecutionResult::failure(
                        ExecutionStage::Build,
                        ExecutionFailure::EndpointFailure(e.to_string()),
                    )
                }
            };
            let tx = match self.build_transaction(instructions, None, signer, fee, blockhash) {
                Ok(tx) => tx,
                Err(e) => {
                    return ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Build(e.to_string()))
                }
            };

            self.enter(ExecutionStage::Build, ExecutionStage::Simulate);
            let simulation = match self.chain.simulate(&tx).await {
                Ok(sim) => sim,
                Err(e) => {
                    return ExecutionResult::failure(
                        ExecutionStage::Simulate,
                        ExecutionFailure::EndpointFailure(e.to_string()),
                    )
                }
            };
            if !simulation.passed() {
                return ExecutionResult::failure(
                    ExecutionStage::Simulate,
                    ExecutionFailure::SimulationRejected(simulation.diagnostic()),
                );
            }

            if cancel.is_cancelled() {
                return ExecutionResult::failure(ExecutionStage::Simulate, ExecutionFailure::Cancelled);
            }
            self.enter(ExecutionStage::Simulate, ExecutionStage::SubmitSingle);
            let signature = match self.chain.send(&tx).await {
                Ok(sig) => sig,
                Err(e) => {
                    return ExecutionResult::failure(
                        ExecutionStage::SubmitSingle,
                        ExecutionFailure::EndpointFailure(e.to_string()),
                    )
                }
            };
            info!("[Execution] Submitted {} (attempt {}/{})", signature, attempt, max_attempts);

            self.enter(ExecutionStage::SubmitSingle, ExecutionStage::Confirm);
            match self.confirm(&signature, last_valid_block_height, cancel).await {
                Confirmation::Confirmed => {
                    let fee_paid = estimate_fee_paid(tx.signatures.len(), fee, simulation.units_consumed);
                    return ExecutionResult::done(
                        vec![signature],
                        simulation.units_consumed.unwrap_or_default(),
                        fee_paid,
                    );
                }
                Confirmation::Failed(msg) => {
                    return ExecutionResult::failure(ExecutionStage::Confirm, ExecutionFailure::OnChainFailure(msg))
                        .with_signatures(vec![signature])
                }
                Confirmation::TimedOut => {
                    return ExecutionResult::failure(
                        ExecutionStage::Confirm,
                        ExecutionFailure::ConfirmationTimeout {
                            id: signature.to_string(),
                        },
                    )
                    .with_signatures(vec![signature])
                }
                Confirmation::Cancelled => {
                    return ExecutionResult::failure(ExecutionStage::Confirm, ExecutionFailure::Cancelled)
                        .with_signatures(vec![signature])
                }
                Confirmation::Expired => {
                    warn!(
                        "[Execution] Blockhash expired before {} confirmed, rebuilding (attempt {}/{})",
                        signature, attempt, max_attempts
                    );
                }
            }
        }

        ExecutionResult::failure(ExecutionStage::Confirm, ExecutionFailure::BlockhashExpired)
    }

    async fn confirm(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
        cancel: &CancellationToken,
    ) -> Confirmation {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            match self.chain.signature_status(signature).await {
                Ok(Some(Ok(()))) => return Confirmation::Confirmed,
                Ok(Some(Err(e))) => return Confirmation::Failed(e),
                Ok(None) => match self.chain.block_height().await {
                    Ok(height) if height > last_valid_block_height => return Confirmation::Expired,
                    Ok(_) => {}
                    Err(e) => debug!("[Execution] Block height unavailable: {}", e),
                },
                Err(e) => debug!("[Execution] Status poll for {} failed: {}", signature, e),
            }

            if Instant::now() >= deadline {
                return Confirmation::TimedOut;
            }
            tokio::select! {
                _ = cancel.cancelled() => return Confirmation::Cancelled,
                _ = tokio::time::sleep(self.config.confirm_poll_interval) => {}
            }
        }
    }

    /// Simulated compute units for the whole bundle. Uses the submitter's in-order simulation
    /// when it has one, otherwise every leg alone against current state.
    async fn simulate_bundle(
        &self,
        submitter: &dyn BundleSubmitter,
        transactions: &[Transaction],
    ) -> Result<u64, ExecutionFailure> {
        match submitter.simulate_bundle(transactions).await {
            Ok(Some(sim)) if sim.passed() => return Ok(sim.units_consumed.unwrap_or_default()),
            Ok(Some(sim)) => return Err(ExecutionFailure::SimulationRejected(format!("bundle: {}", sim.diagnostic()))),
            Ok(None) => debug!("[Execution] {} has no bundle simulation, simulating legs one by one", submitter.name()),
            Err(e) => return Err(ExecutionFailure::EndpointFailure(e.to_string())),
        }

        let mut units = 0u64;
        for (idx, tx) in transactions.iter().enumerate() {
            match self.chain.simulate(tx).await {
                Ok(sim) if sim.passed() => units += sim.units_consumed.unwrap_or_default(),
                Ok(sim) => {
                    return Err(ExecutionFailure::SimulationRejected(format!(
                        "transaction {}: {}",
                        idx,
                        sim.diagnostic()
                    )))
                }
                Err(e) => return Err(ExecutionFailure::EndpointFailure(e.to_string())),
            }
        }
        Ok(units)
    }

    /// Bundle path: every transaction is built, signed and simulated before anything is handed over.
    #[allow(clippy::too_many_arguments)]
    async fn submit_bundle(
        &self,
        route: &MultiHopRoute,
        groups: &[Vec<Instruction>],
        submitter: &dyn BundleSubmitter,
        tip: Option<&Instruction>,
        signer: &(dyn Signer + Sync),
        fee: &PriorityFeeConfig,
        cancel: &CancellationToken,
    ) -> BundlePath {
        if cancel.is_cancelled() {
            return BundlePath::Finished(ExecutionResult::failure(ExecutionStage::Build, ExecutionFailure::Cancelled));
        }
        let blockhash = match self.chain.latest_blockhash().await {
            Ok((hash, _)) => hash,
            Err(e) => {
                return BundlePath::Finished(ExecutionResult::failure(
                    ExecutionStage::Build,
                    ExecutionFailure::EndpointFailure(e.to_string()),
                ))
            }
        };

        let last = groups.len() - 1;
        let mut transactions = Vec::with_capacity(groups.len());
        for (idx, group) in groups.iter().enumerate() {
            let extra = if idx == last { tip } else { None };
            match self.build_transaction(group, extra, signer, fee, blockhash) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    return BundlePath::Finished(ExecutionResult::failure(
                        ExecutionStage::Build,
                        ExecutionFailure::Build(e.to_string()),
                    ))
                }
            }
        }

        self.enter(ExecutionStage::Build, ExecutionStage::Simulate);
        let units = match self.simulate_bundle(submitter, &transactions).await {
            Ok(units) => units,
            Err(failure) => {
                return BundlePath::Finished(ExecutionResult::failure(ExecutionStage::Simulate, failure))
            }
        };

        if cancel.is_cancelled() {
            return BundlePath::Finished(ExecutionResult::failure(ExecutionStage::Simulate, ExecutionFailure::Cancelled));
        }
        self.enter(ExecutionStage::Simulate, ExecutionStage::SubmitBundle);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                return BundlePath::Finished(
                    ExecutionResult::failure(ExecutionStage::SubmitBundle, ExecutionFailure::Cancelled).with_bundle(None),
                );
            }
            outcome = submitter.submit_bundle(&transactions, route.net_profit) => outcome,
        };

        match outcome {
            Err(ArbError::BundleRejected(reason)) => {
                warn!("[Execution] Bundle submission refused by {}: {}", submitter.name(), reason);
                BundlePath::Refused(reason)
            }
            Err(e) => {
                error!(
                    "[Execution] Bundle submission to {} failed in transit, outcome unknown: {}",
                    submitter.name(),
                    e
                );
                BundlePath::Finished(
                    ExecutionResult::failure(
                        ExecutionStage::SubmitBundle,
                        ExecutionFailure::BundleOutcomeUnknown(e.to_string()),
                    )
                    .with_bundle(None),
                )
            }
            Ok(outcome) if outcome.landed => {
                self.enter(ExecutionStage::SubmitBundle, ExecutionStage::Confirm);
                let signature_count = transactions.iter().map(|tx| tx.signatures.len()).sum();
                let fee_paid = estimate_fee_paid(signature_count, fee, Some(units));
                BundlePath::Finished(
                    ExecutionResult::done(outcome.included_signatures, units, fee_paid)
                        .with_bundle(Some(outcome.bundle_id)),
                )
            }
            Ok(outcome) if outcome.timed_out => {
                warn!("[Execution] Bundle {} still pending at the confirmation deadline", outcome.bundle_id);
                BundlePath::Finished(
                    ExecutionResult::failure(
                        ExecutionStage::Confirm,
                        ExecutionFailure::ConfirmationTimeout {
                            id: outcome.bundle_id.clone(),
                        },
                    )
                    .with_bundle(Some(outcome.bundle_id)),
                )
            }
            Ok(outcome) => {
                let reason = outcome.error.unwrap_or_else(|| "bundle did not land".to_string());
                BundlePath::Finished(
                    ExecutionResult::failure(ExecutionStage::Confirm, ExecutionFailure::BundleRejected(reason))
                        .with_bundle(Some(outcome.bundle_id)),
                )
            }
        }
    }
}
