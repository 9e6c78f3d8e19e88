use async_trait::async_trait;
use pretty_assertions::assert_eq;
use solana_cycle_arb::arbitrage::{
    accounting::{ExecutionRecord, ExecutionSink, ProfitSplitter, SplitTarget},
    bundle::{BundleOutcome, BundleSubmitter},
    execution_engine::{ExecutionConfig, ExecutionEngine, ExecutionFailure, ExecutionStage},
    fee_estimator::{FeeEstimator, UrgencyTier},
    path_finder::{RouteSearchEngine, SearchParams, SearchSettings},
    quote::{ProviderRegistry, Quote, QuoteRequest, SwapProvider},
    types::{known_token, GasEstimator, MultiHopRoute, RouteCriteria, RouteHop, Token},
    ArbitrageCoordinator, CycleOutcome,
};
use solana_cycle_arb::error::ArbError;
use solana_cycle_arb::solana::chain::{ChainClient, SimulationOutcome};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const START_BALANCE: u64 = 5_000_000_000;
const PROFIT: u64 = 1_990_000;

/// In-memory chain: by default every send confirms immediately and credits `PROFIT` to the balance.
#[derive(Default)]
struct MockChain {
    simulation_error: Option<String>,
    /// Standalone simulations past this many fail, like a leg spending an intermediate token
    /// that only an earlier leg produces.
    standalone_simulation_limit: Option<usize>,
    fee_sample: Option<Vec<u64>>,
    /// Signatures never get a status.
    pending: bool,
    on_chain_error: Option<String>,
    block_height: u64,
    sends: AtomicUsize,
    simulations: AtomicUsize,
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), ArbError> {
        Ok((Hash::new_unique(), 1_000))
    }

    async fn block_height(&self) -> Result<u64, ArbError> {
        Ok(self.block_height)
    }

    async fn slot(&self) -> Result<u64, ArbError> {
        Ok(1)
    }

    async fn recent_prioritization_fees(&self) -> Result<Vec<u64>, ArbError> {
        self.fee_sample
            .clone()
            .ok_or_else(|| ArbError::RpcError("fee sample unavailable".to_string()))
    }

    async fn simulate(&self, _tx: &Transaction) -> Result<SimulationOutcome, ArbError> {
        let n = self.simulations.fetch_add(1, Ordering::SeqCst);
        let err = match self.standalone_simulation_limit {
            Some(limit) if n >= limit => Some("insufficient funds".to_string()),
            _ => self.simulation_error.clone(),
        };
        Ok(SimulationOutcome {
            err,
            logs: vec!["Program log: swap".to_string()],
            units_consumed: Some(150_000),
        })
    }

    async fn send(&self, tx: &Transaction) -> Result<Signature, ArbError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(tx.signatures[0])
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<Option<Result<(), String>>, ArbError> {
        if self.pending {
            return Ok(None);
        }
        Ok(Some(match &self.on_chain_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }))
    }

    async fn balance(&self, _owner: &Pubkey, _mint: &Pubkey) -> Result<u64, ArbError> {
        let landed = self.sends.load(Ordering::SeqCst) as u64;
        Ok(START_BALANCE + landed * PROFIT)
    }
}

/// Quotes SOL ⇄ USDC at fixed rates and emits one small instruction per swap.
struct MockProvider;

#[async_trait]
impl SwapProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, ArbError> {
        let sol = token("SOL").mint;
        let out_amount = if request.input_mint == sol {
            request.amount * 3 / 20
        } else {
            request.amount * 167 / 25
        };
        Ok(Quote {
            input_mint: request.input_mint,
            output_mint: request.output_mint,
            in_amount: request.amount,
            out_amount,
            price_impact: 0.001,
            fee_amount: 0,
            slippage_bps: request.slippage_bps,
            raw: serde_json::Value::Null,
        })
    }

    async fn build_swap_instructions(&self, _quote: &Quote, user: &Pubkey) -> Result<Vec<Instruction>, ArbError> {
        Ok(vec![Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![
                AccountMeta::new(*user, true),
                AccountMeta::new(Pubkey::new_unique(), false),
            ],
            data: vec![1; 16],
        }])
    }
}

/// Refuses every bundle.
#[derive(Default)]
struct RejectingSubmitter {
    submissions: AtomicUsize,
}

#[async_trait]
impl BundleSubmitter for RejectingSubmitter {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn tip_instruction(&self, _payer: &Pubkey) -> Option<Instruction> {
        None
    }

    async fn submit_bundle(&self, _transactions: &[Transaction], _min_expected_gain: i64) -> Result<BundleOutcome, ArbError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Err(ArbError::BundleRejected("simulation failure in block engine".to_string()))
    }
}

/// Lands every bundle.
struct LandingSubmitter;

#[async_trait]
impl BundleSubmitter for LandingSubmitter {
    fn name(&self) -> &str {
        "landing"
    }

    fn tip_instruction(&self, payer: &Pubkey) -> Option<Instruction> {
        Some(solana_sdk::system_instruction::transfer(payer, &Pubkey::new_unique(), 10_000))
    }

    async fn submit_bundle(&self, transactions: &[Transaction], _min_expected_gain: i64) -> Result<BundleOutcome, ArbError> {
        Ok(BundleOutcome {
            bundle_id: "bundle-1".to_string(),
            landed: true,
            timed_out: false,
            included_signatures: transactions.iter().map(|tx| tx.signatures[0]).collect(),
            landed_slot: Some(42),
            error: None,
        })
    }
}

/// Loses the connection to the block engine mid-request.
#[derive(Default)]
struct DisconnectingSubmitter {
    submissions: AtomicUsize,
}

#[async_trait]
impl BundleSubmitter for DisconnectingSubmitter {
    fn name(&self) -> &str {
        "disconnecting"
    }

    fn tip_instruction(&self, _payer: &Pubkey) -> Option<Instruction> {
        None
    }

    async fn submit_bundle(&self, _transactions: &[Transaction], _min_expected_gain: i64) -> Result<BundleOutcome, ArbError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Err(ArbError::TimeoutError("HTTP request timed out".to_string()))
    }
}

/// Accepts every bundle but never sees it reach a final status.
struct StalledSubmitter;

#[async_trait]
impl BundleSubmitter for StalledSubmitter {
    fn name(&self) -> &str {
        "stalled"
    }

    fn tip_instruction(&self, _payer: &Pubkey) -> Option<Instruction> {
        None
    }

    async fn submit_bundle(&self, _transactions: &[Transaction], _min_expected_gain: i64) -> Result<BundleOutcome, ArbError> {
        Ok(BundleOutcome {
            bundle_id: "bundle-7".to_string(),
            landed: false,
            timed_out: true,
            included_signatures: vec![],
            landed_slot: None,
            error: Some("bundle confirmation timeout".to_string()),
        })
    }
}

/// Simulates bundles as a whole, then lands them. `simulation_error` fails the simulation.
#[derive(Default)]
struct SimulatingSubmitter {
    simulation_error: Option<String>,
    bundle_simulations: AtomicUsize,
    submissions: AtomicUsize,
}

#[async_trait]
impl BundleSubmitter for SimulatingSubmitter {
    fn name(&self) -> &str {
        "simulating"
    }

    fn tip_instruction(&self, _payer: &Pubkey) -> Option<Instruction> {
        None
    }

    async fn simulate_bundle(&self, transactions: &[Transaction]) -> Result<Option<SimulationOutcome>, ArbError> {
        self.bundle_simulations.fetch_add(1, Ordering::SeqCst);
        Ok(Some(SimulationOutcome {
            err: self.simulation_error.clone(),
            logs: vec![],
            units_consumed: Some(transactions.len() as u64 * 120_000),
        }))
    }

    async fn submit_bundle(&self, transactions: &[Transaction], _min_expected_gain: i64) -> Result<BundleOutcome, ArbError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(BundleOutcome {
            bundle_id: "bundle-2".to_string(),
            landed: true,
            timed_out: false,
            included_signatures: transactions.iter().map(|tx| tx.signatures[0]).collect(),
            landed_slot: Some(43),
            error: None,
        })
    }
}

#[derive(Clone, Default)]
struct CapturingSink {
    records: Arc<Mutex<Vec<ExecutionRecord>>>,
}

impl ExecutionSink for CapturingSink {
    fn record(&self, record: &ExecutionRecord) -> Result<(), ArbError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn token(symbol: &str) -> Token {
    known_token(symbol).unwrap()
}

fn criteria() -> RouteCriteria {
    RouteCriteria {
        min_profit_threshold: 0.001,
        max_price_impact: 0.01,
        max_hops: 3,
    }
}

async fn quoted_route() -> MultiHopRoute {
    let (sol, usdc) = (token("SOL"), token("USDC"));
    let provider = MockProvider;
    let mut hops = Vec::new();
    let mut amount = 1_000_000_000;
    for (from, to) in [(&sol, &usdc), (&usdc, &sol)] {
        let quote = provider
            .quote(&QuoteRequest {
                input_mint: from.mint,
                output_mint: to.mint,
                amount,
                slippage_bps: 50,
            })
            .await
            .unwrap();
        amount = quote.out_amount;
        hops.push(RouteHop::from_quote(from, to, provider.name(), quote));
    }
    MultiHopRoute::from_hops(hops, GasEstimator::new().estimate_gas_fee(2), &criteria())
}

fn registry() -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(MockProvider));
    providers
}

fn config(max_hops_per_transaction: usize, prefer_bundle: bool) -> ExecutionConfig {
    ExecutionConfig {
        max_retries: 3,
        confirm_timeout: Duration::from_secs(2),
        confirm_poll_interval: Duration::from_millis(10),
        max_hops_per_transaction,
        prefer_bundle,
    }
}

#[tokio::test]
async fn multi_transaction_route_never_falls_back_to_single_sends() {
    let chain = Arc::new(MockChain::default());
    let submitter = Arc::new(RejectingSubmitter::default());
    let engine = ExecutionEngine::new(
        chain.clone(),
        registry(),
        Some(submitter.clone()),
        config(1, false),
    );
    let route = quoted_route().await;
    let trader = Keypair::new();

    let result = engine
        .execute(&route, &trader, UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(ExecutionFailure::BundleRejected(_))));
    assert_eq!(result.failed_at, Some(ExecutionStage::SubmitBundle));
    assert!(result.used_atomic_bundle);
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
    assert!(result.signatures.is_empty());
}

#[tokio::test]
async fn multi_transaction_route_without_submitter_is_refused() {
    let chain = Arc::new(MockChain::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), None, config(1, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Low, &CancellationToken::new())
        .await;

    assert_eq!(result.error, Some(ExecutionFailure::BundleUnavailable));
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
    assert_eq!(chain.simulations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multi_transaction_route_lands_as_bundle() {
    let chain = Arc::new(MockChain::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(Arc::new(LandingSubmitter)), config(1, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::High, &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.used_atomic_bundle);
    assert_eq!(result.bundle_id.as_deref(), Some("bundle-1"));
    assert_eq!(result.signatures.len(), 2);
    assert_eq!(result.final_stage, ExecutionStage::Done);
    assert_eq!(chain.simulations.load(Ordering::SeqCst), 2);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_transaction_route_confirms_and_reports_realized_profit() {
    let chain = Arc::new(MockChain {
        fee_sample: Some(vec![1_000, 2_000, 3_000, 4_000]),
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), None, config(4, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert!(!result.used_atomic_bundle);
    assert_eq!(result.signatures.len(), 1);
    assert_eq!(result.compute_units_used, 150_000);
    assert_eq!(result.realized_profit, Some(PROFIT as i64));
    // One signature plus 4,500 µlamports/CU over 150k units.
    assert_eq!(result.fee_paid, 5_000 + 675);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_transaction_route_falls_back_when_bundle_is_refused() {
    let chain = Arc::new(MockChain::default());
    let submitter = Arc::new(RejectingSubmitter::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(submitter.clone()), config(4, true));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.error);
    assert!(!result.used_atomic_bundle);
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ambiguous_bundle_submission_is_not_resent_individually() {
    let chain = Arc::new(MockChain::default());
    let submitter = Arc::new(DisconnectingSubmitter::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(submitter.clone()), config(4, true));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(matches!(result.error, Some(ExecutionFailure::BundleOutcomeUnknown(_))));
    assert_eq!(result.failed_at, Some(ExecutionStage::SubmitBundle));
    assert!(result.used_atomic_bundle);
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stalled_bundle_reports_confirmation_timeout() {
    let chain = Arc::new(MockChain::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(Arc::new(StalledSubmitter)), config(1, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(
        result.error,
        Some(ExecutionFailure::ConfirmationTimeout {
            id: "bundle-7".to_string()
        })
    );
    assert_eq!(result.failed_at, Some(ExecutionStage::Confirm));
    assert_eq!(result.bundle_id.as_deref(), Some("bundle-7"));
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dependent_legs_need_whole_bundle_simulation() {
    // Leg 1 spends the USDC leg 0 produces, so it fails when simulated alone.
    let route = quoted_route().await;

    let chain = Arc::new(MockChain {
        standalone_simulation_limit: Some(1),
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(Arc::new(LandingSubmitter)), config(1, false));
    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;
    assert_eq!(result.failed_at, Some(ExecutionStage::Simulate));
    match result.error {
        Some(ExecutionFailure::SimulationRejected(msg)) => assert!(msg.starts_with("transaction 1")),
        other => panic!("unexpected error: {:?}", other),
    }

    let chain = Arc::new(MockChain {
        standalone_simulation_limit: Some(1),
        ..Default::default()
    });
    let submitter = Arc::new(SimulatingSubmitter::default());
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(submitter.clone()), config(1, false));
    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.bundle_id.as_deref(), Some("bundle-2"));
    assert_eq!(result.compute_units_used, 240_000);
    assert_eq!(submitter.bundle_simulations.load(Ordering::SeqCst), 1);
    assert_eq!(chain.simulations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_bundle_simulation_stops_before_submission() {
    let chain = Arc::new(MockChain::default());
    let submitter = Arc::new(SimulatingSubmitter {
        simulation_error: Some("TransactionFailure: custom program error: 0x1771".to_string()),
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), Some(submitter.clone()), config(1, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert_eq!(result.failed_at, Some(ExecutionStage::Simulate));
    match result.error {
        Some(ExecutionFailure::SimulationRejected(msg)) => assert!(msg.contains("0x1771")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(submitter.submissions.load(Ordering::SeqCst), 0);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_blockhash_is_refreshed_up_to_max_retries() {
    let chain = Arc::new(MockChain {
        pending: true,
        block_height: 2_000,
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), None, config(4, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ExecutionFailure::BlockhashExpired));
    assert_eq!(result.failed_at, Some(ExecutionStage::Confirm));
    assert_eq!(chain.sends.load(Ordering::SeqCst), 3);
    assert_eq!(chain.simulations.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unconfirmed_signature_times_out_within_validity_window() {
    let chain = Arc::new(MockChain {
        pending: true,
        block_height: 900,
        ..Default::default()
    });
    let engine = ExecutionEngine::new(
        chain.clone(),
        registry(),
        None,
        ExecutionConfig {
            confirm_timeout: Duration::from_millis(50),
            ..config(4, false)
        },
    );
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_at, Some(ExecutionStage::Confirm));
    assert_eq!(result.signatures.len(), 1);
    assert_eq!(
        result.error,
        Some(ExecutionFailure::ConfirmationTimeout {
            id: result.signatures[0].to_string()
        })
    );
    assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn on_chain_failure_keeps_the_signature() {
    let chain = Arc::new(MockChain {
        on_chain_error: Some("InstructionError(1, Custom(6001))".to_string()),
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), None, config(4, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_at, Some(ExecutionStage::Confirm));
    assert!(matches!(result.error, Some(ExecutionFailure::OnChainFailure(ref msg)) if msg.contains("6001")));
    assert_eq!(result.signatures.len(), 1);
    assert_eq!(result.realized_profit, None);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn simulation_rejection_stops_before_submission() {
    let chain = Arc::new(MockChain {
        simulation_error: Some("InstructionError(0, Custom(6001))".to_string()),
        ..Default::default()
    });
    let engine = ExecutionEngine::new(chain.clone(), registry(), None, config(4, false));
    let route = quoted_route().await;

    let result = engine
        .execute(&route, &Keypair::new(), UrgencyTier::Medium, &CancellationToken::new())
        .await;

    assert_eq!(result.failed_at, Some(ExecutionStage::Simulate));
    match result.error {
        Some(ExecutionFailure::SimulationRejected(msg)) => assert!(msg.contains("6001")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(chain.simulations.load(Ordering::SeqCst), 1);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fee_estimate_is_stable_for_a_fixed_sample() {
    let chain = Arc::new(MockChain {
        fee_sample: Some(vec![900, 100, 500, 300, 700]),
        ..Default::default()
    });
    let estimator = FeeEstimator::new(chain);

    for tier in [UrgencyTier::Low, UrgencyTier::Medium, UrgencyTier::High, UrgencyTier::Critical] {
        let first = estimator.estimate_fee(tier).await;
        let second = estimator.estimate_fee(tier).await;
        assert_eq!(first, second);
        assert_eq!(first.compute_unit_limit, tier.compute_unit_limit());
    }

    let unavailable = FeeEstimator::new(Arc::new(MockChain::default()));
    assert_eq!(
        unavailable.estimate_fee(UrgencyTier::Critical).await,
        UrgencyTier::Critical.default_fee()
    );
}

fn coordinator(
    chain: Arc<MockChain>,
    signer: Option<Arc<dyn Signer + Send + Sync>>,
    dry_run: bool,
    splitter: ProfitSplitter,
    sink: CapturingSink,
) -> ArbitrageCoordinator {
    let search = RouteSearchEngine::new(Arc::new(MockProvider), SearchSettings::default());
    let engine = ExecutionEngine::new(chain, registry(), None, config(4, false));
    let params = SearchParams {
        start_token: token("SOL"),
        min_hops: 2,
        max_hops: 2,
        start_amount: 1_000_000_000,
        universe: vec![token("SOL"), token("USDC")],
        min_profit_threshold: 0.001,
        max_price_impact: 0.01,
        max_slippage_bps: 50,
    };
    ArbitrageCoordinator::new(
        search,
        engine,
        params,
        signer,
        UrgencyTier::Medium,
        dry_run,
        splitter,
        vec![Box::new(sink)],
    )
}

#[tokio::test]
async fn dry_run_cycle_records_without_sending() {
    let chain = Arc::new(MockChain::default());
    let sink = CapturingSink::default();
    let coordinator = coordinator(chain.clone(), None, false, ProfitSplitter::default(), sink.clone());

    let outcome = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

    match outcome {
        CycleOutcome::DryRun(route) => assert_eq!(route.path_symbols(), vec!["SOL", "USDC", "SOL"]),
        other => panic!("expected dry run, got {:?}", other),
    }
    assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "DRY_RUN");
}

#[tokio::test]
async fn live_cycle_executes_and_splits_profit() {
    let chain = Arc::new(MockChain::default());
    let sink = CapturingSink::default();
    let treasury = Pubkey::new_unique();
    let splitter = ProfitSplitter::new(vec![SplitTarget {
        label: "treasury".to_string(),
        recipient: treasury,
        bps: 1_000,
    }])
    .unwrap();
    let signer: Arc<dyn Signer + Send + Sync> = Arc::new(Keypair::new());
    let coordinator = coordinator(chain.clone(), Some(signer), false, splitter, sink.clone());

    let outcome = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

    let CycleOutcome::Executed { result, .. } = outcome else {
        panic!("expected an execution");
    };
    assert!(result.success, "{:?}", result.error);
    assert_eq!(chain.sends.load(Ordering::SeqCst), 1);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "DONE");
    assert_eq!(records[0].realized_profit, Some(PROFIT as i64));
    assert_eq!(records[0].profit_shares.len(), 1);
    assert_eq!(records[0].profit_shares[0].amount, PROFIT / 10);
    assert_eq!(records[0].profit_shares[0].recipient, treasury.to_string());
}

#[tokio::test]
async fn live_cycle_pays_out_shares_when_distribution_is_enabled() {
    let chain = Arc::new(MockChain::default());
    let sink = CapturingSink::default();
    let splitter = ProfitSplitter::new(vec![SplitTarget {
        label: "treasury".to_string(),
        recipient: Pubkey::new_unique(),
        bps: 2_500,
    }])
    .unwrap();
    let signer: Arc<dyn Signer + Send + Sync> = Arc::new(Keypair::new());
    let coordinator = coordinator(chain.clone(), Some(signer), false, splitter, sink.clone())
        .with_optimization(false)
        .with_profit_distribution(true);

    let outcome = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Executed { ref result, .. } if result.success));
    // The swap, then the payout.
    assert_eq!(chain.sends.load(Ordering::SeqCst), 2);
    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].profit_shares[0].amount, PROFIT / 4);
}
