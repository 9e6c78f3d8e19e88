use self::accounting::{emit_record, ExecutionRecord, ExecutionSink, ProfitSplitter};
use self::execution_engine::{ExecutionEngine, ExecutionResult};
use self::fee_estimator::UrgencyTier;
use self::path_finder::{RouteSearchEngine, SearchParams};
use self::types::MultiHopRoute;
use crate::error::ArbError;
use log::{debug, error, info, warn};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub mod accounting;
pub mod bundle;
pub mod execution_engine;
pub mod fee_estimator;
pub mod jito_client;
pub mod jupiter;
pub mod path_finder;
pub mod quote;
pub mod types;

/// What a single search-and-execute cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    NoViableRoute,
    DryRun(MultiHopRoute),
    Executed {
        route: MultiHopRoute,
        result: ExecutionResult,
    },
}

/// Drives search → select → (optimize) → execute → record.
pub struct ArbitrageCoordinator {
    search: RouteSearchEngine,
    engine: ExecutionEngine,
    params: SearchParams,
    signer: Option<Arc<dyn Signer + Send + Sync>>,
    urgency: UrgencyTier,
    dry_run: bool,
    optimize: bool,
    distribute: bool,
    splitter: ProfitSplitter,
    sinks: Vec<Box<dyn ExecutionSink>>,
}

impl ArbitrageCoordinator {
    /// Without a signer every cycle runs dry.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        search: RouteSearchEngine,
        engine: ExecutionEngine,
        params: SearchParams,
        signer: Option<Arc<dyn Signer + Send + Sync>>,
        urgency: UrgencyTier,
        dry_run: bool,
        splitter: ProfitSplitter,
        sinks: Vec<Box<dyn ExecutionSink>>,
    ) -> Self {
        Self {
            search,
            engine,
            params,
            signer,
            urgency,
            dry_run,
            optimize: true,
            distribute: false,
            splitter,
            sinks,
        }
    }

    pub fn with_optimization(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Pay profit shares on-chain, in the start token, after each successful execution.
    pub fn with_profit_distribution(mut self, distribute: bool) -> Self {
        self.distribute = distribute;
        self
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleOutcome, ArbError> {
        let routes = self.search.find_routes(&self.params, cancel).await?;
        let Some(best) = routes.into_iter().next() else {
            debug!("No viable route this cycle");
            return Ok(CycleOutcome::NoViableRoute);
        };

        let route = if self.optimize {
            self.search
                .optimize_route(&best, &self.params.criteria(), cancel)
                .await?
        } else {
            best
        };
        if !route.viable {
            warn!("Dropping {}: no longer viable after optimization", route.describe());
            return Ok(CycleOutcome::NoViableRoute);
        }
        info!(
            "Selected {}: profit {:.4}%, net {} lamports, confidence {:.2}",
            route.describe(),
            route.profit_percentage * 100.0,
            route.net_profit,
            route.confidence
        );

        let signer = match (&self.signer, self.dry_run) {
            (Some(signer), false) => signer,
            _ => {
                emit_record(&self.sinks, &ExecutionRecord::dry_run(&route));
                return Ok(CycleOutcome::DryRun(route));
            }
        };

        let result = self
            .engine
            .execute(&route, signer.as_ref(), self.urgency, cancel)
            .await;

        let shares = if self.splitter.is_empty() {
            vec![]
        } else {
            let realized = result.realized_profit.unwrap_or(0);
            let (shares, remainder) = self.splitter.split(realized);
            if !shares.is_empty() {
                info!("Profit split: {:?}, operator keeps {}", shares, remainder);
                if self.distribute && result.success {
                    self.distribute_profit(signer.as_ref(), realized, cancel).await;
                }
            }
            shares
        };
        emit_record(
            &self.sinks,
            &ExecutionRecord::from_execution(&route, &result).with_shares(shares),
        );

        Ok(CycleOutcome::Executed { route, result })
    }

    /// Payout failures are logged; the trade itself already finished.
    async fn distribute_profit(&self, signer: &(dyn Signer + Send + Sync), realized: i64, cancel: &CancellationToken) {
        let token = &self.params.start_token;
        let instructions = match self.splitter.transfer_instructions(&signer.pubkey(), token, realized) {
            Ok(ixs) if ixs.is_empty() => return,
            Ok(ixs) => ixs,
            Err(e) => {
                error!("Profit distribution not built: {}", e);
                return;
            }
        };
        let payout = self
            .engine
            .submit_instructions(&instructions, signer, self.urgency, cancel)
            .await;
        if payout.success {
            info!("Profit distributed in {}: {:?}", token, payout.signatures);
        } else {
            error!("Profit distribution failed: {:?}", payout.error);
        }
    }

    /// Runs cycles every `every` until cancelled. Cycle errors are logged and the loop continues.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Coordinator stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_cycle(&cancel).await {
                        Ok(CycleOutcome::Executed { result, .. }) if !result.success => {
                            error!("Execution failed: {:?}", result.error);
                        }
                        Ok(_) => {}
                        Err(ArbError::Cancelled(_)) => break,
                        Err(e) => error!("Cycle failed: {}", e),
                    }
                }
            }
        }
    }
}
