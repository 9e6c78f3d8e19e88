// src/arbitrage/path_finder.rs
use crate::{
    arbitrage::{
        quote::{QuoteRequest, SwapProvider},
        types::{
            GasEstimator, HopEvaluation, MultiHopRoute, PruneReason, RouteCriteria, RouteHop, Token,
            DEFAULT_MAX_LOSS_PER_HOP,
        },
    },
    error::ArbError,
};
use futures::future::join_all;
use log::{debug, info};
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Slippage tolerances tried per hop when refining a route.
const OPTIMIZE_SLIPPAGE_TIERS_BPS: [u16; 3] = [50, 100, 200];

/// One cycle search request.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub start_token: Token,
    pub min_hops: usize,
    pub max_hops: usize,
    pub start_amount: u64,
    pub universe: Vec<Token>,
    pub min_profit_threshold: f64,
    pub max_price_impact: f64,
    pub max_slippage_bps: u16,
}

impl SearchParams {
    pub fn criteria(&self) -> RouteCriteria {
        RouteCriteria {
            min_profit_threshold: self.min_profit_threshold,
            max_price_impact: self.max_price_impact,
            max_hops: self.max_hops,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Sibling quotes dispatched concurrently per batch.
    pub quote_batch_size: usize,
    pub quote_timeout: Duration,
    pub max_loss_per_hop: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            quote_batch_size: 10,
            quote_timeout: Duration::from_secs(5),
            max_loss_per_hop: DEFAULT_MAX_LOSS_PER_HOP,
        }
    }
}

/// A partial path on the DFS stack. Each frame owns its own path and visited set.
struct Frame {
    token: Token,
    amount: u64,
    path: Vec<RouteHop>,
    visited: HashSet<Pubkey>,
}

pub struct RouteSearchEngine {
    provider: Arc<dyn SwapProvider>,
    gas_estimator: GasEstimator,
    settings: SearchSettings,
}

impl RouteSearchEngine {
    pub fn new(provider: Arc<dyn SwapProvider>, settings: SearchSettings) -> Self {
        info!(
            "[Route Search] Engine initialized: provider={}, batch_size={}, quote_timeout={:?}, max_loss_per_hop={:.2}",
            provider.name(),
            settings.quote_batch_size,
            settings.quote_timeout,
            settings.max_loss_per_hop
        );
        Self {
            provider,
            gas_estimator: GasEstimator::new(),
            settings,
        }
    }

    pub fn gas_estimator(&self) -> &GasEstimator {
        &self.gas_estimator
    }

    /// Searches closed cycles of every length in `[min_hops, max_hops]`.
    /// Returns viable routes only, highest net profit first. Oracle failures prune, they never fail the search.
    pub async fn find_routes(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<MultiHopRoute>, ArbError> {
        if params.start_amount == 0 {
            return Err(ArbError::InvalidInput("start amount must be positive".to_string()));
        }
        if params.min_hops > params.max_hops {
            return Err(ArbError::InvalidInput(format!(
                "min_hops ({}) exceeds max_hops ({})",
                params.min_hops, params.max_hops
            )));
        }

        let start_time = Instant::now();
        info!(
            "[Route Search] Searching {}-{} hop cycles from {} with {} units over {} tokens",
            params.min_hops,
            params.max_hops,
            params.start_token,
            params.start_amount,
            params.universe.len()
        );

        let mut routes = Vec::new();
        for hop_count in params.min_hops.max(2)..=params.max_hops {
            let mut found = self.search_depth(params, hop_count, cancel).await?;
            debug!("[Route Search] {} viable {}-hop route(s)", found.len(), hop_count);
            routes.append(&mut found);
        }

        routes.sort_by(|a, b| {
            b.net_profit
                .cmp(&a.net_profit)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });

        info!(
            "[Route Search] Completed: {} viable route(s) in {:.2}ms",
            routes.len(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(routes)
    }

    /// Bounded DFS for cycles of exactly `hop_count` hops.
    async fn search_depth(
        &self,
        params: &SearchParams,
        hop_count: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<MultiHopRoute>, ArbError> {
        let criteria = params.criteria();
        let start = &params.start_token;
        let mut viable = Vec::new();

        let mut stack = vec![Frame {
            token: start.clone(),
            amount: params.start_amount,
            path: Vec::with_capacity(hop_count),
            visited: HashSet::from([start.mint]),
        }];

        while let Some(frame) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(ArbError::Cancelled("route search cancelled".to_string()));
            }

            if frame.path.len() + 1 == hop_count {
                let evaluation = self
                    .evaluate_batch(&frame.token, frame.amount, std::slice::from_ref(start), params, cancel)
                    .await?
                    .pop();
                if let Some((_, HopEvaluation::Hop(closing))) = evaluation {
                    let mut hops = frame.path;
                    hops.push(closing);
                    let gas = self.gas_estimator.estimate_gas_fee(hops.len());
                    let route = MultiHopRoute::from_hops(hops, gas, &criteria);
                    if route.viable {
                        debug!(
                            "[Route Search] Viable cycle {}: profit {:.4}%, net {}",
                            route.describe(),
                            route.profit_percentage * 100.0,
                            route.net_profit
                        );
                        viable.push(route);
                    }
                }
                continue;
            }

            let candidates: Vec<Token> = params
                .universe
                .iter()
                .filter(|t| t.mint != frame.token.mint && !frame.visited.contains(&t.mint))
                .cloned()
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let evaluations = self
                .evaluate_batch(&frame.token, frame.amount, &candidates, params, cancel)
                .await?;

            // Reverse so the first candidate is explored first.
            for (to_token, evaluation) in evaluations.into_iter().rev() {
                if let HopEvaluation::Hop(hop) = evaluation {
                    let mut path = frame.path.clone();
                    let amount = hop.expected_output;
                    path.push(hop);
                    let mut visited = frame.visited.clone();
                    visited.insert(to_token.mint);
                    stack.push(Frame {
                        token: to_token,
                        amount,
                        path,
                        visited,
                    });
                }
            }
        }

        Ok(viable)
    }

    /// Prices `from → each target` in batches of `quote_batch_size`, abandoning in-flight quotes on cancel.
    async fn evaluate_batch(
        &self,
        from: &Token,
        amount: u64,
        targets: &[Token],
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<Vec<(Token, HopEvaluation)>, ArbError> {
        let mut results = Vec::with_capacity(targets.len());
        for chunk in targets.chunks(self.settings.quote_batch_size.max(1)) {
            let quotes = chunk.iter().map(|to| {
                self.evaluate_hop(from, to, amount, params.max_slippage_bps, params.max_price_impact)
            });
            let evaluations = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ArbError::Cancelled("route search cancelled".to_string()));
                }
                evaluations = join_all(quotes) => evaluations,
            };
            results.extend(chunk.iter().cloned().zip(evaluations));
        }
        Ok(results)
    }

    /// Prices a single hop. Every failure mode is a `Pruned` value.
    pub async fn evaluate_hop(
        &self,
        from: &Token,
        to: &Token,
        amount: u64,
        slippage_bps: u16,
        max_price_impact: f64,
    ) -> HopEvaluation {
        let request = QuoteRequest {
            input_mint: from.mint,
            output_mint: to.mint,
            amount,
            slippage_bps,
        };

        let quote = match timeout(self.settings.quote_timeout, self.provider.quote(&request)).await {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                debug!("[Route Search] Pruned {} → {}: {}", from, to, e);
                return HopEvaluation::Pruned(PruneReason::OracleUnavailable(e.to_string()));
            }
            Err(_) => {
                debug!("[Route Search] Pruned {} → {}: quote timed out", from, to);
                return HopEvaluation::Pruned(PruneReason::QuoteTimeout);
            }
        };

        if quote.in_amount != amount {
            return HopEvaluation::Pruned(PruneReason::OracleUnavailable(format!(
                "quote priced {} units, requested {}",
                quote.in_amount, amount
            )));
        }
        if quote.price_impact > max_price_impact {
            debug!(
                "[Route Search] Pruned {} → {}: impact {:.4} > {:.4}",
                from, to, quote.price_impact, max_price_impact
            );
            return HopEvaluation::Pruned(PruneReason::PriceImpactExceeded {
                impact: quote.price_impact,
                max: max_price_impact,
            });
        }

        let hop = RouteHop::from_quote(from, to, self.provider.name(), quote);
        if !hop.within_loss_floor(self.settings.max_loss_per_hop) {
            debug!(
                "[Route Search] Pruned {} → {}: {} in, {} out below loss floor",
                from, to, hop.input_amount, hop.expected_output
            );
            return HopEvaluation::Pruned(PruneReason::BelowLossFloor {
                input: hop.input_amount,
                output: hop.expected_output,
            });
        }
        HopEvaluation::Hop(hop)
    }

    /// Re-quotes each hop at several slippage tolerances, keeping the best output per hop.
    /// The refined route replaces the original only on strictly higher net profit.
    pub async fn optimize_route(
        &self,
        route: &MultiHopRoute,
        criteria: &RouteCriteria,
        cancel: &CancellationToken,
    ) -> Result<MultiHopRoute, ArbError> {
        let mut amount = route.total_input;
        let mut hops = Vec::with_capacity(route.hops.len());

        for original in &route.hops {
            let attempts = OPTIMIZE_SLIPPAGE_TIERS_BPS.iter().map(|slippage| {
                self.evaluate_hop(
                    &original.from_token,
                    &original.to_token,
                    amount,
                    *slippage,
                    criteria.max_price_impact,
                )
            });
            let evaluations = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ArbError::Cancelled("route optimization cancelled".to_string()));
                }
                evaluations = join_all(attempts) => evaluations,
            };

            let best = evaluations
                .into_iter()
                .filter_map(|evaluation| match evaluation {
                    HopEvaluation::Hop(hop) => Some(hop),
                    HopEvaluation::Pruned(_) => None,
                })
                .max_by_key(|hop| hop.expected_output);

            match best {
                Some(hop) => {
                    amount = hop.expected_output;
                    hops.push(hop);
                }
                None => {
                    debug!(
                        "[Route Search] Optimization kept original route: {} → {} could not be re-quoted",
                        original.from_token, original.to_token
                    );
                    return Ok(route.clone());
                }
            }
        }

        let gas = self.gas_estimator.estimate_gas_fee(hops.len());
        let refined = MultiHopRoute::from_hops(hops, gas, criteria);
        if refined.viable && refined.net_profit > route.net_profit {
            info!(
                "[Route Search] Optimized {}: net profit {} → {}",
                refined.describe(),
                route.net_profit,
                refined.net_profit
            );
            Ok(refined)
        } else {
            Ok(route.clone())
        }
    }
}
