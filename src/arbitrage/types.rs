// src/arbitrage/types.rs
//! Core data model shared by route search and execution.

use crate::arbitrage::quote::Quote;
use crate::error::ArbError;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey, pubkey::Pubkey};
use std::fmt;

/// Fraction of input value a single hop may lose (in smallest units) before it is rejected.
pub const DEFAULT_MAX_LOSS_PER_HOP: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenCategory {
    Native,
    Stablecoin,
    LiquidStaking,
    Governance,
    Meme,
    Other,
}

/// Immutable reference data for a tradable token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub mint: Pubkey,
    pub decimals: u8,
    pub category: TokenCategory,
}

impl Token {
    pub fn new(symbol: &str, mint: Pubkey, decimals: u8, category: TokenCategory) -> Self {
        Self {
            symbol: symbol.to_string(),
            mint,
            decimals,
            category,
        }
    }

    pub fn is_native(&self) -> bool {
        self.mint == spl_token::native_mint::id()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

const KNOWN_TOKENS: &[(&str, Pubkey, u8, TokenCategory)] = &[
    ("SOL", pubkey!("So11111111111111111111111111111111111111112"), 9, TokenCategory::Native),
    ("USDC", pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"), 6, TokenCategory::Stablecoin),
    ("USDT", pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB"), 6, TokenCategory::Stablecoin),
    ("JUP", pubkey!("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN"), 6, TokenCategory::Governance),
    ("BONK", pubkey!("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263"), 5, TokenCategory::Meme),
    ("mSOL", pubkey!("mSoLzYCxHdYgdzU16g5QSh3i5K3z3KZK7ytfqcJm7So"), 9, TokenCategory::LiquidStaking),
    ("JitoSOL", pubkey!("J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn"), 9, TokenCategory::LiquidStaking),
];

/// Looks up a token from the built-in table (case-insensitive symbol match).
pub fn known_token(symbol: &str) -> Result<Token, ArbError> {
    KNOWN_TOKENS
        .iter()
        .find(|(s, _, _, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(s, mint, decimals, category)| Token::new(s, *mint, *decimals, *category))
        .ok_or_else(|| {
            let symbols: Vec<&str> = KNOWN_TOKENS.iter().map(|(s, _, _, _)| *s).collect();
            ArbError::ConfigError(format!(
                "Unknown token symbol: {} (known: {})",
                symbol,
                symbols.join(", ")
            ))
        })
}

/// One directed, priced trade inside a candidate route.
#[derive(Debug, Clone)]
pub struct RouteHop {
    pub from_token: Token,
    pub to_token: Token,
    pub input_amount: u64,
    pub expected_output: u64,
    /// Fraction, e.g. 0.004 for 0.4%.
    pub price_impact: f64,
    /// Fee charged by the venue, in smallest units of the fee mint.
    pub fee: u64,
    pub provider: String,
    pub quote: Quote,
}

impl RouteHop {
    pub fn from_quote(from_token: &Token, to_token: &Token, provider: &str, quote: Quote) -> Self {
        Self {
            from_token: from_token.clone(),
            to_token: to_token.clone(),
            input_amount: quote.in_amount,
            expected_output: quote.out_amount,
            price_impact: quote.price_impact,
            fee: quote.fee_amount,
            provider: provider.to_string(),
            quote,
        }
    }

    /// `expected_output ≥ input_amount × (1 − max_loss)`
    pub fn within_loss_floor(&self, max_loss_per_hop: f64) -> bool {
        let floor = self.input_amount as f64 * (1.0 - max_loss_per_hop);
        self.expected_output as f64 >= floor
    }
}

/// Thresholds a closed cycle is judged against.
#[derive(Debug, Clone, Copy)]
pub struct RouteCriteria {
    /// Fraction, e.g. 0.003 for 0.3%.
    pub min_profit_threshold: f64,
    /// Fraction, summed across hops.
    pub max_price_impact: f64,
    pub max_hops: usize,
}

#[derive(Debug, Clone)]
pub struct MultiHopRoute {
    pub hops: Vec<RouteHop>,
    pub total_input: u64,
    pub total_output: u64,
    /// Fraction of `total_input` gained (0.002 = 0.2%).
    pub profit_percentage: f64,
    pub total_price_impact: f64,
    /// Lamports.
    pub estimated_gas_cost: u64,
    pub net_profit: i64,
    pub viable: bool,
    pub confidence: f64,
}

impl MultiHopRoute {
    /// Materializes a route from a closed hop sequence. The first hop's input is the route input.
    pub fn from_hops(hops: Vec<RouteHop>, estimated_gas_cost: u64, criteria: &RouteCriteria) -> Self {
        let total_input = hops.first().map(|h| h.input_amount).unwrap_or(0);
        let total_output = hops.last().map(|h| h.expected_output).unwrap_or(0);
        let gross_profit = total_output as i128 - total_input as i128;
        let profit_percentage = if total_input == 0 {
            0.0
        } else {
            gross_profit as f64 / total_input as f64
        };
        let total_price_impact: f64 = hops.iter().map(|h| h.price_impact).sum();
        let net_profit = (gross_profit - estimated_gas_cost as i128)
            .clamp(i64::MIN as i128, i64::MAX as i128) as i64;

        let viable = profit_percentage >= criteria.min_profit_threshold
            && total_price_impact <= criteria.max_price_impact
            && net_profit > 0;
        let confidence =
            calculate_confidence(total_price_impact, profit_percentage, hops.len(), criteria);

        Self {
            hops,
            total_input,
            total_output,
            profit_percentage,
            total_price_impact,
            estimated_gas_cost,
            net_profit,
            viable,
            confidence,
        }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn start_token(&self) -> Option<&Token> {
        self.hops.first().map(|h| &h.from_token)
    }

    pub fn is_closed_cycle(&self) -> bool {
        match (self.hops.first(), self.hops.last()) {
            (Some(first), Some(last)) => first.from_token.mint == last.to_token.mint,
            _ => false,
        }
    }

    /// Token symbols along the route, start token repeated at the end.
    pub fn path_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.hops.iter().map(|h| h.from_token.symbol.clone()).collect();
        if let Some(last) = self.hops.last() {
            symbols.push(last.to_token.symbol.clone());
        }
        symbols
    }

    pub fn describe(&self) -> String {
        self.path_symbols().join(" → ")
    }
}

/// Ranking score in `[0, 1]`; never used for viability.
pub fn calculate_confidence(
    total_price_impact: f64,
    profit_percentage: f64,
    hop_count: usize,
    criteria: &RouteCriteria,
) -> f64 {
    let mut confidence = 1.0_f64;

    let impact_factor = if criteria.max_price_impact > 0.0 {
        1.0 - total_price_impact / criteria.max_price_impact
    } else if total_price_impact > 0.0 {
        0.0
    } else {
        1.0
    };
    confidence *= impact_factor.max(0.1);

    let profit_factor = if criteria.min_profit_threshold > 0.0 {
        profit_percentage / criteria.min_profit_threshold
    } else {
        1.0
    };
    confidence *= profit_factor.min(1.0);

    if criteria.max_hops > 0 {
        let length_factor = 1.0 - (hop_count as f64 / criteria.max_hops as f64) * 0.5;
        confidence *= length_factor.max(0.5);
    }

    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

/// Why a branch was cut during search.
#[derive(Debug, Clone, PartialEq)]
pub enum PruneReason {
    OracleUnavailable(String),
    QuoteTimeout,
    PriceImpactExceeded { impact: f64, max: f64 },
    BelowLossFloor { input: u64, output: u64 },
}

/// Result of pricing one candidate hop; pruning is a value, not an error.
#[derive(Debug, Clone)]
pub enum HopEvaluation {
    Hop(RouteHop),
    Pruned(PruneReason),
}

/// Estimates the network cost of executing a route, in lamports.
#[derive(Debug, Clone)]
pub struct GasEstimator {
    base_compute_units: u64,
    per_hop_compute_units: u64,
    compute_unit_price_micro_lamports: u64,
    signature_fee_lamports: u64,
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl GasEstimator {
    pub fn new() -> Self {
        Self {
            base_compute_units: 100_000,
            per_hop_compute_units: 50_000,
            compute_unit_price_micro_lamports: 5_000,
            signature_fee_lamports: 5_000,
        }
    }

    pub fn estimate_compute_units(&self, hop_count: usize) -> u64 {
        self.base_compute_units + (self.per_hop_compute_units * hop_count as u64)
    }

    pub fn estimate_gas_fee(&self, hop_count: usize) -> u64 {
        self.signature_fee_lamports
            + self.estimate_compute_units(hop_count) * self.compute_unit_price_micro_lamports / 1_000_000
    }
}
