// src/arbitrage/quote.rs
//! Swap provider capability and the registry that selects providers by name.

use crate::error::ArbError;
use async_trait::async_trait;
use log::info;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

/// A priced swap as returned by a provider.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Fraction, e.g. 0.004 for 0.4%.
    pub price_impact: f64,
    /// Sum of the per-leg fee amounts.
    pub fee_amount: u64,
    pub slippage_bps: u16,
    /// Provider payload needed to build the swap later.
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, ArbError>;

    /// Instructions performing the quoted swap for `user`, without compute budget instructions.
    async fn build_swap_instructions(
        &self,
        quote: &Quote,
        user: &Pubkey,
    ) -> Result<Vec<Instruction>, ArbError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SwapProvider>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first registered provider becomes the default.
    pub fn register(&mut self, provider: Arc<dyn SwapProvider>) {
        let name = provider.name().to_string();
        info!("Registered swap provider: {}", name);
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SwapProvider>, ArbError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ArbError::ConfigError(format!("No swap provider registered as '{}'", name)))
    }

    pub fn default_provider(&self) -> Result<Arc<dyn SwapProvider>, ArbError> {
        match &self.default_provider {
            Some(name) => self.get(name),
            None => Err(ArbError::ConfigError("No swap provider registered".to_string())),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
