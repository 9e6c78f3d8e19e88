use crate::arbitrage::fee_estimator::UrgencyTier;
use crate::arbitrage::{
    accounting::ProfitSplitter,
    types::{known_token, Token},
};
use crate::error::{ArbError, RetryPolicy};
use crate::solana::rpc::EndpointConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_QUOTE_API_URL: &str = "https://quote-api.jup.ag/v6";

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_url_backup: Vec<String>,
    pub rpc_max_retries: u32,
    pub rpc_retry_delay_ms: u64,
    pub rpc_timeout_ms: u64,
    pub health_check_interval_secs: u64,
    pub health_check_timeout_ms: u64,
    pub quote_api_url: String,
    pub quote_timeout_ms: u64,
    pub quote_batch_size: usize,
    pub quote_requests_per_second: u32,
    pub min_profit_pct: f64,
    pub max_price_impact: f64,
    pub max_slippage_bps: u16,
    pub max_loss_per_hop: f64,
    pub min_hops: usize,
    pub max_hops: usize,
    pub start_token: String,
    pub start_amount: u64,
    pub token_universe: Vec<String>,
    pub urgency: String,
    pub trader_wallet_keypair_path: Option<String>,
    pub jito_block_engine_url: Option<String>,
    pub jito_tip_lamports: u64,
    /// Jito-enabled RPC serving `simulateBundle`; without it bundle legs are simulated one by one.
    pub jito_simulation_url: Option<String>,
    pub prefer_bundle: bool,
    pub confirm_timeout_secs: u64,
    pub confirm_poll_interval_ms: u64,
    pub max_hops_per_transaction: usize,
    pub execution_log_path: Option<String>,
    pub profit_split: Option<String>,
    /// Pay profit shares on-chain after each successful execution.
    pub distribute_profit: bool,
    pub optimize_routes: bool,
    pub cycle_interval_seconds: u64,
    pub dry_run: bool,
    pub log_level: String,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key/value source; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let float = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let flag = |key: &str| lookup(key).and_then(|v| parse_bool(&v));
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Config {
            rpc_url: non_empty("RPC_URL")
                .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string()),
            rpc_url_backup: lookup("RPC_URL_BACKUP")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            rpc_max_retries: num("RPC_MAX_RETRIES").map(|v| v as u32).unwrap_or(3),
            rpc_retry_delay_ms: num("RPC_RETRY_DELAY_MS").unwrap_or(500),
            rpc_timeout_ms: num("RPC_TIMEOUT_MS").unwrap_or(10_000),
            health_check_interval_secs: num("HEALTH_CHECK_INTERVAL_SECS").unwrap_or(30),
            health_check_timeout_ms: num("HEALTH_CHECK_TIMEOUT_MS").unwrap_or(5_000),
            quote_api_url: non_empty("QUOTE_API_URL")
                .unwrap_or_else(|| DEFAULT_QUOTE_API_URL.to_string()),
            quote_timeout_ms: num("QUOTE_TIMEOUT_MS").unwrap_or(5_000),
            quote_batch_size: num("QUOTE_BATCH_SIZE").map(|v| v as usize).unwrap_or(10),
            quote_requests_per_second: num("QUOTE_REQUESTS_PER_SECOND")
                .map(|v| v as u32)
                .unwrap_or(10),
            min_profit_pct: float("MIN_PROFIT_PCT").unwrap_or(0.003),
            max_price_impact: float("MAX_PRICE_IMPACT").unwrap_or(0.01),
            max_slippage_bps: lookup("MAX_SLIPPAGE_BPS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(50),
            max_loss_per_hop: float("MAX_LOSS_PER_HOP").unwrap_or(0.9),
            min_hops: num("MIN_HOPS").map(|v| v as usize).unwrap_or(2),
            max_hops: num("MAX_HOPS").map(|v| v as usize).unwrap_or(3),
            start_token: non_empty("START_TOKEN").unwrap_or_else(|| "SOL".to_string()),
            start_amount: num("START_AMOUNT").unwrap_or(1_000_000_000),
            token_universe: lookup("TOKEN_UNIVERSE")
                .map(|v| split_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| split_list("SOL,USDC,USDT,JUP,mSOL")),
            urgency: non_empty("URGENCY").unwrap_or_else(|| "medium".to_string()),
            trader_wallet_keypair_path: non_empty("TRADER_WALLET_KEYPAIR_PATH"),
            jito_block_engine_url: non_empty("JITO_BLOCK_ENGINE_URL"),
            jito_tip_lamports: num("JITO_TIP_LAMPORTS").unwrap_or(10_000),
            jito_simulation_url: non_empty("JITO_SIMULATION_URL"),
            prefer_bundle: flag("PREFER_BUNDLE").unwrap_or(false),
            confirm_timeout_secs: num("CONFIRM_TIMEOUT_SECS").unwrap_or(60),
            confirm_poll_interval_ms: num("CONFIRM_POLL_INTERVAL_MS").unwrap_or(500),
            max_hops_per_transaction: num("MAX_HOPS_PER_TRANSACTION")
                .map(|v| v as usize)
                .unwrap_or(4),
            execution_log_path: non_empty("EXECUTION_LOG_PATH"),
            profit_split: non_empty("PROFIT_SPLIT"),
            distribute_profit: flag("DISTRIBUTE_PROFIT").unwrap_or(false),
            optimize_routes: flag("OPTIMIZE_ROUTES").unwrap_or(true),
            cycle_interval_seconds: num("CYCLE_INTERVAL_SECONDS").unwrap_or(5),
            dry_run: flag("DRY_RUN").unwrap_or(true),
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ArbError> {
        if self.rpc_url.is_empty() {
            return Err(ArbError::ConfigError("RPC_URL cannot be empty".to_string()));
        }
        let mut urls: Vec<&str> = vec![self.rpc_url.as_str(), self.quote_api_url.as_str()];
        urls.extend(self.rpc_url_backup.iter().map(String::as_str));
        urls.extend(self.jito_block_engine_url.as_deref());
        urls.extend(self.jito_simulation_url.as_deref());
        for raw in urls {
            Url::parse(raw)
                .map_err(|e| ArbError::ConfigError(format!("Invalid URL '{}': {}", raw, e)))?;
        }

        if self.min_hops < 2 {
            return Err(ArbError::ConfigError("MIN_HOPS must be at least 2".to_string()));
        }
        if self.min_hops > self.max_hops {
            return Err(ArbError::ConfigError(format!(
                "MIN_HOPS ({}) cannot exceed MAX_HOPS ({})",
                self.min_hops, self.max_hops
            )));
        }
        if self.rpc_max_retries == 0 {
            return Err(ArbError::ConfigError("RPC_MAX_RETRIES must be at least 1".to_string()));
        }
        if self.quote_batch_size == 0 || self.max_hops_per_transaction == 0 {
            return Err(ArbError::ConfigError(
                "QUOTE_BATCH_SIZE and MAX_HOPS_PER_TRANSACTION must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_price_impact) || !(0.0..1.0).contains(&self.max_loss_per_hop)
        {
            return Err(ArbError::ConfigError(
                "MAX_PRICE_IMPACT and MAX_LOSS_PER_HOP must be fractions".to_string(),
            ));
        }
        if self.min_profit_pct < 0.0 {
            return Err(ArbError::ConfigError("MIN_PROFIT_PCT cannot be negative".to_string()));
        }
        if self.start_amount == 0 {
            return Err(ArbError::ConfigError("START_AMOUNT must be positive".to_string()));
        }

        match &self.profit_split {
            Some(raw) => {
                ProfitSplitter::parse(raw)?;
            }
            None if self.distribute_profit => {
                return Err(ArbError::ConfigError(
                    "DISTRIBUTE_PROFIT requires PROFIT_SPLIT".to_string(),
                ));
            }
            None => {}
        }

        self.start_token()?;
        self.universe()?;
        self.urgency_tier()?;
        Ok(())
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
    }

    pub fn start_token(&self) -> Result<Token, ArbError> {
        known_token(&self.start_token)
    }

    /// Token universe with the start token always included.
    pub fn universe(&self) -> Result<Vec<Token>, ArbError> {
        let mut tokens = Vec::with_capacity(self.token_universe.len() + 1);
        for symbol in &self.token_universe {
            let token = known_token(symbol)?;
            if !tokens.iter().any(|t: &Token| t.mint == token.mint) {
                tokens.push(token);
            }
        }
        let start = self.start_token()?;
        if !tokens.iter().any(|t| t.mint == start.mint) {
            tokens.insert(0, start);
        }
        Ok(tokens)
    }

    pub fn urgency_tier(&self) -> Result<UrgencyTier, ArbError> {
        UrgencyTier::from_str(&self.urgency)
    }

    pub fn rpc_endpoints(&self) -> Vec<EndpointConfig> {
        std::iter::once(&self.rpc_url)
            .chain(self.rpc_url_backup.iter())
            .map(|url| EndpointConfig::new(url))
            .collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.rpc_max_retries,
            Duration::from_millis(self.rpc_retry_delay_ms),
            Duration::from_secs(30),
        )
    }
}
