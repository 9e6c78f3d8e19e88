// src/arbitrage/jupiter.rs
//! Jupiter v6 aggregator as a `SwapProvider`.

use crate::arbitrage::quote::{Quote, QuoteRequest, SwapProvider};
use crate::error::ArbError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const JUPITER_PROVIDER_NAME: &str = "jupiter";
const JUPITER_QUOTE_ENDPOINT: &str = "quote";
const JUPITER_SWAP_INSTRUCTIONS_ENDPOINT: &str = "swap-instructions";

#[derive(Debug, Serialize)]
struct JupiterQuoteRequest {
    #[serde(rename = "inputMint")]
    input_mint: String,
    #[serde(rename = "outputMint")]
    output_mint: String,
    amount: u64,
    #[serde(rename = "slippageBps")]
    slippage_bps: u16,
    #[serde(rename = "onlyDirectRoutes")]
    only_direct_routes: bool,
    #[serde(rename = "asLegacyTransaction")]
    as_legacy_transaction: bool,
    #[serde(rename = "maxAccounts")]
    max_accounts: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct JupiterQuoteResponse {
    #[serde(rename = "inputMint")]
    input_mint: String,
    #[serde(rename = "inAmount")]
    in_amount: String,
    #[serde(rename = "outputMint")]
    output_mint: String,
    #[serde(rename = "outAmount")]
    out_amount: String,
    #[serde(rename = "slippageBps")]
    slippage_bps: u16,
    #[serde(rename = "priceImpactPct")]
    price_impact_pct: String,
    #[serde(rename = "routePlan", default)]
    route_plan: Vec<JupiterRoutePlan>,
}

#[derive(Debug, Clone, Deserialize)]
struct JupiterRoutePlan {
    #[serde(rename = "swapInfo")]
    swap_info: JupiterSwapInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct JupiterSwapInfo {
    #[serde(rename = "feeAmount")]
    fee_amount: String,
}

#[derive(Debug, Serialize)]
struct JupiterSwapInstructionsRequest<'a> {
    #[serde(rename = "quoteResponse")]
    quote_response: &'a serde_json::Value,
    #[serde(rename = "userPublicKey")]
    user_public_key: String,
    #[serde(rename = "wrapAndUnwrapSol")]
    wrap_and_unwrap_sol: bool,
    #[serde(rename = "useSharedAccounts")]
    use_shared_accounts: bool,
    #[serde(rename = "asLegacyTransaction")]
    as_legacy_transaction: bool,
}

#[derive(Debug, Deserialize)]
struct JupiterSwapInstructionsResponse {
    #[serde(rename = "tokenLedgerInstruction")]
    token_ledger_instruction: Option<JupiterInstruction>,
    #[serde(rename = "setupInstructions", default)]
    setup_instructions: Vec<JupiterInstruction>,
    #[serde(rename = "swapInstruction")]
    swap_instruction: JupiterInstruction,
    #[serde(rename = "cleanupInstruction")]
    cleanup_instruction: Option<JupiterInstruction>,
    #[serde(rename = "addressLookupTableAddresses", default)]
    address_lookup_table_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JupiterInstruction {
    #[serde(rename = "programId")]
    program_id: String,
    accounts: Vec<JupiterAccountMeta>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct JupiterAccountMeta {
    pubkey: String,
    #[serde(rename = "isSigner")]
    is_signer: bool,
    #[serde(rename = "isWritable")]
    is_writable: bool,
}

/// Rate limiter for Jupiter API calls
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(requests_per_second: u32) -> Self {
        Self {
            last_request: None,
            min_interval: Duration::from_millis(1000 / requests_per_second.max(1) as u64),
        }
    }

    async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

fn parse_pubkey(raw: &str, field: &str) -> Result<Pubkey, ArbError> {
    Pubkey::from_str(raw).map_err(|e| ArbError::ParseError(format!("Invalid {} '{}': {}", field, raw, e)))
}

fn parse_amount(raw: &str, field: &str) -> Result<u64, ArbError> {
    raw.parse::<u64>()
        .map_err(|e| ArbError::ParseError(format!("Invalid {} '{}': {}", field, raw, e)))
}

/// Converts a raw v6 quote payload into a `Quote`, keeping the payload for the swap call.
fn parse_quote(raw: serde_json::Value) -> Result<Quote, ArbError> {
    let response: JupiterQuoteResponse = serde_json::from_value(raw.clone())?;

    let price_impact = response
        .price_impact_pct
        .parse::<f64>()
        .map_err(|e| ArbError::ParseError(format!("Invalid priceImpactPct: {}", e)))?;
    if !price_impact.is_finite() {
        return Err(ArbError::ParseError("Non-finite priceImpactPct".to_string()));
    }

    let mut fee_amount = 0u64;
    for plan in &response.route_plan {
        let fee = parse_amount(&plan.swap_info.fee_amount, "feeAmount")?;
        fee_amount = fee_amount.saturating_add(fee);
    }

    Ok(Quote {
        input_mint: parse_pubkey(&response.input_mint, "inputMint")?,
        output_mint: parse_pubkey(&response.output_mint, "outputMint")?,
        in_amount: parse_amount(&response.in_amount, "inAmount")?,
        out_amount: parse_amount(&response.out_amount, "outAmount")?,
        price_impact: price_impact.abs(),
        fee_amount,
        slippage_bps: response.slippage_bps,
        raw,
    })
}

fn decode_instruction(ix: &JupiterInstruction) -> Result<Instruction, ArbError> {
    let accounts = ix
        .accounts
        .iter()
        .map(|meta| {
            let pubkey = parse_pubkey(&meta.pubkey, "account")?;
            Ok(if meta.is_writable {
                AccountMeta::new(pubkey, meta.is_signer)
            } else {
                AccountMeta::new_readonly(pubkey, meta.is_signer)
            })
        })
        .collect::<Result<Vec<_>, ArbError>>()?;
    let data = BASE64
        .decode(&ix.data)
        .map_err(|e| ArbError::ParseError(format!("Invalid instruction data: {}", e)))?;

    Ok(Instruction {
        program_id: parse_pubkey(&ix.program_id, "programId")?,
        accounts,
        data,
    })
}

/// Flattens the swap instruction set in execution order. Compute budget instructions are dropped.
fn collect_swap_instructions(response: &JupiterSwapInstructionsResponse) -> Result<Vec<Instruction>, ArbError> {
    if !response.address_lookup_table_addresses.is_empty() {
        return Err(ArbError::InstructionError(format!(
            "Swap requires {} address lookup table(s); legacy transactions cannot use them",
            response.address_lookup_table_addresses.len()
        )));
    }

    let mut instructions = Vec::with_capacity(response.setup_instructions.len() + 3);
    if let Some(ix) = &response.token_ledger_instruction {
        instructions.push(decode_instruction(ix)?);
    }
    for ix in &response.setup_instructions {
        instructions.push(decode_instruction(ix)?);
    }
    instructions.push(decode_instruction(&response.swap_instruction)?);
    if let Some(ix) = &response.cleanup_instruction {
        instructions.push(decode_instruction(ix)?);
    }
    Ok(instructions)
}

pub struct JupiterClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl JupiterClient {
    pub fn new(base_url: &str, timeout: Duration, requests_per_second: u32) -> Result<Self, ArbError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("SolanaCycleArb/0.1")
            .build()
            .map_err(|e| ArbError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(requests_per_second))),
        })
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<serde_json::Value, ArbError> {
        self.rate_limiter.lock().await.wait_if_needed().await;

        let query = JupiterQuoteRequest {
            input_mint: request.input_mint.to_string(),
            output_mint: request.output_mint.to_string(),
            amount: request.amount,
            slippage_bps: request.slippage_bps,
            only_direct_routes: false,
            as_legacy_transaction: true,
            max_accounts: 64,
        };
        let url = format!("{}/{}", self.base_url, JUPITER_QUOTE_ENDPOINT);
        debug!(
            "Requesting Jupiter quote: {} {} -> {}",
            request.amount, request.input_mint, request.output_mint
        );

        let response = self.client.get(&url).query(&query).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ArbError::QuoteError(format!("Jupiter API error {}: {}", status, text)));
        }
        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[async_trait]
impl SwapProvider for JupiterClient {
    fn name(&self) -> &str {
        JUPITER_PROVIDER_NAME
    }

    async fn quote(&self, request: &QuoteRequest) -> Result<Quote, ArbError> {
        let raw = self.fetch_quote(request).await?;
        let quote = parse_quote(raw)?;
        if quote.input_mint != request.input_mint || quote.output_mint != request.output_mint {
            return Err(ArbError::QuoteError("Jupiter returned a quote for different mints".to_string()));
        }
        debug!(
            "Jupiter quote received: {} -> {} (impact: {:.4}%)",
            quote.in_amount,
            quote.out_amount,
            quote.price_impact * 100.0
        );
        Ok(quote)
    }

    async fn build_swap_instructions(&self, quote: &Quote, user: &Pubkey) -> Result<Vec<Instruction>, ArbError> {
        self.rate_limiter.lock().await.wait_if_needed().await;

        let body = JupiterSwapInstructionsRequest {
            quote_response: &quote.raw,
            user_public_key: user.to_string(),
            wrap_and_unwrap_sol: true,
            use_shared_accounts: true,
            as_legacy_transaction: true,
        };
        let url = format!("{}/{}", self.base_url, JUPITER_SWAP_INSTRUCTIONS_ENDPOINT);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Jupiter swap-instructions failed with {}", status);
            return Err(ArbError::InstructionError(format!(
                "Jupiter swap-instructions error {}: {}",
                status, text
            )));
        }

        let parsed: JupiterSwapInstructionsResponse = response.json().await?;
        let instructions = collect_swap_instructions(&parsed)?;
        debug!("Jupiter returned {} swap instruction(s)", instructions.len());
        Ok(instructions)
    }
}
