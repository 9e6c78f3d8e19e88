// src/solana/rpc.rs
use crate::error::{ArbError, RetryPolicy};
use crate::solana::chain::{ChainClient, SimulationOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::Rng;
use solana_client::{
    nonblocking::rpc_client::RpcClient as NonBlockingRpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig},
};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use solana_transaction_status::UiTransactionEncoding;
use spl_associated_token_account::get_associated_token_address;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

const DEFAULT_COMMITMENT: CommitmentConfig = CommitmentConfig::confirmed();

/// Consecutive failures after which an endpoint is taken out of rotation.
pub const FAILURE_CEILING: u32 = 3;

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub url: String,
    pub weight: u32,
}

impl EndpointConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            weight: 1,
        }
    }

    pub fn with_weight(url: &str, weight: u32) -> Self {
        Self {
            url: url.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: String,
    pub weight: u32,
    pub is_healthy: bool,
    pub failure_count: u32,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Endpoint {
    fn usable(&self) -> bool {
        self.is_healthy && self.failure_count < FAILURE_CEILING
    }
}

#[derive(Debug)]
struct PoolState {
    endpoints: Vec<Endpoint>,
    current: usize,
}

impl PoolState {
    /// First usable endpoint scanning forward from `from + 1`, wrapping back to `from` itself.
    fn next_usable(&self, from: usize) -> Option<usize> {
        let n = self.endpoints.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&idx| self.endpoints[idx].usable())
    }
}

/// RPC access over an ordered endpoint pool with failover and exponential-backoff retry.
///
/// All endpoint bookkeeping lives behind a single mutex; clients are immutable and shared.
pub struct ResilientConnection {
    clients: Vec<Arc<NonBlockingRpcClient>>,
    state: Mutex<PoolState>,
    retry_policy: RetryPolicy,
}

impl ResilientConnection {
    /// Endpoints are ordered by descending weight; equal weights keep configuration order.
    pub fn new(
        endpoints: Vec<EndpointConfig>,
        retry_policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, ArbError> {
        if endpoints.is_empty() {
            return Err(ArbError::ConfigError(
                "At least one RPC endpoint is required".to_string(),
            ));
        }
        let mut endpoints = endpoints;
        endpoints.sort_by(|a, b| b.weight.cmp(&a.weight));

        let clients = endpoints
            .iter()
            .map(|cfg| {
                Arc::new(NonBlockingRpcClient::new_with_timeout_and_commitment(
                    cfg.url.clone(),
                    request_timeout,
                    DEFAULT_COMMITMENT,
                ))
            })
            .collect();
        let endpoints = endpoints
            .into_iter()
            .map(|cfg| Endpoint {
                url: cfg.url,
                weight: cfg.weight,
                is_healthy: true,
                failure_count: 0,
                last_checked: None,
            })
            .collect::<Vec<_>>();

        info!(
            "[RPC HA] Connection pool initialized with {} endpoint(s), max {} attempts",
            endpoints.len(),
            retry_policy.max_attempts
        );

        Ok(Self {
            clients,
            state: Mutex::new(PoolState {
                endpoints,
                current: 0,
            }),
            retry_policy,
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn client(&self, idx: usize) -> Arc<NonBlockingRpcClient> {
        Arc::clone(&self.clients[idx])
    }

    pub async fn current_index(&self) -> usize {
        self.state.lock().await.current
    }

    pub async fn endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().await.endpoints.clone()
    }

    /// Active endpoint, re-selecting when it has dropped out of rotation.
    async fn active(&self) -> Result<(usize, Arc<NonBlockingRpcClient>), ArbError> {
        let mut state = self.state.lock().await;
        let current = state.current;
        if !state.endpoints[current].usable() {
            match state.next_usable(current) {
                Some(idx) => {
                    info!(
                        "[RPC HA] Active endpoint {} is out of rotation, switching to {}",
                        state.endpoints[current].url, state.endpoints[idx].url
                    );
                    state.current = idx;
                }
                None => {
                    return Err(ArbError::NoHealthyEndpoint(format!(
                        "all {} endpoints are unhealthy",
                        state.endpoints.len()
                    )))
                }
            }
        }
        Ok((state.current, Arc::clone(&self.clients[state.current])))
    }

    /// Records a failed call against `idx`. Rotation only happens when `idx` is the active endpoint.
    pub async fn record_failure(&self, idx: usize) -> Result<(), ArbError> {
        let mut state = self.state.lock().await;
        let Some(endpoint) = state.endpoints.get_mut(idx) else {
            return Err(ArbError::InvalidInput(format!("No endpoint at index {}", idx)));
        };
        endpoint.failure_count += 1;
        if endpoint.failure_count >= FAILURE_CEILING && endpoint.is_healthy {
            endpoint.is_healthy = false;
            warn!(
                "[RPC HA] Endpoint {} marked unhealthy after {} failures",
                endpoint.url, endpoint.failure_count
            );
        }

        if idx != state.current {
            return Ok(());
        }
        match state.next_usable(idx) {
            Some(next) => {
                if next != idx {
                    debug!(
                        "[RPC HA] Rotating from {} to {}",
                        state.endpoints[idx].url, state.endpoints[next].url
                    );
                }
                state.current = next;
                Ok(())
            }
            None => Err(ArbError::NoHealthyEndpoint(format!(
                "no healthy endpoint left after failure on {}",
                state.endpoints[idx].url
            ))),
        }
    }

    pub async fn record_success(&self, idx: usize) {
        let mut state = self.state.lock().await;
        if let Some(endpoint) = state.endpoints.get_mut(idx) {
            endpoint.failure_count = 0;
            endpoint.is_healthy = true;
        }
    }

    /// Applies one liveness probe result.
    pub async fn record_probe(&self, idx: usize, alive: bool) {
        let mut state = self.state.lock().await;
        if let Some(endpoint) = state.endpoints.get_mut(idx) {
            if alive {
                endpoint.failure_count = endpoint.failure_count.saturating_sub(1);
                endpoint.is_healthy = true;
            } else {
                endpoint.is_healthy = false;
            }
            endpoint.last_checked = Some(Utc::now());
        }
    }

    /// Runs `rpc_call_fn` against the active endpoint, rotating and backing off on failure.
    /// Makes at most `retry_policy.max_attempts` attempts.
    pub async fn execute<F, Fut, T, E>(&self, operation_name: &str, mut rpc_call_fn: F) -> Result<T, ArbError>
    where
        F: FnMut(Arc<NonBlockingRpcClient>) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send,
        E: Into<ArbError>,
        T: Send,
    {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut last_error: Option<ArbError> = None;

        for attempt in 1..=max_attempts {
            let (idx, client) = self.active().await?;

            match rpc_call_fn(client).await {
                Ok(result) => {
                    debug!("[RPC HA - {}] Endpoint #{} succeeded on attempt {}", operation_name, idx, attempt);
                    self.record_success(idx).await;
                    return Ok(result);
                }
                Err(e) => {
                    let err: ArbError = e.into();
                    if !err.should_retry() {
                        // Deterministic failures say nothing about endpoint health.
                        warn!(
                            "[RPC HA - {}] Endpoint #{} attempt {} failed without retry: {}",
                            operation_name, idx, attempt, err
                        );
                        return Err(err);
                    }
                    warn!(
                        "[RPC HA - {}] Endpoint #{} attempt {}/{} failed: {}",
                        operation_name, idx, attempt, max_attempts, err
                    );
                    if let Err(rotation_err) = self.record_failure(idx).await {
                        error!("[RPC HA - {}] {} (last error: {})", operation_name, rotation_err, err);
                        return Err(ArbError::NoHealthyEndpoint(format!(
                            "{}; last error: {}",
                            rotation_err, err
                        )));
                    }
                    last_error = Some(err);

                    if attempt < max_attempts {
                        let mut delay_ms = self.retry_policy.delay_for_attempt(attempt).as_millis() as u64;
                        if delay_ms > 0 {
                            delay_ms += rand::thread_rng().gen_range(0..(delay_ms / 4).max(1));
                        }
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        error!("[RPC HA - {}] All {} attempts failed.", operation_name, max_attempts);
        Err(last_error.unwrap_or_else(|| {
            ArbError::RpcError(format!("{}: no attempt was made", operation_name))
        }))
    }
}

#[async_trait]
impl ChainClient for ResilientConnection {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), ArbError> {
        self.execute("get_latest_blockhash", |client| async move {
            client
                .get_latest_blockhash_with_commitment(DEFAULT_COMMITMENT)
                .await
        })
        .await
    }

    async fn block_height(&self) -> Result<u64, ArbError> {
        self.execute("get_block_height", |client| async move { client.get_block_height().await })
            .await
    }

    async fn slot(&self) -> Result<u64, ArbError> {
        self.execute("get_slot", |client| async move { client.get_slot().await })
            .await
    }

    async fn recent_prioritization_fees(&self) -> Result<Vec<u64>, ArbError> {
        self.execute("get_recent_prioritization_fees", |client| async move {
            client.get_recent_prioritization_fees(&[]).await
        })
        .await
        .map(|fees| fees.into_iter().map(|f| f.prioritization_fee).collect())
    }

    async fn simulate(&self, tx: &Transaction) -> Result<SimulationOutcome, ArbError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: false,
            commitment: Some(DEFAULT_COMMITMENT),
            encoding: Some(UiTransactionEncoding::Base64),
            ..Default::default()
        };
        let response = self
            .execute("simulate_transaction", |client| {
                let config = config.clone();
                async move { client.simulate_transaction_with_config(tx, config).await }
            })
            .await?;

        let value = response.value;
        Ok(SimulationOutcome {
            err: value.err.map(|e| e.to_string()),
            logs: value.logs.unwrap_or_default(),
            units_consumed: value.units_consumed,
        })
    }

    async fn send(&self, tx: &Transaction) -> Result<Signature, ArbError> {
        // Already simulated by the caller.
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            ..Default::default()
        };
        self.execute("send_transaction", |client| {
            let config = config.clone();
            async move { client.send_transaction_with_config(tx, config).await }
        })
        .await
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<Result<(), String>>, ArbError> {
        self.execute("get_signature_status", |client| async move {
            client.get_signature_status(signature).await
        })
        .await
        .map(|status| status.map(|res| res.map_err(|e| e.to_string())))
    }

    async fn balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, ArbError> {
        if *mint == spl_token::native_mint::id() {
            return self
                .execute("get_balance", |client| async move { client.get_balance(owner).await })
                .await;
        }

        let ata = get_associated_token_address(owner, mint);
        let ui_amount = self
            .execute("get_token_account_balance", |client| async move {
                client.get_token_account_balance(&ata).await
            })
            .await?;
        ui_amount.amount.parse::<u64>().map_err(|e| {
            ArbError::ParseError(format!("Invalid token amount '{}' for {}: {}", ui_amount.amount, ata, e))
        })
    }
}
