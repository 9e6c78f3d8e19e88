// src/arbitrage/jito_client.rs
//! Jito block engine client for atomic bundle submission.

use crate::arbitrage::bundle::{BundleOutcome, BundleSubmitter};
use crate::error::{ArbError, RetryPolicy};
use crate::solana::chain::SimulationOutcome;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info, warn};
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use solana_sdk::{
    instruction::Instruction, pubkey, pubkey::Pubkey, signature::Signature, system_instruction,
    transaction::Transaction,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Block engines accept at most five transactions per bundle.
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

const BUNDLES_PATH: &str = "api/v1/bundles";

#[derive(Debug, Clone)]
pub struct JitoConfig {
    pub block_engine_url: String,
    pub tip_lamports: u64,
    pub submission_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub confirmation_timeout: Duration,
    pub status_poll_interval: Duration,
    /// Tip accounts keyed by region.
    pub tip_accounts: HashMap<String, Pubkey>,
    /// Jito-enabled RPC node answering `simulateBundle`.
    pub simulation_url: Option<String>,
}

impl Default for JitoConfig {
    fn default() -> Self {
        let tip_accounts = HashMap::from([
            ("ny".to_string(), pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5")),
            ("ams".to_string(), pubkey!("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe")),
            ("fra".to_string(), pubkey!("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY")),
            ("tok".to_string(), pubkey!("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49")),
        ]);

        Self {
            block_engine_url: "https://mainnet.block-engine.jito.wtf".to_string(),
            tip_lamports: 10_000,
            submission_timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(2)),
            confirmation_timeout: Duration::from_secs(30),
            status_poll_interval: Duration::from_millis(500),
            tip_accounts,
            simulation_url: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JitoError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JitoError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct InflightStatusResult {
    value: Vec<InflightBundleStatus>,
}

#[derive(Debug, Deserialize)]
struct InflightBundleStatus {
    bundle_id: String,
    status: String,
    landed_slot: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BundleSimulationResult {
    value: BundleSimulationValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleSimulationValue {
    /// `"succeeded"` or `{"failed": {"error": ..., "tx_signature": ...}}`.
    summary: serde_json::Value,
    #[serde(default)]
    transaction_results: Vec<BundleTransactionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleTransactionResult {
    err: Option<serde_json::Value>,
    logs: Option<Vec<String>>,
    units_consumed: Option<u64>,
}

impl BundleSimulationValue {
    fn into_outcome(self) -> SimulationOutcome {
        let err = match &self.summary {
            serde_json::Value::String(s) if s == "succeeded" => None,
            serde_json::Value::Object(map) => Some(
                map.get("failed")
                    .and_then(|f| f.get("error"))
                    .unwrap_or(&self.summary)
                    .to_string(),
            ),
            other => Some(other.to_string()),
        };
        let mut logs = Vec::new();
        let mut units = 0u64;
        for (idx, result) in self.transaction_results.into_iter().enumerate() {
            if let Some(tx_err) = result.err.filter(|e| !e.is_null()) {
                logs.push(format!("transaction {} error: {}", idx, tx_err));
            }
            logs.extend(result.logs.unwrap_or_default());
            units += result.units_consumed.unwrap_or_default();
        }
        SimulationOutcome {
            err,
            logs,
            units_consumed: Some(units),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundleState {
    Pending,
    Landed,
    Failed,
}

/// `Invalid` means the engine does not know the bundle yet; it is polled like `Pending`.
fn interpret_status(status: &str) -> BundleState {
    match status {
        "Landed" => BundleState::Landed,
        "Failed" => BundleState::Failed,
        _ => BundleState::Pending,
    }
}

pub struct JitoClient {
    config: JitoConfig,
    client: reqwest::Client,
    request_id_counter: AtomicU64,
}

impl JitoClient {
    pub fn new(config: JitoConfig) -> Result<Self, ArbError> {
        info!(
            "[Jito] Client initialized: engine={}, tip={} lamports, timeout={:?}",
            config.block_engine_url, config.tip_lamports, config.submission_timeout
        );
        if config.tip_accounts.is_empty() {
            return Err(ArbError::ConfigError("No Jito tip accounts configured".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.submission_timeout)
            .build()
            .map_err(|e| ArbError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            request_id_counter: AtomicU64::new(1),
        })
    }

    pub fn tip_accounts(&self) -> &HashMap<String, Pubkey> {
        &self.config.tip_accounts
    }

    fn bundles_url(&self) -> String {
        format!("{}/{}", self.config.block_engine_url.trim_end_matches('/'), BUNDLES_PATH)
    }

    fn validate_bundle(&self, transactions: &[Transaction]) -> Result<(), ArbError> {
        if transactions.is_empty() {
            return Err(ArbError::BundleRejected("Bundle cannot be empty".to_string()));
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(ArbError::BundleRejected(format!(
                "Bundle too large ({} > {} transactions)",
                transactions.len(),
                MAX_BUNDLE_TRANSACTIONS
            )));
        }
        for (idx, tx) in transactions.iter().enumerate() {
            if tx.message.instructions.is_empty() {
                return Err(ArbError::BundleRejected(format!("Transaction {} has no instructions", idx)));
            }
            if !tx.is_signed() {
                return Err(ArbError::BundleRejected(format!("Transaction {} is not fully signed", idx)));
            }
        }
        Ok(())
    }

    fn encode_transactions(&self, transactions: &[Transaction]) -> Result<Vec<String>, ArbError> {
        transactions
            .iter()
            .enumerate()
            .map(|(idx, tx)| {
                let serialized = bincode::serialize(tx).map_err(|e| {
                    ArbError::BundleRejected(format!("Failed to serialize transaction {}: {}", idx, e))
                })?;
                debug!("[Jito] Encoded transaction {}: {} bytes", idx, serialized.len());
                Ok(BASE64.encode(serialized))
            })
            .collect()
    }

    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<T, ArbError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id_counter.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };

        let response = self.client.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ArbError::NetworkError(format!("Jito HTTP error: {}", response.status())));
        }

        let parsed: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ArbError::ParseError(format!("Failed to parse Jito response: {}", e)))?;
        if let Some(error) = parsed.error {
            return Err(ArbError::BundleRejected(format!("Jito error {}: {}", error.code, error.message)));
        }
        parsed
            .result
            .ok_or_else(|| ArbError::ParseError(format!("Jito {} returned no result", method)))
    }

    async fn send_bundle(&self, encoded: &[String]) -> Result<String, ArbError> {
        let mut last_error = None;
        let attempts = self.config.retry_policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self
                .rpc_call::<String>(&self.bundles_url(), "sendBundle", json!([encoded, {"encoding": "base64"}]))
                .await
            {
                Ok(bundle_id) => return Ok(bundle_id),
                // An explicit engine rejection will not change on retry. Resends carry the
                // same signatures, so the engine drops duplicates.
                Err(e @ ArbError::BundleRejected(_)) => return Err(e),
                Err(e) => {
                    warn!("[Jito] Bundle submission attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_policy.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ArbError::BundleRejected("Bundle submission failed".to_string())))
    }

    async fn wait_for_bundle(&self, bundle_id: &str, signatures: Vec<Signature>) -> BundleOutcome {
        let start_time = Instant::now();
        while start_time.elapsed() < self.config.confirmation_timeout {
            match self
                .rpc_call::<InflightStatusResult>(
                    &self.bundles_url(),
                    "getInflightBundleStatuses",
                    json!([[bundle_id]]),
                )
                .await
            {
                Ok(result) => {
                    let status = result.value.into_iter().find(|s| s.bundle_id == bundle_id);
                    if let Some(status) = status {
                        match interpret_status(&status.status) {
                            BundleState::Landed => {
                                info!("[Jito] Bundle {} landed in slot {:?}", bundle_id, status.landed_slot);
                                return BundleOutcome {
                                    bundle_id: bundle_id.to_string(),
                                    landed: true,
                                    timed_out: false,
                                    included_signatures: signatures,
                                    landed_slot: status.landed_slot,
                                    error: None,
                                };
                            }
                            BundleState::Failed => {
                                warn!("[Jito] Bundle {} failed", bundle_id);
                                return BundleOutcome {
                                    bundle_id: bundle_id.to_string(),
                                    landed: false,
                                    timed_out: false,
                                    included_signatures: vec![],
                                    landed_slot: None,
                                    error: Some("bundle failed in block engine".to_string()),
                                };
                            }
                            BundleState::Pending => debug!("[Jito] Bundle {} status: {}", bundle_id, status.status),
                        }
                    }
                }
                Err(e) => debug!("[Jito] Failed to get bundle status: {}", e),
            }
            tokio::time::sleep(self.config.status_poll_interval).await;
        }

        warn!("[Jito] Bundle {} did not land within {:?}", bundle_id, self.config.confirmation_timeout);
        BundleOutcome {
            bundle_id: bundle_id.to_string(),
            landed: false,
            timed_out: true,
            included_signatures: vec![],
            landed_slot: None,
            error: Some("bundle confirmation timeout".to_string()),
        }
    }
}

#[async_trait]
impl BundleSubmitter for JitoClient {
    fn name(&self) -> &str {
        "jito"
    }

    fn tip_instruction(&self, payer: &Pubkey) -> Option<Instruction> {
        if self.config.tip_lamports == 0 {
            return None;
        }
        let tip_account = self.config.tip_accounts.values().choose(&mut rand::thread_rng())?;
        Some(system_instruction::transfer(payer, tip_account, self.config.tip_lamports))
    }

    async fn simulate_bundle(&self, transactions: &[Transaction]) -> Result<Option<SimulationOutcome>, ArbError> {
        let Some(url) = &self.config.simulation_url else {
            return Ok(None);
        };
        self.validate_bundle(transactions)?;
        let encoded = self.encode_transactions(transactions)?;
        let unset: Vec<serde_json::Value> = vec![serde_json::Value::Null; encoded.len()];
        let result: BundleSimulationResult = self
            .rpc_call(
                url,
                "simulateBundle",
                json!([
                    {"encodedTransactions": encoded},
                    {
                        "preExecutionAccountsConfigs": unset,
                        "postExecutionAccountsConfigs": unset,
                        "skipSigVerify": false,
                        "replaceRecentBlockhash": false
                    }
                ]),
            )
            .await?;
        let outcome = result.value.into_outcome();
        debug!(
            "[Jito] Bundle simulation of {} transaction(s): err={:?}, units={:?}",
            transactions.len(),
            outcome.err,
            outcome.units_consumed
        );
        Ok(Some(outcome))
    }

    async fn submit_bundle(
        &self,
        transactions: &[Transaction],
        min_expected_gain: i64,
    ) -> Result<BundleOutcome, ArbError> {
        self.validate_bundle(transactions)?;
        if min_expected_gain <= self.config.tip_lamports as i64 {
            return Err(ArbError::BundleRejected(format!(
                "Expected gain {} does not cover the {} lamport tip",
                min_expected_gain, self.config.tip_lamports
            )));
        }

        info!(
            "[Jito] Submitting bundle with {} transaction(s), expected gain {}",
            transactions.len(),
            min_expected_gain
        );
        let encoded = self.encode_transactions(transactions)?;
        let bundle_id = self.send_bundle(&encoded).await?;
        info!("[Jito] Bundle accepted: {}", bundle_id);

        let signatures = transactions.iter().filter_map(|tx| tx.signatures.first().copied()).collect();
        Ok(self.wait_for_bundle(&bundle_id, signatures).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{hash::Hash, signature::Keypair, signer::Signer};

    fn signed_transfer(payer: &Keypair) -> Transaction {
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
        Transaction::new_signed_with_payer(&[ix], Some(&payer.pubkey()), &[payer], Hash::new_unique())
    }

    fn unreachable_client() -> JitoClient {
        JitoClient::new(JitoConfig {
            block_engine_url: "http://127.0.0.1:1".to_string(),
            retry_policy: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
            submission_timeout: Duration::from_millis(500),
            ..JitoConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_jito_config_default() {
        let config = JitoConfig::default();
        assert_eq!(config.tip_accounts.len(), 4);
        assert!(config.tip_lamports > 0);
    }

    #[test]
    fn test_bundle_validation() {
        let client = JitoClient::new(JitoConfig::default()).unwrap();
        assert!(client.validate_bundle(&[]).is_err());

        let payer = Keypair::new();
        let six: Vec<Transaction> = (0..6).map(|_| signed_transfer(&payer)).collect();
        assert!(client.validate_bundle(&six).is_err());
        assert!(client.validate_bundle(&six[..2]).is_ok());

        let unsigned = Transaction::new_with_payer(
            &[system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1)],
            Some(&payer.pubkey()),
        );
        assert!(client.validate_bundle(&[unsigned]).is_err());
    }

    #[test]
    fn test_tip_goes_to_known_account() {
        let client = JitoClient::new(JitoConfig::default()).unwrap();
        let payer = Pubkey::new_unique();
        let ix = client.tip_instruction(&payer).unwrap();
        assert_eq!(ix.accounts[0].pubkey, payer);
        assert!(client.tip_accounts().values().any(|a| *a == ix.accounts[1].pubkey));
    }

    #[test]
    fn test_status_interpretation() {
        assert_eq!(interpret_status("Landed"), BundleState::Landed);
        assert_eq!(interpret_status("Failed"), BundleState::Failed);
        assert_eq!(interpret_status("Invalid"), BundleState::Pending);
        assert_eq!(interpret_status("Pending"), BundleState::Pending);

        let parsed: JsonRpcResponse<InflightStatusResult> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 280}, "value": [
                {"bundle_id": "abc", "status": "Landed", "landed_slot": 279}
            ]}
        }))
        .unwrap();
        let status = &parsed.result.unwrap().value[0];
        assert_eq!(status.landed_slot, Some(279));
    }

    #[tokio::test]
    async fn test_insufficient_gain_is_rejected_before_sending() {
        let client = unreachable_client();
        let payer = Keypair::new();
        let result = client.submit_bundle(&[signed_transfer(&payer)], 5_000).await;
        assert!(matches!(result, Err(ArbError::BundleRejected(_))));
    }

    #[tokio::test]
    async fn test_unreachable_engine_fails_after_retries() {
        let client = unreachable_client();
        let payer = Keypair::new();
        let result = client.submit_bundle(&[signed_transfer(&payer)], 1_000_000).await;
        // Transport failures are not refusals: the engine may have taken the bundle.
        assert!(matches!(
            result,
            Err(ArbError::NetworkError(_)) | Err(ArbError::TimeoutError(_))
        ));
    }

    #[tokio::test]
    async fn test_status_wait_reports_timeout() {
        let client = JitoClient::new(JitoConfig {
            block_engine_url: "http://127.0.0.1:1".to_string(),
            submission_timeout: Duration::from_millis(200),
            confirmation_timeout: Duration::from_millis(50),
            status_poll_interval: Duration::from_millis(10),
            ..JitoConfig::default()
        })
        .unwrap();

        let outcome = client.wait_for_bundle("abc", vec![Signature::default()]).await;
        assert!(!outcome.landed);
        assert!(outcome.timed_out);
        assert_eq!(outcome.bundle_id, "abc");
        assert!(outcome.included_signatures.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_simulation_needs_a_simulation_endpoint() {
        let client = unreachable_client();
        let payer = Keypair::new();
        let simulated = client.simulate_bundle(&[signed_transfer(&payer)]).await.unwrap();
        assert!(simulated.is_none());
    }

    #[test]
    fn test_bundle_simulation_parsing() {
        let passed: JsonRpcResponse<BundleSimulationResult> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"context": {"slot": 280}, "value": {
                "summary": "succeeded",
                "transactionResults": [
                    {"err": null, "logs": ["Program log: leg 0"], "unitsConsumed": 120000},
                    {"err": null, "logs": ["Program log: leg 1"], "unitsConsumed": 95000}
                ]
            }}
        }))
        .unwrap();
        let outcome = passed.result.unwrap().value.into_outcome();
        assert!(outcome.passed());
        assert_eq!(outcome.units_consumed, Some(215_000));
        assert_eq!(outcome.logs.len(), 2);

        let failed: JsonRpcResponse<BundleSimulationResult> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"context": {"slot": 281}, "value": {
                "summary": {"failed": {
                    "error": {"TransactionFailure": [[1], "custom program error: 0x1771"]},
                    "tx_signature": "sig"
                }},
                "transactionResults": [
                    {"err": null, "logs": [], "unitsConsumed": 120000}
                ]
            }}
        }))
        .unwrap();
        let outcome = failed.result.unwrap().value.into_outcome();
        assert!(!outcome.passed());
        assert!(outcome.err.unwrap().contains("0x1771"));
    }
}
