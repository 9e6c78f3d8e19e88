// src/arbitrage/bundle.rs
use crate::{error::ArbError, solana::chain::SimulationOutcome};
use async_trait::async_trait;
use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

/// Final state of a submitted bundle.
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub bundle_id: String,
    pub landed: bool,
    /// The wait ended before the engine reported a final status; the bundle may still land.
    pub timed_out: bool,
    pub included_signatures: Vec<Signature>,
    pub landed_slot: Option<u64>,
    pub error: Option<String>,
}

/// All-or-nothing submission of an ordered set of signed transactions.
///
/// `Err(ArbError::BundleRejected)` means the bundle was refused before the engine took it,
/// so none of its transactions can land. Any other `Err` leaves the outcome unknown.
/// `Ok` with `landed == false` means it was accepted but not included, unless `timed_out`
/// is set.
#[async_trait]
pub trait BundleSubmitter: Send + Sync {
    fn name(&self) -> &str;

    /// Tip transfer the submitter expects inside the bundle, paid by `payer`.
    fn tip_instruction(&self, payer: &Pubkey) -> Option<Instruction>;

    /// Simulates the transactions in order against one evolving state, so each leg sees
    /// what the previous legs produced. `None` when the submitter cannot do this.
    async fn simulate_bundle(&self, _transactions: &[Transaction]) -> Result<Option<SimulationOutcome>, ArbError> {
        Ok(None)
    }

    async fn submit_bundle(
        &self,
        transactions: &[Transaction],
        min_expected_gain: i64,
    ) -> Result<BundleOutcome, ArbError>;
}
