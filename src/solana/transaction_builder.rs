// src/solana/transaction_builder.rs
use crate::arbitrage::fee_estimator::PriorityFeeConfig;
use crate::error::ArbError;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::Message,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signer,
    system_instruction,
    transaction::Transaction,
};

/// Accumulates instructions for one legacy transaction paid by `payer`.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    payer: Pubkey,
    instructions: Vec<Instruction>,
}

impl TransactionBuilder {
    pub fn new(payer: Pubkey) -> Self {
        Self {
            payer,
            instructions: Vec::new(),
        }
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn add_instructions<I>(&mut self, instructions: I) -> &mut Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        self.instructions.extend(instructions);
        self
    }

    pub fn add_transfer(&mut self, from: &Pubkey, to: &Pubkey, lamports: u64) -> &mut Self {
        self.add_instruction(system_instruction::transfer(from, to, lamports))
    }

    pub fn add_custom_instruction(
        &mut self,
        program_id: Pubkey,
        accounts: Vec<AccountMeta>,
        data: Vec<u8>,
    ) -> &mut Self {
        self.add_instruction(Instruction {
            program_id,
            accounts,
            data,
        })
    }

    /// Prepends the compute unit limit and price instructions.
    pub fn add_compute_budget(&mut self, fee: &PriorityFeeConfig) -> &mut Self {
        let prefix = [
            ComputeBudgetInstruction::set_compute_unit_limit(fee.compute_unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(fee.micro_lamports_per_cu),
        ];
        self.instructions.splice(0..0, prefix);
        self
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.instructions.clear();
        self
    }

    pub fn build(&self, recent_blockhash: Hash) -> Result<Transaction, ArbError> {
        if self.instructions.is_empty() {
            return Err(ArbError::InstructionError(
                "Transaction must have at least one instruction".to_string(),
            ));
        }
        let message =
            Message::new_with_blockhash(&self.instructions, Some(&self.payer), &recent_blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    /// Builds and signs. The payer must be one of `signers`.
    pub fn build_and_sign(
        &self,
        signers: &[&dyn Signer],
        recent_blockhash: Hash,
    ) -> Result<Transaction, ArbError> {
        if !signers.iter().any(|s| s.pubkey() == self.payer) {
            return Err(ArbError::InstructionError(format!(
                "Fee payer {} is not among the signers",
                self.payer
            )));
        }
        let mut tx = self.build(recent_blockhash)?;
        tx.try_sign(signers, recent_blockhash)
            .map_err(|e| ArbError::InstructionError(format!("Signing failed: {}", e)))?;
        Ok(tx)
    }

    /// Serialized size of the transaction this builder would produce plus `extra`.
    pub fn size_with(&self, extra: &[Instruction]) -> Result<usize, ArbError> {
        let mut probe = self.clone();
        probe.add_instructions(extra.iter().cloned());
        let tx = probe.build(Hash::default())?;
        Self::estimate_size(&tx)
    }

    pub fn estimate_size(tx: &Transaction) -> Result<usize, ArbError> {
        bincode::serialized_size(tx)
            .map(|size| size as usize)
            .map_err(|e| ArbError::InstructionError(format!("Failed to size transaction: {}", e)))
    }

    pub fn fits_in_packet(tx: &Transaction) -> bool {
        Self::estimate_size(tx)
            .map(|size| size <= PACKET_DATA_SIZE)
            .unwrap_or(false)
    }
}
