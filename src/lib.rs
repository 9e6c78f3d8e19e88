pub mod arbitrage;
pub mod config;
pub mod error;
pub mod solana;
pub mod utils;

pub use arbitrage::{ArbitrageCoordinator, CycleOutcome};
pub use error::{ArbError, Result};
