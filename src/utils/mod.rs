// src/utils/mod.rs
use crate::error::ArbError;
use log::{error, info, LevelFilter};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::{read_keypair_file, Keypair};
use std::fmt;
use std::str::FromStr;

/// Installs the global fern dispatcher. Safe to call once per process.
pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("solana_rbpf", LevelFilter::Warn)
        .level_for("solana_runtime::message_processor", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

pub fn load_keypair(path: &str) -> Result<Keypair, ArbError> {
    match read_keypair_file(path) {
        Ok(kp) => {
            info!("Successfully loaded keypair from: {}", path);
            Ok(kp)
        }
        Err(e) => {
            let error_msg = format!("Failed to load keypair from path '{}': {}", path, e);
            error!("{}", error_msg);
            Err(ArbError::ConfigError(error_msg))
        }
    }
}

/// Amount in a token's smallest unit together with its decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub amount: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(amount: u64, decimals: u8) -> Self {
        Self { amount, decimals }
    }

    pub fn to_float(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Negative and non-finite inputs saturate to zero.
    pub fn from_float(float_amount: f64, decimals: u8) -> Self {
        let scaled = (float_amount * 10f64.powi(decimals as i32)).round();
        let amount = if scaled.is_finite() && scaled > 0.0 {
            scaled as u64
        } else {
            0
        };
        Self { amount, decimals }
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", self.decimals as usize, self.to_float())
    }
}

/// Formats a signed smallest-unit delta (e.g. a profit) using the token's decimals.
pub fn format_signed_amount(amount: i64, decimals: u8) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!(
        "{}{}",
        sign,
        TokenAmount::new(amount.unsigned_abs(), decimals)
    )
}
