use log::debug;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ArbError {
    /// Network/connectivity issues
    #[error("Network Error: {0}")]
    NetworkError(String),

    /// RPC/Solana network errors
    #[error("RPC Error: {0}")]
    RpcError(String),

    /// Timeout errors for operations
    #[error("Timeout Error: {0}")]
    TimeoutError(String),

    /// Every configured endpoint is unhealthy or over the failure ceiling
    #[error("No Healthy Endpoint: {0}")]
    NoHealthyEndpoint(String),

    /// Quote oracle did not produce a usable quote
    #[error("Quote Error: {0}")]
    QuoteError(String),

    /// Parsing errors for remote payloads
    #[error("Parse Error: {0}")]
    ParseError(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    ConfigError(String),

    /// Instruction building errors
    #[error("Instruction Error: {0}")]
    InstructionError(String),

    /// Simulation failed errors
    #[error("Simulation Failed: {0}")]
    SimulationFailed(String),

    /// Transaction/blockchain errors
    #[error("Transaction Error: {0}")]
    TransactionError(String),

    /// Atomic bundle was not accepted or did not land
    #[error("Bundle Rejected: {0}")]
    BundleRejected(String),

    /// Trade execution errors
    #[error("Execution Error: {0}")]
    ExecutionError(String),

    /// Invalid input parameters
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Operation abandoned because the caller cancelled it
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl From<serde_json::Error> for ArbError {
    fn from(err: serde_json::Error) -> Self {
        ArbError::ParseError(format!("JSON serialization/deserialization error: {}", err))
    }
}

impl From<anyhow::Error> for ArbError {
    fn from(err: anyhow::Error) -> Self {
        ArbError::ConfigError(format!("Anyhow error: {}", err))
    }
}

impl From<solana_client::client_error::ClientError> for ArbError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        use solana_client::{client_error::ClientErrorKind, rpc_request::RpcError};
        match err.kind() {
            ClientErrorKind::Io(_) | ClientErrorKind::Reqwest(_) => {
                ArbError::NetworkError(format!("Solana client transport error: {}", err))
            }
            ClientErrorKind::SerdeJson(_) => ArbError::ParseError(format!("Solana client payload error: {}", err)),
            ClientErrorKind::SigningError(_) => ArbError::InstructionError(format!("Signing failed: {}", err)),
            ClientErrorKind::TransactionError(_) => ArbError::TransactionError(format!("{}", err)),
            // Account-not-found and similar answers are the same on every endpoint.
            ClientErrorKind::RpcError(RpcError::ForUser(msg)) => ArbError::InvalidInput(msg.clone()),
            _ => ArbError::RpcError(format!("Solana client error: {}", err)),
        }
    }
}

impl From<reqwest::Error> for ArbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ArbError::TimeoutError(format!("HTTP request timed out: {}", err))
        } else {
            ArbError::NetworkError(format!("HTTP request failed: {}", err))
        }
    }
}

impl ArbError {
    /// Determines if an error is recoverable through retry
    pub fn is_recoverable(&self) -> bool {
        match self {
            ArbError::NetworkError(_) => true,
            ArbError::RpcError(_) => true,
            ArbError::TimeoutError(_) => true,
            ArbError::NoHealthyEndpoint(_) => false, // Nothing left to rotate to
            ArbError::QuoteError(_) => true,
            ArbError::ParseError(_) => false,
            ArbError::ConfigError(_) => false,
            ArbError::InstructionError(_) => false,
            ArbError::SimulationFailed(_) => false, // Route is likely stale
            ArbError::TransactionError(msg) => {
                !msg.contains("signature")
                    && !msg.contains("invalid")
                    && (msg.contains("network")
                        || msg.contains("timeout")
                        || msg.contains("congestion")
                        || msg.contains("expired"))
            }
            ArbError::BundleRejected(_) => false,
            ArbError::ExecutionError(msg) => msg.contains("temporary") || msg.contains("retry"),
            ArbError::InvalidInput(_) => false,
            ArbError::Cancelled(_) => false,
        }
    }

    /// Determines if operation should be retried immediately
    pub fn should_retry(&self) -> bool {
        self.is_recoverable()
            && match self {
                ArbError::NetworkError(_) => true,
                ArbError::RpcError(_) => true,
                ArbError::TimeoutError(_) => true,
                ArbError::QuoteError(msg) => msg.contains("rate") || msg.contains("timeout"),
                ArbError::TransactionError(msg) => {
                    msg.contains("network") || msg.contains("timeout") || msg.contains("congestion")
                }
                _ => false,
            }
    }

    /// Categorizes error for logging and accounting
    pub fn categorize(&self) -> ErrorCategory {
        match self {
            ArbError::NetworkError(_)
            | ArbError::RpcError(_)
            | ArbError::TimeoutError(_)
            | ArbError::NoHealthyEndpoint(_) => ErrorCategory::Network,
            ArbError::QuoteError(_) => ErrorCategory::Oracle,
            ArbError::ParseError(_) => ErrorCategory::Data,
            ArbError::ConfigError(_) | ArbError::InvalidInput(_) => ErrorCategory::Configuration,
            ArbError::InstructionError(_)
            | ArbError::SimulationFailed(_)
            | ArbError::TransactionError(_)
            | ArbError::BundleRejected(_)
            | ArbError::ExecutionError(_) => ErrorCategory::Trading,
            ArbError::Cancelled(_) => ErrorCategory::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Oracle,
    Trading,
    Data,
    Configuration,
    Cancelled,
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait *after* the given failed attempt (1-based): `base × 2^(attempt−1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }

        let factor = 2_u128.saturating_pow(attempt - 1);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let delay = Duration::from_millis(delay_ms.min(self.max_delay.as_millis()) as u64);

        debug!("Retry attempt {}: delay = {:?}", attempt, delay);
        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

pub type Result<T> = std::result::Result<T, ArbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(20, Duration::from_millis(500), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(2));
    }

    #[test]
    fn test_simulation_rejection_is_not_retried() {
        let err = ArbError::SimulationFailed("custom program error: 0x1771".to_string());
        assert!(!err.is_recoverable());
        assert!(!err.should_retry());
        assert_eq!(err.categorize(), ErrorCategory::Trading);
    }

    #[test]
    fn test_rpc_errors_are_retried() {
        let err = ArbError::RpcError("connection reset".to_string());
        assert!(err.should_retry());
        assert_eq!(err.categorize(), ErrorCategory::Network);
        assert!(!ArbError::NoHealthyEndpoint("all down".to_string()).is_recoverable());
    }

    #[test]
    fn test_client_errors_are_classified_by_kind() {
        use solana_client::{
            client_error::{ClientError, ClientErrorKind},
            rpc_request::RpcError,
        };

        let not_found: ArbError =
            ClientError::from(ClientErrorKind::RpcError(RpcError::ForUser("AccountNotFound".to_string()))).into();
        assert!(matches!(not_found, ArbError::InvalidInput(_)));
        assert!(!not_found.should_retry());

        let io: ArbError = ClientError::from(ClientErrorKind::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )))
        .into();
        assert!(matches!(io, ArbError::NetworkError(_)));
        assert!(io.should_retry());

        let custom: ArbError = ClientError::from(ClientErrorKind::Custom("node is behind".to_string())).into();
        assert!(custom.should_retry());
    }
}
