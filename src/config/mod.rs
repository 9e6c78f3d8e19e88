pub mod settings;

pub use settings::Config;

use crate::error::ArbError;
use std::sync::Arc;

/// Loads `.env` (if present), reads the environment and validates the result.
/// Runs before logging is installed, so it does not log.
pub fn load_config() -> Result<Arc<settings::Config>, ArbError> {
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let config = settings::Config::from_env();
    config.validate()?;

    Ok(Arc::new(config))
}
