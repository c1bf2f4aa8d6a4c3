use std::env;

use config::{Config, Environment, File};

use crate::error::{BotError, BotResult};

use super::runtime::{ExchangeConfig, RuntimeConfig};

/// Loads `RuntimeConfig` from a TOML file, overlaid by `SIGNAL_ENGINE_*`
/// environment variables (e.g. `SIGNAL_ENGINE_TRADING_ENABLED=true`), then
/// validates it. Exchange credentials are never read through this path.
pub fn load_runtime_config(path: &str) -> BotResult<RuntimeConfig> {
    let settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("SIGNAL_ENGINE").separator("__"))
        .build()
        .map_err(|e| BotError::InvalidConfig(format!("failed to load {path}: {e}")))?;

    let runtime: RuntimeConfig = settings
        .try_deserialize()
        .map_err(|e| BotError::InvalidConfig(format!("failed to parse {path}: {e}")))?;

    runtime
        .validate()
        .map_err(|errors| BotError::InvalidConfig(errors.join("; ")))?;

    Ok(runtime)
}

/// Reads exchange credentials strictly from the process environment (after
/// loading a `.env` file if present), so a TOML config file committed to a
/// repo can never carry a live API secret.
pub fn load_exchange_config() -> BotResult<ExchangeConfig> {
    let _ = dotenvy::dotenv();

    let api_key = env::var("EXCHANGE_API_KEY")
        .map_err(|_| BotError::InvalidConfig("EXCHANGE_API_KEY is not set".into()))?;
    let api_secret = env::var("EXCHANGE_API_SECRET")
        .map_err(|_| BotError::InvalidConfig("EXCHANGE_API_SECRET is not set".into()))?;
    let base_url = env::var("EXCHANGE_BASE_URL").ok();

    Ok(ExchangeConfig {
        api_key,
        api_secret,
        base_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_surfaces_invalid_config() {
        let result = load_runtime_config("/nonexistent/path/definitely-not-here");
        assert!(result.is_err());
    }
}
