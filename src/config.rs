use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ledger::Amount;

pub const DEFAULT_MAX_SUPPLY: u64 = 10_000;
pub const DEFAULT_BASE_URI: &str = "ipfs://bafybeicardwars/";
/// 0.01 native units at 18 decimals.
pub const DEFAULT_MINT_PRICE: Amount = 10_000_000_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Deployment-time ledger parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LedgerConfig {
    pub max_supply: u64,
    pub base_uri: String,
    pub price_tiers: Vec<Amount>,
    pub active_tier: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_supply: DEFAULT_MAX_SUPPLY,
            base_uri: DEFAULT_BASE_URI.to_string(),
            price_tiers: vec![DEFAULT_MINT_PRICE],
            active_tier: 0,
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON config; missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: LedgerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_supply == 0 {
            return Err(ConfigError::Invalid("max_supply must be positive"));
        }
        if self.price_tiers.is_empty() {
            return Err(ConfigError::Invalid("at least one price tier is required"));
        }
        if self.active_tier >= self.price_tiers.len() {
            return Err(ConfigError::Invalid("active_tier is out of range"));
        }
        Ok(())
    }
}
