//! Configuration for the bridge model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{constants, Amount, BridgeError, Result};

/// Protocol parameters shared by validation and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Amount of the coin that seeds escrow at genesis (counted in mint).
    pub genesis_seed_amount: Amount,
    /// Smallest change output a settlement may leave as the next anchor.
    pub min_seed_amount: Amount,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            genesis_seed_amount: constants::DEFAULT_GENESIS_SEED_AMOUNT,
            min_seed_amount: constants::DEFAULT_MIN_SEED_AMOUNT,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject parameters under which no valid anchor can exist.
    pub fn validate(&self) -> Result<()> {
        if self.min_seed_amount == 0 {
            return Err(BridgeError::Configuration(
                "min_seed_amount must be > 0".to_string(),
            ));
        }
        if self.genesis_seed_amount < self.min_seed_amount {
            return Err(BridgeError::Configuration(format!(
                "genesis_seed_amount {} is below min_seed_amount {}",
                self.genesis_seed_amount, self.min_seed_amount
            )));
        }
        Ok(())
    }
}
