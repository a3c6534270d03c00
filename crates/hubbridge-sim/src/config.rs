//! Harness configuration.

use std::path::Path;

use hubbridge_types::{constants, Amount, BridgeConfig, BridgeError, Result};
use serde::{Deserialize, Serialize};

/// Parameters for one seeded simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seeds both the action stream and the relayer's input selection.
    pub seed: u64,
    pub steps: usize,
    /// Deposits are drawn from `1..=max_deposit`.
    pub max_deposit: Amount,
    /// Withdrawals are drawn from `1..=max_withdrawal`.
    pub max_withdrawal: Amount,
    pub bridge: BridgeConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            steps: constants::DEFAULT_SIM_STEPS,
            max_deposit: constants::DEFAULT_SIM_MAX_DEPOSIT,
            max_withdrawal: constants::DEFAULT_SIM_MAX_WITHDRAWAL,
            bridge: BridgeConfig::default(),
        }
    }
}

impl SimConfig {
    /// Default parameters with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_deposit == 0 || self.max_withdrawal == 0 {
            return Err(BridgeError::Configuration(
                "max_deposit and max_withdrawal must be > 0".to_string(),
            ));
        }
        self.bridge.validate()
    }
}
