//! Ledger configuration.

use crate::core::{Error, Result};
use crate::crypto::HashAlgorithm;
use crate::ledger::pow::{check_difficulty, MiningControl};
use serde::{Deserialize, Serialize};

/// Default mining difficulty, in leading zero bits.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Settings a chain is created with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Exact number of leading zero bits every mined digest carries
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    /// Digest function
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// Attempt cap per block; `None` mines until the target is met
    #[serde(default)]
    pub max_mining_attempts: Option<u64>,
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

impl LedgerConfig {
    /// Create config with a difficulty and defaults for everything else.
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Default::default()
        }
    }

    /// Set the digest function.
    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Cap mining attempts per block.
    pub fn max_mining_attempts(mut self, attempts: u64) -> Self {
        self.max_mining_attempts = Some(attempts);
        self
    }

    /// Reject settings that can never produce a block.
    pub fn validate(&self) -> Result<()> {
        check_difficulty(self.difficulty)
    }

    /// Parse from a JSON document. Absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Mining control derived from these settings.
    pub fn mining_control(&self) -> MiningControl {
        match self.max_mining_attempts {
            Some(max) => MiningControl::new().with_max_attempts(max),
            None => MiningControl::new(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            hash_algorithm: HashAlgorithm::default(),
            max_mining_attempts: None,
        }
    }
}
