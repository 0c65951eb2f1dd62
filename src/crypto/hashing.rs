//! Digest functions.

use crate::core::Hash256;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

/// Hash function used to compute block digests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256, the reference digest.
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA3-256.
    #[serde(rename = "sha3-256")]
    Sha3_256,
}

impl HashAlgorithm {
    /// Hash data with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Hash256 {
        match self {
            HashAlgorithm::Sha256 => sha256(data),
            HashAlgorithm::Sha3_256 => sha3_256(data),
        }
    }

    /// Hash data and return the lowercase hex form.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        self.digest(data).to_hex()
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Sha3_256 => write!(f, "sha3-256"),
        }
    }
}

/// Compute SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256::new(bytes)
}

/// Compute SHA3-256 hash of data.
pub fn sha3_256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256::new(bytes)
}
