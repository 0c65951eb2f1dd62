//! Ledger block structure.
//!
//! A block's digest covers its index, timestamp, payload, nonce and the digest
//! of its predecessor. The digest is derived state: it can always be recomputed
//! from the other fields, which is what makes tampering detectable.

use crate::core::{format_unix_seconds, Error, Result};
use crate::crypto::{to_canonical_vec, HashAlgorithm};
use crate::ledger::pow::{leading_zero_bits, MiningControl, MiningOutcome};
use crate::ledger::snapshot::BlockRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

/// Arbitrary structured data carried by a block.
pub type Payload = Map<String, Value>;

/// Previous-digest sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_DIGEST: &str = "0";

/// Message stored in the genesis block payload.
pub const GENESIS_MESSAGE: &str = "Genesis Block";

/// Turn a JSON value into a payload. Only objects are accepted.
pub fn payload_from_value(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidPayload(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Fields covered by the digest, named as they appear in snapshots.
#[derive(Serialize)]
struct Preimage<'a> {
    data: &'a Payload,
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
}

/// A mined (or about to be mined) ledger block.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    index: u64,
    timestamp: f64,
    payload: Payload,
    previous_digest: String,
    nonce: u64,
    digest: String,
    algorithm: HashAlgorithm,
}

impl Block {
    /// Create a new block with nonce 0 and its digest computed.
    pub fn new(
        index: u64,
        timestamp: f64,
        payload: Payload,
        previous_digest: impl Into<String>,
        algorithm: HashAlgorithm,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            payload,
            previous_digest: previous_digest.into(),
            nonce: 0,
            digest: String::new(),
            algorithm,
        };
        block.digest = block.compute_digest()?;
        Ok(block)
    }

    /// Create an unmined genesis block.
    pub fn genesis(timestamp: f64, algorithm: HashAlgorithm) -> Result<Self> {
        let mut payload = Payload::new();
        payload.insert("message".to_string(), Value::from(GENESIS_MESSAGE));
        Self::new(0, timestamp, payload, GENESIS_PREVIOUS_DIGEST, algorithm)
    }

    /// Position of the block in its chain.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Creation time in fractional seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// The block's data.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Digest of the preceding block, or `"0"` for genesis.
    pub fn previous_digest(&self) -> &str {
        &self.previous_digest
    }

    /// Proof-of-work nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Stored digest (lowercase hex).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Hash function the digest is computed with.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Whether this block sits at the start of a chain.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_digest == GENESIS_PREVIOUS_DIGEST
    }

    /// Recompute the digest from the current fields.
    ///
    /// Pure: does not touch the stored digest.
    pub fn compute_digest(&self) -> Result<String> {
        let preimage = Preimage {
            data: &self.payload,
            index: self.index,
            nonce: self.nonce,
            previous_hash: &self.previous_digest,
            timestamp: self.timestamp,
        };
        Ok(self.algorithm.hex_digest(&to_canonical_vec(&preimage)?))
    }

    /// Leading zero bits of the stored digest.
    pub fn leading_zero_bits(&self) -> Result<u32> {
        leading_zero_bits(&self.digest)
    }

    /// Mine until the digest has exactly `difficulty` leading zero bits.
    ///
    /// Blocks the calling thread with no upper bound; see [`Block::mine_with`]
    /// for a cancellable run.
    pub fn mine(&mut self, difficulty: u32) -> Result<()> {
        self.mine_with(difficulty, &MiningControl::new())?;
        Ok(())
    }

    /// Mine under a [`MiningControl`].
    ///
    /// The digest at the current nonce is tried first. At least one digest is
    /// always tried. Whatever the outcome, the stored digest matches the stored
    /// nonce when this returns.
    pub fn mine_with(&mut self, difficulty: u32, control: &MiningControl) -> Result<MiningOutcome> {
        self.digest = self.compute_digest()?;
        let mut attempts = 1u64;

        loop {
            if leading_zero_bits(&self.digest)? == difficulty {
                info!(
                    index = self.index,
                    nonce = self.nonce,
                    attempts,
                    digest = %self.digest,
                    "Block mined"
                );
                return Ok(MiningOutcome::Mined { attempts });
            }

            if control.is_cancelled() {
                return Ok(MiningOutcome::Cancelled { attempts });
            }

            if let Some(max_attempts) = control.max_attempts {
                if attempts >= max_attempts {
                    return Ok(MiningOutcome::Exhausted { attempts });
                }
            }

            self.nonce = self.nonce.wrapping_add(1);
            self.digest = self.compute_digest()?;
            attempts += 1;
        }
    }

    /// Convert to the snapshot record form.
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            timestamp: self.timestamp,
            data: self.payload.clone(),
            previous_hash: self.previous_digest.clone(),
            nonce: self.nonce,
            hash: self.digest.clone(),
        }
    }

    /// Rebuild a block from its record, keeping the stored nonce and digest.
    pub fn from_record(record: BlockRecord, algorithm: HashAlgorithm) -> Self {
        Self {
            index: record.index,
            timestamp: record.timestamp,
            payload: record.data,
            previous_digest: record.previous_hash,
            nonce: record.nonce,
            digest: record.hash,
            algorithm,
        }
    }

    /// Swap the payload without re-mining. Returns the previous payload.
    #[cfg(any(test, feature = "tamper-probe"))]
    pub(crate) fn replace_payload(&mut self, payload: Payload) -> Payload {
        std::mem::replace(&mut self.payload, payload)
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = serde_json::to_string_pretty(&self.payload).map_err(|_| std::fmt::Error)?;
        writeln!(f, "Block #{}", self.index)?;
        writeln!(f, "Timestamp: {}", format_unix_seconds(self.timestamp))?;
        writeln!(f, "Data: {}", data)?;
        writeln!(f, "Previous Hash: {}", self.previous_digest)?;
        writeln!(f, "Hash: {}", self.digest)?;
        writeln!(f, "Nonce: {}", self.nonce)
    }
}
