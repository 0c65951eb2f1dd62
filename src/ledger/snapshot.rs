//! Flat snapshot format for a whole chain.
//!
//! ```json
//! {
//!   "chain": [{"index": 0, "timestamp": 1700000000.5, "data": {...},
//!              "previous_hash": "0", "nonce": 80, "hash": "0d33..."}],
//!   "difficulty": 4,
//!   "length": 1
//! }
//! ```
//!
//! `hash_algorithm` is written alongside and defaults to SHA-256 when a
//! document does not carry it.

use crate::core::{Error, Result};
use crate::crypto::HashAlgorithm;
use crate::ledger::block::Payload;
use serde::{Deserialize, Serialize};

/// One block as stored in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block index
    pub index: u64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Block payload
    pub data: Payload,
    /// Digest of the previous block
    pub previous_hash: String,
    /// Proof-of-work nonce
    pub nonce: u64,
    /// Stored block digest
    pub hash: String,
}

/// A whole chain as stored in a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// Blocks in chain order
    pub chain: Vec<BlockRecord>,
    /// Mining difficulty of the chain
    pub difficulty: u32,
    /// Number of blocks; must equal `chain.len()`
    pub length: usize,
    /// Digest function of the chain
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}

impl ChainSnapshot {
    /// Build a snapshot from block records.
    pub fn new(chain: Vec<BlockRecord>, difficulty: u32, hash_algorithm: HashAlgorithm) -> Self {
        Self {
            length: chain.len(),
            chain,
            difficulty,
            hash_algorithm,
        }
    }

    /// Check the structural contract that serde alone cannot express.
    pub fn check(&self) -> Result<()> {
        if self.length != self.chain.len() {
            return Err(Error::MalformedSnapshot(format!(
                "length field says {} but chain holds {} blocks",
                self.length,
                self.chain.len()
            )));
        }
        Ok(())
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a snapshot document. Missing or mistyped fields fail fast.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        snapshot.check()?;
        Ok(snapshot)
    }
}

/// Three blocks mined at difficulty 4 by the reference tool.
#[cfg(test)]
pub(crate) const REFERENCE_SNAPSHOT: &str = r#"{"chain": [{"index": 0, "timestamp": 1700000000.5, "data": {"message": "Genesis Block"}, "previous_hash": "0", "nonce": 80, "hash": "0d33ff535a900456f0e1accb6bf274dd36969a51dd157c4910c8ce25072663ef"}, {"index": 1, "timestamp": 1700000001.25, "data": {"event_type": "login", "user_id": "user123", "success": true}, "previous_hash": "0d33ff535a900456f0e1accb6bf274dd36969a51dd157c4910c8ce25072663ef", "nonce": 5, "hash": "0e27432540df326f7d1c19359c45933f675f470ff8ab96f1adb5701623737b80"}, {"index": 2, "timestamp": 1700000002.25, "data": {"event_type": "data_access", "user_id": "user123", "resource": "customer_database"}, "previous_hash": "0e27432540df326f7d1c19359c45933f675f470ff8ab96f1adb5701623737b80", "nonce": 6, "hash": "0c1218d18caf646b4fe7e468918e0052a3eede2e1abc0bdbc1d231c54b58f22a"}], "difficulty": 4, "length": 3}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference_snapshot() {
        let snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        assert_eq!(snapshot.difficulty, 4);
        assert_eq!(snapshot.length, 3);
        assert_eq!(snapshot.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(snapshot.chain[1].nonce, 5);
        assert_eq!(snapshot.chain[1].data["success"], json!(true));
    }

    #[test]
    fn test_json_roundtrip() {
        let snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\n  \"chain\": ["));
        assert_eq!(ChainSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_missing_field_fails() {
        let doc = json!({"chain": [], "length": 0}).to_string();
        assert!(matches!(
            ChainSnapshot::from_json(&doc),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_wrong_type_fails() {
        let doc = json!({
            "chain": [{"index": "zero", "timestamp": 1.0, "data": {}, "previous_hash": "0", "nonce": 0, "hash": "00"}],
            "difficulty": 1,
            "length": 1
        })
        .to_string();
        assert!(matches!(
            ChainSnapshot::from_json(&doc),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let doc = json!({"chain": [], "difficulty": 1, "length": 2}).to_string();
        assert!(matches!(
            ChainSnapshot::from_json(&doc),
            Err(Error::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn test_algorithm_written() {
        let snapshot = ChainSnapshot::new(Vec::new(), 3, HashAlgorithm::Sha3_256);
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["hash_algorithm"], json!("sha3-256"));
        assert_eq!(value["length"], json!(0));
    }
}
