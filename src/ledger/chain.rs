//! Hash-linked chain of mined blocks.
//!
//! The chain owns the mining policy, appends blocks linked to the current tail
//! and verifies the whole sequence on demand.

use crate::core::{unix_seconds, Error, Result};
use crate::crypto::HashAlgorithm;
use crate::ledger::block::{Block, Payload, GENESIS_PREVIOUS_DIGEST};
use crate::ledger::config::LedgerConfig;
use crate::ledger::pow::{check_difficulty, MiningControl};
use crate::ledger::snapshot::ChainSnapshot;
use serde_json::{Number, Value};
use std::path::Path;
use tracing::{debug, info, warn};

/// Why a block failed verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// First block is not at index 0
    GenesisIndex { found: u64 },
    /// First block does not carry the `"0"` previous digest
    GenesisLink { found: String },
    /// Stored digest differs from the recomputed one
    DigestMismatch { stored: String, computed: String },
    /// Previous digest differs from the predecessor's stored digest
    LinkMismatch { expected: String, found: String },
    /// Index does not follow the predecessor's index
    IndexGap { expected: u64, found: u64 },
}

/// The first offending block found by [`Chain::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Position of the offending block
    pub index: u64,
    /// What was wrong with it
    pub kind: FailureKind,
}

impl ValidationFailure {
    /// Human-readable reason.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FailureKind::GenesisIndex { found } => {
                write!(f, "Invalid genesis at block {}: index is {}", self.index, found)
            }
            FailureKind::GenesisLink { found } => write!(
                f,
                "Invalid genesis at block {}: previous hash is {} instead of {}",
                self.index, found, GENESIS_PREVIOUS_DIGEST
            ),
            FailureKind::DigestMismatch { stored, computed } => write!(
                f,
                "Invalid hash at block {}: {} vs {}",
                self.index, stored, computed
            ),
            FailureKind::LinkMismatch { expected, found } => write!(
                f,
                "Invalid previous hash at block {}: {} vs {}",
                self.index, found, expected
            ),
            FailureKind::IndexGap { expected, found } => write!(
                f,
                "Invalid index at block {}: expected {}, got {}",
                self.index, expected, found
            ),
        }
    }
}

/// Result of chain verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainVerification {
    /// Whether the chain is valid
    pub valid: bool,
    /// Number of blocks that passed before the first failure
    pub blocks_verified: u64,
    /// First failure, if any
    pub failure: Option<ValidationFailure>,
}

impl ChainVerification {
    /// Index of the first invalid block, if any.
    pub fn first_invalid_index(&self) -> Option<u64> {
        self.failure.as_ref().map(|f| f.index)
    }
}

/// An append-only chain of proof-of-work blocks.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    config: LedgerConfig,
}

impl Chain {
    /// Create a chain with a mined genesis block.
    pub fn new(difficulty: u32) -> Result<Self> {
        Self::with_config(LedgerConfig::with_difficulty(difficulty))
    }

    /// Create a chain from full settings.
    pub fn with_config(config: LedgerConfig) -> Result<Self> {
        config.validate()?;

        let mut chain = Self {
            blocks: Vec::new(),
            config,
        };

        let mut genesis = Block::genesis(unix_seconds(), chain.config.hash_algorithm)?;
        chain.mine_block(&mut genesis, &chain.config.mining_control())?;
        chain.blocks.push(genesis);

        Ok(chain)
    }

    /// Mining difficulty shared by every block of this chain.
    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Digest function of this chain.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.config.hash_algorithm
    }

    /// Settings the chain runs with.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the chain holds no block at all (only reachable through restore).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All blocks in order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The most recent block.
    pub fn latest(&self) -> Result<&Block> {
        self.blocks.last().ok_or(Error::EmptyChain)
    }

    /// Block at a position, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Mine and append a block carrying `payload`.
    pub fn append(&mut self, payload: Payload) -> Result<&Block> {
        let control = self.config.mining_control();
        self.append_with(payload, &control)
    }

    /// Mine and append under a [`MiningControl`].
    ///
    /// A cancelled or exhausted run fails with [`Error::MiningAborted`] and
    /// leaves the chain untouched.
    pub fn append_with(&mut self, payload: Payload, control: &MiningControl) -> Result<&Block> {
        let previous = self.latest()?;
        let mut block = Block::new(
            previous.index() + 1,
            unix_seconds(),
            payload,
            previous.digest(),
            self.config.hash_algorithm,
        )?;

        self.mine_block(&mut block, control)?;
        debug!(index = block.index(), digest = %block.digest(), "Block appended");
        self.blocks.push(block);

        self.latest()
    }

    fn mine_block(&self, block: &mut Block, control: &MiningControl) -> Result<()> {
        let outcome = block.mine_with(self.config.difficulty, control)?;
        if !outcome.is_mined() {
            return Err(Error::MiningAborted {
                index: block.index(),
                attempts: outcome.attempts(),
            });
        }
        Ok(())
    }

    /// Verify stored digests and links across the whole chain.
    ///
    /// Stops at the first offending block. Proof-of-work difficulty is not
    /// re-checked: a digest that recomputes and links correctly is trusted.
    pub fn validate(&self) -> Result<ChainVerification> {
        let mut verification = ChainVerification {
            valid: true,
            blocks_verified: 0,
            failure: None,
        };

        for (i, block) in self.blocks.iter().enumerate() {
            let previous = if i > 0 { self.blocks.get(i - 1) } else { None };

            if let Some(kind) = Self::check_block(block, previous)? {
                let failure = ValidationFailure {
                    index: i as u64,
                    kind,
                };
                warn!(index = failure.index, reason = %failure, "Chain validation failed");
                verification.valid = false;
                verification.failure = Some(failure);
                break;
            }

            verification.blocks_verified += 1;
        }

        Ok(verification)
    }

    fn check_block(block: &Block, previous: Option<&Block>) -> Result<Option<FailureKind>> {
        if previous.is_none() {
            if block.index() != 0 {
                return Ok(Some(FailureKind::GenesisIndex {
                    found: block.index(),
                }));
            }
            if block.previous_digest() != GENESIS_PREVIOUS_DIGEST {
                return Ok(Some(FailureKind::GenesisLink {
                    found: block.previous_digest().to_string(),
                }));
            }
        }

        let computed = block.compute_digest()?;
        if computed != block.digest() {
            return Ok(Some(FailureKind::DigestMismatch {
                stored: block.digest().to_string(),
                computed,
            }));
        }

        if let Some(previous) = previous {
            if block.previous_digest() != previous.digest() {
                return Ok(Some(FailureKind::LinkMismatch {
                    expected: previous.digest().to_string(),
                    found: block.previous_digest().to_string(),
                }));
            }
            let expected = previous.index().wrapping_add(1);
            if block.index() != expected {
                return Ok(Some(FailureKind::IndexGap {
                    expected,
                    found: block.index(),
                }));
            }
        }

        Ok(None)
    }

    /// Shorthand for `validate()?.valid`.
    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.validate()?.valid)
    }

    /// Blocks whose payload maps `key` to a value equal to `value`, in chain order.
    ///
    /// Numbers compare by numeric value, so `1` matches `1.0`.
    pub fn find_by(&self, key: &str, value: &Value) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.payload().get(key).is_some_and(|v| values_equal(v, value)))
            .collect()
    }

    /// Capture the whole chain as a snapshot.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot::new(
            self.blocks.iter().map(Block::to_record).collect(),
            self.config.difficulty,
            self.config.hash_algorithm,
        )
    }

    /// Rebuild a chain from a snapshot.
    ///
    /// Stored digests and nonces are taken verbatim. Nothing is re-mined or
    /// validated; call [`Chain::validate`] for integrity assurance.
    pub fn restore(snapshot: ChainSnapshot) -> Result<Self> {
        snapshot.check()?;
        check_difficulty(snapshot.difficulty)?;

        let config = LedgerConfig {
            difficulty: snapshot.difficulty,
            hash_algorithm: snapshot.hash_algorithm,
            max_mining_attempts: None,
        };
        let blocks: Vec<Block> = snapshot
            .chain
            .into_iter()
            .map(|record| Block::from_record(record, config.hash_algorithm))
            .collect();

        debug!(blocks = blocks.len(), difficulty = config.difficulty, "Chain restored");
        Ok(Self { blocks, config })
    }

    /// Snapshot as indented JSON.
    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json_pretty()
    }

    /// Restore from snapshot JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::restore(ChainSnapshot::from_json(json)?)
    }

    /// Write the snapshot to a file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), blocks = self.len(), "Chain saved");
        Ok(())
    }

    /// Read a snapshot file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let chain = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), blocks = chain.len(), "Chain loaded");
        Ok(chain)
    }

    #[cfg(any(test, feature = "tamper-probe"))]
    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Blockchain (length: {}):", self.blocks.len())?;
        for block in &self.blocks {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// Structural equality with numbers compared by value.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::payload_from_value;
    use crate::ledger::pow::leading_zero_bits;
    use crate::ledger::snapshot::REFERENCE_SNAPSHOT;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        payload_from_value(value).unwrap()
    }

    fn audit_chain(difficulty: u32) -> Chain {
        let mut chain = Chain::new(difficulty).unwrap();
        chain
            .append(payload(json!({"event_type": "login", "user_id": "u1", "success": true})))
            .unwrap();
        chain
            .append(payload(json!({"event_type": "data_access", "user_id": "u1", "attempts": 1})))
            .unwrap();
        chain
            .append(payload(json!({"event_type": "login", "user_id": "u2", "success": false})))
            .unwrap();
        chain
    }

    /// Rewrites a record and refreshes its digest so only the intended check fails.
    fn restore_edited(edit: impl FnOnce(&mut crate::ledger::snapshot::BlockRecord), at: usize) -> Chain {
        let mut snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        edit(&mut snapshot.chain[at]);
        let block = Block::from_record(snapshot.chain[at].clone(), HashAlgorithm::Sha256);
        snapshot.chain[at].hash = block.compute_digest().unwrap();
        Chain::restore(snapshot).unwrap()
    }

    #[test]
    fn test_chain_creation() {
        for difficulty in [0, 4, 8] {
            let chain = Chain::new(difficulty).unwrap();
            assert_eq!(chain.len(), 1);
            assert_eq!(chain.difficulty(), difficulty);

            let genesis = chain.latest().unwrap();
            assert_eq!(genesis.index(), 0);
            assert_eq!(genesis.previous_digest(), "0");
            assert_eq!(genesis.payload()["message"], json!("Genesis Block"));
            assert_eq!(leading_zero_bits(genesis.digest()).unwrap(), difficulty);
        }
    }

    #[test]
    fn test_unreachable_difficulty_rejected() {
        assert!(matches!(Chain::new(257), Err(Error::InvalidDifficulty(257))));
    }

    #[test]
    fn test_append_links_blocks() {
        let mut chain = Chain::new(3).unwrap();
        for i in 0..5 {
            let block = chain.append(payload(json!({"seq": i}))).unwrap();
            assert_eq!(block.index(), i + 1);
            assert_eq!(block.leading_zero_bits().unwrap(), 3);
        }

        let blocks = chain.blocks();
        assert_eq!(blocks.len(), 6);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].previous_digest(), pair[0].digest());
            assert_eq!(pair[1].index(), pair[0].index() + 1);
        }
    }

    #[test]
    fn test_validate_fresh_chain() {
        let chain = audit_chain(4);
        let verification = chain.validate().unwrap();
        assert!(verification.valid);
        assert_eq!(verification.blocks_verified, 4);
        assert!(verification.failure.is_none());
        assert!(chain.is_valid().unwrap());
    }

    #[test]
    fn test_tamper_detected_at_mutated_block() {
        let mut chain = audit_chain(4);
        chain
            .block_mut(1)
            .unwrap()
            .replace_payload(payload(json!({"event_type": "login", "user_id": "u1", "success": false})));

        let verification = chain.validate().unwrap();
        assert!(!verification.valid);
        assert_eq!(verification.blocks_verified, 1);
        assert_eq!(verification.first_invalid_index(), Some(1));
        assert!(matches!(
            verification.failure.unwrap().kind,
            FailureKind::DigestMismatch { .. }
        ));
    }

    #[test]
    fn test_tamper_detected_in_genesis() {
        let mut chain = audit_chain(2);
        chain
            .block_mut(0)
            .unwrap()
            .replace_payload(payload(json!({"message": "Rewritten"})));

        let verification = chain.validate().unwrap();
        assert_eq!(verification.first_invalid_index(), Some(0));
    }

    #[test]
    fn test_link_mismatch_detected() {
        let chain = restore_edited(|record| record.previous_hash = "ff".repeat(32), 2);
        let failure = chain.validate().unwrap().failure.unwrap();
        assert_eq!(failure.index, 2);
        assert!(matches!(failure.kind, FailureKind::LinkMismatch { .. }));
        assert!(failure.reason().starts_with("Invalid previous hash at block 2"));
    }

    #[test]
    fn test_index_gap_detected() {
        let chain = restore_edited(|record| record.index = 7, 2);
        let failure = chain.validate().unwrap().failure.unwrap();
        assert_eq!(
            failure.kind,
            FailureKind::IndexGap {
                expected: 2,
                found: 7
            }
        );
    }

    #[test]
    fn test_malformed_genesis_detected() {
        let chain = restore_edited(|record| record.previous_hash = "1".to_string(), 0);
        let failure = chain.validate().unwrap().failure.unwrap();
        assert_eq!(failure.index, 0);
        assert!(matches!(failure.kind, FailureKind::GenesisLink { .. }));
    }

    #[test]
    fn test_validate_does_not_recheck_difficulty() {
        let mut snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        snapshot.difficulty = 12;
        let chain = Chain::restore(snapshot).unwrap();
        assert!(chain.is_valid().unwrap());
    }

    #[test]
    fn test_find_by() {
        let chain = audit_chain(2);

        let logins = chain.find_by("event_type", &json!("login"));
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].index(), 1);
        assert_eq!(logins[1].index(), 3);

        assert!(chain.find_by("event_type", &json!("logout")).is_empty());
        assert!(chain.find_by("missing_key", &json!("login")).is_empty());
        assert_eq!(chain.find_by("success", &json!(false)).len(), 1);
    }

    #[test]
    fn test_find_by_numeric_value_equality() {
        let chain = audit_chain(2);
        assert_eq!(chain.find_by("attempts", &json!(1)).len(), 1);
        assert_eq!(chain.find_by("attempts", &json!(1.0)).len(), 1);
        assert!(chain.find_by("attempts", &json!("1")).is_empty());
        assert!(chain.find_by("success", &json!(1)).is_empty());
    }

    #[test]
    fn test_values_equal_nested() {
        assert!(values_equal(
            &json!({"a": [1, {"b": 2.0}]}),
            &json!({"a": [1.0, {"b": 2}]})
        ));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(values_equal(&json!(-3), &json!(-3.0)));
        assert!(values_equal(&json!(null), &json!(null)));
    }

    #[test]
    fn test_get() {
        let chain = audit_chain(2);
        assert_eq!(chain.get(0).unwrap().index(), 0);
        assert_eq!(chain.get(3).unwrap().index(), 3);
        assert!(chain.get(4).is_none());
        assert!(chain.get(999).is_none());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let chain = audit_chain(4);
        let restored = Chain::restore(chain.snapshot()).unwrap();

        assert_eq!(restored.blocks(), chain.blocks());
        assert_eq!(restored.difficulty(), 4);
        assert_eq!(restored.is_valid().unwrap(), chain.is_valid().unwrap());
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_invalid_state() {
        let mut chain = audit_chain(2);
        chain
            .block_mut(2)
            .unwrap()
            .replace_payload(payload(json!({"event_type": "noop"})));

        let restored = Chain::from_json(&chain.to_json().unwrap()).unwrap();
        assert_eq!(restored.blocks(), chain.blocks());
        assert_eq!(
            restored.validate().unwrap().first_invalid_index(),
            chain.validate().unwrap().first_invalid_index()
        );
    }

    #[test]
    fn test_restore_reference_snapshot() {
        let mut chain = Chain::from_json(REFERENCE_SNAPSHOT).unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.is_valid().unwrap());

        let tail = chain.latest().unwrap().digest().to_string();
        let block = chain.append(payload(json!({"event_type": "logout"}))).unwrap();
        assert_eq!(block.previous_digest(), tail);
        assert_eq!(block.leading_zero_bits().unwrap(), 4);
        assert!(chain.is_valid().unwrap());
    }

    #[test]
    fn test_restore_rejects_unreachable_difficulty() {
        let mut snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        snapshot.difficulty = 1_000;
        assert!(matches!(
            Chain::restore(snapshot),
            Err(Error::InvalidDifficulty(1_000))
        ));
    }

    #[test]
    fn test_empty_chain() {
        let chain = Chain::from_json(r#"{"chain": [], "difficulty": 2, "length": 0}"#).unwrap();
        assert!(chain.is_empty());
        assert!(matches!(chain.latest(), Err(Error::EmptyChain)));
        assert!(chain.is_valid().unwrap());

        let mut chain = chain;
        assert!(matches!(
            chain.append(payload(json!({"a": 1}))),
            Err(Error::EmptyChain)
        ));
    }

    #[test]
    fn test_append_with_cancelled_leaves_chain_unchanged() {
        let mut snapshot = ChainSnapshot::from_json(REFERENCE_SNAPSHOT).unwrap();
        snapshot.difficulty = 200;
        let mut chain = Chain::restore(snapshot).unwrap();

        let control = MiningControl::new();
        control.cancel();
        let result = chain.append_with(payload(json!({"a": 1})), &control);

        assert!(matches!(result, Err(Error::MiningAborted { index: 3, .. })));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_config_attempt_cap_aborts_genesis() {
        let config = LedgerConfig::with_difficulty(200).max_mining_attempts(10);
        assert!(matches!(
            Chain::with_config(config),
            Err(Error::MiningAborted { index: 0, attempts: 10 })
        ));
    }

    #[test]
    fn test_sha3_chain() {
        let config = LedgerConfig::with_difficulty(3).hash_algorithm(HashAlgorithm::Sha3_256);
        let mut chain = Chain::with_config(config).unwrap();
        chain.append(payload(json!({"k": "v"}))).unwrap();

        let restored = Chain::from_json(&chain.to_json().unwrap()).unwrap();
        assert_eq!(restored.algorithm(), HashAlgorithm::Sha3_256);
        assert!(restored.is_valid().unwrap());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_chain.json");

        let chain = audit_chain(2);
        chain.save_to_file(&path).unwrap();
        let loaded = Chain::load_from_file(&path).unwrap();

        assert_eq!(loaded.blocks(), chain.blocks());
        assert!(loaded.is_valid().unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Chain::load_from_file(dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_display() {
        let chain = audit_chain(1);
        let text = chain.to_string();
        assert!(text.starts_with("Blockchain (length: 4):\n"));
        assert!(text.contains("Block #3"));
    }

    #[test]
    fn test_login_logout_scenario() {
        let mut chain = Chain::new(8).unwrap();
        chain
            .append(payload(json!({"event_type": "login", "user_id": "u1"})))
            .unwrap();
        chain
            .append(payload(json!({"event_type": "logout", "user_id": "u1"})))
            .unwrap();

        let logins = chain.find_by("event_type", &json!("login"));
        assert_eq!(logins.len(), 1);
        assert_eq!(logins[0].index(), 1);
        assert!(chain.is_valid().unwrap());

        chain
            .block_mut(1)
            .unwrap()
            .replace_payload(payload(json!({"event_type": "login", "user_id": "u2"})));

        let verification = chain.validate().unwrap();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid_index(), Some(1));
    }
}
