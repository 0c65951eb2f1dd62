//! Proof-of-work ledger.
//!
//! Provides a tamper-evident record of arbitrary payloads:
//! - Blocks linked by the digest of their predecessor
//! - Exact-target proof-of-work mining, cancellable on demand
//! - Whole-chain integrity verification
//! - Flat JSON snapshots

pub mod block;
pub mod chain;
pub mod config;
pub mod pow;
pub mod snapshot;

pub use block::{payload_from_value, Block, Payload, GENESIS_PREVIOUS_DIGEST};
pub use chain::{Chain, ChainVerification, FailureKind, ValidationFailure};
pub use config::LedgerConfig;
pub use pow::{leading_zero_bits, MiningControl, MiningOutcome};
pub use snapshot::{BlockRecord, ChainSnapshot};
