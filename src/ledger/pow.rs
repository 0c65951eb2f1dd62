//! Proof-of-work metric and mining controls.
//!
//! A digest satisfies difficulty `d` when its hex form, read as a binary string
//! of four bits per hex digit, starts with exactly `d` zero bits. Exact match
//! (not "at least") is the mining target: each extra bit of difficulty halves
//! the chance of a hit, and a difficulty beyond the digest width never hits.

use crate::core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Width of a digest in bits. No difficulty above this can ever be met.
pub const DIGEST_BITS: u32 = 256;

/// Count the leading zero bits of a hex digest.
pub fn leading_zero_bits(digest: &str) -> Result<u32> {
    if digest.is_empty() {
        return Err(Error::InvalidDigest(String::new()));
    }

    let mut total = 0u32;
    let mut nibbles = digest.chars();

    for c in nibbles.by_ref() {
        let nibble = c
            .to_digit(16)
            .ok_or_else(|| Error::InvalidDigest(digest.to_string()))?;
        if nibble == 0 {
            total += 4;
        } else {
            // leading zeros of a nibble inside a u32
            total += nibble.leading_zeros() - 28;
            break;
        }
    }

    // The rest must still be hex even though it no longer affects the count.
    if nibbles.any(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::InvalidDigest(digest.to_string()));
    }

    Ok(total)
}

/// Check that a difficulty can be met by some digest.
pub fn check_difficulty(difficulty: u32) -> Result<()> {
    if difficulty > DIGEST_BITS {
        return Err(Error::InvalidDifficulty(difficulty));
    }
    Ok(())
}

/// Bounds for a single mining run.
///
/// The default control never stops: mining runs until the target is met.
#[derive(Clone, Debug, Default)]
pub struct MiningControl {
    /// Give up after this many digests have been tried
    pub max_attempts: Option<u64>,
    /// Cooperative cancellation flag, checked before every attempt
    cancel: Arc<AtomicBool>,
}

impl MiningControl {
    /// Create an unbounded control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Share an existing cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Handle that can cancel a run from another thread.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// How a mining run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiningOutcome {
    /// Target met; the block's nonce and digest are final
    Mined { attempts: u64 },
    /// Cancellation flag was raised
    Cancelled { attempts: u64 },
    /// Attempt cap reached without meeting the target
    Exhausted { attempts: u64 },
}

impl MiningOutcome {
    /// Whether the target was met.
    pub fn is_mined(&self) -> bool {
        matches!(self, MiningOutcome::Mined { .. })
    }

    /// Number of digests tried.
    pub fn attempts(&self) -> u64 {
        match *self {
            MiningOutcome::Mined { attempts }
            | MiningOutcome::Cancelled { attempts }
            | MiningOutcome::Exhausted { attempts } => attempts,
        }
    }
}
