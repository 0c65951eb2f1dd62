//! Tamper probe: rewrite a block's payload and see whether validation notices.

use crate::core::Result;
use crate::ledger::{Chain, ChainVerification, Payload};
use tracing::warn;

/// Outcome of a tamper attempt.
#[derive(Clone, Debug)]
pub struct TamperReport {
    /// Whether the altered payload went unnoticed and stayed in place
    pub undetected: bool,
    /// Human-readable summary
    pub message: String,
    /// Validation result taken right after the payload was swapped
    pub verification: Option<ChainVerification>,
}

/// Mutable handle on a chain for tamper experiments.
pub struct TamperProbe<'a> {
    chain: &'a mut Chain,
}

impl<'a> TamperProbe<'a> {
    /// Wrap a chain.
    pub fn new(chain: &'a mut Chain) -> Self {
        Self { chain }
    }

    /// Replace the payload of block `index` without re-mining and validate.
    ///
    /// A detected change is rolled back. An undetected one stays in the chain.
    pub fn attempt_mutation(&mut self, index: usize, new_payload: Payload) -> Result<TamperReport> {
        let original = match self.chain.block_mut(index) {
            Some(block) => block.replace_payload(new_payload),
            None => {
                return Ok(TamperReport {
                    undetected: false,
                    message: "Invalid block index".to_string(),
                    verification: None,
                })
            }
        };

        let verification = match self.chain.validate() {
            Ok(verification) => verification,
            Err(err) => {
                self.restore(index, original);
                return Err(err);
            }
        };

        if verification.valid {
            warn!(index, "Tampered payload passed validation");
            return Ok(TamperReport {
                undetected: true,
                message: "Tamper successful (this should not happen in a proper blockchain)"
                    .to_string(),
                verification: Some(verification),
            });
        }

        self.restore(index, original);
        Ok(TamperReport {
            undetected: false,
            message: "Tamper detected, blockchain protected the data".to_string(),
            verification: Some(verification),
        })
    }

    fn restore(&mut self, index: usize, payload: Payload) {
        if let Some(block) = self.chain.block_mut(index) {
            block.replace_payload(payload);
        }
    }
}
