//! # hashledger - tamper-evident proof-of-work ledger
//!
//! An append-only chain of blocks, each identified by a digest over its own
//! content and its predecessor's digest:
//! - **Blocks**: arbitrary JSON payloads, canonically hashed
//! - **Mining**: exact leading-zero-bit proof-of-work, cancellable
//! - **Verification**: any edit to history is reported with the block it hit
//! - **Snapshots**: flat JSON documents, restored verbatim
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hashledger::ledger::{payload_from_value, Chain};
//! use serde_json::json;
//!
//! fn main() -> hashledger::Result<()> {
//!     let mut chain = Chain::new(8)?;
//!     chain.append(payload_from_value(json!({"event_type": "login", "user_id": "u1"}))?)?;
//!
//!     let logins = chain.find_by("event_type", &json!("login"));
//!     println!("{} login events, valid: {}", logins.len(), chain.is_valid()?);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod crypto;
pub mod ledger;

#[cfg(any(test, feature = "tamper-probe"))]
pub mod testing;

pub use crate::core::error::{Error, Result};
