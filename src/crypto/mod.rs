//! Cryptographic utilities for the ledger.
//!
//! Provides the digest functions blocks are hashed with and the canonical
//! JSON encoding that forms the hash pre-image.

pub mod canonical;
pub mod hashing;

pub use canonical::{canonicalize, to_canonical_vec};
pub use hashing::{sha256, sha3_256, HashAlgorithm};
