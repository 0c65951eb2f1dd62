//! Diagnostic hooks that deliberately break chain integrity.
//!
//! Only compiled for unit tests or with the `tamper-probe` feature, so the
//! production [`Chain`](crate::ledger::Chain) API never exposes a mutation path.

pub mod tamper;

pub use tamper::{TamperProbe, TamperReport};
