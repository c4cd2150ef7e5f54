//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the pool (time, asset ledgers) are abstracted
//! behind traits or explicit parameters. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including misbehaving on demand
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::{NullLedger, TransferHook, TransferRecord};
