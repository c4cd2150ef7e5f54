//! The asset ledger seam.
//!
//! The pool never holds token balances itself. Both the staked asset and the
//! reward asset live on external ledgers that the pool queries live and moves
//! funds through. Implementations may change balances at any time without the
//! pool's involvement (rebasing, fee reflection), and may call back into the
//! pool from inside a transfer.

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::AssetLedger;
