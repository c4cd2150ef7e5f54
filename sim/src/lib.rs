//! Scenario replay for the staking pool.
//!
//! A scenario lists starting balances and a sequence of pool calls, ledger
//! effects and clock moves. [`run`] replays it against in-memory ledgers and
//! returns a [`Report`] of every step's outcome, the committed events and
//! the final balances.

pub mod runner;
pub mod scenario;

pub use runner::{run, AccountReport, PoolSummary, Replay, Report, RunError, StepOutcome};
pub use scenario::{Amount, Funding, Scenario, ScenarioError, Step};
