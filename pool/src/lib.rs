//! Staking pool engine.
//!
//! Streams a reward asset to stakers in proportion to their share of a staked
//! asset whose pool balance can grow on its own (rebasing / fee reflection).
//!
//! Two pieces of accounting cooperate over one [`PoolState`]:
//! - the [`RewardAccumulator`], a reward-per-share index advanced at a fixed
//!   rate over an emission period;
//! - the elastic share ledger ([`shares`]), which prices shares against the
//!   pool's live holdings on every query.
//!
//! Every mutating call checkpoints reward accrual against current balances
//! before it changes balances or the rate, and either commits completely or
//! leaves no trace.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod event;
pub mod guard;
pub mod pool;
pub mod roles;
pub mod shares;
pub mod state;

pub use accumulator::RewardAccumulator;
pub use config::{ConfigError, PoolConfig};
pub use error::PoolError;
pub use event::PoolEvent;
pub use guard::{GuardState, ReentrancyGuard};
pub use pool::{ExitReceipt, StakingPool};
pub use roles::Roles;
pub use state::{AccountState, PoolState};
