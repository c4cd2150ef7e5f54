//! Pool-level errors.

use stakepool_token::LedgerError;
use stakepool_types::{Role, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("caller lacks the {0} role")]
    Unauthorized(Role),

    #[error("amount must be non-zero and mint at least one share")]
    InvalidAmount,

    #[error("insufficient staked balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u128, available: u128 },

    #[error("ledger transfer failed: {0}")]
    TransferFailed(#[from] LedgerError),

    #[error("share price undefined: pool holds no staked asset against outstanding shares")]
    DivisionByZeroGuarded,

    #[error("pool is already executing a call")]
    Reentrant,

    #[error("reward funding too low: need {required}, pool holds {available}")]
    InsufficientRewardFunding { required: u128, available: u128 },

    #[error("timestamp {now} precedes last update at {last_update}")]
    StaleTimestamp { now: Timestamp, last_update: Timestamp },

    #[error("arithmetic overflow in pool accounting")]
    Overflow,

    #[error("state codec error: {0}")]
    Codec(String),
}
