//! Observable pool events.

use serde::{Deserialize, Serialize};
use stakepool_types::AccountAddress;

/// Emitted by committed calls only; a rolled-back call emits nothing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoolEvent {
    RewardAdded { reward: u128 },
    Staked { account: AccountAddress, amount: u128 },
    Withdrawn { account: AccountAddress, amount: u128 },
    RewardPaid { account: AccountAddress, reward: u128 },
    RewardDistributionSet { account: AccountAddress },
}
