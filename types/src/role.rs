//! Access-control roles checked by the pool's gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A privilege required by an administrative pool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May appoint the reward distributor.
    Owner,
    /// May notify new reward amounts.
    RewardDistribution,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::RewardDistribution => write!(f, "reward distribution"),
        }
    }
}
