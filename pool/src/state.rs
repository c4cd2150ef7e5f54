//! Persistent pool state: the accumulator, the share totals, roles and the
//! per-account ledger.

use crate::accumulator::RewardAccumulator;
use crate::error::PoolError;
use crate::roles::Roles;
use serde::{Deserialize, Serialize};
use stakepool_types::{AccountAddress, U256};
use std::collections::BTreeMap;

/// Per-account accounting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Claim on the pool's staked holdings, in shares (not asset units).
    pub shares: u128,
    /// Index value at this account's last checkpoint.
    pub reward_per_token_paid: U256,
    /// Reward units accrued and not yet paid out.
    pub rewards: u128,
}

impl AccountState {
    /// No shares and nothing owed: indistinguishable from an absent account.
    pub fn is_empty(&self) -> bool {
        self.shares == 0 && self.rewards == 0
    }
}

/// Everything the pool persists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub accumulator: RewardAccumulator,
    /// Sum of `shares` over all accounts.
    pub total_shares: u128,
    pub roles: Roles,
    pub accounts: BTreeMap<AccountAddress, AccountState>,
}

impl PoolState {
    pub fn new(owner: AccountAddress, rewards_duration: u64) -> Self {
        Self {
            accumulator: RewardAccumulator::new(rewards_duration),
            total_shares: 0,
            roles: Roles::new(owner),
            accounts: BTreeMap::new(),
        }
    }

    pub fn account(&self, address: &AccountAddress) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    pub fn shares_of(&self, address: &AccountAddress) -> u128 {
        self.accounts.get(address).map_or(0, |a| a.shares)
    }

    /// Write back an account, dropping it if it no longer holds anything.
    pub fn store_account(&mut self, address: AccountAddress, account: AccountState) {
        if account.is_empty() {
            self.accounts.remove(&address);
        } else {
            self.accounts.insert(address, account);
        }
    }

    /// Recompute `Σ shares` from the account map.
    ///
    /// Consistency check for tests and restored snapshots; the engine keeps
    /// `total_shares` incrementally.
    pub fn summed_shares(&self) -> Option<u128> {
        self.accounts
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.shares))
    }

    /// Serialize for durable storage.
    pub fn encode(&self) -> Result<Vec<u8>, PoolError> {
        bincode::serialize(self).map_err(|e| PoolError::Codec(e.to_string()))
    }

    /// Restore from [`PoolState::encode`] output, rejecting snapshots whose
    /// share total disagrees with the account map.
    pub fn decode(bytes: &[u8]) -> Result<Self, PoolError> {
        let state: Self =
            bincode::deserialize(bytes).map_err(|e| PoolError::Codec(e.to_string()))?;
        if state.summed_shares() != Some(state.total_shares) {
            return Err(PoolError::Codec(format!(
                "total_shares {} does not match account shares",
                state.total_shares
            )));
        }
        Ok(state)
    }
}
