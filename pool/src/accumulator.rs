//! Reward accumulator: a reward-per-share index streamed at a fixed rate.
//!
//! The index only ever grows. Each account remembers the index value it was
//! last settled at, so its entitlement is `balance × (index − paid) / SCALE`
//! without ever iterating other accounts.

use crate::error::PoolError;
use crate::state::AccountState;
use serde::{Deserialize, Serialize};
use stakepool_types::{Timestamp, SCALE, U256};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAccumulator {
    /// Reward units emitted per second.
    pub reward_rate: u128,
    /// End of the current emission period.
    pub period_finish: Timestamp,
    /// Index value as of `last_update_time`, scaled by [`SCALE`].
    pub reward_per_token_stored: U256,
    pub last_update_time: Timestamp,
    /// Length of every emission period in seconds.
    pub rewards_duration: u64,
}

impl RewardAccumulator {
    pub fn new(rewards_duration: u64) -> Self {
        Self {
            reward_rate: 0,
            period_finish: Timestamp::EPOCH,
            reward_per_token_stored: U256::ZERO,
            last_update_time: Timestamp::EPOCH,
            rewards_duration,
        }
    }

    /// `min(now, period_finish)`.
    pub fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.period_finish)
    }

    /// Index value at `now` against the live `total_supply`.
    ///
    /// An empty pool freezes the index: nothing is streamed while nobody is
    /// staked. Growth saturates at [`U256::MAX`] rather than failing.
    pub fn reward_per_token(&self, total_supply: u128, now: Timestamp) -> U256 {
        let elapsed = self
            .last_update_time
            .elapsed_since(self.last_time_reward_applicable(now));
        let emitted = (elapsed as u128).saturating_mul(self.reward_rate);
        match U256::mul_div(emitted, SCALE, total_supply) {
            Some(delta) => self.reward_per_token_stored.saturating_add(delta),
            None => self.reward_per_token_stored,
        }
    }

    /// Global half of a checkpoint: fold elapsed emission into the stored
    /// index. Returns the new index.
    pub fn update(&mut self, total_supply: u128, now: Timestamp) -> U256 {
        self.reward_per_token_stored = self.reward_per_token(total_supply, now);
        self.last_update_time = self.last_time_reward_applicable(now);
        self.reward_per_token_stored
    }

    /// Account half of a checkpoint. Must follow [`RewardAccumulator::update`]
    /// and see the account's balance from before the pending mutation.
    pub fn settle(&self, account: &mut AccountState, balance: u128) {
        let owed = pending(balance, self.reward_per_token_stored, account.reward_per_token_paid);
        account.rewards = account.rewards.saturating_add(owed);
        account.reward_per_token_paid = self.reward_per_token_stored;
    }

    /// What a checkpoint at `now` would leave in `account.rewards`.
    pub fn earned(
        &self,
        account: &AccountState,
        balance: u128,
        total_supply: u128,
        now: Timestamp,
    ) -> u128 {
        let index = self.reward_per_token(total_supply, now);
        let owed = pending(balance, index, account.reward_per_token_paid);
        account.rewards.saturating_add(owed)
    }

    /// Start a new emission period of `reward`, rolling the unstreamed part
    /// of a running period into it. The caller checkpoints first.
    pub fn notify(&mut self, reward: u128, now: Timestamp) -> Result<(), PoolError> {
        let duration = self.rewards_duration as u128;
        if duration == 0 {
            return Err(PoolError::DivisionByZeroGuarded);
        }
        let total = if now >= self.period_finish {
            reward
        } else {
            let remaining = now.elapsed_since(self.period_finish) as u128;
            let leftover = remaining
                .checked_mul(self.reward_rate)
                .ok_or(PoolError::Overflow)?;
            reward.checked_add(leftover).ok_or(PoolError::Overflow)?
        };
        self.reward_rate = total / duration;
        self.last_update_time = now;
        self.period_finish = now.saturating_add(self.rewards_duration);
        Ok(())
    }

    /// Reward units the current rate streams over a full period.
    pub fn funding_required(&self) -> Result<u128, PoolError> {
        self.reward_rate
            .checked_mul(self.rewards_duration as u128)
            .ok_or(PoolError::Overflow)
    }
}

/// `balance × (index − paid) / SCALE`, saturating at `u128::MAX`. An
/// entitlement that large fails when claimed, never at the checkpoint.
fn pending(balance: u128, index: U256, paid: U256) -> u128 {
    index
        .saturating_sub(paid)
        .mul_div_floor(balance, SCALE)
        .unwrap_or(u128::MAX)
}
