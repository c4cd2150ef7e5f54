//! The staking pool: checkpoint-then-mutate entry points over the reward
//! accumulator and the elastic share ledger.
//!
//! Every mutating call runs against a staged copy of the pool's global state
//! plus an overlay of the accounts it touches, inside a transaction on both
//! asset ledgers. Only a call that succeeds end to end publishes its staged
//! state, its ledger effects and its events; any error discards all three.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use stakepool_token::AssetLedger;
use stakepool_types::{AccountAddress, Role, Timestamp, U256};
use tracing::{debug, info, warn};

use crate::accumulator::RewardAccumulator;
use crate::config::{ConfigError, PoolConfig};
use crate::error::PoolError;
use crate::event::PoolEvent;
use crate::guard::{GuardState, ReentrancyGuard};
use crate::roles::Roles;
use crate::shares;
use crate::state::{AccountState, PoolState};

/// Outcome of [`StakingPool::exit`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExitReceipt {
    /// Staked-asset units returned.
    pub withdrawn: u128,
    /// Reward-asset units paid.
    pub reward: u128,
}

pub struct StakingPool {
    address: AccountAddress,
    staked: Rc<dyn AssetLedger>,
    reward: Rc<dyn AssetLedger>,
    require_funded_rewards: bool,
    state: RefCell<PoolState>,
    events: RefCell<Vec<PoolEvent>>,
    guard: ReentrancyGuard,
}

impl StakingPool {
    /// A fresh pool: no shares, no reward period.
    pub fn new(
        config: &PoolConfig,
        staked: Rc<dyn AssetLedger>,
        reward: Rc<dyn AssetLedger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = PoolState::new(config.owner.clone(), config.rewards_duration_secs);
        Ok(Self::assemble(config, state, staked, reward))
    }

    /// Rebuild a pool around previously persisted state. The role table and
    /// rewards duration come from `state`, not from `config`.
    pub fn restore(
        config: &PoolConfig,
        state: PoolState,
        staked: Rc<dyn AssetLedger>,
        reward: Rc<dyn AssetLedger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if state.summed_shares() != Some(state.total_shares) {
            return Err(ConfigError::Invalid(
                "snapshot share total does not match its accounts".into(),
            ));
        }
        Ok(Self::assemble(config, state, staked, reward))
    }

    fn assemble(
        config: &PoolConfig,
        state: PoolState,
        staked: Rc<dyn AssetLedger>,
        reward: Rc<dyn AssetLedger>,
    ) -> Self {
        Self {
            address: config.address.clone(),
            staked,
            reward,
            require_funded_rewards: config.require_funded_rewards,
            state: RefCell::new(state),
            events: RefCell::new(Vec::new()),
            guard: ReentrancyGuard::new(),
        }
    }

    // ── Mutating entry points ──────────────────────────────────────────

    /// Appoint the account allowed to notify rewards. Owner only.
    pub fn set_reward_distribution(
        &self,
        caller: &AccountAddress,
        account: AccountAddress,
    ) -> Result<(), PoolError> {
        self.execute("set_reward_distribution", |tx| {
            tx.require(caller, Role::Owner)?;
            tx.roles.reward_distribution = Some(account.clone());
            tx.events.push(PoolEvent::RewardDistributionSet { account });
            Ok(())
        })
    }

    /// Start (or top up) an emission period of `reward` units. Distributor only.
    pub fn notify_reward_amount(
        &self,
        caller: &AccountAddress,
        reward: u128,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.execute("notify_reward_amount", |tx| {
            tx.require(caller, Role::RewardDistribution)?;
            tx.checkpoint(None, now)?;
            tx.accumulator.notify(reward, now)?;
            if self.require_funded_rewards {
                let required = tx.accumulator.funding_required()?;
                let available = self.reward.balance_of(&self.address);
                if required > available {
                    return Err(PoolError::InsufficientRewardFunding { required, available });
                }
            }
            info!(
                reward,
                rate = tx.accumulator.reward_rate,
                period_finish = %tx.accumulator.period_finish,
                "reward notified"
            );
            tx.events.push(PoolEvent::RewardAdded { reward });
            Ok(())
        })
    }

    /// Deposit `amount` of the staked asset. Returns the shares minted.
    pub fn stake(
        &self,
        caller: &AccountAddress,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, PoolError> {
        self.execute("stake", |tx| tx.stake(caller, amount, now))
    }

    /// Withdraw `amount` of the staked asset. Returns the shares burned.
    pub fn withdraw(
        &self,
        caller: &AccountAddress,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, PoolError> {
        self.execute("withdraw", |tx| tx.withdraw(caller, amount, now))
    }

    /// Pay out the caller's accrued reward. Returns the amount paid, zero
    /// (with no transfer and no event) when nothing is owed.
    pub fn get_reward(&self, caller: &AccountAddress, now: Timestamp) -> Result<u128, PoolError> {
        self.execute("get_reward", |tx| tx.claim(caller, now))
    }

    /// Withdraw the caller's whole balance and claim, as one unit.
    pub fn exit(&self, caller: &AccountAddress, now: Timestamp) -> Result<ExitReceipt, PoolError> {
        self.execute("exit", |tx| {
            tx.check_clock(now)?;
            let withdrawn = tx.balance_of(caller)?;
            if withdrawn > 0 {
                tx.withdraw(caller, withdrawn, now)?;
            }
            let reward = tx.claim(caller, now)?;
            Ok(ExitReceipt { withdrawn, reward })
        })
    }

    fn execute<T>(
        &self,
        op: &'static str,
        body: impl FnOnce(&mut Staged<'_>) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let _entered = self.guard.enter().map_err(|e| {
            warn!(op, "rejected reentrant call");
            e
        })?;

        let mut tx = Staged::open(self);
        self.staked.begin();
        self.reward.begin();

        match body(&mut tx) {
            Ok(value) => {
                self.reward.commit();
                self.staked.commit();
                tx.publish();
                Ok(value)
            }
            Err(e) => {
                self.reward.rollback();
                self.staked.rollback();
                warn!(op, error = %e, "call rolled back");
                Err(e)
            }
        }
    }

    // ── Read-only surface ──────────────────────────────────────────────

    pub fn address(&self) -> &AccountAddress {
        &self.address
    }

    /// Staked-asset units the pool holds right now.
    pub fn total_supply(&self) -> u128 {
        self.staked.balance_of(&self.address)
    }

    /// `account`'s share of [`StakingPool::total_supply`].
    pub fn balance_of(&self, account: &AccountAddress) -> u128 {
        let state = self.state.borrow();
        // shares ≤ total_shares, so the value never exceeds the holdings
        shares::value_of(state.shares_of(account), state.total_shares, self.total_supply())
            .unwrap_or(0)
    }

    pub fn shares_of(&self, account: &AccountAddress) -> u128 {
        self.state.borrow().shares_of(account)
    }

    pub fn total_shares(&self) -> u128 {
        self.state.borrow().total_shares
    }

    pub fn reward_rate(&self) -> u128 {
        self.state.borrow().accumulator.reward_rate
    }

    pub fn period_finish(&self) -> Timestamp {
        self.state.borrow().accumulator.period_finish
    }

    pub fn last_update_time(&self) -> Timestamp {
        self.state.borrow().accumulator.last_update_time
    }

    pub fn rewards_duration(&self) -> u64 {
        self.state.borrow().accumulator.rewards_duration
    }

    pub fn reward_per_token_stored(&self) -> U256 {
        self.state.borrow().accumulator.reward_per_token_stored
    }

    pub fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        self.state.borrow().accumulator.last_time_reward_applicable(now)
    }

    /// Live index value.
    pub fn reward_per_token(&self, now: Timestamp) -> U256 {
        self.state
            .borrow()
            .accumulator
            .reward_per_token(self.total_supply(), now)
    }

    /// Reward a checkpoint at `now` would leave owed to `account`; saturates
    /// instead of failing.
    pub fn earned(&self, account: &AccountAddress, now: Timestamp) -> u128 {
        let balance = self.balance_of(account);
        let state = self.state.borrow();
        let empty = AccountState::default();
        let record = state.account(account).unwrap_or(&empty);
        state
            .accumulator
            .earned(record, balance, self.total_supply(), now)
    }

    pub fn user_reward_per_token_paid(&self, account: &AccountAddress) -> U256 {
        self.state
            .borrow()
            .account(account)
            .map_or(U256::ZERO, |a| a.reward_per_token_paid)
    }

    /// Rewards settled at the account's last checkpoint.
    pub fn rewards(&self, account: &AccountAddress) -> u128 {
        self.state.borrow().account(account).map_or(0, |a| a.rewards)
    }

    pub fn owner(&self) -> AccountAddress {
        self.state.borrow().roles.owner.clone()
    }

    pub fn reward_distribution(&self) -> Option<AccountAddress> {
        self.state.borrow().roles.reward_distribution.clone()
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    /// A copy of the committed state, e.g. for persistence.
    pub fn snapshot(&self) -> PoolState {
        self.state.borrow().clone()
    }

    /// Take every event committed since the last drain.
    pub fn drain_events(&self) -> Vec<PoolEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

/// One call's working set: globals copied from the committed state and the
/// accounts the call has touched so far.
struct Staged<'a> {
    pool: &'a StakingPool,
    accumulator: RewardAccumulator,
    total_shares: u128,
    roles: Roles,
    touched: BTreeMap<AccountAddress, AccountState>,
    events: Vec<PoolEvent>,
}

impl<'a> Staged<'a> {
    fn open(pool: &'a StakingPool) -> Self {
        let state = pool.state.borrow();
        Self {
            pool,
            accumulator: state.accumulator.clone(),
            total_shares: state.total_shares,
            roles: state.roles.clone(),
            touched: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn publish(self) {
        let mut state = self.pool.state.borrow_mut();
        state.accumulator = self.accumulator;
        state.total_shares = self.total_shares;
        state.roles = self.roles;
        for (address, account) in self.touched {
            state.store_account(address, account);
        }
        self.pool.events.borrow_mut().extend(self.events);
    }

    fn require(&self, caller: &AccountAddress, role: Role) -> Result<(), PoolError> {
        if self.roles.is_authorized(caller, role) {
            Ok(())
        } else {
            Err(PoolError::Unauthorized(role))
        }
    }

    fn check_clock(&self, now: Timestamp) -> Result<(), PoolError> {
        let last_update = self.accumulator.last_update_time;
        if now < last_update {
            return Err(PoolError::StaleTimestamp { now, last_update });
        }
        Ok(())
    }

    fn holdings(&self) -> u128 {
        self.pool.staked.balance_of(&self.pool.address)
    }

    fn account(&self, address: &AccountAddress) -> AccountState {
        match self.touched.get(address) {
            Some(account) => account.clone(),
            None => self
                .pool
                .state
                .borrow()
                .account(address)
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn account_mut(&mut self, address: &AccountAddress) -> &mut AccountState {
        if !self.touched.contains_key(address) {
            let account = self.account(address);
            self.touched.insert(address.clone(), account);
        }
        self.touched.entry(address.clone()).or_default()
    }

    fn balance_of(&self, address: &AccountAddress) -> Result<u128, PoolError> {
        shares::value_of(self.account(address).shares, self.total_shares, self.holdings())
    }

    /// Fold elapsed emission into the index, then settle `account` against
    /// its current (pre-mutation) balance.
    fn checkpoint(&mut self, account: Option<&AccountAddress>, now: Timestamp) -> Result<(), PoolError> {
        self.check_clock(now)?;
        let supply = self.holdings();
        let index = self.accumulator.update(supply, now);
        if let Some(address) = account {
            let balance = self.balance_of(address)?;
            let accumulator = self.accumulator.clone();
            let record = self.account_mut(address);
            accumulator.settle(record, balance);
            debug!(account = %address, balance, %index, rewards = record.rewards, "checkpoint");
        } else {
            debug!(supply, %index, "global checkpoint");
        }
        Ok(())
    }

    fn stake(&mut self, caller: &AccountAddress, amount: u128, now: Timestamp) -> Result<u128, PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.checkpoint(Some(caller), now)?;

        let pool = self.pool;
        let holdings_before = self.holdings();
        pool.staked
            .transfer_from(&pool.address, caller, &pool.address, amount)?;
        // A fee-charging asset may deliver less than `amount`; mint only for
        // what arrived, priced before it arrived.
        let credited = self.holdings().saturating_sub(holdings_before);

        let minted = shares::shares_for_deposit(credited, self.total_shares, holdings_before)?;
        if minted == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.total_shares = self
            .total_shares
            .checked_add(minted)
            .ok_or(PoolError::Overflow)?;
        let record = self.account_mut(caller);
        record.shares = record.shares.checked_add(minted).ok_or(PoolError::Overflow)?;

        info!(account = %caller, amount, credited, minted, "staked");
        self.events.push(PoolEvent::Staked {
            account: caller.clone(),
            amount,
        });
        Ok(minted)
    }

    fn withdraw(&mut self, caller: &AccountAddress, amount: u128, now: Timestamp) -> Result<u128, PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        self.checkpoint(Some(caller), now)?;

        let available = self.balance_of(caller)?;
        if amount > available {
            return Err(PoolError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let burned = shares::shares_for_withdrawal(amount, self.total_shares, self.holdings())?;
        let record = self.account_mut(caller);
        record.shares = record.shares.checked_sub(burned).ok_or(PoolError::Overflow)?;
        self.total_shares = self
            .total_shares
            .checked_sub(burned)
            .ok_or(PoolError::Overflow)?;

        let pool = self.pool;
        pool.staked.transfer(&pool.address, caller, amount)?;

        info!(account = %caller, amount, burned, "withdrawn");
        self.events.push(PoolEvent::Withdrawn {
            account: caller.clone(),
            amount,
        });
        Ok(burned)
    }

    fn claim(&mut self, caller: &AccountAddress, now: Timestamp) -> Result<u128, PoolError> {
        self.checkpoint(Some(caller), now)?;

        let record = self.account_mut(caller);
        let reward = record.rewards;
        if reward == 0 {
            return Ok(0);
        }
        record.rewards = 0;

        let pool = self.pool;
        pool.reward.transfer(&pool.address, caller, reward)?;

        info!(account = %caller, reward, "reward paid");
        self.events.push(PoolEvent::RewardPaid {
            account: caller.clone(),
            reward,
        });
        Ok(reward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakepool_nullables::NullLedger;

    const DAY: u64 = 86_400;

    fn addr(name: &str) -> AccountAddress {
        AccountAddress::new(name)
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    struct Fixture {
        pool: StakingPool,
        staked: Rc<NullLedger>,
        reward: Rc<NullLedger>,
    }

    fn fixture() -> Fixture {
        let staked = Rc::new(NullLedger::new());
        let reward = Rc::new(NullLedger::new());
        let config = PoolConfig::with_duration(DAY);
        let pool = StakingPool::new(&config, staked.clone(), reward.clone()).unwrap();
        Fixture { pool, staked, reward }
    }

    fn fund_staker(f: &Fixture, who: &str, amount: u128) -> AccountAddress {
        let account = addr(who);
        f.staked.mint(&account, amount);
        f.staked.approve(&account, f.pool.address(), amount);
        account
    }

    #[test]
    fn stake_mints_one_to_one_then_at_price() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 1_000);
        let bob = fund_staker(&f, "bob", 1_000);

        assert_eq!(f.pool.stake(&alice, 1_000, ts(1)).unwrap(), 1_000);
        f.staked.mint(f.pool.address(), 1_000);
        assert_eq!(f.pool.stake(&bob, 1_000, ts(2)).unwrap(), 500);

        assert_eq!(f.pool.total_supply(), 3_000);
        assert_eq!(f.pool.balance_of(&alice), 2_000);
        assert_eq!(f.pool.balance_of(&bob), 1_000);
        assert_eq!(f.pool.total_shares(), 1_500);
    }

    #[test]
    fn zero_amounts_are_rejected() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 10);
        assert_eq!(f.pool.stake(&alice, 0, ts(1)), Err(PoolError::InvalidAmount));
        assert_eq!(f.pool.withdraw(&alice, 0, ts(1)), Err(PoolError::InvalidAmount));
    }

    #[test]
    fn withdraw_more_than_balance_fails_without_side_effects() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 100);
        f.pool.stake(&alice, 100, ts(1)).unwrap();
        f.pool.drain_events();

        let err = f.pool.withdraw(&alice, 101, ts(2)).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientBalance {
                requested: 101,
                available: 100
            }
        );
        assert_eq!(f.pool.shares_of(&alice), 100);
        assert_eq!(f.staked.balance_of(&alice), 0);
        assert!(f.pool.drain_events().is_empty());
    }

    #[test]
    fn failed_pull_leaves_no_shares() {
        let f = fixture();
        let alice = addr("alice");
        f.staked.mint(&alice, 100);
        // no approval
        let err = f.pool.stake(&alice, 100, ts(1)).unwrap_err();
        assert!(matches!(err, PoolError::TransferFailed(_)));
        assert_eq!(f.pool.total_shares(), 0);
        assert!(f.pool.snapshot().accounts.is_empty());
    }

    #[test]
    fn notify_requires_distribution_role() {
        let f = fixture();
        let owner = f.pool.owner();
        assert_eq!(
            f.pool.notify_reward_amount(&owner, 1_000, ts(1)),
            Err(PoolError::Unauthorized(Role::RewardDistribution))
        );
        assert_eq!(
            f.pool.set_reward_distribution(&addr("mallory"), addr("mallory")),
            Err(PoolError::Unauthorized(Role::Owner))
        );

        f.pool.set_reward_distribution(&owner, owner.clone()).unwrap();
        f.pool.notify_reward_amount(&owner, 86_400_000, ts(1)).unwrap();
        assert_eq!(f.pool.reward_rate(), 1_000);
        assert_eq!(f.pool.last_update_time(), ts(1));
        assert_eq!(f.pool.period_finish(), ts(1 + DAY));
        assert_eq!(
            f.pool.drain_events(),
            vec![
                PoolEvent::RewardDistributionSet { account: owner.clone() },
                PoolEvent::RewardAdded { reward: 86_400_000 },
            ]
        );
    }

    #[test]
    fn reappointing_the_distributor_revokes_the_previous_one() {
        let f = fixture();
        let owner = f.pool.owner();
        f.pool.set_reward_distribution(&owner, addr("first")).unwrap();
        f.pool.set_reward_distribution(&owner, addr("second")).unwrap();

        assert_eq!(f.pool.reward_distribution(), Some(addr("second")));
        assert_eq!(
            f.pool.notify_reward_amount(&addr("first"), 1_000, ts(1)),
            Err(PoolError::Unauthorized(Role::RewardDistribution))
        );
        f.pool.notify_reward_amount(&addr("second"), 86_400, ts(1)).unwrap();
        assert_eq!(f.pool.reward_rate(), 1);
    }

    #[test]
    fn funded_reward_check_is_opt_in() {
        let staked = Rc::new(NullLedger::new());
        let reward = Rc::new(NullLedger::new());
        let config = PoolConfig {
            require_funded_rewards: true,
            ..PoolConfig::with_duration(DAY)
        };
        let pool = StakingPool::new(&config, staked, reward.clone()).unwrap();
        let owner = pool.owner();
        pool.set_reward_distribution(&owner, owner.clone()).unwrap();

        let err = pool.notify_reward_amount(&owner, 86_400, ts(1)).unwrap_err();
        assert_eq!(
            err,
            PoolError::InsufficientRewardFunding {
                required: 86_400,
                available: 0
            }
        );
        assert_eq!(pool.reward_rate(), 0);

        reward.mint(pool.address(), 86_400);
        pool.notify_reward_amount(&owner, 86_400, ts(1)).unwrap();
        assert_eq!(pool.reward_rate(), 1);
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let f = fixture();
        let owner = f.pool.owner();
        f.pool.set_reward_distribution(&owner, owner.clone()).unwrap();
        f.pool.notify_reward_amount(&owner, 1, ts(100)).unwrap();
        let alice = fund_staker(&f, "alice", 10);
        assert_eq!(
            f.pool.stake(&alice, 10, ts(99)),
            Err(PoolError::StaleTimestamp {
                now: ts(99),
                last_update: ts(100)
            })
        );
    }

    #[test]
    fn zero_reward_claim_is_a_no_op() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 10);
        f.pool.stake(&alice, 10, ts(1)).unwrap();
        f.pool.drain_events();

        assert_eq!(f.pool.get_reward(&alice, ts(5)).unwrap(), 0);
        assert!(f.pool.drain_events().is_empty());
        assert_eq!(f.reward.transfer_count(), 0);
    }

    #[test]
    fn stake_into_drained_pool_is_guarded() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 10);
        let bob = fund_staker(&f, "bob", 10);
        f.pool.stake(&alice, 10, ts(1)).unwrap();
        f.staked.burn(f.pool.address(), 10);

        assert_eq!(f.pool.balance_of(&alice), 0);
        assert_eq!(f.pool.stake(&bob, 10, ts(2)), Err(PoolError::DivisionByZeroGuarded));
        assert_eq!(f.staked.balance_of(&bob), 10);
    }

    #[test]
    fn dust_deposit_minting_nothing_is_rejected() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 1);
        let bob = fund_staker(&f, "bob", 1);
        f.pool.stake(&alice, 1, ts(1)).unwrap();
        f.staked.mint(f.pool.address(), 1_000);

        assert_eq!(f.pool.stake(&bob, 1, ts(2)), Err(PoolError::InvalidAmount));
        assert_eq!(f.staked.balance_of(&bob), 1);
    }

    #[test]
    fn snapshot_restores_an_equivalent_pool() {
        let f = fixture();
        let alice = fund_staker(&f, "alice", 500);
        let owner = f.pool.owner();
        f.pool.set_reward_distribution(&owner, owner.clone()).unwrap();
        f.reward.mint(f.pool.address(), DAY as u128);
        f.pool.notify_reward_amount(&owner, DAY as u128, ts(0)).unwrap();
        f.pool.stake(&alice, 500, ts(0)).unwrap();

        let bytes = f.pool.snapshot().encode().unwrap();
        let restored = StakingPool::restore(
            &PoolConfig::with_duration(DAY),
            PoolState::decode(&bytes).unwrap(),
            f.staked.clone(),
            f.reward.clone(),
        )
        .unwrap();

        assert_eq!(restored.balance_of(&alice), 500);
        assert_eq!(restored.earned(&alice, ts(100)), f.pool.earned(&alice, ts(100)));
        assert_eq!(restored.reward_distribution(), Some(owner));
    }
}
