#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use stakepool_nullables::{NullClock, NullLedger};
use stakepool_pool::{GuardState, PoolConfig, StakingPool};
use stakepool_token::AssetLedger;
use stakepool_types::AccountAddress;

#[derive(Arbitrary, Debug)]
enum Op {
    Stake { who: u8, amount: u64 },
    Withdraw { who: u8, amount: u64 },
    GetReward { who: u8 },
    Exit { who: u8 },
    Notify { amount: u64 },
    Grow { amount: u32 },
    Shrink { amount: u32 },
    Fee { bps: u16 },
    Advance { secs: u16 },
}

const STAKERS: usize = 4;

// Drive the pool with arbitrary call sequences over a misbehaving staked
// asset. No call may panic, committed state must stay consistent, and a
// staker can always withdraw up to their own balance.
fuzz_target!(|ops: Vec<Op>| {
    let staked = Rc::new(NullLedger::new());
    let reward = Rc::new(NullLedger::new());
    let config = PoolConfig::with_duration(3_600);
    let owner = config.owner.clone();
    let Ok(pool) = StakingPool::new(&config, staked.clone(), reward.clone()) else {
        return;
    };
    let _ = pool.set_reward_distribution(&owner, owner.clone());

    let accounts: Vec<_> = (0..STAKERS)
        .map(|i| {
            let account = AccountAddress::new(format!("staker{i}"));
            staked.mint(&account, u64::MAX as u128 * 64);
            staked.approve(&account, pool.address(), u128::MAX);
            account
        })
        .collect();
    let clock = NullClock::new(0);

    for op in ops.iter().take(256) {
        let now = clock.now();
        match *op {
            Op::Stake { who, amount } => {
                let _ = pool.stake(&accounts[who as usize % STAKERS], amount as u128, now);
            }
            Op::Withdraw { who, amount } => {
                let account = &accounts[who as usize % STAKERS];
                let owned = pool.balance_of(account);
                let result = pool.withdraw(account, amount as u128, now);
                if amount > 0 && amount as u128 <= owned {
                    assert!(result.is_ok(), "withdraw {amount} of {owned}: {result:?}");
                }
            }
            Op::GetReward { who } => {
                let _ = pool.get_reward(&accounts[who as usize % STAKERS], now);
            }
            Op::Exit { who } => {
                let _ = pool.exit(&accounts[who as usize % STAKERS], now);
            }
            Op::Notify { amount } => {
                reward.mint(pool.address(), amount as u128);
                let _ = pool.notify_reward_amount(&owner, amount as u128, now);
            }
            Op::Grow { amount } => staked.mint(pool.address(), amount as u128),
            Op::Shrink { amount } => staked.burn(pool.address(), amount as u128),
            Op::Fee { bps } => staked.set_fee_bps(bps % 2_000),
            Op::Advance { secs } => clock.advance(secs as u64),
        }

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.summed_shares(), Some(snapshot.total_shares));
        assert_eq!(pool.guard_state(), GuardState::Idle);
        assert_eq!(staked.journal_depth(), 0);
        assert_eq!(reward.journal_depth(), 0);

        let sum: u128 = accounts.iter().map(|a| pool.balance_of(a)).sum();
        assert!(sum <= staked.balance_of(pool.address()));

        let _ = pool.reward_per_token(now);
        for account in &accounts {
            let _ = pool.earned(account, now);
        }
    }
});
