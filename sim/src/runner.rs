//! Replays a [`Scenario`] against a fresh pool over nullable ledgers.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use stakepool_nullables::{NullClock, NullLedger};
use stakepool_pool::{ConfigError, PoolConfig, PoolError, PoolEvent, PoolState, StakingPool};
use stakepool_token::AssetLedger;
use stakepool_types::{AccountAddress, AddressError, Timestamp};
use tracing::{debug, info};

use crate::scenario::{Scenario, Step};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bad account name: {0}")]
    Address(#[from] AddressError),
}

/// What one step did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    pub at: u64,
    /// The call's return value as a decimal string, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub name: String,
    /// Pool balance, priced at the final holdings.
    pub balance: String,
    pub shares: String,
    pub earned: String,
    pub wallet_staked: String,
    pub wallet_reward: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub now: u64,
    pub total_supply: String,
    pub total_shares: String,
    pub reward_rate: String,
    pub period_finish: u64,
    pub reward_per_token: String,
    pub reward_balance: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub events: Vec<PoolEvent>,
    pub pool: PoolSummary,
    pub accounts: Vec<AccountReport>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Result of a replay: the report plus the pool's final committed state.
pub struct Replay {
    pub report: Report,
    pub state: PoolState,
}

struct Sim {
    pool: StakingPool,
    staked: Rc<NullLedger>,
    reward: Rc<NullLedger>,
    clock: NullClock,
    names: BTreeMap<String, AccountAddress>,
}

impl Sim {
    fn address(&mut self, name: &str) -> Result<AccountAddress, AddressError> {
        if let Some(address) = self.names.get(name) {
            return Ok(address.clone());
        }
        let address = AccountAddress::parse(name)?;
        self.names.insert(name.to_string(), address.clone());
        Ok(address)
    }

    fn apply(&mut self, step: &Step) -> Result<Option<u128>, String> {
        let now = self.clock.now();
        let pool_err = |e: PoolError| e.to_string();
        let addr_err = |e: AddressError| e.to_string();
        match step {
            Step::SetRewardDistribution { caller, account } => {
                let caller = self.address(caller).map_err(addr_err)?;
                let account = self.address(account).map_err(addr_err)?;
                self.pool
                    .set_reward_distribution(&caller, account)
                    .map_err(pool_err)?;
                Ok(None)
            }
            Step::Notify {
                caller,
                amount,
                fund,
            } => {
                let caller = self.address(caller).map_err(addr_err)?;
                if *fund {
                    self.reward.mint(self.pool.address(), amount.0);
                }
                self.pool
                    .notify_reward_amount(&caller, amount.0, now)
                    .map_err(pool_err)?;
                Ok(None)
            }
            Step::Stake { account, amount } => {
                let account = self.address(account).map_err(addr_err)?;
                self.pool.stake(&account, amount.0, now).map(Some).map_err(pool_err)
            }
            Step::Withdraw { account, amount } => {
                let account = self.address(account).map_err(addr_err)?;
                self.pool
                    .withdraw(&account, amount.0, now)
                    .map(Some)
                    .map_err(pool_err)
            }
            Step::GetReward { account } => {
                let account = self.address(account).map_err(addr_err)?;
                self.pool.get_reward(&account, now).map(Some).map_err(pool_err)
            }
            Step::Exit { account } => {
                let account = self.address(account).map_err(addr_err)?;
                let receipt = self.pool.exit(&account, now).map_err(pool_err)?;
                Ok(Some(receipt.withdrawn))
            }
            Step::Credit { amount } => {
                self.staked.mint(self.pool.address(), amount.0);
                Ok(None)
            }
            Step::SetFee { bps, exempt } => {
                self.staked.set_fee_bps(*bps);
                self.staked.exempt_from_fee(self.pool.address());
                for name in exempt {
                    let account = self.address(name).map_err(addr_err)?;
                    self.staked.exempt_from_fee(&account);
                }
                Ok(None)
            }
            Step::Transfer { from, to, amount } => {
                let from = self.address(from).map_err(addr_err)?;
                let to = self.address(to).map_err(addr_err)?;
                self.staked
                    .transfer(&from, &to, amount.0)
                    .map_err(|e| e.to_string())?;
                Ok(None)
            }
            Step::Advance { secs } => {
                self.clock.advance(*secs);
                Ok(None)
            }
        }
    }

    fn summary(&self) -> PoolSummary {
        let now = self.clock.now();
        PoolSummary {
            now: now.as_secs(),
            total_supply: self.pool.total_supply().to_string(),
            total_shares: self.pool.total_shares().to_string(),
            reward_rate: self.pool.reward_rate().to_string(),
            period_finish: self.pool.period_finish().as_secs(),
            reward_per_token: self.pool.reward_per_token(now).to_string(),
            reward_balance: self.reward.balance_of(self.pool.address()).to_string(),
        }
    }

    fn account_reports(&self) -> Vec<AccountReport> {
        let now = self.clock.now();
        self.names
            .iter()
            .filter(|(_, address)| *address != self.pool.address())
            .map(|(name, address)| AccountReport {
                name: name.clone(),
                balance: self.pool.balance_of(address).to_string(),
                shares: self.pool.shares_of(address).to_string(),
                earned: self.pool.earned(address, now).to_string(),
                wallet_staked: self.staked.balance_of(address).to_string(),
                wallet_reward: self.reward.balance_of(address).to_string(),
            })
            .collect()
    }
}

/// Run every step in order. A failing step is recorded and the replay
/// carries on; only setup errors abort.
pub fn run(config: &PoolConfig, scenario: &Scenario) -> Result<Replay, RunError> {
    let staked = Rc::new(NullLedger::new());
    let reward = Rc::new(NullLedger::new());
    let pool = StakingPool::new(config, staked.clone(), reward.clone())?;

    let mut sim = Sim {
        pool,
        staked,
        reward,
        clock: NullClock::new(scenario.start),
        names: BTreeMap::new(),
    };
    let owner = config.owner.clone();
    sim.names.insert(owner.to_string(), owner);

    for funding in &scenario.accounts {
        let account = sim.address(&funding.name)?;
        sim.staked.mint(&account, funding.staked.0);
        sim.staked.approve(&account, sim.pool.address(), u128::MAX);
        sim.reward.mint(&account, funding.reward.0);
    }
    info!(
        accounts = scenario.accounts.len(),
        steps = scenario.steps.len(),
        start = %Timestamp::new(scenario.start),
        "replaying scenario"
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let at = sim.clock.now().as_secs();
        let outcome = sim.apply(step);
        debug!(index, op = step.name(), ?outcome, "step");
        let (value, error) = match outcome {
            Ok(value) => (value.map(|v| v.to_string()), None),
            Err(e) => (None, Some(e)),
        };
        steps.push(StepOutcome {
            index,
            op: step.name(),
            at,
            value,
            error,
        });
    }

    let report = Report {
        steps,
        events: sim.pool.drain_events(),
        pool: sim.summary(),
        accounts: sim.account_reports(),
    };
    Ok(Replay {
        report,
        state: sim.pool.snapshot(),
    })
}
