//! Scenario files: who holds what, and the sequence of calls to replay.
//!
//! ```toml
//! start = 1700000000
//!
//! [[accounts]]
//! name = "alice"
//! staked = "1000000000000"
//!
//! [[steps]]
//! op = "set_reward_distribution"
//! caller = "owner"
//! account = "owner"
//!
//! [[steps]]
//! op = "notify"
//! caller = "owner"
//! amount = "1000000000000000000000"
//!
//! [[steps]]
//! op = "stake"
//! account = "alice"
//! amount = "1000000000000"
//!
//! [[steps]]
//! op = "advance"
//! secs = 3600
//! ```
//!
//! Amounts are decimal strings (or small integers) since TOML integers stop
//! at `i64`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

/// A token amount in base units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAmount", into = "String")]
pub struct Amount(pub u128);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Int(u64),
    Text(String),
}

impl TryFrom<RawAmount> for Amount {
    type Error = String;

    fn try_from(raw: RawAmount) -> Result<Self, Self::Error> {
        match raw {
            RawAmount::Int(n) => Ok(Self(n as u128)),
            RawAmount::Text(s) => {
                let digits: String = s.chars().filter(|c| *c != '_').collect();
                digits
                    .parse::<u128>()
                    .map(Self)
                    .map_err(|e| format!("bad amount {s:?}: {e}"))
            }
        }
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Starting balances of one participant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Funding {
    pub name: String,
    /// Staked-asset balance; fully approved to the pool.
    #[serde(default)]
    pub staked: Amount,
    #[serde(default)]
    pub reward: Amount,
}

/// One scripted action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetRewardDistribution {
        caller: String,
        account: String,
    },
    /// Notify a reward, first minting it to the pool unless `fund = false`.
    Notify {
        caller: String,
        amount: Amount,
        #[serde(default = "default_fund")]
        fund: bool,
    },
    Stake {
        account: String,
        amount: Amount,
    },
    Withdraw {
        account: String,
        amount: Amount,
    },
    GetReward {
        account: String,
    },
    Exit {
        account: String,
    },
    /// Grow the pool's staked holdings without a transfer (a rebase).
    Credit {
        amount: Amount,
    },
    /// Charge a reflected fee on staked-asset transfers. The pool is always
    /// exempt; `exempt` lists further accounts.
    SetFee {
        bps: u16,
        #[serde(default)]
        exempt: Vec<String>,
    },
    /// Move staked asset between participants directly on the ledger.
    Transfer {
        from: String,
        to: String,
        amount: Amount,
    },
    Advance {
        secs: u64,
    },
}

fn default_fund() -> bool {
    true
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetRewardDistribution { .. } => "set_reward_distribution",
            Self::Notify { .. } => "notify",
            Self::Stake { .. } => "stake",
            Self::Withdraw { .. } => "withdraw",
            Self::GetReward { .. } => "get_reward",
            Self::Exit { .. } => "exit",
            Self::Credit { .. } => "credit",
            Self::SetFee { .. } => "set_fee",
            Self::Transfer { .. } => "transfer",
            Self::Advance { .. } => "advance",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    /// Clock reading before the first step, in Unix seconds.
    #[serde(default)]
    pub start: u64,
    #[serde(default)]
    pub accounts: Vec<Funding>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(s)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        let mut seen = std::collections::BTreeSet::new();
        for funding in &self.accounts {
            if funding.name.trim().is_empty() {
                return Err(ScenarioError::Invalid("account with empty name".into()));
            }
            if !seen.insert(funding.name.as_str()) {
                return Err(ScenarioError::Invalid(format!(
                    "account {:?} listed twice",
                    funding.name
                )));
            }
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::Invalid("no steps".into()));
        }
        Ok(())
    }
}
