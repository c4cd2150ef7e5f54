//! Access-control gate for administrative calls.

use serde::{Deserialize, Serialize};
use stakepool_types::{AccountAddress, Role};

/// The pool's own role table: a fixed owner and an owner-appointed reward
/// distributor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub owner: AccountAddress,
    pub reward_distribution: Option<AccountAddress>,
}

impl Roles {
    pub fn new(owner: AccountAddress) -> Self {
        Self {
            owner,
            reward_distribution: None,
        }
    }

    /// May `caller` act as `role`?
    pub fn is_authorized(&self, caller: &AccountAddress, role: Role) -> bool {
        match role {
            Role::Owner => *caller == self.owner,
            Role::RewardDistribution => self.reward_distribution.as_ref() == Some(caller),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributor_unset_authorizes_nobody() {
        let owner = AccountAddress::new("owner");
        let roles = Roles::new(owner.clone());
        assert!(roles.is_authorized(&owner, Role::Owner));
        assert!(!roles.is_authorized(&owner, Role::RewardDistribution));
    }

    #[test]
    fn owner_is_not_implicitly_distributor() {
        let owner = AccountAddress::new("owner");
        let other = AccountAddress::new("other");
        let mut roles = Roles::new(owner.clone());
        roles.reward_distribution = Some(other.clone());
        assert!(roles.is_authorized(&other, Role::RewardDistribution));
        assert!(!roles.is_authorized(&owner, Role::RewardDistribution));
        assert!(!roles.is_authorized(&other, Role::Owner));
    }
}
