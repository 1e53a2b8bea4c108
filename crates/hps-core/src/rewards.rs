use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Rewards pool as wired into the ledger. Accrual is not modelled; only the
/// addresses it was deployed against are kept.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardsPool {
    address: Address,
    staking_token: Address,
    reward_token: Address,
}

impl RewardsPool {
    pub fn new(address: Address, staking_token: Address, reward_token: Address) -> Self {
        Self {
            address,
            staking_token,
            reward_token,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn staking_token(&self) -> Address {
        self.staking_token
    }

    pub fn reward_token(&self) -> Address {
        self.reward_token
    }
}
