use serde::{Deserialize, Serialize};

use crate::{
    chain::{Call, Chain, WorldState},
    custody::{CustodyAsset, Token},
    error::ChainError,
    ledger::{LedgerWiring, StakingLedger},
    registry::EscrowRegistry,
    rewards::RewardsPool,
    types::{Address, Amount},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployOptions {
    pub auto_fund_on_stake: bool,
    /// Custody balances minted by the deployer right after deployment.
    pub seed_balances: Vec<(Address, Amount)>,
}

/// Addresses produced by a deployment.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSummary {
    pub operator: Address,
    pub token: Address,
    pub staking_token: Address,
    pub escrow_factory: Address,
    pub rewards_pool: Address,
    pub staking: Address,
}

/// Deploy token, staking token, escrow factory, rewards pool and ledger in
/// that order, wiring each into the next, then seed custody balances.
pub fn deploy(
    operator: Address,
    options: &DeployOptions,
) -> Result<(Chain, DeploymentSummary), ChainError> {
    let mut nonce = 0u64;
    let mut next_address = || {
        let address = Address::contract(&operator, nonce);
        nonce += 1;
        address
    };

    let mut token = Token::new(next_address(), "HMT");
    token.add_minter(operator);
    let mut staking_token = Token::new(next_address(), "HMTS");
    staking_token.add_minter(operator);
    let registry = EscrowRegistry::new(next_address(), token.address());
    let rewards_pool = RewardsPool::new(next_address(), staking_token.address(), token.address());
    let ledger = StakingLedger::new(
        next_address(),
        LedgerWiring {
            operator,
            custody: token.address(),
            registry: registry.address(),
            rewards_pool: rewards_pool.address(),
            auto_fund_on_stake: options.auto_fund_on_stake,
        },
    );
    if options.auto_fund_on_stake {
        token.add_minter(ledger.address());
    }

    let summary = DeploymentSummary {
        operator,
        token: token.address(),
        staking_token: staking_token.address(),
        escrow_factory: registry.address(),
        rewards_pool: rewards_pool.address(),
        staking: ledger.address(),
    };
    let mut chain = Chain::new(WorldState {
        token,
        staking_token,
        registry,
        rewards_pool,
        ledger,
    });

    for (account, amount) in &options.seed_balances {
        chain.transact(
            operator,
            Call::Mint {
                to: *account,
                amount: *amount,
            },
        )?;
    }
    tracing::info!(
        staking = %summary.staking,
        token = %summary.token,
        factory = %summary.escrow_factory,
        seeded = options.seed_balances.len(),
        "contracts deployed"
    );
    Ok((chain, summary))
}
